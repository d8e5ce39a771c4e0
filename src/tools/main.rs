use clap::Parser;

use ioccc_submit_tool::error::NiceError;
use ioccc_submit_tool::tools::clear::main_clear;
use ioccc_submit_tool::tools::delete::main_delete;
use ioccc_submit_tool::tools::gen_autocompletion::main_get_autocompletion;
use ioccc_submit_tool::tools::info::main_info;
use ioccc_submit_tool::tools::opt::{Opt, Tool};
use ioccc_submit_tool::tools::post_collect::main_post_collect;
use ioccc_submit_tool::tools::provision::main_provision;
use ioccc_submit_tool::tools::register::main_register;
use ioccc_submit_tool::tools::set_status::main_set_status;

fn main() {
    let base_opt = Opt::parse();
    base_opt.logger.enable_log();

    let config = base_opt.config.load().nice_unwrap();
    match base_opt.tool {
        Tool::Register(opt) => main_register(opt, &config),
        Tool::Provision(opt) => main_provision(opt, &config),
        Tool::Delete(opt) => main_delete(opt, &config),
        Tool::PostCollect(opt) => main_post_collect(opt, &config),
        Tool::SetStatus(opt) => main_set_status(opt, &config),
        Tool::Info(opt) => main_info(opt, &config),
        Tool::Clear(opt) => main_clear(opt, &config),
        Tool::GenAutocompletion(opt) => main_get_autocompletion(opt),
    }
    .nice_unwrap()
}
