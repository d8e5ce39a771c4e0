use anyhow::Error;

use crate::config::Config;
use crate::tools::opt::SetStatusOpt;

pub fn main_set_status(opt: SetStatusOpt, config: &Config) -> Result<(), Error> {
    let server = opt.remote.server(config)?;
    server.set_slot_status(&opt.slot, &opt.status, opt.collected)
}
