use anyhow::Error;

use crate::config::Config;
use crate::tools::opt::ClearOpt;

pub fn main_clear(opt: ClearOpt, config: &Config) -> Result<(), Error> {
    let store = opt.store.open(config)?;
    let summary = store.clear_leftovers()?;
    println!(
        "Removed {} scratch directories and {} files in inbound/",
        summary.scratch, summary.inbound
    );
    Ok(())
}
