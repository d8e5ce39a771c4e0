use anyhow::{bail, Error};

use ioccc_store::CommitOutcome;

use crate::collector_name;
use crate::config::Config;
use crate::post_collect::{post_collect, PostCollectOutcome};
use crate::tools::opt::PostCollectOpt;

pub fn main_post_collect(opt: PostCollectOpt, config: &Config) -> Result<(), Error> {
    let store = opt.store.open(config)?;
    let checker = opt.checker.checker(config)?;
    let outcome = post_collect(
        &store,
        &checker,
        &opt.tarball,
        opt.sha256.as_ref(),
        &collector_name(),
    )?;
    outcome.report().print();
    match outcome {
        PostCollectOutcome::Committed { file, outcome, .. } => {
            match outcome {
                CommitOutcome::Committed { number, .. } => {
                    println!("{} committed as submission {}", file, number)
                }
                CommitOutcome::AlreadyCurrent => println!("{} was already committed", file),
                CommitOutcome::Stale { current } => {
                    println!("{} stored, but {} is newer and stays current", file, current)
                }
            }
            Ok(())
        }
        PostCollectOutcome::Rejected { file, .. } => {
            bail!(
                "{} has been rejected, see {}",
                file,
                store.error_path(&file).display()
            )
        }
    }
}
