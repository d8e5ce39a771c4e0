use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Error};
use clap::Parser;
use log::warn;

use ioccc_submit_tool::error::NiceError;
use ioccc_submit_tool::{collector_name, CollectOptions, CollectOutcome, Collector, Opt};
use ioccc_store::CommitOutcome;

fn main() {
    let opt = Opt::parse();
    opt.logger.enable_log();
    main_collect(opt).nice_unwrap()
}

/// Entry point of the collector: collect all the slots in order, stopping early on ^C.
fn main_collect(opt: Opt) -> Result<(), Error> {
    let config = opt.config.load()?;
    let server = opt.remote.server(&config)?;
    let store = opt.store.open(&config)?;
    let checker = opt.checker.checker(&config)?;
    let collector = Collector::new(
        &server,
        &store,
        &checker,
        CollectOptions {
            keep_staged: opt.keep_staged,
            dry_run: opt.dry_run,
            collected_by: collector_name(),
        },
    );

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            eprintln!("Stopping after the current slot...");
            stop.store(true, Ordering::SeqCst);
        })
        .context("Failed to set ctrl-c handler")?;
    }

    let mut failed = 0;
    for id in &opt.slots {
        if stop.load(Ordering::SeqCst) {
            warn!("Interrupted, {} was not collected", id);
            failed += 1;
            continue;
        }
        match collector.collect_slot(id) {
            Ok(outcome) => print_outcome(id, &outcome),
            Err(e) => {
                failed += 1;
                eprintln!("{}: failed: {:?}", id, e);
            }
        }
    }
    if failed > 0 {
        bail!("{} of {} slots not collected", failed, opt.slots.len());
    }
    Ok(())
}

fn print_outcome(id: &ioccc_slot::SlotId, outcome: &CollectOutcome) {
    match outcome {
        CollectOutcome::Empty => println!("{}: empty", id),
        CollectOutcome::WouldCollect(file) => println!("{}: would collect {}", id, file),
        CollectOutcome::AlreadyCollected(file) => println!("{}: {} already collected", id, file),
        CollectOutcome::Collected { file, outcome } => match outcome {
            CommitOutcome::Committed { number, .. } => {
                println!("{}: collected {} as submission {}", id, file, number)
            }
            CommitOutcome::AlreadyCurrent => println!("{}: {} already collected", id, file),
            CommitOutcome::Stale { current } => {
                println!("{}: collected {}, older than {}", id, file, current)
            }
        },
        CollectOutcome::Rejected { file, report } => {
            println!("{}: rejected {}", id, file);
            report.print();
        }
    }
}
