use anyhow::{Context, Error};
use colored::Colorize;
use itertools::Itertools;

use ioccc_store::SlotState;

use crate::config::Config;
use crate::tools::opt::InfoOpt;

pub fn main_info(opt: InfoOpt, config: &Config) -> Result<(), Error> {
    let store = opt.store.open(config)?;
    let slots = store.list_slots()?;
    if opt.json {
        let json = serde_json::to_string(&slots).context("Non-serializable slot info")?;
        println!("{}", json);
    } else {
        for slot in &slots {
            print_slot(slot);
        }
        let committed = slots.iter().filter(|s| s.is_committed()).count();
        println!("{} slots, {} committed", slots.len(), committed);
    }
    Ok(())
}

fn print_slot(slot: &SlotState) {
    let state = if slot.is_committed() {
        "committed".green().bold()
    } else if slot.current.is_some() {
        "incomplete".yellow().bold()
    } else {
        "empty".bold()
    };
    println!("{} [{}]", slot.id.to_string().bold(), state);
    if let Some(number) = slot.number {
        println!("    number:   {}", number);
    }
    if let Some(current) = &slot.current {
        println!("    current:  {}", current);
    }
    if let Some(previous) = &slot.previous {
        println!("    previous: {}", previous);
    }
    if let Some(meta) = &slot.meta {
        println!("    sha256:   {} ({} bytes)", meta.sha256, meta.length);
        println!("    collected {} by {}", meta.collected_at, meta.collected_by);
    }
    if slot.tarballs.len() > 1 {
        println!(
            "    tarballs: {}",
            slot.tarballs.iter().map(|t| t.to_string()).join(", ")
        );
    }
}
