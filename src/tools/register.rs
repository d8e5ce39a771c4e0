use anyhow::{Context, Error};
use ioccc_slot::Username;
use ioccc_store::CollectStore;

use crate::config::Config;
use crate::tools::opt::RegisterOpt;

pub fn main_register(opt: RegisterOpt, config: &Config) -> Result<(), Error> {
    let store = opt.store.open(config)?;
    let username = register(&store, &opt.email, opt.name.as_deref())?;
    println!("{}", username);
    Ok(())
}

/// Add a contestant to the registry of the store and save it.
pub fn register(store: &CollectStore, email: &str, name: Option<&str>) -> Result<Username, Error> {
    let mut registry = store.registry()?;
    let username = registry.register(email, name)?;
    registry
        .save()
        .with_context(|| format!("Failed to save the registration of {}", email))?;
    Ok(username)
}
