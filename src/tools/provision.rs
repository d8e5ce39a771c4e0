use anyhow::{bail, Context, Error};
use rand::Rng;

use ioccc_remote::{AccountFlags, AddUserOutcome, SubmitServer};
use ioccc_slot::Username;
use ioccc_store::CollectStore;

use crate::config::Config;
use crate::tools::opt::ProvisionOpt;

/// Characters of the generated passwords: no `0O1lI` and friends.
const PASSWORD_ALPHABET: &[u8] = b"abcdefghijkmnpqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789+-=_";
/// Length of the generated passwords.
const GENERATED_PASSWORD_LENGTH: usize = 16;
/// Minimum length of a password given by the operator.
const MIN_PASSWORD_LENGTH: usize = 15;
/// Maximum length of a password given by the operator.
const MAX_PASSWORD_LENGTH: usize = 40;

/// What [`provision`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provisioned {
    /// The account has been created with this password.
    Created(String),
    /// The account was already on the server, its password is unknown and has not been changed.
    AlreadyExists,
}

pub fn main_provision(opt: ProvisionOpt, config: &Config) -> Result<(), Error> {
    let store = opt.store.open(config)?;
    let server = opt.remote.server(config)?;
    let flags = AccountFlags {
        force_change: opt.force_change,
        grace: opt.grace,
        nologin: opt.nologin,
        ignore_date: opt.ignore_date,
    };
    match provision(&store, &server, &opt.username, opt.password, &flags)? {
        Provisioned::Created(password) => println!("{} {}", opt.username, password),
        Provisioned::AlreadyExists => {
            eprintln!(
                "{} already exists on the server, its password has not been changed",
                opt.username
            );
        }
    }
    Ok(())
}

/// Create the account of a registered contestant on the server.
///
/// An account already present on the server is considered provisioned, but it keeps its
/// password. The password is never written to disk.
pub fn provision(
    store: &CollectStore,
    server: &SubmitServer,
    username: &Username,
    password: Option<String>,
    flags: &AccountFlags,
) -> Result<Provisioned, Error> {
    let mut registry = store.registry()?;
    if registry.get(username).is_none() {
        bail!("{} is not registered", username);
    }
    let password = match password {
        Some(password) => {
            check_password(&password)?;
            password
        }
        None => generate_password(),
    };
    let provisioned = match server.add_user(username, &password, flags)? {
        AddUserOutcome::Added => {
            info!("Account {} created", username);
            Provisioned::Created(password)
        }
        AddUserOutcome::AlreadyExists => {
            warn!("The password of {} was not changed", username);
            Provisioned::AlreadyExists
        }
    };
    registry.mark_provisioned(username)?;
    registry
        .save()
        .with_context(|| format!("Failed to save the provisioning of {}", username))?;
    Ok(provisioned)
}

/// A random password, readable without confusing similar characters.
pub fn generate_password() -> String {
    let mut rng = rand::rng();
    (0..GENERATED_PASSWORD_LENGTH)
        .map(|_| PASSWORD_ALPHABET[rng.random_range(0..PASSWORD_ALPHABET.len())] as char)
        .collect()
}

/// Check a password chosen by the operator.
pub fn check_password(password: &str) -> Result<(), Error> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&len) {
        bail!(
            "The password must be {} to {} characters long, it is {}",
            MIN_PASSWORD_LENGTH,
            MAX_PASSWORD_LENGTH,
            len
        );
    }
    if password.chars().any(|c| c.is_whitespace() || c.is_control()) {
        bail!("The password must not contain spaces or control characters");
    }
    Ok(())
}
