use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Error};
use ioccc_slot::{Username, DATETIME_USEC_FORMAT};
use serde::{Deserialize, Serialize};

use crate::fs::write_atomic;

/// How many fresh usernames to try before giving up.
const MAX_USERNAME_ATTEMPTS: usize = 10;

/// A registered contestant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contestant {
    /// Email address of the contestant, unique in the registry.
    pub email: String,
    /// Name of the contestant, if provided.
    pub name: Option<String>,
    /// When the contestant registered.
    pub registered: String,
    /// Whether the account has been created on the submit server.
    pub provisioned: bool,
}

/// The registered contestants, stored in a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    #[serde(skip)]
    path: PathBuf,
    contestants: BTreeMap<Username, Contestant>,
}

impl Registry {
    /// Load the registry from `path`, an empty registry if it does not exist.
    pub fn load<P: Into<PathBuf>>(path: P) -> Result<Registry, Error> {
        let path = path.into();
        if !path.exists() {
            debug!("Registry at {} not found, creating new one", path.display());
            return Ok(Registry {
                path,
                contestants: BTreeMap::new(),
            });
        }
        debug!("Loading registry from {}", path.display());
        let content = std::fs::read(&path)
            .with_context(|| format!("Failed to read registry from {}", path.display()))?;
        let mut registry: Registry = serde_json::from_slice(&content)
            .with_context(|| format!("Invalid registry at {}", path.display()))?;
        registry.path = path;
        Ok(registry)
    }

    /// Atomically store the registry.
    pub fn save(&self) -> Result<(), Error> {
        debug!("Saving registry at {}", self.path.display());
        let content = serde_json::to_vec_pretty(self).context("Failed to serialize registry")?;
        write_atomic(&self.path, &content)
    }

    /// Where the registry is stored.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Register a new contestant, returning the new username.
    ///
    /// The registry is not saved.
    pub fn register(&mut self, email: &str, name: Option<&str>) -> Result<Username, Error> {
        let email = email.trim();
        match email.split_once('@') {
            Some((user, domain)) if !user.is_empty() && domain.contains('.') => {}
            _ => bail!("Invalid email address: {:?}", email),
        }
        if let Some((username, _)) = self
            .contestants
            .iter()
            .find(|(_, c)| c.email.eq_ignore_ascii_case(email))
        {
            bail!("{} is already registered as {}", email, username);
        }
        let username = self.fresh_username()?;
        self.contestants.insert(
            username.clone(),
            Contestant {
                email: email.to_string(),
                name: name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
                registered: chrono::Utc::now().format(DATETIME_USEC_FORMAT).to_string(),
                provisioned: false,
            },
        );
        info!("Registered {} as {}", email, username);
        Ok(username)
    }

    /// A UUID username not yet in the registry, of the form `xxxxxxxx-xxxx-4xxx-axxx-xxxxxxxxxxxx`.
    fn fresh_username(&self) -> Result<Username, Error> {
        for _ in 0..MAX_USERNAME_ATTEMPTS {
            let mut uuid = uuid::Uuid::new_v4().hyphenated().to_string();
            uuid.replace_range(19..20, "a");
            let username = Username::new(uuid)?;
            if !self.contestants.contains_key(&username) {
                return Ok(username);
            }
        }
        bail!(
            "Failed to find a fresh username in {} attempts",
            MAX_USERNAME_ATTEMPTS
        )
    }

    /// Mark the account of the contestant as created on the submit server.
    pub fn mark_provisioned(&mut self, username: &Username) -> Result<(), Error> {
        match self.contestants.get_mut(username) {
            Some(contestant) => {
                contestant.provisioned = true;
                Ok(())
            }
            None => bail!("{} is not registered", username),
        }
    }

    /// Mark the account of the contestant as removed from the submit server.
    pub fn mark_deleted(&mut self, username: &Username) -> Result<(), Error> {
        match self.contestants.get_mut(username) {
            Some(contestant) => {
                contestant.provisioned = false;
                Ok(())
            }
            None => bail!("{} is not registered", username),
        }
    }

    /// Forget a contestant, returning what was known about it.
    pub fn remove(&mut self, username: &Username) -> Option<Contestant> {
        self.contestants.remove(username)
    }

    /// Information about a contestant.
    pub fn get(&self, username: &Username) -> Option<&Contestant> {
        self.contestants.get(username)
    }

    /// All the contestants, sorted by username.
    pub fn iter(&self) -> impl Iterator<Item = (&Username, &Contestant)> {
        self.contestants.iter()
    }
}
