use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Error};
use ioccc_slot::{Sha256Digest, SlotNum, SubmitFilename, Username};
use serde::{Deserialize, Serialize};

use crate::fs::write_atomic;

/// Metadata of the current submission of a slot, stored in `.submit.sh`.
///
/// The file is a list of `KEY=value` lines with shell-quoted values, so that shell scripts can
/// just source it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitMeta {
    /// Owner of the slot.
    pub username: Username,
    /// Number of the slot.
    pub slot: SlotNum,
    /// Upload time of the tarball, seconds since the epoch.
    pub timestamp: u64,
    /// Name of the tarball.
    pub filename: SubmitFilename,
    /// Hash of the tarball.
    pub sha256: Sha256Digest,
    /// Length of the tarball, in bytes.
    pub length: u64,
    /// When the tarball has been collected.
    pub collected_at: String,
    /// Who collected the tarball, as `user@host`.
    pub collected_by: String,
}

impl SubmitMeta {
    /// Serialize as `KEY=value` lines.
    pub fn to_shell(&self) -> String {
        let fields = [
            ("SUBMIT_USERNAME", self.username.to_string()),
            ("SUBMIT_SLOT", self.slot.to_string()),
            ("SUBMIT_TIMESTAMP", self.timestamp.to_string()),
            ("SUBMIT_FILENAME", self.filename.to_string()),
            ("SUBMIT_SHA256", self.sha256.to_string()),
            ("SUBMIT_LENGTH", self.length.to_string()),
            ("SUBMIT_COLLECTED_AT", self.collected_at.clone()),
            ("SUBMIT_COLLECTED_BY", self.collected_by.clone()),
        ];
        fields
            .iter()
            .map(|(key, value)| format!("{}={}\n", key, shell_words::quote(value)))
            .collect()
    }

    /// Parse the content of a `.submit.sh`. Empty lines and comments are ignored.
    pub fn from_shell(content: &str) -> Result<SubmitMeta, Error> {
        let mut values = HashMap::new();
        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| anyhow!("Invalid line: {:?}", line))?;
            let words =
                shell_words::split(value).with_context(|| format!("Invalid value of {}", key))?;
            let value = match words.as_slice() {
                [] => String::new(),
                [value] => value.clone(),
                _ => bail!("Value of {} is not a single word", key),
            };
            values.insert(key, value);
        }
        let mut get = |key: &str| {
            values
                .remove(key)
                .ok_or_else(|| anyhow!("Missing {}", key))
        };
        let meta = SubmitMeta {
            username: Username::new(get("SUBMIT_USERNAME")?)?,
            slot: get("SUBMIT_SLOT")?.parse()?,
            timestamp: get("SUBMIT_TIMESTAMP")?
                .parse()
                .context("Invalid SUBMIT_TIMESTAMP")?,
            filename: SubmitFilename::parse(&get("SUBMIT_FILENAME")?)?,
            sha256: get("SUBMIT_SHA256")?.parse()?,
            length: get("SUBMIT_LENGTH")?
                .parse()
                .context("Invalid SUBMIT_LENGTH")?,
            collected_at: get("SUBMIT_COLLECTED_AT")?,
            collected_by: get("SUBMIT_COLLECTED_BY")?,
        };
        if meta.filename.id().username != meta.username
            || meta.filename.id().slot != meta.slot
            || meta.filename.timestamp() != meta.timestamp
        {
            bail!("SUBMIT_FILENAME does not match the other fields");
        }
        Ok(meta)
    }

    /// Load the metadata from a file, `None` if the file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<SubmitMeta>, Error> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let meta = SubmitMeta::from_shell(&content)
            .with_context(|| format!("Invalid metadata in {}", path.display()))?;
        Ok(Some(meta))
    }

    /// Atomically replace the file with this metadata.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        write_atomic(path, self.to_shell().as_bytes())
    }
}
