use std::fmt::{Display, Formatter};
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Error};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{SlotId, SlotNum, Username};

/// Prefix of every submit file.
const PREFIX: &str = "submit.";
/// Extension of every submit file.
const SUFFIX: &str = ".txz";
/// Minimum number of digits of the upload timestamp.
const MIN_TIMESTAMP_DIGITS: usize = 10;

/// The name of a tarball uploaded in a slot: `submit.<username>-<slot>.<timestamp>.txz`.
///
/// The timestamp is the upload time in seconds since the epoch and it's at least 10 digits long,
/// without leading zeros.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubmitFilename {
    /// The slot the file has been uploaded into.
    id: SlotId,
    /// The upload timestamp.
    timestamp: u64,
}

impl SubmitFilename {
    /// Make the file name of an upload in a slot at the given time.
    pub fn new(id: SlotId, timestamp: u64) -> Result<SubmitFilename, Error> {
        if timestamp.to_string().len() < MIN_TIMESTAMP_DIGITS {
            bail!(
                "Timestamp {} is too small, at least {} digits are required",
                timestamp,
                MIN_TIMESTAMP_DIGITS
            );
        }
        Ok(SubmitFilename { id, timestamp })
    }

    /// Parse a submit file name.
    ///
    /// Usernames can contain both `.` and `-`, so the timestamp is split at the last dot and the
    /// slot number at the last dash.
    pub fn parse(name: &str) -> Result<SubmitFilename, Error> {
        let inner = name
            .strip_prefix(PREFIX)
            .ok_or_else(|| anyhow!("{:?} does not begin with {}", name, PREFIX))?
            .strip_suffix(SUFFIX)
            .ok_or_else(|| anyhow!("{:?} does not end with {}", name, SUFFIX))?;
        let (slot_part, timestamp) = inner
            .rsplit_once('.')
            .ok_or_else(|| anyhow!("{:?} has no timestamp", name))?;
        if timestamp.len() < MIN_TIMESTAMP_DIGITS
            || timestamp.starts_with('0')
            || !timestamp.bytes().all(|b| b.is_ascii_digit())
        {
            bail!("{:?} has an invalid timestamp: {:?}", name, timestamp);
        }
        let timestamp = timestamp
            .parse::<u64>()
            .with_context(|| format!("{:?} has an invalid timestamp", name))?;
        let (username, slot) = slot_part
            .rsplit_once('-')
            .ok_or_else(|| anyhow!("{:?} does not contain <username>-<slot>", name))?;
        let username =
            Username::new(username).with_context(|| format!("Invalid username in {:?}", name))?;
        let slot = slot
            .parse::<SlotNum>()
            .with_context(|| format!("Invalid slot number in {:?}", name))?;
        Ok(SubmitFilename {
            id: SlotId::new(username, slot),
            timestamp,
        })
    }

    /// Parse the file name of a path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<SubmitFilename, Error> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("{} has no valid file name", path.display()))?;
        SubmitFilename::parse(name)
    }

    /// The slot of this upload.
    pub fn id(&self) -> &SlotId {
        &self.id
    }

    /// The upload timestamp, in seconds since the epoch.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// The name of the directory inside the tarball: the file name without the extension.
    pub fn stem(&self) -> String {
        format!("{}{}.{}", PREFIX, self.id, self.timestamp)
    }
}

impl Display for SubmitFilename {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.stem(), SUFFIX)
    }
}

impl FromStr for SubmitFilename {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubmitFilename::parse(s)
    }
}

impl Serialize for SubmitFilename {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SubmitFilename {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        let data = String::deserialize(deserializer)?;
        SubmitFilename::parse(&data).map_err(D::Error::custom)
    }
}
