use std::fmt::{Display, Formatter};
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Error};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{MAX_SUBMIT_SLOT, MAX_USERNAME_LENGTH, MIN_USERNAME_LENGTH};

lazy_static! {
    /// A username has to be usable as a file name on any POSIX system.
    static ref POSIX_SAFE_RE: Regex =
        Regex::new(r"^[0-9A-Za-z][0-9A-Za-z._+-]*$").expect("Invalid regex");
}

/// A username of the submit server.
///
/// Usernames end up in paths, both on the server and locally, so they are checked to be POSIX safe
/// file names.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Username(String);

/// The number of a slot of a user, between 0 and [`MAX_SUBMIT_SLOT`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SlotNum(u8);

/// A slot of a user.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotId {
    /// The owner of the slot.
    pub username: Username,
    /// The number of the slot.
    pub slot: SlotNum,
}

impl Username {
    /// Validate a username.
    pub fn new<S: Into<String>>(username: S) -> Result<Username, Error> {
        let username = username.into();
        if username.len() < MIN_USERNAME_LENGTH {
            bail!("Username is empty");
        }
        if username.len() > MAX_USERNAME_LENGTH {
            bail!(
                "Username is too long: {} > {}",
                username.len(),
                MAX_USERNAME_LENGTH
            );
        }
        if !POSIX_SAFE_RE.is_match(&username) {
            bail!("Username is not POSIX safe: {:?}", username);
        }
        Ok(Username(username))
    }

    /// The username as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Username {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Username {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Username::new(s)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for Username {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Username {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        let data = String::deserialize(deserializer)?;
        Username::new(data).map_err(D::Error::custom)
    }
}

impl SlotNum {
    /// Validate a slot number.
    pub fn new(slot: u8) -> Result<SlotNum, Error> {
        if slot > MAX_SUBMIT_SLOT {
            bail!(
                "Invalid slot number {}: slots go from 0 to {}",
                slot,
                MAX_SUBMIT_SLOT
            );
        }
        Ok(SlotNum(slot))
    }

    /// The slot number as an integer.
    pub fn get(self) -> u8 {
        self.0
    }

    /// All the valid slot numbers, in order.
    pub fn all() -> impl Iterator<Item = SlotNum> {
        (0..=MAX_SUBMIT_SLOT).map(SlotNum)
    }
}

impl Display for SlotNum {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for SlotNum {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            bail!("Slot number is not a decimal integer: {:?}", s);
        }
        let slot = s
            .parse::<u8>()
            .with_context(|| format!("Invalid slot number: {:?}", s))?;
        SlotNum::new(slot)
    }
}

impl TryFrom<u8> for SlotNum {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        SlotNum::new(value)
    }
}

impl From<SlotNum> for u8 {
    fn from(slot: SlotNum) -> u8 {
        slot.0
    }
}

impl SlotId {
    /// Make a new `SlotId`.
    pub fn new(username: Username, slot: SlotNum) -> SlotId {
        SlotId { username, slot }
    }

    /// Parse a slot directory path like the server ones, `.../users/<username>/<slot>`: the last
    /// component is the slot number and its parent is the username.
    pub fn from_slot_path<P: AsRef<Path>>(path: P) -> Result<SlotId, Error> {
        let path = path.as_ref();
        let slot = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("Slot path {} has no slot number", path.display()))?;
        let slot = slot.parse::<SlotNum>().with_context(|| {
            format!(
                "Last component of slot path {} is not a slot number",
                path.display()
            )
        })?;
        let username = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("Slot path {} has no username", path.display()))?;
        let username = Username::new(username)
            .with_context(|| format!("Invalid username in slot path {}", path.display()))?;
        Ok(SlotId { username, slot })
    }

    /// The path of the slot directory relative to the users directory: `<username>/<slot>`.
    pub fn relative_dir(&self) -> String {
        format!("{}/{}", self.username, self.slot)
    }
}

impl Display for SlotId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.username, self.slot)
    }
}

impl FromStr for SlotId {
    type Err = Error;

    /// Parse either `<username>/<slot>`, `<username>-<slot>` or a slot path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains('/') {
            return SlotId::from_slot_path(s.trim_end_matches('/'));
        }
        let (username, slot) = s
            .rsplit_once('-')
            .ok_or_else(|| anyhow!("Invalid slot {:?}: expecting <username>-<slot>", s))?;
        Ok(SlotId {
            username: Username::new(username)?,
            slot: slot.parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use speculoos::prelude::*;

    use super::*;

    const UUID: &str = "12345678-1234-4321-abcd-1234567890ab";

    #[test]
    fn test_username_valid() {
        assert_that(&Username::new("abc")).is_ok();
        assert_that(&Username::new(UUID)).is_ok();
        assert_that(&Username::new("a.b+c_d-e")).is_ok();
        assert_that(&Username::new("x".repeat(MAX_USERNAME_LENGTH))).is_ok();
    }

    #[test]
    fn test_username_invalid() {
        assert_that(&Username::new("")).is_err();
        assert_that(&Username::new(".hidden")).is_err();
        assert_that(&Username::new("-dash")).is_err();
        assert_that(&Username::new("with space")).is_err();
        assert_that(&Username::new("a/b")).is_err();
        assert_that(&Username::new("x".repeat(MAX_USERNAME_LENGTH + 1))).is_err();
    }

    #[test]
    fn test_slot_num() {
        assert_eq!(SlotNum::new(0).unwrap().get(), 0);
        assert_eq!(SlotNum::new(MAX_SUBMIT_SLOT).unwrap().get(), MAX_SUBMIT_SLOT);
        assert!(SlotNum::new(MAX_SUBMIT_SLOT + 1).is_err());
        assert!("3".parse::<SlotNum>().is_ok());
        assert!("+3".parse::<SlotNum>().is_err());
        assert!("10".parse::<SlotNum>().is_err());
        assert!("".parse::<SlotNum>().is_err());
        assert_eq!(SlotNum::all().count(), MAX_SUBMIT_SLOT as usize + 1);
    }

    #[test]
    fn test_slot_id_from_slot_path() {
        let id = SlotId::from_slot_path(format!("/var/ioccc/users/{}/7", UUID)).unwrap();
        assert_eq!(id.username.as_str(), UUID);
        assert_eq!(id.slot.get(), 7);
        assert_eq!(id.relative_dir(), format!("{}/7", UUID));
    }

    #[test]
    fn test_slot_id_from_slot_path_invalid() {
        assert!(SlotId::from_slot_path("/var/ioccc/users/user/x").is_err());
        assert!(SlotId::from_slot_path("/var/ioccc/users/user/11").is_err());
        assert!(SlotId::from_slot_path("7").is_err());
    }

    #[test]
    fn test_slot_id_from_str() {
        let dash: SlotId = format!("{}-2", UUID).parse().unwrap();
        let slash: SlotId = format!("{}/2", UUID).parse().unwrap();
        let path: SlotId = format!("users/{}/2/", UUID).parse().unwrap();
        assert_eq!(dash, slash);
        assert_eq!(dash, path);
        assert_eq!(dash.to_string(), format!("{}-2", UUID));
        assert!("nodash".parse::<SlotId>().is_err());
    }

    #[test]
    fn test_slot_id_serde() {
        let id: SlotId = "user-4".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#"{"username":"user","slot":4}"#);
        let back: SlotId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<SlotId>(r#"{"username":"user","slot":12}"#).is_err());
    }
}
