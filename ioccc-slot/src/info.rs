use anyhow::{Context, Error};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::digest::SHA256_HEXLEN;
use crate::{
    Sha256Digest, SlotId, SlotNum, SubmitFilename, DATETIME_USEC_FORMAT, NO_COMMENT_VALUE,
    SLOT_VERSION_VALUE,
};

/// Status of a slot that never received an upload.
const EMPTY_SLOT_STATUS: &str = "slot is empty";

/// The content of the `slot.json` file the server keeps in every slot directory.
///
/// The fields are kept as loose as the JSON is, [`SlotInfo::validate`] checks them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInfo {
    /// Fixed comment, see [`NO_COMMENT_VALUE`].
    pub no_comment: String,
    /// Version of the format, see [`SLOT_VERSION_VALUE`].
    #[serde(rename = "slot_JSON_format_version")]
    pub format_version: String,
    /// The number of the slot.
    pub slot: i64,
    /// Name of the uploaded file, `null` if nothing was ever uploaded.
    pub filename: Option<String>,
    /// Length of the uploaded file, in bytes.
    pub length: Option<i64>,
    /// Upload date.
    pub date: Option<String>,
    /// SHA256 of the uploaded file.
    #[serde(rename = "SHA256")]
    pub sha256: Option<String>,
    /// Whether the judges already collected the upload.
    pub collected: bool,
    /// Free text status shown to the contestant.
    pub status: String,
}

/// A reason for which a `slot.json` is not valid.
#[allow(missing_docs)]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    #[error("invalid slot no_comment")]
    InvalidNoComment,
    #[error("invalid slot_JSON_format_version: {0:?}")]
    InvalidVersion(String),
    #[error("wrong slot number: expecting {expected}, found {found}")]
    WrongSlot { expected: SlotNum, found: i64 },
    #[error("invalid slot filename {0:?}: {1}")]
    InvalidFilename(String, String),
    #[error("slot filename {0:?} belongs to slot {1}")]
    ForeignFilename(String, SlotId),
    #[error("slot length is missing")]
    MissingLength,
    #[error("slot length not >= 0")]
    NegativeLength,
    #[error("slot date is missing")]
    MissingDate,
    #[error("slot date format is invalid: {0:?}")]
    InvalidDate(String),
    #[error("slot SHA256 is missing")]
    MissingSha256,
    #[error("slot SHA256 is invalid: {0:?}")]
    InvalidSha256(String),
    #[error("have {0} w/o filename")]
    FieldWithoutFilename(&'static str),
    #[error("submit file was collected w/o filename")]
    CollectedWithoutFilename,
}

impl SlotInfo {
    /// The content of a slot that never received an upload.
    pub fn empty(slot: SlotNum) -> SlotInfo {
        SlotInfo {
            no_comment: NO_COMMENT_VALUE.into(),
            format_version: SLOT_VERSION_VALUE.into(),
            slot: slot.get().into(),
            filename: None,
            length: None,
            date: None,
            sha256: None,
            collected: false,
            status: EMPTY_SLOT_STATUS.into(),
        }
    }

    /// Parse the content of a `slot.json`.
    pub fn from_json(content: &str) -> Result<SlotInfo, Error> {
        serde_json::from_str(content).context("Failed to parse slot JSON")
    }

    /// Check that this is a consistent slot JSON for the slot `id`.
    ///
    /// When `filename` is set, `length`, `date` and `SHA256` must be set and valid. When it is
    /// `null` they must be `null` too and the slot cannot be marked as collected.
    pub fn validate(&self, id: &SlotId) -> Result<(), SlotError> {
        if self.no_comment != NO_COMMENT_VALUE {
            return Err(SlotError::InvalidNoComment);
        }
        if self.format_version != SLOT_VERSION_VALUE {
            return Err(SlotError::InvalidVersion(self.format_version.clone()));
        }
        if self.slot != i64::from(id.slot.get()) {
            return Err(SlotError::WrongSlot {
                expected: id.slot,
                found: self.slot,
            });
        }
        match &self.filename {
            Some(filename) => {
                let parsed = SubmitFilename::parse(filename)
                    .map_err(|e| SlotError::InvalidFilename(filename.clone(), e.to_string()))?;
                if parsed.id() != id {
                    return Err(SlotError::ForeignFilename(
                        filename.clone(),
                        parsed.id().clone(),
                    ));
                }
                match self.length {
                    None => return Err(SlotError::MissingLength),
                    Some(length) if length < 0 => return Err(SlotError::NegativeLength),
                    _ => {}
                }
                match &self.date {
                    None => return Err(SlotError::MissingDate),
                    Some(date) => {
                        if NaiveDateTime::parse_from_str(date, DATETIME_USEC_FORMAT).is_err() {
                            return Err(SlotError::InvalidDate(date.clone()));
                        }
                    }
                }
                match &self.sha256 {
                    None => return Err(SlotError::MissingSha256),
                    Some(sha) => {
                        if sha.len() != SHA256_HEXLEN || sha.parse::<Sha256Digest>().is_err() {
                            return Err(SlotError::InvalidSha256(sha.clone()));
                        }
                    }
                }
            }
            None => {
                if self.length.is_some() {
                    return Err(SlotError::FieldWithoutFilename("length"));
                }
                if self.date.is_some() {
                    return Err(SlotError::FieldWithoutFilename("date"));
                }
                if self.sha256.is_some() {
                    return Err(SlotError::FieldWithoutFilename("SHA256"));
                }
                if self.collected {
                    return Err(SlotError::CollectedWithoutFilename);
                }
            }
        }
        Ok(())
    }

    /// The uploaded file of this slot, if any. The slot should be validated first.
    pub fn submit_filename(&self) -> Option<SubmitFilename> {
        self.filename
            .as_deref()
            .and_then(|f| SubmitFilename::parse(f).ok())
    }

    /// The SHA256 of the uploaded file, if any. The slot should be validated first.
    pub fn digest(&self) -> Option<Sha256Digest> {
        self.sha256.as_deref().and_then(|s| s.parse().ok())
    }

    /// The length of the uploaded file, if any. The slot should be validated first.
    pub fn length(&self) -> Option<u64> {
        self.length.and_then(|l| u64::try_from(l).ok())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const SHA: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn id() -> SlotId {
        "user-2".parse().unwrap()
    }

    fn uploaded() -> SlotInfo {
        SlotInfo {
            filename: Some("submit.user-2.1735689600.txz".into()),
            length: Some(11),
            date: Some("2025-01-01 00:00:00.123456 UTC".into()),
            sha256: Some(SHA.into()),
            status: "uploaded".into(),
            ..SlotInfo::empty(SlotNum::new(2).unwrap())
        }
    }

    #[test]
    fn test_empty_is_valid() {
        let info = SlotInfo::empty(SlotNum::new(2).unwrap());
        assert_eq!(info.validate(&id()), Ok(()));
        assert!(info.submit_filename().is_none());
    }

    #[test]
    fn test_uploaded_is_valid() {
        let info = uploaded();
        assert_eq!(info.validate(&id()), Ok(()));
        assert_eq!(info.submit_filename().unwrap().timestamp(), 1735689600);
        assert_eq!(info.digest().unwrap().to_string(), SHA);
        assert_eq!(info.length(), Some(11));
    }

    #[test]
    fn test_json_roundtrip_field_names() {
        let json = r#"{
            "no_comment": "mandatory comment: because comments were removed from the original JSON spec",
            "slot_JSON_format_version":  "1.2 2025-01-26",
            "slot": 2,
            "filename": null,
            "length": null,
            "date": null,
            "SHA256": null,
            "collected": false,
            "status": "slot is empty"
        }"#;
        let info = SlotInfo::from_json(json).unwrap();
        assert_eq!(info, SlotInfo::empty(SlotNum::new(2).unwrap()));
        let back = serde_json::to_value(&info).unwrap();
        assert!(back.get("SHA256").is_some());
        assert!(back.get("slot_JSON_format_version").is_some());
    }

    #[test]
    fn test_wrong_slot() {
        let info = SlotInfo::empty(SlotNum::new(3).unwrap());
        assert!(matches!(
            info.validate(&id()),
            Err(SlotError::WrongSlot { found: 3, .. })
        ));
    }

    #[test]
    fn test_foreign_filename() {
        let mut info = uploaded();
        info.filename = Some("submit.other-2.1735689600.txz".into());
        assert!(matches!(
            info.validate(&id()),
            Err(SlotError::ForeignFilename(..))
        ));
    }

    #[test]
    fn test_invalid_fields() {
        let mut info = uploaded();
        info.date = Some("yesterday".into());
        assert!(matches!(info.validate(&id()), Err(SlotError::InvalidDate(_))));

        let mut info = uploaded();
        info.sha256 = Some("abcd".into());
        assert!(matches!(
            info.validate(&id()),
            Err(SlotError::InvalidSha256(_))
        ));

        let mut info = uploaded();
        info.length = Some(-1);
        assert_eq!(info.validate(&id()), Err(SlotError::NegativeLength));

        let mut info = uploaded();
        info.length = None;
        assert_eq!(info.validate(&id()), Err(SlotError::MissingLength));
    }

    #[test]
    fn test_fields_without_filename() {
        let mut info = SlotInfo::empty(SlotNum::new(2).unwrap());
        info.sha256 = Some(SHA.into());
        assert_eq!(
            info.validate(&id()),
            Err(SlotError::FieldWithoutFilename("SHA256"))
        );

        let mut info = SlotInfo::empty(SlotNum::new(2).unwrap());
        info.collected = true;
        assert_eq!(info.validate(&id()), Err(SlotError::CollectedWithoutFilename));
    }

    #[test]
    fn test_version_mismatch() {
        let mut info = uploaded();
        info.format_version = "1.0".into();
        assert!(matches!(
            info.validate(&id()),
            Err(SlotError::InvalidVersion(_))
        ));
    }
}
