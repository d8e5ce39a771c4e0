//! Identity and metadata of the submit server slots.
//!
//! Every contestant of the submit server owns a fixed number of numbered slots, each one holding at
//! most one uploaded tarball. This crate contains the validated building blocks used by the rest of
//! the tooling to talk about them:
//!
//! - [`Username`], [`SlotNum`] and [`SlotId`] identify a slot;
//! - [`SubmitFilename`] is the name of a tarball uploaded into a slot;
//! - [`Sha256Digest`] is the hash the server records for every upload;
//! - [`SlotInfo`] is the `slot.json` document kept by the server for every slot.
//!
//! # Example
//!
//! ```
//! use ioccc_slot::{SlotId, SubmitFilename};
//!
//! # use anyhow::Error;
//! # fn main() -> Result<(), Error> {
//! let id: SlotId = "12345678-1234-4321-abcd-1234567890ab/3".parse()?;
//! let file = SubmitFilename::parse("submit.12345678-1234-4321-abcd-1234567890ab-3.1735689600.txz")?;
//! assert_eq!(file.id(), &id);
//! assert_eq!(file.timestamp(), 1735689600);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

#[macro_use]
extern crate log;

mod digest;
mod filename;
mod id;
mod info;

pub use digest::Sha256Digest;
pub use filename::SubmitFilename;
pub use id::{SlotId, SlotNum, Username};
pub use info::{SlotError, SlotInfo};

/// The highest slot number a user can upload into.
pub const MAX_SUBMIT_SLOT: u8 = 9;

/// Maximum length of a compressed submission tarball, in bytes.
pub const MAX_TARBALL_LEN: u64 = 3999971;

/// Minimum length of a username.
pub const MIN_USERNAME_LENGTH: usize = 1;

/// Maximum length of a username. UUID usernames are 36 characters long.
pub const MAX_USERNAME_LENGTH: usize = 40;

/// Value of the `no_comment` field of the slot JSON.
pub const NO_COMMENT_VALUE: &str =
    "mandatory comment: because comments were removed from the original JSON spec";

/// Version of the slot JSON format understood by this crate.
pub const SLOT_VERSION_VALUE: &str = "1.2 2025-01-26";

/// Format of the upload date stored inside the slot JSON.
pub const DATETIME_USEC_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f UTC";
