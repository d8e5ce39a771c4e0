//! The local collect tree, where the collected submissions are stored.
//!
//! A submission goes through these states, each one identified only by where its files are:
//!
//! - _staged_: the tarball has been fetched into `inbound/`;
//! - _validated_: the tarball passed the checks and has been unpacked in `tmp/`;
//! - _committed_: tarball and unpacked tree are in `slots/<username>-<slot>/` and the `.txz`
//!   symlink of the slot points to the tarball;
//! - _rejected_: the tarball has been moved into `errors/`, next to a log with the reasons.
//!
//! Moving between states only uses renames inside the tree, so an interrupted run leaves the tree
//! in a state from which running again completes the work.
//!
//! # Example
//!
//! ```
//! use ioccc_store::{CollectStore, SubmissionState};
//! use ioccc_slot::SubmitFilename;
//!
//! # use anyhow::Error;
//! # use tempfile::TempDir;
//! # fn main() -> Result<(), Error> {
//! # let tmp = TempDir::new()?;
//! // this will wait if another collector is using the same tree
//! let store = CollectStore::open(tmp.path())?;
//! let file = SubmitFilename::parse("submit.user-1.1735689600.txz")?;
//! assert_eq!(store.submission_state(&file), SubmissionState::Absent);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

#[macro_use]
extern crate log;

mod fs;
mod meta;
mod numbers;
mod registry;
mod state;
mod store;

pub use meta::SubmitMeta;
pub use numbers::{SubmissionNumbers, NUM_FILE};
pub use registry::{Contestant, Registry};
pub use state::{SlotState, SubmissionState};
pub use store::{ClearSummary, CollectStore, Commit, CommitOutcome};

/// Symlink, inside a slot directory, to the current tarball.
pub const CURRENT_LINK: &str = ".txz";
/// Symlink, inside a slot directory, to the tarball before the current one.
pub const PREVIOUS_LINK: &str = ".prev";
/// File, inside a slot directory, with the [`SubmitMeta`] of the current tarball.
pub const SUBMIT_META_FILE: &str = ".submit.sh";
