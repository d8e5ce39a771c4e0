//! # ioccc-submit-tool
//!
//! The judges' side of the IOCCC submit server. Contestants upload their tarballs into the slots
//! of the submit server; this crate collects them: the slot is staged on the server, the tarball
//! is fetched, checked with the external validators and committed into the local collect tree,
//! and finally the slot status on the server is updated.
//!
//! This is both an application and a library: `ioccc-collect` and `ioccc-tools` are thin wrappers
//! around [`Collector`], [`post_collect`] and the [`tools`].

#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;

mod collect;
pub mod config;
pub mod error;
pub mod opt;
mod post_collect;
pub mod tools;

pub use collect::{
    CollectOptions, CollectOutcome, Collector, COLLECTED_STATUS, REJECTED_STATUS_PREFIX,
};
pub use opt::*;
pub use post_collect::{post_collect, PostCollectOutcome};

/// Who is running the tool, as `user@host`. Recorded in the metadata of the collected slots.
pub fn collector_name() -> String {
    format!("{}@{}", whoami::username(), whoami::hostname())
}
