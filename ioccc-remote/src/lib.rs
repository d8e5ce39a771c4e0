//! Talking to the submit server.
//!
//! The submit server is reached only via `ssh` and `scp`, and all the slot management happens
//! through the Python tools installed on it (`stage.py`, `set_slot_status.py` and
//! `ioccc_passwd.py`). This crate wraps those invocations:
//!
//! - a [`Transport`] runs a command line on the server and copies files from it. The real one is
//!   [`SshTransport`], tests use [`mock::MockTransport`];
//! - [`SubmitServer`] knows where things are on the server and speaks the tools' output formats,
//!   including the [`StageReply`] printed by `stage.py`.
//!
//! Staging moves the tarball of a slot out of the slot directory into the server's `staged/`
//! directory, where it stays until the collector removes it after a successful commit. Every
//! operation is safe to repeat: running `stage.py` on an already staged slot fails without
//! touching the staged file.

#![deny(missing_docs)]

#[macro_use]
extern crate log;

mod error;
pub mod mock;
mod server;
mod stage;
mod transport;

pub use error::RemoteError;
pub use server::{AccountFlags, AddUserOutcome, ServerLayout, SubmitServer};
pub use stage::StageReply;
pub use transport::{RemoteConfig, RemoteOutput, SshTransport, Transport};
