//! Validation of the submissions fetched from the submit server.
//!
//! The actual checks are done by external tools: `txzchk` looks at the compressed tarball, `tar`
//! unpacks it and `chkentry` looks at the unpacked submission directory. [`ExternalChecker`]
//! runs them and turns their failures into [`Diagnostic`]s collected in a [`CheckReport`].
//!
//! The [`Checker`] trait allows replacing the tools in tests.

#![deny(missing_docs)]

#[macro_use]
extern crate log;

mod checker;
mod diagnostic;

pub use checker::{check_length, Checker, CheckerTools, ExternalChecker, Unpacked};
pub use diagnostic::{CheckReport, Diagnostic, DiagnosticLevel};
