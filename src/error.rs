use anyhow::Error;
use colored::Colorize;

use ioccc_remote::RemoteError;

/// Ends a binary printing the error chain instead of panicking.
pub trait NiceError<T> {
    /// Return the content, or print the error with its causes and exit with `1`.
    fn nice_unwrap(self) -> T;
}

/// A suggestion for the operator, for the errors that have a usual cause.
fn hint(error: &Error) -> Option<&'static str> {
    match error.chain().find_map(|e| e.downcast_ref::<RemoteError>())? {
        RemoteError::Connection { .. } => {
            Some("check --host, --remote-user and --identity, ssh runs in batch mode")
        }
        RemoteError::StageFailed { .. } => {
            Some("the slot may have been emptied or re-uploaded, run the collector again")
        }
        _ => None,
    }
}

fn print_error(error: Error) {
    debug!("{:?}", error);
    eprintln!("{} {}", "Error:".red().bold(), error);
    for cause in error.chain().skip(1) {
        eprintln!("  {} {}", "caused by:".bold(), cause);
    }
    if let Some(hint) = hint(&error) {
        eprintln!("  {} {}", "hint:".yellow().bold(), hint);
    }
}

impl<T> NiceError<T> for Result<T, Error> {
    fn nice_unwrap(self) -> T {
        match self {
            Ok(x) => x,
            Err(e) => {
                print_error(e);
                std::process::exit(1);
            }
        }
    }
}
