use thiserror::Error;

/// A failure talking to the submit server that the callers may want to handle.
#[allow(missing_docs)]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Cannot connect to {host}: {stderr}")]
    Connection { host: String, stderr: String },
    #[error("Remote command `{command}` failed with exit code {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("Invalid slot JSON at {path}: {reason}")]
    InvalidSlotJson { path: String, reason: String },
    #[error("Malformed reply from stage.py: {0:?}")]
    MalformedStageReply(String),
    #[error("stage.py failed with exit.{code} ({unexpected} files moved to unexpected)")]
    StageFailed { code: u32, unexpected: u32 },
}
