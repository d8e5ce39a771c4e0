use ioccc_slot::Sha256Digest;

use crate::RemoteError;

/// What `stage.py` printed.
///
/// On success it prints `<sha256> <unexpected_count>`, on failure `exit.<code> <unexpected_count>`.
/// The unexpected count is the number of stray `submit.*.txz` files found in the slot and moved to
/// the server's `unexpected/` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageReply {
    /// The slot's tarball is now in `staged/`.
    Staged {
        /// SHA256 of the staged file, as recorded in the slot JSON.
        digest: Sha256Digest,
        /// Number of stray files moved away.
        unexpected: u32,
    },
    /// Nothing was staged.
    Failed {
        /// The exit code reported by `stage.py`.
        code: u32,
        /// Number of stray files moved away.
        unexpected: u32,
    },
}

impl StageReply {
    /// Parse the stdout of `stage.py`, only its last non-empty line is considered.
    pub fn parse(stdout: &str) -> Result<StageReply, RemoteError> {
        let malformed = || RemoteError::MalformedStageReply(stdout.trim().to_string());
        let line = stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
            .ok_or_else(malformed)?;
        let mut parts = line.split_whitespace();
        let (first, count) = match (parts.next(), parts.next(), parts.next()) {
            (Some(first), Some(count), None) => (first, count),
            _ => return Err(malformed()),
        };
        let unexpected = count.parse::<u32>().map_err(|_| malformed())?;
        if let Some(code) = first.strip_prefix("exit.") {
            let code = code.parse::<u32>().map_err(|_| malformed())?;
            return Ok(StageReply::Failed { code, unexpected });
        }
        let digest = first.parse::<Sha256Digest>().map_err(|_| malformed())?;
        Ok(StageReply::Staged { digest, unexpected })
    }

    /// Number of stray files moved to `unexpected/` by the server.
    pub fn unexpected(&self) -> u32 {
        match self {
            StageReply::Staged { unexpected, .. } | StageReply::Failed { unexpected, .. } => {
                *unexpected
            }
        }
    }

    /// The digest of the staged file, failing with [`RemoteError::StageFailed`] if nothing was
    /// staged.
    pub fn into_digest(self) -> Result<Sha256Digest, RemoteError> {
        match self {
            StageReply::Staged { digest, .. } => Ok(digest),
            StageReply::Failed { code, unexpected } => {
                Err(RemoteError::StageFailed { code, unexpected })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const SHA: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_parse_staged() {
        let reply = StageReply::parse(&format!("{} 0\n", SHA)).unwrap();
        assert_eq!(
            reply,
            StageReply::Staged {
                digest: SHA.parse().unwrap(),
                unexpected: 0
            }
        );
        assert_eq!(reply.into_digest().unwrap().to_string(), SHA);
    }

    #[test]
    fn test_parse_failed() {
        let reply = StageReply::parse("exit.8 2\n").unwrap();
        assert_eq!(
            reply,
            StageReply::Failed {
                code: 8,
                unexpected: 2
            }
        );
        assert_eq!(reply.unexpected(), 2);
        assert_eq!(
            reply.into_digest(),
            Err(RemoteError::StageFailed {
                code: 8,
                unexpected: 2
            })
        );
    }

    #[test]
    fn test_parse_uses_last_line() {
        let stdout = format!("some warning\n\n{} 1\n\n", SHA);
        let reply = StageReply::parse(&stdout).unwrap();
        assert_eq!(reply.unexpected(), 1);
    }

    #[test]
    fn test_parse_malformed() {
        let negative = format!("{} -1", SHA);
        for stdout in [
            "",
            "\n\n",
            "exit.x 0",
            "exit.3",
            "exit.3 0 extra",
            "deadbeef 0",
            negative.as_str(),
        ] {
            assert!(
                matches!(
                    StageReply::parse(stdout),
                    Err(RemoteError::MalformedStageReply(_))
                ),
                "{:?} should be malformed",
                stdout
            );
        }
    }
}
