use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Error};
use serde::{Deserialize, Serialize};

use crate::RemoteError;

/// Exit code used by ssh for its own errors, as opposed to the ones of the remote command.
const SSH_ERROR_CODE: i32 = 255;

/// How to reach the submit server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Host name of the server.
    pub host: String,
    /// User to log in as, defaults to the ssh configuration.
    pub user: Option<String>,
    /// Port of the ssh server.
    pub port: Option<u16>,
    /// Identity file to authenticate with.
    pub identity: Option<PathBuf>,
    /// Seconds before giving up connecting.
    pub connect_timeout: Option<u32>,
    /// The `ssh` binary.
    pub ssh: PathBuf,
    /// The `scp` binary.
    pub scp: PathBuf,
}

/// What a remote command produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOutput {
    /// Exit code of the command, `None` if killed by a signal.
    pub code: Option<i32>,
    /// Everything printed on stdout.
    pub stdout: String,
    /// Everything printed on stderr.
    pub stderr: String,
}

/// A way of running commands on the submit server and of copying files from it.
pub trait Transport {
    /// Run a command on the server. Each element of `args` is a single argument, the first one
    /// being the program.
    ///
    /// Returns `Err` only if the command could not be run at all, a failing command is reported
    /// via [`RemoteOutput::code`].
    fn run(&self, args: &[String]) -> Result<RemoteOutput, Error>;

    /// Copy the remote file at `remote` to `local`, overwriting it.
    fn fetch(&self, remote: &str, local: &Path) -> Result<(), Error>;
}

/// The real [`Transport`], using the `ssh` and `scp` binaries.
#[derive(Debug, Clone)]
pub struct SshTransport {
    config: RemoteConfig,
}

impl RemoteOutput {
    /// The output of a command that exited with zero, printing `stdout`.
    pub fn ok<S: Into<String>>(stdout: S) -> RemoteOutput {
        RemoteOutput {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// The output of a command that exited with `code`, printing `stderr`.
    pub fn failed<S: Into<String>>(code: i32, stderr: S) -> RemoteOutput {
        RemoteOutput {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the command exited with zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// The last non-empty line of stdout, trimmed.
    pub fn last_line(&self) -> Option<&str> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
    }

    /// Fail with [`RemoteError::CommandFailed`] if the command did not exit with zero.
    pub fn check(self, args: &[String]) -> Result<RemoteOutput, RemoteError> {
        if self.success() {
            Ok(self)
        } else {
            Err(RemoteError::CommandFailed {
                command: shell_words::join(args),
                code: self.code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

impl SshTransport {
    /// Make a new transport for the given server.
    pub fn new(config: RemoteConfig) -> SshTransport {
        SshTransport { config }
    }

    /// `user@host`, or just `host` without a configured user.
    fn destination(&self) -> String {
        match &self.config.user {
            Some(user) => format!("{}@{}", user, self.config.host),
            None => self.config.host.clone(),
        }
    }

    /// Add to the command the options shared by ssh and scp. The only difference between the two
    /// is the flag for the port.
    fn common_args(&self, command: &mut Command, port_flag: &str) {
        command.arg("-o").arg("BatchMode=yes");
        if let Some(timeout) = self.config.connect_timeout {
            command.arg("-o").arg(format!("ConnectTimeout={}", timeout));
        }
        if let Some(port) = self.config.port {
            command.arg(port_flag).arg(port.to_string());
        }
        if let Some(identity) = &self.config.identity {
            command.arg("-i").arg(identity);
        }
        command.stdin(Stdio::null());
    }

    /// Turn an ssh exit code 255 into a connection error.
    fn check_connection(&self, output: &RemoteOutput) -> Result<(), Error> {
        if output.code == Some(SSH_ERROR_CODE) {
            return Err(RemoteError::Connection {
                host: self.config.host.clone(),
                stderr: output.stderr.trim().to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl Transport for SshTransport {
    fn run(&self, args: &[String]) -> Result<RemoteOutput, Error> {
        let mut command = Command::new(&self.config.ssh);
        self.common_args(&mut command, "-p");
        command.arg(self.destination());
        command.arg("--");
        // ssh concatenates its arguments in a single line for the remote shell
        command.arg(shell_words::join(args));
        debug!("Running {:?}", command);
        let output = command
            .output()
            .with_context(|| format!("Failed to start {:?}", command))?;
        let output = RemoteOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        trace!("Remote output: {:?}", output);
        self.check_connection(&output)?;
        Ok(output)
    }

    fn fetch(&self, remote: &str, local: &Path) -> Result<(), Error> {
        let mut command = Command::new(&self.config.scp);
        command.arg("-q").arg("-p");
        self.common_args(&mut command, "-P");
        command.arg(format!("{}:{}", self.destination(), remote));
        command.arg(local);
        debug!("Running {:?}", command);
        let output = command
            .output()
            .with_context(|| format!("Failed to start {:?}", command))?;
        let output = RemoteOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        self.check_connection(&output)?;
        if !output.success() {
            return Err(RemoteError::CommandFailed {
                command: format!("scp {}", remote),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            })
            .with_context(|| format!("Failed to fetch {} into {}", remote, local.display()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    /// Write a fake `ssh` that prints its arguments, one per line.
    fn fake_ssh(dir: &Path, exit_code: i32) -> PathBuf {
        let path = dir.join("ssh");
        std::fs::write(
            &path,
            format!(
                "#!/bin/sh\nfor a in \"$@\"; do echo \"$a\"; done\necho oops >&2\nexit {}\n",
                exit_code
            ),
        )
        .unwrap();
        let mut perm = std::fs::metadata(&path).unwrap().permissions();
        perm.set_mode(0o755);
        std::fs::set_permissions(&path, perm).unwrap();
        path
    }

    fn config(ssh: PathBuf) -> RemoteConfig {
        RemoteConfig {
            host: "submit.example".into(),
            user: Some("judge".into()),
            port: Some(2222),
            identity: None,
            connect_timeout: Some(5),
            ssh,
            scp: "scp".into(),
        }
    }

    #[test]
    fn test_run_quotes_arguments() {
        let tmp = TempDir::new().unwrap();
        let transport = SshTransport::new(config(fake_ssh(tmp.path(), 0)));
        let output = transport
            .run(&["set_slot_status.py".into(), "slot is ok".into()])
            .unwrap();
        assert!(output.success());
        let lines: Vec<_> = output.stdout.lines().collect();
        assert_eq!(
            lines,
            vec![
                "-o",
                "BatchMode=yes",
                "-o",
                "ConnectTimeout=5",
                "-p",
                "2222",
                "judge@submit.example",
                "--",
                "set_slot_status.py 'slot is ok'",
            ]
        );
        assert_eq!(output.last_line(), Some("set_slot_status.py 'slot is ok'"));
    }

    #[test]
    fn test_run_connection_error() {
        let tmp = TempDir::new().unwrap();
        let transport = SshTransport::new(config(fake_ssh(tmp.path(), 255)));
        let err = transport.run(&["true".into()]).unwrap_err();
        let err = err.downcast::<RemoteError>().unwrap();
        assert_eq!(
            err,
            RemoteError::Connection {
                host: "submit.example".into(),
                stderr: "oops".into()
            }
        );
    }

    #[test]
    fn test_check_failed_command() {
        let output = RemoteOutput {
            code: Some(3),
            stdout: String::new(),
            stderr: "no such user\n".into(),
        };
        let err = output.check(&["ioccc_passwd.py".into(), "-d".into()]);
        assert_eq!(
            err,
            Err(RemoteError::CommandFailed {
                command: "ioccc_passwd.py -d".into(),
                code: Some(3),
                stderr: "no such user".into()
            })
        );
    }
}
