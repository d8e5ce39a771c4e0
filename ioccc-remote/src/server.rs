use std::path::Path;

use anyhow::{bail, Context, Error};
use ioccc_slot::{SlotId, SlotInfo, SubmitFilename, Username};
use serde::{Deserialize, Serialize};

use crate::{RemoteError, StageReply, Transport};

/// Where the submit server keeps its data and its tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerLayout {
    /// The application directory, usually `/var/ioccc`.
    pub appdir: String,
    /// Where `stage.py` and the other tools are installed, usually `/usr/local/bin`.
    pub bindir: String,
}

/// Options of a new submit server account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountFlags {
    /// Force a password change at the first login.
    pub force_change: bool,
    /// Seconds the user has to change the password.
    pub grace: Option<u64>,
    /// Disable the login of the user.
    pub nologin: bool,
    /// Allow the user to log in while the contest is closed.
    pub ignore_date: bool,
}

/// Result of adding an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddUserOutcome {
    /// The account has been created.
    Added,
    /// An account with that username already exists, it has not been touched.
    AlreadyExists,
}

/// The submit server, reached via a [`Transport`].
pub struct SubmitServer {
    transport: Box<dyn Transport>,
    layout: ServerLayout,
}

impl Default for ServerLayout {
    fn default() -> Self {
        ServerLayout {
            appdir: "/var/ioccc".into(),
            bindir: "/usr/local/bin".into(),
        }
    }
}

impl ServerLayout {
    /// Path of the slot directory on the server.
    pub fn slot_dir(&self, id: &SlotId) -> String {
        format!("{}/users/{}", self.appdir, id.relative_dir())
    }

    /// Path of the slot JSON on the server.
    pub fn slot_json(&self, id: &SlotId) -> String {
        format!("{}/slot.json", self.slot_dir(id))
    }

    /// Path of a staged file on the server.
    pub fn staged(&self, file: &SubmitFilename) -> String {
        format!("{}/staged/{}", self.appdir, file)
    }

    /// Path of one of the server tools.
    fn tool(&self, name: &str) -> String {
        format!("{}/{}", self.bindir, name)
    }

    /// The command line of a server tool, with the options shared by all of them: the application
    /// directory and logging disabled, the collector keeps its own logs.
    fn tool_command(&self, name: &str) -> Vec<String> {
        vec![
            self.tool(name),
            "-t".into(),
            self.appdir.clone(),
            "-l".into(),
            "none".into(),
        ]
    }
}

impl SubmitServer {
    /// Make a new `SubmitServer`.
    pub fn new<T: Transport + 'static>(transport: T, layout: ServerLayout) -> SubmitServer {
        SubmitServer {
            transport: Box::new(transport),
            layout,
        }
    }

    /// The layout of the server.
    pub fn layout(&self) -> &ServerLayout {
        &self.layout
    }

    /// Run a command, failing if it does not exit with zero.
    fn run_checked(&self, args: Vec<String>) -> Result<String, Error> {
        let output = self.transport.run(&args)?;
        Ok(output.check(&args)?.stdout)
    }

    /// Read the slot JSON of a slot. The content is parsed but not validated.
    pub fn read_slot(&self, id: &SlotId) -> Result<SlotInfo, Error> {
        let path = self.layout.slot_json(id);
        debug!("Reading remote slot JSON {}", path);
        let content = self
            .run_checked(vec!["cat".into(), path.clone()])
            .with_context(|| format!("Failed to read {}", path))?;
        SlotInfo::from_json(&content).map_err(|e| {
            RemoteError::InvalidSlotJson {
                path,
                reason: format!("{:#}", e),
            }
            .into()
        })
    }

    /// Move the tarball of a slot into the staging directory of the server.
    ///
    /// A failing `stage.py` is not an error here, it is reported as [`StageReply::Failed`].
    pub fn stage(&self, id: &SlotId) -> Result<StageReply, Error> {
        let mut args = self.layout.tool_command("stage.py");
        args.push(self.layout.slot_dir(id));
        info!("Staging slot {}", id);
        let output = self.transport.run(&args)?;
        let reply = StageReply::parse(&output.stdout)?;
        if output.success() != matches!(reply, StageReply::Staged { .. }) {
            bail!(RemoteError::MalformedStageReply(output.stdout.trim().into()));
        }
        if reply.unexpected() > 0 {
            warn!(
                "The server moved {} unexpected files of slot {} away",
                reply.unexpected(),
                id
            );
        }
        Ok(reply)
    }

    /// Copy a staged file into `dest`.
    pub fn fetch_staged(&self, file: &SubmitFilename, dest: &Path) -> Result<(), Error> {
        let remote = self.layout.staged(file);
        info!("Fetching {} into {}", remote, dest.display());
        self.transport.fetch(&remote, dest)
    }

    /// Remove a staged file from the server. Removing a missing file is not an error.
    pub fn remove_staged(&self, file: &SubmitFilename) -> Result<(), Error> {
        let remote = self.layout.staged(file);
        debug!("Removing remote {}", remote);
        self.run_checked(vec!["rm".into(), "-f".into(), remote.clone()])
            .with_context(|| format!("Failed to remove {}", remote))?;
        Ok(())
    }

    /// Change the status comment of a slot, optionally marking it as collected.
    pub fn set_slot_status(&self, id: &SlotId, status: &str, collected: bool) -> Result<(), Error> {
        let mut args = self.layout.tool_command("set_slot_status.py");
        if collected {
            args.push("-c".into());
        }
        args.push(id.username.to_string());
        args.push(id.slot.to_string());
        args.push(status.into());
        info!("Setting status of slot {} to {:?}", id, status);
        self.run_checked(args)
            .with_context(|| format!("Failed to set the status of slot {}", id))?;
        Ok(())
    }

    /// Create a new account on the server.
    pub fn add_user(
        &self,
        username: &Username,
        password: &str,
        flags: &AccountFlags,
    ) -> Result<AddUserOutcome, Error> {
        let mut args = self.layout.tool_command("ioccc_passwd.py");
        args.extend(["-a".into(), username.to_string()]);
        args.extend(["-p".into(), password.into()]);
        if flags.force_change {
            args.push("-c".into());
        }
        if let Some(grace) = flags.grace {
            args.extend(["-g".into(), grace.to_string()]);
        }
        if flags.nologin {
            args.push("-n".into());
        }
        if flags.ignore_date {
            args.push("-I".into());
        }
        info!("Adding account {}", username);
        let output = self.transport.run(&args)?;
        if output.stdout.contains("already exists") {
            warn!("Account {} already exists on the server", username);
            return Ok(AddUserOutcome::AlreadyExists);
        }
        // never leak the password in the error message
        let redacted: Vec<String> = args
            .iter()
            .map(|a| if a == password { "****".into() } else { a.clone() })
            .collect();
        output
            .check(&redacted)
            .with_context(|| format!("Failed to add account {}", username))?;
        Ok(AddUserOutcome::Added)
    }

    /// Delete an account from the server.
    pub fn delete_user(&self, username: &Username) -> Result<(), Error> {
        let mut args = self.layout.tool_command("ioccc_passwd.py");
        args.extend(["-d".into(), username.to_string()]);
        info!("Deleting account {}", username);
        self.run_checked(args)
            .with_context(|| format!("Failed to delete account {}", username))?;
        Ok(())
    }
}
