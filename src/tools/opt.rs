use std::path::PathBuf;

use clap::Parser;

use ioccc_slot::{Sha256Digest, SlotId, Username};

use crate::tools::gen_autocompletion::GenAutocompletionOpt;
use crate::{CheckerOpt, ConfigOpt, LoggerOpt, RemoteOpt, StoreOpt};

#[derive(Parser, Debug)]
#[clap(
    name = "ioccc-tools",
    version = include_str!(concat!(env!("OUT_DIR"), "/version.txt"))
)]
pub struct Opt {
    #[clap(flatten, next_help_heading = Some("LOGGING"))]
    pub logger: LoggerOpt,

    #[clap(flatten, next_help_heading = Some("CONFIG"))]
    pub config: ConfigOpt,

    /// Which tool to use
    #[clap(subcommand)]
    pub tool: Tool,
}

#[derive(Parser, Debug)]
pub enum Tool {
    /// Register a new contestant and print its username
    Register(RegisterOpt),
    /// Create the account of a registered contestant on the submit server
    Provision(ProvisionOpt),
    /// Delete the account of a contestant from the submit server
    Delete(DeleteOpt),
    /// Validate a local tarball and commit it into its slot, without contacting the server
    PostCollect(PostCollectOpt),
    /// Set the status of a slot on the submit server
    SetStatus(SetStatusOpt),
    /// List the slots in the local collect tree
    Info(InfoOpt),
    /// Remove the leftovers of interrupted runs from the local collect tree
    ///
    /// Warning: no collector should be running when this tool is used.
    Clear(ClearOpt),
    /// Generate the autocompletion files for the shell
    GenAutocompletion(GenAutocompletionOpt),
}

#[derive(Parser, Debug, Clone)]
pub struct RegisterOpt {
    /// Email address of the contestant
    #[clap(long = "email")]
    pub email: String,

    /// Name of the contestant
    #[clap(long = "name")]
    pub name: Option<String>,

    #[clap(flatten, next_help_heading = Some("STORE"))]
    pub store: StoreOpt,
}

#[derive(Parser, Debug, Clone)]
pub struct ProvisionOpt {
    /// Username of the registered contestant
    pub username: Username,

    /// Password of the account, a random one is generated if not given
    #[clap(long = "password", env = "IOCCC_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Force the contestant to change the password at the first login
    #[clap(long = "force-change")]
    pub force_change: bool,

    /// Seconds the contestant has to change the password
    #[clap(long = "grace")]
    pub grace: Option<u64>,

    /// Create the account with login disabled
    #[clap(long = "nologin")]
    pub nologin: bool,

    /// Ignore the contest open and close dates
    #[clap(long = "ignore-date")]
    pub ignore_date: bool,

    #[clap(flatten, next_help_heading = Some("STORE"))]
    pub store: StoreOpt,

    #[clap(flatten, next_help_heading = Some("REMOTE"))]
    pub remote: RemoteOpt,
}

#[derive(Parser, Debug, Clone)]
pub struct DeleteOpt {
    /// Username of the contestant
    pub username: Username,

    /// Also remove the contestant from the registry
    #[clap(long = "unregister")]
    pub unregister: bool,

    #[clap(flatten, next_help_heading = Some("STORE"))]
    pub store: StoreOpt,

    #[clap(flatten, next_help_heading = Some("REMOTE"))]
    pub remote: RemoteOpt,
}

#[derive(Parser, Debug, Clone)]
pub struct PostCollectOpt {
    /// The tarball to check, named like submit.<username>-<slot>.<timestamp>.txz
    pub tarball: PathBuf,

    /// The expected SHA256 of the tarball
    #[clap(long = "sha256")]
    pub sha256: Option<Sha256Digest>,

    #[clap(flatten, next_help_heading = Some("STORE"))]
    pub store: StoreOpt,

    #[clap(flatten, next_help_heading = Some("CHECKERS"))]
    pub checker: CheckerOpt,
}

#[derive(Parser, Debug, Clone)]
pub struct SetStatusOpt {
    /// The slot, as `username/slot` or `username-slot`
    pub slot: SlotId,

    /// The new status message
    pub status: String,

    /// Mark the submission of the slot as collected
    #[clap(long = "collected")]
    pub collected: bool,

    #[clap(flatten, next_help_heading = Some("REMOTE"))]
    pub remote: RemoteOpt,
}

#[derive(Parser, Debug, Clone)]
pub struct InfoOpt {
    /// Print the information as JSON
    #[clap(long = "json")]
    pub json: bool,

    #[clap(flatten, next_help_heading = Some("STORE"))]
    pub store: StoreOpt,
}

#[derive(Parser, Debug, Clone)]
pub struct ClearOpt {
    #[clap(flatten, next_help_heading = Some("STORE"))]
    pub store: StoreOpt,
}
