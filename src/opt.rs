use std::path::PathBuf;

use anyhow::{bail, Error};
use clap::Parser;

use ioccc_check::{CheckerTools, ExternalChecker};
use ioccc_remote::{RemoteConfig, ServerLayout, SshTransport, SubmitServer};
use ioccc_slot::SlotId;
use ioccc_store::CollectStore;

use crate::config::Config;

#[derive(Parser, Debug)]
#[clap(
    name = "ioccc-collect",
    version = include_str!(concat!(env!("OUT_DIR"), "/version.txt"))
)]
pub struct Opt {
    /// The slots to collect, as `username/slot`, `username-slot` or a server slot path
    #[clap(required = true)]
    pub slots: Vec<SlotId>,

    /// Do not remove the staged files from the server after collecting them
    #[clap(long = "keep-staged")]
    pub keep_staged: bool,

    /// Only read the slots, without staging, fetching or changing anything
    #[clap(long = "dry-run")]
    pub dry_run: bool,

    #[clap(flatten, next_help_heading = Some("LOGGING"))]
    pub logger: LoggerOpt,

    #[clap(flatten, next_help_heading = Some("CONFIG"))]
    pub config: ConfigOpt,

    #[clap(flatten, next_help_heading = Some("STORE"))]
    pub store: StoreOpt,

    #[clap(flatten, next_help_heading = Some("REMOTE"))]
    pub remote: RemoteOpt,

    #[clap(flatten, next_help_heading = Some("CHECKERS"))]
    pub checker: CheckerOpt,
}

#[derive(Parser, Debug, Clone)]
pub struct LoggerOpt {
    /// Verbose mode (-v, -vv, -vvv, etc.)
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Parser, Debug, Clone)]
pub struct ConfigOpt {
    /// The YAML config file, defaults to config.yaml in the user config directory
    #[clap(long = "config", env = "IOCCC_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct StoreOpt {
    /// Top directory of the local collect tree
    #[clap(long = "topdir", env = "IOCCC_TOPDIR")]
    pub topdir: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone, Default)]
pub struct RemoteOpt {
    /// Host name of the submit server
    #[clap(long = "host", env = "IOCCC_HOST")]
    pub host: Option<String>,

    /// User to log in as on the submit server
    #[clap(long = "remote-user", env = "IOCCC_REMOTE_USER")]
    pub user: Option<String>,

    /// Port of the ssh server
    #[clap(long = "port", env = "IOCCC_PORT")]
    pub port: Option<u16>,

    /// Identity file for ssh
    #[clap(long = "identity", env = "IOCCC_IDENTITY")]
    pub identity: Option<PathBuf>,

    /// Seconds before giving up connecting to the server
    #[clap(long = "connect-timeout", env = "IOCCC_CONNECT_TIMEOUT")]
    pub connect_timeout: Option<u32>,

    /// The ssh binary
    #[clap(long = "ssh", env = "IOCCC_SSH")]
    pub ssh: Option<PathBuf>,

    /// The scp binary
    #[clap(long = "scp", env = "IOCCC_SCP")]
    pub scp: Option<PathBuf>,

    /// The application directory on the server [default: /var/ioccc]
    #[clap(long = "appdir", env = "IOCCC_APPDIR")]
    pub appdir: Option<String>,

    /// Where the server tools are installed [default: /usr/local/bin]
    #[clap(long = "bindir", env = "IOCCC_BINDIR")]
    pub bindir: Option<String>,
}

#[derive(Parser, Debug, Clone, Default)]
pub struct CheckerOpt {
    /// The txzchk tool [default: txzchk from $PATH]
    #[clap(long = "txzchk", env = "IOCCC_TXZCHK")]
    pub txzchk: Option<PathBuf>,

    /// The chkentry tool [default: chkentry from $PATH]
    #[clap(long = "chkentry", env = "IOCCC_CHKENTRY")]
    pub chkentry: Option<PathBuf>,

    /// GNU tar [default: tar from $PATH]
    #[clap(long = "tar", env = "IOCCC_TAR")]
    pub tar: Option<PathBuf>,
}

impl LoggerOpt {
    pub fn enable_log(&self) {
        if self.verbose > 0 {
            std::env::set_var("RUST_BACKTRACE", "1");
            match self.verbose {
                0 => unreachable!(),
                1 => std::env::set_var("RUST_LOG", "info"),
                2 => std::env::set_var("RUST_LOG", "debug"),
                _ => std::env::set_var("RUST_LOG", "trace"),
            }
        }

        env_logger::Builder::from_default_env()
            .format_timestamp_nanos()
            .init();
        better_panic::install();
    }
}

impl ConfigOpt {
    /// Load the config file.
    pub fn load(&self) -> Result<Config, Error> {
        Config::load(self.config.as_deref())
    }
}

impl StoreOpt {
    /// The top directory of the collect tree: from the command line, the config, or the data
    /// directory of the user.
    pub fn topdir(&self, config: &Config) -> PathBuf {
        self.topdir
            .clone()
            .or_else(|| config.topdir.clone())
            .unwrap_or_else(Config::default_topdir)
    }

    /// Open the collect tree, waiting for other collectors to finish.
    pub fn open(&self, config: &Config) -> Result<CollectStore, Error> {
        CollectStore::open(self.topdir(config))
    }
}

impl RemoteOpt {
    /// The ssh parameters, merging the command line with the config.
    pub fn remote_config(&self, config: &Config) -> Result<RemoteConfig, Error> {
        let section = &config.remote;
        let host = match self.host.clone().or_else(|| section.host.clone()) {
            Some(host) => host,
            None => bail!("The host of the submit server is not set: use --host or IOCCC_HOST"),
        };
        Ok(RemoteConfig {
            host,
            user: self.user.clone().or_else(|| section.user.clone()),
            port: self.port.or(section.port),
            identity: self.identity.clone().or_else(|| section.identity.clone()),
            connect_timeout: self.connect_timeout.or(section.connect_timeout),
            ssh: self
                .ssh
                .clone()
                .or_else(|| section.ssh.clone())
                .unwrap_or_else(|| "ssh".into()),
            scp: self
                .scp
                .clone()
                .or_else(|| section.scp.clone())
                .unwrap_or_else(|| "scp".into()),
        })
    }

    /// Where things are on the server, merging the command line with the config.
    pub fn layout(&self, config: &Config) -> ServerLayout {
        let default = ServerLayout::default();
        ServerLayout {
            appdir: self
                .appdir
                .clone()
                .or_else(|| config.remote.appdir.clone())
                .unwrap_or(default.appdir),
            bindir: self
                .bindir
                .clone()
                .or_else(|| config.remote.bindir.clone())
                .unwrap_or(default.bindir),
        }
    }

    /// The submit server reached via ssh.
    pub fn server(&self, config: &Config) -> Result<SubmitServer, Error> {
        let transport = SshTransport::new(self.remote_config(config)?);
        Ok(SubmitServer::new(transport, self.layout(config)))
    }
}

impl CheckerOpt {
    /// The validation tools, merging the command line with the config. The tools are not resolved.
    pub fn tools(&self, config: &Config) -> CheckerTools {
        let section = &config.tools;
        let default = CheckerTools::default();
        CheckerTools {
            txzchk: self
                .txzchk
                .clone()
                .or_else(|| section.txzchk.clone())
                .unwrap_or(default.txzchk),
            chkentry: self
                .chkentry
                .clone()
                .or_else(|| section.chkentry.clone())
                .unwrap_or(default.chkentry),
            tar: self
                .tar
                .clone()
                .or_else(|| section.tar.clone())
                .unwrap_or(default.tar),
        }
    }

    /// The checker using the external tools, failing if one of them is missing.
    pub fn checker(&self, config: &Config) -> Result<ExternalChecker, Error> {
        let tools = self.tools(config).resolve()?;
        debug!("Using the checkers {:?}", tools);
        Ok(ExternalChecker::new(tools))
    }
}
