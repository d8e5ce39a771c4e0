use std::path::{Path, PathBuf};

use anyhow::{Context, Error};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

lazy_static! {
    /// The standard directories of the tool, if the platform has them.
    static ref PROJECT_DIRS: Option<ProjectDirs> = ProjectDirs::from("", "", "ioccc-submit-tool");
}

/// Values read from the YAML config file. Everything is optional, command line flags and
/// environment variables take precedence.
///
/// ```yaml
/// topdir: /var/spool/ioccc
/// remote:
///   host: submit.ioccc.org
///   user: judge
///   identity: /home/judge/.ssh/id_ed25519
/// tools:
///   txzchk: /usr/local/bin/txzchk
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Top directory of the local collect tree.
    pub topdir: Option<PathBuf>,
    /// How to reach the submit server.
    pub remote: RemoteConfigSection,
    /// Where the validation tools are.
    pub tools: ToolsConfigSection,
}

/// The `remote` section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfigSection {
    pub host: Option<String>,
    pub user: Option<String>,
    pub port: Option<u16>,
    pub identity: Option<PathBuf>,
    pub connect_timeout: Option<u32>,
    pub ssh: Option<PathBuf>,
    pub scp: Option<PathBuf>,
    pub appdir: Option<String>,
    pub bindir: Option<String>,
}

/// The `tools` section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfigSection {
    pub txzchk: Option<PathBuf>,
    pub chkentry: Option<PathBuf>,
    pub tar: Option<PathBuf>,
}

impl Config {
    /// The config file used when none is specified.
    pub fn default_path() -> Option<PathBuf> {
        PROJECT_DIRS
            .as_ref()
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// The default top directory of the collect tree.
    pub fn default_topdir() -> PathBuf {
        match PROJECT_DIRS.as_ref() {
            Some(dirs) => dirs.data_dir().join("collect"),
            None => std::env::temp_dir().join("ioccc-submit-tool"),
        }
    }

    /// Load the config file at `path`, or the default one if `path` is `None`.
    ///
    /// A missing default config file is an empty config, a missing explicit one is an error.
    pub fn load(path: Option<&Path>) -> Result<Config, Error> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Config::default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    debug!("No config file found, using the defaults");
                    return Ok(Config::default());
                }
            },
        };
        debug!("Loading config from {}", path.display());
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Config::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse the content of a config file.
    pub fn parse(content: &str) -> Result<Config, Error> {
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_parse() {
        let config = Config::parse(
            "topdir: /srv/collect\nremote:\n  host: submit.example\n  port: 2222\ntools:\n  tar: /usr/bin/gtar\n",
        )
        .unwrap();
        assert_eq!(config.topdir, Some(PathBuf::from("/srv/collect")));
        assert_eq!(config.remote.host.as_deref(), Some("submit.example"));
        assert_eq!(config.remote.port, Some(2222));
        assert_eq!(config.remote.user, None);
        assert_eq!(config.tools.tar, Some(PathBuf::from("/usr/bin/gtar")));
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(Config::parse("\n").unwrap(), Config::default());
    }

    #[test]
    fn test_unknown_field() {
        assert!(Config::parse("remote:\n  hots: typo\n").is_err());
    }

    #[test]
    fn test_load_missing_explicit() {
        let tmp = TempDir::new().unwrap();
        assert!(Config::load(Some(&tmp.path().join("nope.yaml"))).is_err());
    }
}
