use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Error};
use ioccc_slot::MAX_TARBALL_LEN;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::{CheckReport, Diagnostic};

/// Something able to validate a submission.
pub trait Checker {
    /// Validate the structure of a compressed tarball, without unpacking it.
    fn check_tarball(&self, tarball: &Path) -> Result<CheckReport, Error>;

    /// Unpack the tarball into `dest`, which must be an empty directory.
    fn unpack(&self, tarball: &Path, dest: &Path) -> Result<Unpacked, Error>;

    /// Validate an unpacked submission directory.
    fn check_entry(&self, dir: &Path) -> Result<CheckReport, Error>;
}

/// Result of [`Checker::unpack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unpacked {
    /// The tarball has been unpacked, this is its only top-level directory.
    Dir(PathBuf),
    /// The tarball cannot be accepted.
    Rejected(CheckReport),
}

/// Where the external validation tools are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckerTools {
    /// Checks the structure of the compressed tarball.
    pub txzchk: PathBuf,
    /// Checks the content of the submission directory.
    pub chkentry: PathBuf,
    /// GNU tar, with xz support.
    pub tar: PathBuf,
}

/// A [`Checker`] that runs the external tools.
#[derive(Debug, Clone)]
pub struct ExternalChecker {
    tools: CheckerTools,
}

impl Default for CheckerTools {
    fn default() -> Self {
        CheckerTools {
            txzchk: "txzchk".into(),
            chkentry: "chkentry".into(),
            tar: "tar".into(),
        }
    }
}

impl CheckerTools {
    /// Resolve the tools that are not paths using `$PATH`. Fails if a tool cannot be found.
    pub fn resolve(self) -> Result<CheckerTools, Error> {
        Ok(CheckerTools {
            txzchk: resolve_tool(self.txzchk)?,
            chkentry: resolve_tool(self.chkentry)?,
            tar: resolve_tool(self.tar)?,
        })
    }
}

/// A bare name is searched in `$PATH`, anything with a slash is used as is.
fn resolve_tool(tool: PathBuf) -> Result<PathBuf, Error> {
    if tool.components().count() > 1 {
        if !tool.exists() {
            bail!("Tool {} does not exist", tool.display());
        }
        return Ok(tool);
    }
    which::which(&tool).with_context(|| format!("Cannot find {} in $PATH", tool.display()))
}

/// Check the length of a tarball before looking at its content.
pub fn check_length(length: u64) -> CheckReport {
    let mut report = CheckReport::new();
    if length == 0 {
        report.add_diagnostic(Diagnostic::error("The submit file is empty"));
    } else if length > MAX_TARBALL_LEN {
        report.add_diagnostic(
            Diagnostic::error("The submit file is too large").with_note(format!(
                "It is {} bytes long, the limit is {} bytes",
                length, MAX_TARBALL_LEN
            )),
        );
    }
    report
}

impl ExternalChecker {
    /// Make a new checker using the provided tools, as they are.
    pub fn new(tools: CheckerTools) -> ExternalChecker {
        ExternalChecker { tools }
    }

    /// The tools used by this checker.
    pub fn tools(&self) -> &CheckerTools {
        &self.tools
    }

    /// Run a tool, returning an error diagnostic if it fails.
    fn run_tool(&self, tool: &Path, args: &[&Path]) -> Result<Option<Diagnostic>, Error> {
        let mut command = Command::new(tool);
        command.args(args).stdin(Stdio::null());
        debug!("Running {:?}", command);
        let output = command
            .output()
            .with_context(|| format!("Failed to start {:?}", command))?;
        if output.status.success() {
            return Ok(None);
        }
        let name = tool
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| tool.display().to_string());
        let status = match output.status.code() {
            Some(code) => format!("exit code {}", code),
            None => "a signal".to_string(),
        };
        let mut text = String::from_utf8_lossy(&output.stderr).into_owned();
        text += &String::from_utf8_lossy(&output.stdout);
        Ok(Some(
            Diagnostic::error(format!("{} failed with {}", name, status)).with_output(text),
        ))
    }
}

impl Checker for ExternalChecker {
    fn check_tarball(&self, tarball: &Path) -> Result<CheckReport, Error> {
        let mut report = CheckReport::new();
        let quiet = Path::new("-q");
        if let Some(diagnostic) = self.run_tool(&self.tools.txzchk, &[quiet, tarball])? {
            report.add_diagnostic(diagnostic);
        }
        Ok(report)
    }

    fn unpack(&self, tarball: &Path, dest: &Path) -> Result<Unpacked, Error> {
        std::fs::create_dir_all(dest)
            .with_context(|| format!("Failed to create {}", dest.display()))?;
        if std::fs::read_dir(dest)?.next().is_some() {
            bail!("Cannot unpack into {}: not empty", dest.display());
        }
        let args = [
            Path::new("-J"),
            Path::new("-x"),
            Path::new("--no-same-owner"),
            Path::new("-f"),
            tarball,
            Path::new("-C"),
            dest,
        ];
        if let Some(diagnostic) = self.run_tool(&self.tools.tar, &args)? {
            return Ok(Unpacked::Rejected(diagnostic.into()));
        }
        inspect_unpacked(dest)
    }

    fn check_entry(&self, dir: &Path) -> Result<CheckReport, Error> {
        let mut report = CheckReport::new();
        let quiet = Path::new("-q");
        if let Some(diagnostic) = self.run_tool(&self.tools.chkentry, &[quiet, dir])? {
            report.add_diagnostic(diagnostic);
        }
        Ok(report)
    }
}

/// Make sure the unpacked tree has a single top-level directory and no symlinks.
fn inspect_unpacked(dest: &Path) -> Result<Unpacked, Error> {
    let mut report = CheckReport::new();
    let mut top_level = vec![];
    for entry in WalkDir::new(dest).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", dest.display()))?;
        let relative = entry.path().strip_prefix(dest)?.to_path_buf();
        if entry.path_is_symlink() {
            report.add_diagnostic(Diagnostic::error(format!(
                "The tarball contains a symbolic link: {}",
                relative.display()
            )));
        }
        if entry.depth() == 1 {
            top_level.push((relative, entry.file_type().is_dir()));
        }
    }
    let dir = match top_level.as_slice() {
        [(name, true)] => Some(dest.join(name)),
        [] => {
            report.add_diagnostic(Diagnostic::error("The tarball is empty"));
            None
        }
        _ => {
            let names: Vec<_> = top_level
                .iter()
                .map(|(name, _)| name.display().to_string())
                .collect();
            report.add_diagnostic(
                Diagnostic::error("The tarball must contain exactly one top-level directory")
                    .with_note(format!("Found: {}", names.join(", "))),
            );
            None
        }
    };
    match dir {
        Some(dir) if report.ok() => Ok(Unpacked::Dir(dir)),
        _ => Ok(Unpacked::Rejected(report)),
    }
}
