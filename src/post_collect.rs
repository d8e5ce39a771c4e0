use std::path::{Path, PathBuf};

use anyhow::{Context, Error};
use ioccc_check::{check_length, CheckReport, Checker, Diagnostic, Unpacked};
use ioccc_slot::{Sha256Digest, SubmitFilename};
use ioccc_store::{CollectStore, Commit, CommitOutcome};
use scopeguard::defer;

/// What happened to a tarball after the checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostCollectOutcome {
    /// The tarball passed all the checks and has been committed.
    Committed {
        /// Name of the tarball.
        file: SubmitFilename,
        /// What the commit did.
        outcome: CommitOutcome,
        /// Warnings found by the checks.
        report: CheckReport,
    },
    /// The tarball failed a check and has been moved into `errors/`.
    Rejected {
        /// Name of the tarball.
        file: SubmitFilename,
        /// Why it has been rejected.
        report: CheckReport,
    },
}

impl PostCollectOutcome {
    /// The report of the checks.
    pub fn report(&self) -> &CheckReport {
        match self {
            PostCollectOutcome::Committed { report, .. }
            | PostCollectOutcome::Rejected { report, .. } => report,
        }
    }
}

/// Validate a local tarball and commit it into its slot.
///
/// The tarball name must be a valid submit file name. If it is not already in `inbound/` it is
/// copied there first, the original file is left untouched. When `expected` is given the hash of
/// the tarball must match it.
pub fn post_collect(
    store: &CollectStore,
    checker: &dyn Checker,
    tarball: &Path,
    expected: Option<&Sha256Digest>,
    collected_by: &str,
) -> Result<PostCollectOutcome, Error> {
    let file = SubmitFilename::from_path(tarball)?;
    let inbound = store.inbound_path(&file);
    if !same_file(tarball, &inbound) {
        debug!("Copying {} into {}", tarball.display(), inbound.display());
        std::fs::copy(tarball, &inbound).with_context(|| {
            format!(
                "Failed to copy {} -> {}",
                tarball.display(),
                inbound.display()
            )
        })?;
    }
    let scratch_of = file.clone();
    defer! {
        if let Err(e) = store.remove_scratch(&scratch_of) {
            warn!("Failed to remove the scratch directory of {}: {:#}", scratch_of, e);
        }
    }

    let length = std::fs::metadata(&inbound)
        .with_context(|| format!("Failed to stat {}", inbound.display()))?
        .len();
    let mut report = check_length(length);
    if !report.ok() {
        return reject(store, file, &inbound, report);
    }

    let digest = Sha256Digest::from_file(&inbound)?;
    if let Some(expected) = expected {
        if expected != &digest {
            report.add_diagnostic(
                Diagnostic::error("The SHA256 of the submit file is wrong").with_note(format!(
                    "Expected {}\nFound    {}",
                    expected, digest
                )),
            );
            return reject(store, file, &inbound, report);
        }
    }

    info!("Checking {}", file);
    report.merge(checker.check_tarball(&inbound)?);
    if !report.ok() {
        return reject(store, file, &inbound, report);
    }

    let scratch = store.scratch_dir(&file)?;
    let unpacked = match checker.unpack(&inbound, &scratch)? {
        Unpacked::Dir(dir) => dir,
        Unpacked::Rejected(unpack_report) => {
            report.merge(unpack_report);
            return reject(store, file, &inbound, report);
        }
    };

    report.merge(checker.check_entry(&unpacked)?);
    if !report.ok() {
        return reject(store, file, &inbound, report);
    }

    let outcome = store.commit(Commit {
        filename: file.clone(),
        digest,
        length,
        tarball: inbound,
        unpacked,
        collected_by: collected_by.to_string(),
    })?;
    Ok(PostCollectOutcome::Committed {
        file,
        outcome,
        report,
    })
}

fn reject(
    store: &CollectStore,
    file: SubmitFilename,
    tarball: &Path,
    report: CheckReport,
) -> Result<PostCollectOutcome, Error> {
    store.reject(&file, tarball, &report.to_plain_text())?;
    Ok(PostCollectOutcome::Rejected { file, report })
}

/// Whether the two paths point to the same file.
fn same_file(a: &Path, b: &Path) -> bool {
    let canonical = |p: &Path| -> Option<PathBuf> { p.canonicalize().ok() };
    match (canonical(a), canonical(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
