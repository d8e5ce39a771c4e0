use anyhow::{anyhow, bail, Context, Error};
use ioccc_check::{CheckReport, Checker, Diagnostic};
use ioccc_remote::{RemoteError, StageReply, SubmitServer};
use ioccc_slot::{Sha256Digest, SlotId, SlotInfo, SubmitFilename};
use ioccc_store::{CollectStore, CommitOutcome, SubmissionState};

use crate::post_collect::{post_collect, PostCollectOutcome};

/// Status set on the server for a collected slot.
pub const COLLECTED_STATUS: &str = "submit file collected and validated";
/// Prefix of the status set on the server for a slot whose tarball has been rejected.
pub const REJECTED_STATUS_PREFIX: &str = "submit file failed validation: ";

/// Options of the collector.
#[derive(Debug, Clone, Default)]
pub struct CollectOptions {
    /// Do not remove the staged file from the server.
    pub keep_staged: bool,
    /// Only read the slot JSON.
    pub dry_run: bool,
    /// Who is collecting, as `user@host`.
    pub collected_by: String,
}

/// What happened collecting a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectOutcome {
    /// Nothing has been uploaded in the slot.
    Empty,
    /// `--dry-run`: this is what would be collected.
    WouldCollect(SubmitFilename),
    /// The submission of the slot was already committed locally.
    AlreadyCollected(SubmitFilename),
    /// The submission has been committed.
    Collected {
        /// Name of the tarball.
        file: SubmitFilename,
        /// What the commit did.
        outcome: CommitOutcome,
    },
    /// The submission failed the checks.
    Rejected {
        /// Name of the tarball.
        file: SubmitFilename,
        /// Why it has been rejected.
        report: CheckReport,
    },
}

/// Collects the slots of the submit server into the local collect tree.
pub struct Collector<'a> {
    server: &'a SubmitServer,
    store: &'a CollectStore,
    checker: &'a dyn Checker,
    options: CollectOptions,
}

impl<'a> Collector<'a> {
    /// Make a new collector.
    pub fn new(
        server: &'a SubmitServer,
        store: &'a CollectStore,
        checker: &'a dyn Checker,
        options: CollectOptions,
    ) -> Collector<'a> {
        Collector {
            server,
            store,
            checker,
            options,
        }
    }

    /// Collect a single slot. Running it again after a failure, or after an interruption,
    /// continues from where the previous run stopped.
    ///
    /// A tarball already rejected, or already stored in the slot directory, is not fetched again:
    /// only its status is reported. Remove it from `errors/` to check it again.
    pub fn collect_slot(&self, id: &SlotId) -> Result<CollectOutcome, Error> {
        let info = self.server.read_slot(id)?;
        info.validate(id)
            .with_context(|| format!("Invalid slot JSON for slot {}", id))?;
        let file = match info.submit_filename() {
            Some(file) => file,
            None => {
                info!("Slot {} is empty", id);
                return Ok(CollectOutcome::Empty);
            }
        };
        let digest = info
            .digest()
            .ok_or_else(|| anyhow!("Slot {} has no SHA256", id))?;
        let length = info
            .length()
            .ok_or_else(|| anyhow!("Slot {} has no length", id))?;
        if self.options.dry_run {
            return Ok(CollectOutcome::WouldCollect(file));
        }

        if self.store.is_current(id, &digest)? {
            info!("{} has already been collected", file);
            self.report(id, &info, COLLECTED_STATUS, true)?;
            self.remove_staged(&file)?;
            return Ok(CollectOutcome::AlreadyCollected(file));
        }

        let inbound = self.store.inbound_path(&file);
        match self.store.submission_state(&file) {
            SubmissionState::Rejected => {
                info!("{} has already been rejected", file);
                let log = self.store.rejection_log(&file)?.unwrap_or_default();
                let reason = CheckReport::first_error_in_plain_text(&log).unwrap_or("unknown error");
                let report = CheckReport::from(Diagnostic::error(reason).with_note(format!(
                    "See {}",
                    self.store.rejection_log_path(&file).display()
                )));
                return self.rejected(id, &info, file, report);
            }
            SubmissionState::Committed => {
                let stored = self.store.slot_dir(id).join(file.to_string());
                let current = self.store.slot_state(id)?.current;
                if let Some(current) = current.filter(|c| c.timestamp() > file.timestamp()) {
                    info!("{} is stored, the newer {} is current", file, current);
                    self.report(id, &info, COLLECTED_STATUS, true)?;
                    self.remove_staged(&file)?;
                    return Ok(CollectOutcome::Collected {
                        file,
                        outcome: CommitOutcome::Stale { current },
                    });
                }
                // a commit interrupted after storing the tarball
                info!("Resuming the commit of {}", file);
                std::fs::copy(&stored, &inbound).with_context(|| {
                    format!("Failed to copy {} -> {}", stored.display(), inbound.display())
                })?;
            }
            _ => {
                if inbound.exists() && Sha256Digest::from_file(&inbound)? == digest {
                    info!("{} has already been fetched", file);
                } else {
                    self.stage_and_fetch(id, &file, &digest)?;
                }
            }
        }

        let actual_length = std::fs::metadata(&inbound)
            .with_context(|| format!("Failed to stat {}", inbound.display()))?
            .len();
        if actual_length != length {
            let report = CheckReport::from(
                Diagnostic::error("The length of the submit file is wrong").with_note(format!(
                    "The slot JSON says {} bytes, the fetched file is {} bytes",
                    length, actual_length
                )),
            );
            self.store
                .reject(&file, &inbound, &report.to_plain_text())?;
            return self.rejected(id, &info, file, report);
        }

        let outcome = post_collect(
            self.store,
            self.checker,
            &inbound,
            Some(&digest),
            &self.options.collected_by,
        )?;
        match outcome {
            PostCollectOutcome::Committed { file, outcome, .. } => {
                self.report(id, &info, COLLECTED_STATUS, true)?;
                self.remove_staged(&file)?;
                Ok(CollectOutcome::Collected { file, outcome })
            }
            PostCollectOutcome::Rejected { file, report } => {
                self.rejected(id, &info, file, report)
            }
        }
    }

    /// Stage the slot on the server and fetch the staged file into `inbound/`.
    fn stage_and_fetch(
        &self,
        id: &SlotId,
        file: &SubmitFilename,
        digest: &Sha256Digest,
    ) -> Result<(), Error> {
        let staged = self.server.stage(id)?;
        if let StageReply::Staged {
            digest: staged_digest,
            ..
        } = &staged
        {
            if staged_digest != digest {
                bail!(
                    "stage.py staged a file with SHA256 {}, but the slot JSON says {}",
                    staged_digest,
                    digest
                );
            }
        }
        let inbound = self.store.inbound_path(file);
        match (staged, self.server.fetch_staged(file, &inbound)) {
            (_, Ok(())) => Ok(()),
            // a previous run may have staged the file without fetching it
            (StageReply::Failed { code, unexpected }, Err(e)) => {
                debug!("No file staged by a previous run: {:#}", e);
                Err(RemoteError::StageFailed { code, unexpected })
                    .with_context(|| format!("Failed to stage slot {}", id))
            }
            (StageReply::Staged { .. }, Err(e)) => Err(e),
        }
    }

    /// Set the status of the slot, unless the slot JSON already shows it.
    fn report(
        &self,
        id: &SlotId,
        info: &SlotInfo,
        status: &str,
        collected: bool,
    ) -> Result<(), Error> {
        if info.status == status && info.collected == collected {
            debug!("Slot {} already reports {:?}", id, status);
            return Ok(());
        }
        self.server.set_slot_status(id, status, collected)
    }

    /// Report the rejection to the server.
    fn rejected(
        &self,
        id: &SlotId,
        info: &SlotInfo,
        file: SubmitFilename,
        report: CheckReport,
    ) -> Result<CollectOutcome, Error> {
        let reason = report
            .first_error()
            .map(|e| e.message().to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        warn!("{} has been rejected: {}", file, reason);
        let status = format!("{}{}", REJECTED_STATUS_PREFIX, reason);
        self.report(id, info, &status, false)?;
        self.remove_staged(&file)?;
        Ok(CollectOutcome::Rejected { file, report })
    }

    fn remove_staged(&self, file: &SubmitFilename) -> Result<(), Error> {
        if self.options.keep_staged {
            debug!("Keeping {} staged on the server", file);
            return Ok(());
        }
        self.server.remove_staged(file)
    }
}
