use std::path::{Path, PathBuf};

use anyhow::{Context, Error};
use fslock::LockFile;
use ioccc_slot::{Sha256Digest, SlotId, SubmitFilename};
use serde::Serialize;

use crate::fs::{move_file, remove_tree, swap_symlink, write_atomic};
use crate::{
    Registry, SlotState, SubmissionNumbers, SubmissionState, SubmitMeta, CURRENT_LINK,
    PREVIOUS_LINK, SUBMIT_META_FILE,
};

/// The name of the lock of the collect tree.
const LOCK_FILE: &str = "collect.lock";

/// A submission that passed all the checks, ready to be committed.
#[derive(Debug, Clone)]
pub struct Commit {
    /// Name of the tarball.
    pub filename: SubmitFilename,
    /// Hash of the tarball.
    pub digest: Sha256Digest,
    /// Length of the tarball, in bytes.
    pub length: u64,
    /// Where the tarball is now, usually in `inbound/`.
    pub tarball: PathBuf,
    /// Where the tarball has been unpacked, usually in `tmp/`.
    pub unpacked: PathBuf,
    /// Who is collecting, as `user@host`.
    pub collected_by: String,
}

/// What happened committing a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CommitOutcome {
    /// The submission was already the current one of the slot, nothing changed.
    AlreadyCurrent,
    /// The slot has a newer submission. The tarball is kept in the slot directory but it is not
    /// the current one.
    Stale {
        /// The current submission of the slot.
        current: SubmitFilename,
    },
    /// The submission is now the current one of the slot.
    Committed {
        /// The submission number of the slot.
        number: u64,
        /// The submission it replaced, if any.
        previous: Option<SubmitFilename>,
    },
}

/// What [`CollectStore::clear_leftovers`] removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearSummary {
    /// Number of entries removed from `tmp/`.
    pub scratch: usize,
    /// Number of already committed files removed from `inbound/`.
    pub inbound: usize,
}

/// The local collect tree.
///
/// Only one `CollectStore` can be open on the same directory at the same time, even across
/// processes: opening blocks until the other one is dropped.
#[derive(Debug)]
pub struct CollectStore {
    /// Top directory of the tree.
    topdir: PathBuf,
    /// Keeps the lock alive.
    _lock: LockFile,
}

impl CollectStore {
    /// Open the collect tree at `topdir`, creating it if needed. If another process holds the lock,
    /// this waits for it.
    pub fn open<P: Into<PathBuf>>(topdir: P) -> Result<CollectStore, Error> {
        let topdir = topdir.into();
        debug!("Opening collect tree at {}", topdir.display());
        for dir in ["etc", "inbound", "tmp", "errors", "slots"] {
            let dir = topdir.join(dir);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let lock_path = topdir.join(LOCK_FILE);
        let mut lock = LockFile::open(lock_path.as_path())
            .with_context(|| format!("Failed to create lock file at {}", lock_path.display()))?;
        if !lock.try_lock().context("Failed to lock the collect tree")? {
            warn!("Collect tree locked by another process... waiting");
            lock.lock()
                .context("Failed to obtain exclusive lock on the collect tree")?;
        }
        Ok(CollectStore {
            topdir,
            _lock: lock,
        })
    }

    /// The top directory of the tree.
    pub fn topdir(&self) -> &Path {
        &self.topdir
    }

    /// Where a fetched tarball is kept until it is committed.
    pub fn inbound_path(&self, file: &SubmitFilename) -> PathBuf {
        self.topdir.join("inbound").join(file.to_string())
    }

    /// Where a rejected tarball ends up.
    pub fn error_path(&self, file: &SubmitFilename) -> PathBuf {
        self.topdir.join("errors").join(file.to_string())
    }

    /// The log written next to a rejected tarball.
    pub fn rejection_log_path(&self, file: &SubmitFilename) -> PathBuf {
        let mut path = self.error_path(file).into_os_string();
        path.push(".log");
        path.into()
    }

    /// The reasons a tarball has been rejected for, `None` if it was never rejected.
    pub fn rejection_log(&self, file: &SubmitFilename) -> Result<Option<String>, Error> {
        let path = self.rejection_log_path(file);
        if !path.exists() {
            return Ok(None);
        }
        let log = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(log))
    }

    /// The directory of a slot.
    pub fn slot_dir(&self, id: &SlotId) -> PathBuf {
        self.topdir.join("slots").join(id.to_string())
    }

    /// The submission numbers allocator.
    pub fn numbers(&self) -> SubmissionNumbers {
        SubmissionNumbers::new(self.topdir.join("etc").join("next_num"))
    }

    /// Load the registry of the contestants.
    pub fn registry(&self) -> Result<Registry, Error> {
        Registry::load(self.topdir.join("etc").join("registry.json"))
    }

    /// A fresh empty directory in `tmp/` where to unpack `file`. Anything left there by a previous
    /// run is removed.
    pub fn scratch_dir(&self, file: &SubmitFilename) -> Result<PathBuf, Error> {
        let dir = self.scratch_path(file);
        remove_tree(&dir)?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(dir)
    }

    /// Remove the scratch directory of `file`, if any.
    pub fn remove_scratch(&self, file: &SubmitFilename) -> Result<(), Error> {
        remove_tree(self.scratch_path(file))
    }

    fn scratch_path(&self, file: &SubmitFilename) -> PathBuf {
        self.topdir.join("tmp").join(file.stem())
    }

    /// The local state of a slot.
    pub fn slot_state(&self, id: &SlotId) -> Result<SlotState, Error> {
        SlotState::inspect(self.slot_dir(id), id.clone())
    }

    /// Where a single submission is.
    pub fn submission_state(&self, file: &SubmitFilename) -> SubmissionState {
        if self.slot_dir(file.id()).join(file.to_string()).exists() {
            SubmissionState::Committed
        } else if self.error_path(file).exists() {
            SubmissionState::Rejected
        } else if self.scratch_path(file).exists() {
            SubmissionState::Validated
        } else if self.inbound_path(file).exists() {
            SubmissionState::Staged
        } else {
            SubmissionState::Absent
        }
    }

    /// Whether the current submission of the slot has the given hash.
    pub fn is_current(&self, id: &SlotId, digest: &Sha256Digest) -> Result<bool, Error> {
        let state = self.slot_state(id)?;
        Ok(state.is_committed() && state.meta.map_or(false, |m| &m.sha256 == digest))
    }

    /// Make a validated submission the current one of its slot.
    ///
    /// Every step can be redone after a crash: committing again the same submission completes a
    /// half-done commit.
    pub fn commit(&self, commit: Commit) -> Result<CommitOutcome, Error> {
        let file = &commit.filename;
        let slot_dir = self.slot_dir(file.id());
        std::fs::create_dir_all(&slot_dir)
            .with_context(|| format!("Failed to create {}", slot_dir.display()))?;
        let state = self.slot_state(file.id())?;
        let dest_tarball = slot_dir.join(file.to_string());

        if state.current.as_ref() == Some(file)
            && state.meta.as_ref().map(|m| &m.sha256) == Some(&commit.digest)
            && dest_tarball.exists()
        {
            info!("{} is already the current submission", file);
            self.discard(&commit, &dest_tarball)?;
            remove_tree(self.scratch_path(file))?;
            return Ok(CommitOutcome::AlreadyCurrent);
        }

        if let Some(current) = &state.current {
            if current.timestamp() > file.timestamp() {
                warn!("{} is older than the current submission {}", file, current);
                if commit.tarball != dest_tarball {
                    move_file(&commit.tarball, &dest_tarball)?;
                }
                remove_tree(&commit.unpacked)?;
                remove_tree(self.scratch_path(file))?;
                return Ok(CommitOutcome::Stale {
                    current: current.clone(),
                });
            }
        }

        let dest_dir = slot_dir.join(file.timestamp().to_string());
        // a half-committed leftover of the same submission
        remove_tree(&dest_dir)?;
        std::fs::rename(&commit.unpacked, &dest_dir).with_context(|| {
            format!(
                "Failed to move {} -> {}",
                commit.unpacked.display(),
                dest_dir.display()
            )
        })?;
        if commit.tarball != dest_tarball {
            move_file(&commit.tarball, &dest_tarball)?;
        }
        let previous = state.current.filter(|current| current != file);
        if let Some(previous) = &previous {
            swap_symlink(slot_dir.join(PREVIOUS_LINK), Path::new(&previous.to_string()))?;
        }
        swap_symlink(slot_dir.join(CURRENT_LINK), Path::new(&file.to_string()))?;
        let meta = SubmitMeta {
            username: file.id().username.clone(),
            slot: file.id().slot,
            timestamp: file.timestamp(),
            filename: file.clone(),
            sha256: commit.digest.clone(),
            length: commit.length,
            collected_at: chrono::Utc::now()
                .format(ioccc_slot::DATETIME_USEC_FORMAT)
                .to_string(),
            collected_by: commit.collected_by.clone(),
        };
        meta.save(slot_dir.join(SUBMIT_META_FILE))?;
        let number = self.numbers().assign(&slot_dir)?;
        remove_tree(self.scratch_path(file))?;
        info!("Committed {} as submission {}", file, number);
        Ok(CommitOutcome::Committed { number, previous })
    }

    /// Remove the copies of an already committed submission.
    fn discard(&self, commit: &Commit, dest_tarball: &Path) -> Result<(), Error> {
        if commit.tarball != dest_tarball && commit.tarball.exists() {
            std::fs::remove_file(&commit.tarball)
                .with_context(|| format!("Failed to remove {}", commit.tarball.display()))?;
        }
        remove_tree(&commit.unpacked)
    }

    /// Move a tarball that failed the checks into `errors/`, together with a log of the reasons.
    /// The tarball may be missing, for example if the fetch failed.
    pub fn reject(&self, file: &SubmitFilename, tarball: &Path, log: &str) -> Result<PathBuf, Error> {
        let dest = self.error_path(file);
        if tarball.exists() {
            move_file(tarball, &dest)?;
        }
        let log_path = self.rejection_log_path(file);
        write_atomic(&log_path, log.as_bytes())?;
        remove_tree(self.scratch_path(file))?;
        warn!("Rejected {}, see {}", file, log_path.display());
        Ok(dest)
    }

    /// The state of every slot with a local directory, sorted by slot.
    pub fn list_slots(&self) -> Result<Vec<SlotState>, Error> {
        let slots = self.topdir.join("slots");
        let mut states = vec![];
        for entry in
            std::fs::read_dir(&slots).with_context(|| format!("Failed to list {}", slots.display()))?
        {
            let entry = entry?;
            let name = entry.file_name();
            let id = match name.to_string_lossy().parse::<SlotId>() {
                Ok(id) => id,
                Err(e) => {
                    warn!("Ignoring {}: {:#}", entry.path().display(), e);
                    continue;
                }
            };
            states.push(SlotState::inspect(entry.path(), id)?);
        }
        states.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(states)
    }

    /// Remove the leftovers of interrupted runs: the content of `tmp/` and the files in `inbound/`
    /// already stored in their slot.
    pub fn clear_leftovers(&self) -> Result<ClearSummary, Error> {
        let mut summary = ClearSummary::default();
        let tmp = self.topdir.join("tmp");
        for entry in std::fs::read_dir(&tmp)? {
            let path = entry?.path();
            debug!("Removing {}", path.display());
            remove_tree(&path)?;
            summary.scratch += 1;
        }
        let inbound = self.topdir.join("inbound");
        for entry in std::fs::read_dir(&inbound)? {
            let path = entry?.path();
            let file = match SubmitFilename::from_path(&path) {
                Ok(file) => file,
                Err(_) => continue,
            };
            if self.slot_dir(file.id()).join(file.to_string()).exists() {
                debug!("Removing {}", path.display());
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                summary.inbound += 1;
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    const SHA: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn file(timestamp: u64) -> SubmitFilename {
        SubmitFilename::parse(&format!("submit.user-1.{}.txz", timestamp)).unwrap()
    }

    /// Put a fetched and unpacked submission in the tree, as the collector does.
    fn prepare(store: &CollectStore, file: &SubmitFilename, digest: &str) -> Commit {
        let tarball = store.inbound_path(file);
        std::fs::write(&tarball, file.to_string()).unwrap();
        let unpacked = store.scratch_dir(file).unwrap().join("entry");
        std::fs::create_dir(&unpacked).unwrap();
        std::fs::write(unpacked.join("prog.c"), "main;").unwrap();
        Commit {
            filename: file.clone(),
            digest: digest.parse().unwrap(),
            length: 42,
            tarball,
            unpacked,
            collected_by: "judge@collector".into(),
        }
    }

    #[test]
    fn test_open_creates_tree() {
        let tmp = TempDir::new().unwrap();
        let store = CollectStore::open(tmp.path().join("collect")).unwrap();
        for dir in ["etc", "inbound", "tmp", "errors", "slots"] {
            assert!(store.topdir().join(dir).is_dir());
        }
        let mut other = LockFile::open(store.topdir().join(LOCK_FILE).as_path()).unwrap();
        assert!(!other.try_lock().unwrap());
        drop(store);
        assert!(other.try_lock().unwrap());
    }

    #[test]
    fn test_commit_first() {
        let tmp = TempDir::new().unwrap();
        let store = CollectStore::open(tmp.path()).unwrap();
        let file = file(1735689600);
        let commit = prepare(&store, &file, SHA);
        assert_eq!(store.submission_state(&file), SubmissionState::Validated);

        let outcome = store.commit(commit).unwrap();
        assert_eq!(
            outcome,
            CommitOutcome::Committed {
                number: 1,
                previous: None
            }
        );
        assert_eq!(store.submission_state(&file), SubmissionState::Committed);
        let slot_dir = store.slot_dir(file.id());
        assert!(slot_dir.join("1735689600/prog.c").exists());
        assert!(!store.inbound_path(&file).exists());
        assert!(store.is_current(file.id(), &SHA.parse().unwrap()).unwrap());

        let state = store.slot_state(file.id()).unwrap();
        assert_eq!(state.current, Some(file.clone()));
        assert_eq!(state.previous, None);
        assert_eq!(state.number, Some(1));
        assert_eq!(state.tarballs, vec![file.clone()]);
        assert_eq!(state.meta.unwrap().length, 42);
    }

    #[test]
    fn test_commit_twice() {
        let tmp = TempDir::new().unwrap();
        let store = CollectStore::open(tmp.path()).unwrap();
        let file = file(1735689600);
        store.commit(prepare(&store, &file, SHA)).unwrap();
        let outcome = store.commit(prepare(&store, &file, SHA)).unwrap();
        assert_eq!(outcome, CommitOutcome::AlreadyCurrent);
        assert!(!store.inbound_path(&file).exists());
        assert_eq!(std::fs::read_dir(store.topdir().join("tmp")).unwrap().count(), 0);
    }

    #[test]
    fn test_commit_newer_and_stale() {
        let tmp = TempDir::new().unwrap();
        let store = CollectStore::open(tmp.path()).unwrap();
        let old = file(1735689600);
        let new = file(1735700000);
        store.commit(prepare(&store, &old, SHA)).unwrap();
        let outcome = store.commit(prepare(&store, &new, SHA)).unwrap();
        assert_eq!(
            outcome,
            CommitOutcome::Committed {
                number: 1,
                previous: Some(old.clone())
            }
        );
        let state = store.slot_state(new.id()).unwrap();
        assert_eq!(state.current, Some(new.clone()));
        assert_eq!(state.previous, Some(old.clone()));
        assert_eq!(state.tarballs, vec![old.clone(), new.clone()]);

        let older = file(1735600000);
        let outcome = store.commit(prepare(&store, &older, SHA)).unwrap();
        assert_eq!(outcome, CommitOutcome::Stale { current: new.clone() });
        let state = store.slot_state(new.id()).unwrap();
        assert_eq!(state.current, Some(new));
        assert_eq!(state.previous, Some(old));
        assert_eq!(state.tarballs.len(), 3);
        assert!(!store.slot_dir(older.id()).join("1735600000").exists());
    }

    #[test]
    fn test_commit_completes_half_done() {
        let tmp = TempDir::new().unwrap();
        let store = CollectStore::open(tmp.path()).unwrap();
        let file = file(1735689600);
        store.commit(prepare(&store, &file, SHA)).unwrap();
        // simulate a crash before .submit.sh was written
        let slot_dir = store.slot_dir(file.id());
        std::fs::remove_file(slot_dir.join(SUBMIT_META_FILE)).unwrap();
        assert!(!store.slot_state(file.id()).unwrap().is_committed());

        let outcome = store.commit(prepare(&store, &file, SHA)).unwrap();
        assert_eq!(
            outcome,
            CommitOutcome::Committed {
                number: 1,
                previous: None
            }
        );
        assert!(store.slot_state(file.id()).unwrap().is_committed());
        assert_eq!(store.numbers().peek().unwrap(), 2);
    }

    #[test]
    fn test_numbers_per_slot() {
        let tmp = TempDir::new().unwrap();
        let store = CollectStore::open(tmp.path()).unwrap();
        let a = SubmitFilename::parse("submit.user-1.1735689600.txz").unwrap();
        let b = SubmitFilename::parse("submit.other-0.1735689600.txz").unwrap();
        store.commit(prepare(&store, &a, SHA)).unwrap();
        let outcome = store.commit(prepare(&store, &b, SHA)).unwrap();
        assert_eq!(
            outcome,
            CommitOutcome::Committed {
                number: 2,
                previous: None
            }
        );
        let slots = store.list_slots().unwrap();
        let ids: Vec<_> = slots.iter().map(|s| s.id.to_string()).collect();
        assert_eq!(ids, vec!["other-0", "user-1"]);
    }

    #[test]
    fn test_reject() {
        let tmp = TempDir::new().unwrap();
        let store = CollectStore::open(tmp.path()).unwrap();
        let file = file(1735689600);
        let commit = prepare(&store, &file, SHA);
        let dest = store
            .reject(&file, &commit.tarball, "Error: txzchk failed\n")
            .unwrap();
        assert!(dest.exists());
        assert_eq!(store.submission_state(&file), SubmissionState::Rejected);
        assert_eq!(
            std::fs::read_to_string(store.topdir().join(format!("errors/{}.log", file))).unwrap(),
            "Error: txzchk failed\n"
        );
        assert!(!store.inbound_path(&file).exists());
        assert!(!commit.unpacked.exists());
        assert_eq!(
            store.rejection_log(&file).unwrap().as_deref(),
            Some("Error: txzchk failed\n")
        );
        assert_eq!(store.rejection_log(&self::file(1735700000)).unwrap(), None);
    }

    #[test]
    fn test_reject_missing_tarball() {
        let tmp = TempDir::new().unwrap();
        let store = CollectStore::open(tmp.path()).unwrap();
        let file = file(1735689600);
        store
            .reject(&file, &store.inbound_path(&file), "fetch failed")
            .unwrap();
        assert!(store
            .topdir()
            .join(format!("errors/{}.log", file))
            .exists());
    }

    #[test]
    fn test_clear_leftovers() {
        let tmp = TempDir::new().unwrap();
        let store = CollectStore::open(tmp.path()).unwrap();
        let committed = file(1735689600);
        let pending = file(1735700000);
        store.commit(prepare(&store, &committed, SHA)).unwrap();
        // a copy left in inbound by a crash after the commit
        std::fs::write(store.inbound_path(&committed), "x").unwrap();
        prepare(&store, &pending, SHA);

        let summary = store.clear_leftovers().unwrap();
        assert_eq!(
            summary,
            ClearSummary {
                scratch: 1,
                inbound: 1
            }
        );
        assert!(!store.inbound_path(&committed).exists());
        assert_eq!(store.submission_state(&pending), SubmissionState::Staged);
    }
}
