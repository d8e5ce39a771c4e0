use std::path::Path;

use anyhow::{Context, Error};
use ioccc_slot::{SlotId, SubmitFilename};
use serde::Serialize;

use crate::{SubmissionNumbers, SubmitMeta, CURRENT_LINK, PREVIOUS_LINK, SUBMIT_META_FILE};

/// Where a single submission is in the collect pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubmissionState {
    /// Not known locally.
    Absent,
    /// Fetched into `inbound/`, not yet checked.
    Staged,
    /// Checked and unpacked into `tmp/`, not yet committed.
    Validated,
    /// Stored in the slot directory.
    Committed,
    /// Moved into `errors/`.
    Rejected,
}

/// What is known locally about a slot, derived from the files in its directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotState {
    /// The slot.
    pub id: SlotId,
    /// The tarball `.txz` points to.
    pub current: Option<SubmitFilename>,
    /// The tarball `.prev` points to.
    pub previous: Option<SubmitFilename>,
    /// Content of `.submit.sh`.
    pub meta: Option<SubmitMeta>,
    /// Content of `.num.sh`.
    pub number: Option<u64>,
    /// All the tarballs stored in the slot directory, oldest first.
    pub tarballs: Vec<SubmitFilename>,
}

impl SlotState {
    /// Inspect the slot directory of `id`. A missing directory is an empty slot.
    pub fn inspect<P: AsRef<Path>>(slot_dir: P, id: SlotId) -> Result<SlotState, Error> {
        let slot_dir = slot_dir.as_ref();
        let mut state = SlotState {
            id,
            current: None,
            previous: None,
            meta: None,
            number: None,
            tarballs: vec![],
        };
        if !slot_dir.is_dir() {
            return Ok(state);
        }
        state.current = read_link(&slot_dir.join(CURRENT_LINK))?;
        state.previous = read_link(&slot_dir.join(PREVIOUS_LINK))?;
        state.meta = SubmitMeta::load(slot_dir.join(SUBMIT_META_FILE))?;
        state.number = SubmissionNumbers::get(slot_dir)?;
        for entry in std::fs::read_dir(slot_dir)
            .with_context(|| format!("Failed to list {}", slot_dir.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if let Ok(file) = SubmitFilename::parse(&name.to_string_lossy()) {
                if file.id() == &state.id {
                    state.tarballs.push(file);
                }
            }
        }
        state.tarballs.sort();
        Ok(state)
    }

    /// Whether the current submission of the slot is complete: `.txz` points to an existing
    /// tarball described by `.submit.sh`.
    pub fn is_committed(&self) -> bool {
        match (&self.current, &self.meta) {
            (Some(current), Some(meta)) => {
                &meta.filename == current && self.tarballs.contains(current)
            }
            _ => false,
        }
    }
}

/// The tarball a slot symlink points to, `None` if the link is missing or does not point to a
/// submit file.
fn read_link(link: &Path) -> Result<Option<SubmitFilename>, Error> {
    if link.symlink_metadata().is_err() {
        return Ok(None);
    }
    let target = std::fs::read_link(link)
        .with_context(|| format!("Failed to read symlink {}", link.display()))?;
    match SubmitFilename::from_path(&target) {
        Ok(file) => Ok(Some(file)),
        Err(e) => {
            warn!("Ignoring {}: {:#}", link.display(), e);
            Ok(None)
        }
    }
}
