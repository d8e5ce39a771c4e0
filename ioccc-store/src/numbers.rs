use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Error};

use crate::fs::write_atomic;

/// Name of the file, inside a slot directory, with the submission number of the slot.
pub const NUM_FILE: &str = ".num.sh";

/// Allocator of the submission numbers.
///
/// Every slot gets a number the first time a submission is committed into it, the number is kept
/// for all the following submissions of the same slot. Numbers start at 1 and are never reused:
/// the counter is bumped before the number is written into the slot, so a crash can only leave a
/// hole in the sequence.
#[derive(Debug, Clone)]
pub struct SubmissionNumbers {
    /// Path of the file with the next number to assign.
    next_num: PathBuf,
}

impl SubmissionNumbers {
    /// Use the counter stored at `next_num`.
    pub fn new<P: Into<PathBuf>>(next_num: P) -> SubmissionNumbers {
        SubmissionNumbers {
            next_num: next_num.into(),
        }
    }

    /// The next number that will be assigned.
    pub fn peek(&self) -> Result<u64, Error> {
        if !self.next_num.exists() {
            return Ok(1);
        }
        let content = std::fs::read_to_string(&self.next_num)
            .with_context(|| format!("Failed to read {}", self.next_num.display()))?;
        content
            .trim()
            .parse()
            .with_context(|| format!("Invalid counter in {}", self.next_num.display()))
    }

    /// The number of the slot stored in `slot_dir`, if it has one.
    pub fn get<P: AsRef<Path>>(slot_dir: P) -> Result<Option<u64>, Error> {
        let path = slot_dir.as_ref().join(NUM_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let num = content
            .lines()
            .find_map(|line| line.trim().strip_prefix("SUBMIT_NUM="))
            .ok_or_else(|| anyhow!("Missing SUBMIT_NUM in {}", path.display()))?;
        let num = num
            .parse::<u64>()
            .with_context(|| format!("Invalid SUBMIT_NUM in {}", path.display()))?;
        Ok(Some(num))
    }

    /// The number of the slot stored in `slot_dir`, assigning a new one if it has none.
    pub fn assign<P: AsRef<Path>>(&self, slot_dir: P) -> Result<u64, Error> {
        let slot_dir = slot_dir.as_ref();
        if let Some(num) = SubmissionNumbers::get(slot_dir)? {
            return Ok(num);
        }
        let num = self.peek()?;
        write_atomic(&self.next_num, format!("{}\n", num + 1).as_bytes())?;
        write_atomic(
            slot_dir.join(NUM_FILE),
            format!("SUBMIT_NUM={}\n", num).as_bytes(),
        )?;
        info!("Assigned submission number {} to {}", num, slot_dir.display());
        Ok(num)
    }
}
