//! Which archives to keep, delete, or compress.

use crate::archive::{compress_file, Compression};
use crate::error::{Error, Result};
use crate::scan::ArchiveEntry;
use chrono::{NaiveDateTime, TimeDelta};
use log::debug;
use std::fs;
use std::io;
use std::time::Duration;

/// Count, age, and compression limits applied to a set of archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Maximum number of archives to keep; `0` keeps any number.
    pub max_archives: usize,
    /// Maximum archive age; zero keeps archives of any age.
    pub max_age: Duration,
    /// Codec for compressing kept archives; `None` leaves them as written.
    pub compress: Option<Compression>,
}

/// The outcome of applying a [`RetentionPolicy`] to a set of archives.
#[derive(Debug, Default)]
pub struct RetentionPlan {
    /// Archives to remove.
    pub delete: Vec<ArchiveEntry>,
    /// Kept archives that still need compressing.
    pub compress: Vec<ArchiveEntry>,
    /// Every kept archive, newest first, compressed or not.
    pub keep: Vec<ArchiveEntry>,
}

impl RetentionPolicy {
    /// Partition `archives` (newest first) into what to delete and what to
    /// compress, as of `now`.
    ///
    /// Age is applied before count: archives older than `now - max_age` are
    /// deleted first, then survivors beyond the newest `max_archives` are
    /// deleted as well.
    pub fn plan(&self, archives: Vec<ArchiveEntry>, now: NaiveDateTime) -> RetentionPlan {
        let mut plan = RetentionPlan::default();

        if self.max_age.is_zero() {
            plan.keep = archives;
        } else {
            let cutoff = TimeDelta::from_std(self.max_age)
                .ok()
                .and_then(|age| now.checked_sub_signed(age));
            for archive in archives {
                match cutoff {
                    Some(cutoff) if archive.timestamp() < cutoff => plan.delete.push(archive),
                    _ => plan.keep.push(archive),
                }
            }
        }

        if self.max_archives > 0 && plan.keep.len() > self.max_archives {
            plan.delete.extend(plan.keep.split_off(self.max_archives));
        }

        if self.compress.is_some() {
            plan.compress = plan
                .keep
                .iter()
                .filter(|a| !a.is_compressed())
                .cloned()
                .collect();
        }

        plan
    }
}

impl RetentionPlan {
    /// Delete and compress what the plan says.
    ///
    /// Every action is attempted even if an earlier one fails; the error of
    /// the last failing action is returned. Archives that disappeared since
    /// the scan count as handled, so repeating a pass is harmless.
    pub fn apply(&self, codec: Compression) -> Result<()> {
        let mut last_err = None;

        for archive in &self.delete {
            let path = archive.path();
            match fs::remove_file(&path) {
                Ok(()) => debug!("removed archive {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => last_err = Some(Error::Io(e)),
            }
        }

        for archive in &self.compress {
            let path = archive.path();
            match compress_file(&path, codec) {
                Ok(dst) => debug!("compressed archive {}", dst.display()),
                Err(Error::Compress { source, .. }) if source.kind() == io::ErrorKind::NotFound => {}
                Err(e) => last_err = Some(e),
            }
        }

        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
