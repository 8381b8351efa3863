#![allow(dead_code)]

use chrono::{Local, NaiveDateTime, TimeDelta};
use logrotate::schedule::Callback;
use logrotate::{Result, Scheduler, DEFAULT_ARCHIVE_TIME_FORMAT};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const TIME_FORMAT: &str = DEFAULT_ARCHIVE_TIME_FORMAT;

pub fn days_ago(days: i64) -> NaiveDateTime {
    Local::now().naive_local() - TimeDelta::days(days)
}

/// Create an archive file `<prefix>-<at><ext>` holding `contents`.
pub fn write_archive(dir: &Path, prefix: &str, at: NaiveDateTime, ext: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(format!("{prefix}-{}{ext}", at.format(TIME_FORMAT)));
    fs::write(&path, contents).unwrap();
    path
}

/// Sorted file names in `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

/// Sorted file names in `dir` other than `active`.
pub fn archive_names(dir: &Path, active: &str) -> Vec<String> {
    file_names(dir).into_iter().filter(|n| n != active).collect()
}

/// Concatenated contents of every file in `dir`.
pub fn all_bytes(dir: &Path) -> Vec<u8> {
    file_names(dir)
        .iter()
        .flat_map(|n| fs::read(dir.join(n)).unwrap())
        .collect()
}

/// A scheduler that only fires when told to.
#[derive(Default)]
pub struct ManualScheduler {
    jobs: Mutex<Vec<(String, Callback)>>,
}

impl ManualScheduler {
    pub fn fire(&self) {
        for (_, callback) in self.jobs.lock().unwrap().iter() {
            callback();
        }
    }

    pub fn exprs(&self) -> Vec<String> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .map(|(expr, _)| expr.clone())
            .collect()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, expr: &str, callback: Callback) -> Result<()> {
        self.jobs.lock().unwrap().push((expr.to_string(), callback));
        Ok(())
    }
}
