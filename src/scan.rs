//! Discovery of archived predecessors of an active file.

use crate::archive::Compression;
use crate::naming::{split_filename, time_from_name};
use chrono::NaiveDateTime;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};

/// An archive found next to the active file.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    name: String,
    dir: PathBuf,
    timestamp: NaiveDateTime,
    compressed: bool,
    metadata: Metadata,
}

impl ArchiveEntry {
    /// File name of the archive.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding the archive.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the archive.
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }

    /// Timestamp parsed from the file name, in local time.
    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// Whether the archive already carries the compressed suffix.
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Size in bytes at the time of the scan.
    pub fn len(&self) -> u64 {
        self.metadata.len()
    }

    /// Whether the archive was empty at the time of the scan.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// File system metadata captured during the scan.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// List the archives of `active`, newest first.
///
/// Scans the active file's directory without recursing. A file is an archive
/// when its name is `<prefix>-<timestamp><ext>` or
/// `<prefix>-<timestamp><ext><codec suffix>` for the active file's own prefix
/// and extension, with the timestamp written in `time_format`. Everything
/// else, including the active file itself, is ignored.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn list_archives(
    active: &Path,
    time_format: &str,
    codec: Compression,
) -> io::Result<Vec<ArchiveEntry>> {
    let dir = match active.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let (prefix, ext) = split_filename(active);
    let prefix = format!("{prefix}-");
    let compressed_ext = format!("{ext}{}", codec.suffix());

    let mut archives = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let (timestamp, compressed) =
            if let Ok(t) = time_from_name(time_format, &name, &prefix, &ext) {
                (t, false)
            } else if let Ok(t) = time_from_name(time_format, &name, &prefix, &compressed_ext) {
                (t, true)
            } else {
                continue;
            };

        // The entry may vanish between listing and stat when another
        // retention pass runs concurrently.
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        if metadata.is_dir() {
            continue;
        }

        archives.push(ArchiveEntry {
            name,
            dir: dir.clone(),
            timestamp,
            compressed,
            metadata,
        });
    }

    archives.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(archives)
}
