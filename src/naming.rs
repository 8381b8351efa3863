//! Archive file names: `<prefix>-<timestamp><ext>`.

use chrono::format::{Item, ParseErrorKind, StrftimeItems};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// Why a file name is not an archive of a given active file.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveNameError {
    #[error("mismatched prefix")]
    MismatchedPrefix,
    #[error("mismatched extension")]
    MismatchedExtension,
    #[error("timestamp does not match format: {0}")]
    Timestamp(#[from] chrono::format::ParseError),
}

/// Split a path's file name into `(prefix, extension)`.
///
/// The extension starts at the last `.` of the file name and keeps the dot;
/// it is empty when the name has no dot.
///
/// ```
/// use logrotate::split_filename;
///
/// assert_eq!(split_filename("/tmp/tmp.log"), ("tmp".to_string(), ".log".to_string()));
/// assert_eq!(split_filename("noext"), ("noext".to_string(), String::new()));
/// ```
pub fn split_filename(path: impl AsRef<Path>) -> (String, String) {
    let name = path
        .as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.rfind('.') {
        Some(i) => (name[..i].to_string(), name[i..].to_string()),
        None => (name, String::new()),
    }
}

/// Archive path for `active` stamped with the current local time.
///
/// # Panics
///
/// Panics if `time_format` contains an invalid strftime specifier. Formats
/// coming from a resolved [`Config`](crate::Config) are always valid.
pub fn archive_name(active: &Path, time_format: &str) -> PathBuf {
    archive_name_at(active, time_format, Local::now().naive_local())
}

/// Archive path for `active` stamped with `at`.
///
/// # Panics
///
/// Same as [`archive_name`].
pub fn archive_name_at(active: &Path, time_format: &str, at: NaiveDateTime) -> PathBuf {
    let (prefix, ext) = split_filename(active);
    let stamp = at.format(time_format);
    let name = format!("{prefix}-{stamp}{ext}");
    match active.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

/// Extract the timestamp embedded in an archive file name.
///
/// `prefix` must already include the trailing `-`. `ext` is the full suffix
/// expected after the timestamp, e.g. `.log` or `.log.gz`. Formats without a
/// time-of-day component parse as midnight.
///
/// # Errors
///
/// Returns an [`ArchiveNameError`] if the name does not start with `prefix`,
/// does not end with `ext`, or the part in between is not a timestamp in
/// `time_format`.
pub fn time_from_name(
    time_format: &str,
    filename: &str,
    prefix: &str,
    ext: &str,
) -> Result<NaiveDateTime, ArchiveNameError> {
    let rest = filename
        .strip_prefix(prefix)
        .ok_or(ArchiveNameError::MismatchedPrefix)?;
    let stamp = rest
        .strip_suffix(ext)
        .ok_or(ArchiveNameError::MismatchedExtension)?;

    match NaiveDateTime::parse_from_str(stamp, time_format) {
        Ok(t) => Ok(t),
        Err(e) if e.kind() == ParseErrorKind::NotEnough => {
            let date = NaiveDate::parse_from_str(stamp, time_format)?;
            Ok(date.and_time(NaiveTime::MIN))
        }
        Err(e) => Err(e.into()),
    }
}

/// Check that `time_format` is usable inside file names.
///
/// Returns the reason it is not: an invalid specifier, a format that renders
/// nothing, a rendering that contains a path separator, or one that
/// [`time_from_name`] cannot read back. Archives named with such a format
/// would never be found again, so retention could not bound them.
pub(crate) fn check_time_format(time_format: &str) -> Result<(), &'static str> {
    if StrftimeItems::new(time_format).any(|item| matches!(item, Item::Error)) {
        return Err("unsupported strftime specifier");
    }
    let mut sample = String::new();
    if write!(sample, "{}", Local::now().naive_local().format(time_format)).is_err() {
        return Err("needs fields a local timestamp does not carry");
    }
    if sample.is_empty() {
        return Err("renders an empty timestamp");
    }
    if sample.contains(['/', std::path::MAIN_SEPARATOR]) {
        return Err("renders a path separator");
    }
    let name = format!("archive-{sample}.log");
    if time_from_name(time_format, &name, "archive-", ".log").is_err() {
        return Err("cannot be parsed back");
    }
    Ok(())
}
