//! Options accepted by [`RotatingFile`] and the validated [`Config`] they
//! resolve to.

use crate::archive::Compression;
use crate::error::{Error, Result};
use crate::naming::check_time_format;
use crate::retention::RetentionPolicy;
use crate::schedule::Scheduler;
use crate::size::parse_size;
use crate::writer::RotatingFile;
use serde::Deserialize;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Archive timestamp format used when none is given: millisecond precision,
/// e.g. `2024-03-01_12:30:05.042`.
pub const DEFAULT_ARCHIVE_TIME_FORMAT: &str = "%Y-%m-%d_%H:%M:%S%.3f";

/// Archive count cap applied when rotation is enabled and none is given.
pub const DEFAULT_MAX_ARCHIVES: usize = 100;

/// Archive age cap in days applied when rotation is enabled and none is given.
pub const DEFAULT_MAX_ARCHIVE_DAYS: u32 = 14;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Calendar period for schedule-based rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotatePeriod {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl RotatePeriod {
    /// Cron expression firing at the start of every period.
    pub fn cron(self) -> &'static str {
        match self {
            RotatePeriod::Hourly => "0 * * * *",
            RotatePeriod::Daily => "0 0 * * *",
            RotatePeriod::Weekly => "0 0 * * 0",
            RotatePeriod::Monthly => "0 0 1 * *",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RotatePeriod::Hourly => "hourly",
            RotatePeriod::Daily => "daily",
            RotatePeriod::Weekly => "weekly",
            RotatePeriod::Monthly => "monthly",
        }
    }
}

impl fmt::Display for RotatePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RotatePeriod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hourly" => Ok(RotatePeriod::Hourly),
            "daily" => Ok(RotatePeriod::Daily),
            "weekly" => Ok(RotatePeriod::Weekly),
            "monthly" => Ok(RotatePeriod::Monthly),
            other => Err(Error::InvalidRotatePeriod(other.to_string())),
        }
    }
}

/// Unvalidated options for a [`RotatingFile`].
///
/// Build one with chained setters, or deserialize it from a configuration
/// file; every key is optional.
///
/// ```
/// use logrotate::{Options, RotatePeriod};
///
/// let config = Options::new()
///     .file("/var/log/app/app.log")
///     .rotate_size("100m")
///     .rotate_period(RotatePeriod::Daily)
///     .compress(true)
///     .resolve()
///     .unwrap();
/// assert_eq!(config.rotate_size(), 100 * 1024 * 1024);
/// assert_eq!(config.schedule(), Some("0 0 * * *"));
/// assert_eq!(config.max_archives(), 100);
/// ```
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Active file. Defaults to `<process name>.log` in the temp directory.
    pub file: Option<PathBuf>,
    /// `hourly`, `daily`, `weekly` or `monthly`.
    pub rotate_period: Option<String>,
    /// Size threshold such as `"10MB"`; empty or zero disables it.
    pub rotate_size: Option<String>,
    /// Archive count cap; `0` means the default when rotation is enabled.
    pub max_archives: usize,
    /// Archive age cap in days; `0` means the default when rotation is enabled.
    pub max_archive_days: u32,
    /// strftime pattern embedded in archive names.
    pub archive_time_format: Option<String>,
    /// Compress archives that survive retention.
    pub compress: bool,
    /// Codec used when `compress` is set.
    pub compression: Compression,
    #[serde(skip)]
    scheduler: Option<Arc<dyn Scheduler>>,
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("file", &self.file)
            .field("rotate_period", &self.rotate_period)
            .field("rotate_size", &self.rotate_size)
            .field("max_archives", &self.max_archives)
            .field("max_archive_days", &self.max_archive_days)
            .field("archive_time_format", &self.archive_time_format)
            .field("compress", &self.compress)
            .field("compression", &self.compression)
            .field("scheduler", &self.scheduler.is_some())
            .finish()
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn rotate_period(mut self, period: RotatePeriod) -> Self {
        self.rotate_period = Some(period.to_string());
        self
    }

    pub fn rotate_size(mut self, size: impl Into<String>) -> Self {
        self.rotate_size = Some(size.into());
        self
    }

    pub fn max_archives(mut self, n: usize) -> Self {
        self.max_archives = n;
        self
    }

    pub fn max_archive_days(mut self, days: u32) -> Self {
        self.max_archive_days = days;
        self
    }

    pub fn archive_time_format(mut self, format: impl Into<String>) -> Self {
        self.archive_time_format = Some(format.into());
        self
    }

    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn compression(mut self, codec: Compression) -> Self {
        self.compression = codec;
        self
    }

    /// Scheduler that drives period-based rotation.
    ///
    /// Without one, a [`ThreadScheduler`](crate::ThreadScheduler) owned by the
    /// file is started when a rotate period is set.
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub(crate) fn take_scheduler(&mut self) -> Option<Arc<dyn Scheduler>> {
        self.scheduler.take()
    }

    /// Validate the options and fill in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSize`], [`Error::InvalidRotatePeriod`] or
    /// [`Error::InvalidTimeFormat`] for malformed values.
    pub fn resolve(&self) -> Result<Config> {
        let rotate_size = match self.rotate_size.as_deref() {
            Some(s) => parse_size(s)?,
            None => 0,
        };
        let schedule = match self.rotate_period.as_deref() {
            None | Some("") => None,
            Some(p) => Some(p.parse::<RotatePeriod>()?.cron().to_string()),
        };

        let time_format = match self.archive_time_format.as_deref() {
            None | Some("") => DEFAULT_ARCHIVE_TIME_FORMAT.to_string(),
            Some(f) => f.to_string(),
        };
        check_time_format(&time_format).map_err(|reason| Error::InvalidTimeFormat {
            format: time_format.clone(),
            reason,
        })?;

        let mut max_archives = self.max_archives;
        let mut max_archive_days = self.max_archive_days;
        if rotate_size > 0 || schedule.is_some() {
            if max_archives == 0 {
                max_archives = DEFAULT_MAX_ARCHIVES;
            }
            if max_archive_days == 0 {
                max_archive_days = DEFAULT_MAX_ARCHIVE_DAYS;
            }
        }

        let path = match &self.file {
            Some(p) if !p.as_os_str().is_empty() => p.clone(),
            _ => default_file(),
        };

        Ok(Config {
            path,
            rotate_size,
            schedule,
            time_format,
            max_archives,
            max_age: Duration::from_secs(u64::from(max_archive_days) * SECS_PER_DAY),
            compress: self.compress,
            codec: self.compression,
        })
    }

    /// Resolve the options and open a [`RotatingFile`] with them.
    pub fn open(self) -> Result<RotatingFile> {
        RotatingFile::new(self)
    }
}

fn default_file() -> PathBuf {
    let mut name = std::env::args_os()
        .next()
        .and_then(|arg0| Path::new(&arg0).file_name().map(OsString::from))
        .unwrap_or_else(|| OsString::from(env!("CARGO_PKG_NAME")));
    name.push(".log");
    std::env::temp_dir().join(name)
}

/// Validated, immutable settings of a [`RotatingFile`].
#[derive(Debug, Clone)]
pub struct Config {
    path: PathBuf,
    rotate_size: u64,
    schedule: Option<String>,
    time_format: String,
    max_archives: usize,
    max_age: Duration,
    compress: bool,
    codec: Compression,
}

impl Config {
    /// The active file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size threshold in bytes; `0` disables size-based rotation.
    pub fn rotate_size(&self) -> u64 {
        self.rotate_size
    }

    /// Cron expression for schedule-based rotation.
    pub fn schedule(&self) -> Option<&str> {
        self.schedule.as_deref()
    }

    pub fn time_format(&self) -> &str {
        &self.time_format
    }

    pub fn max_archives(&self) -> usize {
        self.max_archives
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn compress(&self) -> bool {
        self.compress
    }

    pub fn codec(&self) -> Compression {
        self.codec
    }

    /// Whether any rotation trigger is configured.
    pub fn rotates(&self) -> bool {
        self.rotate_size > 0 || self.schedule.is_some()
    }

    /// Whether a file of `size` bytes would be over the size threshold.
    pub(crate) fn exceeds(&self, size: u64) -> bool {
        self.rotate_size > 0 && size > self.rotate_size
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_archives: self.max_archives,
            max_age: self.max_age,
            compress: self.compress.then_some(self.codec),
        }
    }
}
