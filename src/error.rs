use std::io;
use std::path::PathBuf;

/// Errors produced while configuring or driving a [`RotatingFile`](crate::RotatingFile).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The rotate size string has a non-numeric magnitude or overflows `u64`.
    #[error("invalid size {0:?}")]
    InvalidSize(String),

    /// The rotate period is not one of `hourly`, `daily`, `weekly`, `monthly`.
    #[error("invalid rotate period {0:?}")]
    InvalidRotatePeriod(String),

    /// The archive time format cannot render or parse timestamps in file names.
    #[error("invalid archive time format {format:?}: {reason}")]
    InvalidTimeFormat { format: String, reason: &'static str },

    /// A cron expression outside the supported subset.
    #[error("invalid schedule {expr:?}: {reason}")]
    InvalidSchedule { expr: String, reason: &'static str },

    /// A single payload larger than the rotate size.
    #[error("write length ({len}) exceeds maximum file size ({max})")]
    WriteTooLarge { len: u64, max: u64 },

    #[error("can't make directories for new log file {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("can't archive {from} to {to}: {source}")]
    Archive {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("can't open log file {path}: {source}")]
    OpenFile { path: PathBuf, source: io::Error },

    #[error("failed to compress {path}: {source}")]
    Compress { path: PathBuf, source: io::Error },

    /// The write failed after `written` bytes had reached the file.
    #[error("write failed after {written} bytes: {source}")]
    PartialWrite { written: usize, source: io::Error },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        if let Error::Io(e) = err {
            return e;
        }
        let kind = match &err {
            Error::CreateDir { source, .. }
            | Error::Archive { source, .. }
            | Error::OpenFile { source, .. }
            | Error::Compress { source, .. }
            | Error::PartialWrite { source, .. } => source.kind(),
            _ => io::ErrorKind::InvalidInput,
        };
        io::Error::new(kind, err)
    }
}
