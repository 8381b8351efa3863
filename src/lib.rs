//! An append-only file sink that rotates itself by size or on a schedule and
//! keeps a bounded, optionally compressed set of timestamped archives.

mod archive;
mod error;
mod naming;
mod options;
mod retention;
mod scan;
pub mod schedule;
mod size;
mod writer;

pub use archive::{compress_file, Compression};
pub use error::{Error, Result};
pub use naming::{archive_name, archive_name_at, split_filename, time_from_name, ArchiveNameError};
pub use options::{
    Config, Options, RotatePeriod, DEFAULT_ARCHIVE_TIME_FORMAT, DEFAULT_MAX_ARCHIVES,
    DEFAULT_MAX_ARCHIVE_DAYS,
};
pub use retention::{RetentionPlan, RetentionPolicy};
pub use scan::{list_archives, ArchiveEntry};
pub use schedule::{CronExpr, Scheduler, ThreadScheduler};
pub use size::parse_size;
pub use writer::RotatingFile;
