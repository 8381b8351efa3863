use crate::error::{Error, Result};
use crate::naming::archive_name_at;
use crate::options::{Config, Options};
use crate::scan::list_archives;
use crate::schedule::{Scheduler, ThreadScheduler};
use chrono::{Local, NaiveDateTime, TimeDelta};
use log::{debug, warn};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions, Permissions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

// Candidate archive timestamps tried, one millisecond apart, before an
// existing archive is replaced.
const ARCHIVE_NAME_ATTEMPTS: u32 = 1000;

/// An append-only file that rotates itself.
///
/// Writes go to the active file at [`Config::path`]. Before a write would
/// push the file past the rotate size, or whenever the schedule fires or
/// [`rotate`](Self::rotate) is called, the active file is renamed to
/// `<prefix>-<timestamp><ext>` and a fresh one is created. After every
/// rotation a retention pass runs on a background thread, deleting archives
/// beyond the count and age caps and compressing the rest if configured.
///
/// All methods take `&self`; writes, rotations, and closes from different
/// threads are serialized by an internal lock, so the file can be shared
/// through an [`Arc`]. `&RotatingFile` implements [`io::Write`].
///
/// ```no_run
/// use logrotate::RotatingFile;
/// use std::io::Write;
///
/// let log = RotatingFile::builder()
///     .file("/var/log/app/app.log")
///     .rotate_size("10MB")
///     .max_archives(5)
///     .compress(true)
///     .open()?;
///
/// writeln!(&log, "service started")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct RotatingFile {
    // Dropped first so no scheduled rotation runs while the rest is torn down.
    scheduler: Option<Arc<dyn Scheduler>>,
    shared: Arc<Shared>,
}

struct Shared {
    config: Arc<Config>,
    state: Mutex<State>,
    retention: RetentionWorker,
}

#[derive(Default)]
struct State {
    file: Option<File>,
    size: u64,
    // Timestamp and path of the newest archive this writer created.
    last_archive: Option<(NaiveDateTime, PathBuf)>,
}

impl RotatingFile {
    /// Start building a rotating file.
    pub fn builder() -> Options {
        Options::new()
    }

    /// Open `path` without any rotation trigger.
    ///
    /// The file still rotates on an explicit [`rotate`](Self::rotate).
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Options::new().file(path).open()
    }

    /// Resolve `options` and set up the file.
    ///
    /// Nothing is opened until the first write. If a rotate period is set,
    /// the rotation callback is registered with the configured scheduler, or
    /// with a [`ThreadScheduler`] owned by the returned file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `options` do not resolve, or an I/O
    /// error if the background threads cannot be started.
    pub fn new(mut options: Options) -> Result<Self> {
        let scheduler = options.take_scheduler();
        let config = Arc::new(options.resolve()?);
        let retention = RetentionWorker::spawn(Arc::clone(&config))?;
        let shared = Arc::new(Shared {
            config,
            state: Mutex::new(State::default()),
            retention,
        });

        let scheduler = match shared.config.schedule() {
            Some(expr) => {
                let scheduler = scheduler
                    .unwrap_or_else(|| Arc::new(ThreadScheduler::new()) as Arc<dyn Scheduler>);
                let weak = Arc::downgrade(&shared);
                scheduler.schedule(
                    expr,
                    Box::new(move || {
                        let Some(shared) = weak.upgrade() else {
                            return;
                        };
                        if let Err(e) = shared.rotate() {
                            warn!(
                                "scheduled rotation of {} failed: {e}",
                                shared.config.path().display()
                            );
                        }
                    }),
                )?;
                Some(scheduler)
            }
            None => None,
        };

        Ok(RotatingFile { scheduler, shared })
    }

    /// Append `buf` to the active file, rotating first if it would not fit.
    ///
    /// Returns the number of bytes written, which is always `buf.len()` on
    /// success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WriteTooLarge`] without touching the file if `buf` is
    /// larger than the rotate size on its own. Opening, rotating, or writing
    /// errors are returned as they occur; nothing is retried. If the write
    /// fails after part of `buf` reached the file, the error is
    /// [`Error::PartialWrite`] carrying the byte count, and those bytes are
    /// included in [`current_size`](Self::current_size).
    pub fn append(&self, buf: &[u8]) -> Result<usize> {
        self.shared.append(buf)
    }

    /// Rotate now, whatever the active file's size.
    pub fn rotate(&self) -> Result<()> {
        self.shared.rotate()
    }

    /// Sync and close the active file.
    ///
    /// Calling `close` again, or before anything was written, is a no-op. A
    /// later write opens the active file again.
    pub fn close(&self) -> Result<()> {
        let mut state = self.shared.lock();
        match state.file.take() {
            Some(file) => {
                state.size = 0;
                file.sync_data()?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Flush the active file's data to disk.
    pub fn sync(&self) -> Result<()> {
        match &self.shared.lock().file {
            Some(file) => Ok(file.sync_data()?),
            None => Ok(()),
        }
    }

    /// Run a retention pass on the calling thread.
    ///
    /// Does nothing unless a size or period trigger is configured. Every
    /// deletion and compression is attempted; if any fail, the error of the
    /// last one is returned.
    pub fn apply_retention(&self) -> Result<()> {
        handle_archives(&self.shared.config)
    }

    /// Block until all retention passes queued by earlier rotations finish.
    pub fn wait_for_retention(&self) {
        self.shared.retention.wait_idle();
    }

    /// The active file's path.
    pub fn path(&self) -> &Path {
        self.shared.config.path()
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Bytes in the active file as tracked by this writer; `0` while closed.
    pub fn current_size(&self) -> u64 {
        self.shared.lock().size
    }

    /// Whether the active file is currently open.
    pub fn is_open(&self) -> bool {
        self.shared.lock().file.is_some()
    }
}

impl std::fmt::Debug for RotatingFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingFile")
            .field("config", &self.shared.config)
            .field("scheduled", &self.scheduler.is_some())
            .finish()
    }
}

impl Drop for RotatingFile {
    fn drop(&mut self) {
        self.scheduler = None;
        self.shared.lock().file = None;
    }
}

impl Write for &RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        accepted(self.append(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.shared.lock().file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut this: &RotatingFile = self;
        this.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut this: &RotatingFile = self;
        this.flush()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn append(&self, buf: &[u8]) -> Result<usize> {
        let len = buf.len() as u64;
        if self.config.exceeds(len) {
            return Err(Error::WriteTooLarge {
                len,
                max: self.config.rotate_size(),
            });
        }

        let mut state = self.lock();
        if state.file.is_none() {
            self.open_file(&mut state, len)?;
        }
        if self.config.exceeds(state.size + len) {
            self.rotate_locked(&mut state)?;
        }
        state.write(buf)
    }

    fn rotate(&self) -> Result<()> {
        let mut state = self.lock();
        self.rotate_locked(&mut state)
    }

    fn rotate_locked(&self, state: &mut State) -> Result<()> {
        if let Some(mut file) = state.file.take() {
            state.size = 0;
            file.flush()?;
        }
        self.open_new_file(state)?;
        debug!("rotated {}", self.config.path().display());
        self.retention.request();
        Ok(())
    }

    /// Open the existing active file for appending, or rotate it away if the
    /// pending write would not fit.
    fn open_file(&self, state: &mut State, pending: u64) -> Result<()> {
        let path = self.config.path();
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return self.open_new_file(state),
            Err(source) => {
                return Err(Error::OpenFile {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        if self.config.exceeds(meta.len() + pending) {
            return self.rotate_locked(state);
        }

        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|source| Error::OpenFile {
                path: path.to_path_buf(),
                source,
            })?;
        state.file = Some(file);
        state.size = meta.len();
        Ok(())
    }

    /// Archive whatever sits at the active path and start an empty file.
    fn open_new_file(&self, state: &mut State) -> Result<()> {
        let path = self.config.path();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| Error::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let permissions = match fs::metadata(path) {
            Ok(meta) => {
                let archive = self.archive_path(state);
                fs::rename(path, &archive).map_err(|source| Error::Archive {
                    from: path.to_path_buf(),
                    to: archive.clone(),
                    source,
                })?;
                debug!("archived {} to {}", path.display(), archive.display());
                Some(meta.permissions())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(source) => {
                return Err(Error::OpenFile {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let open_err = |source| Error::OpenFile {
            path: path.to_path_buf(),
            source,
        };
        let file = new_file_options(permissions)
            .open(path)
            .map_err(open_err)?;
        let size = file.metadata().map_err(open_err)?.len();
        state.file = Some(file);
        state.size = size;
        Ok(())
    }

    /// A free archive name for the active file, stamped with the current time
    /// and never older than the previous archive.
    fn archive_path(&self, state: &mut State) -> PathBuf {
        let path = self.config.path();
        let format = self.config.time_format();
        let suffix = self.config.codec().suffix();

        let mut at = Local::now().naive_local();
        if let Some((last, _)) = &state.last_archive {
            if at <= *last {
                at = *last + TimeDelta::milliseconds(1);
            }
        }

        let mut candidate = archive_name_at(path, format, at);
        let mut attempts = 0;
        loop {
            let mut compressed = OsString::from(candidate.as_os_str());
            compressed.push(suffix);
            let taken = candidate.exists()
                || Path::new(&compressed).exists()
                || matches!(&state.last_archive, Some((_, last)) if *last == candidate);
            if !taken {
                break;
            }
            attempts += 1;
            if attempts == ARCHIVE_NAME_ATTEMPTS {
                warn!("archive {} already exists, replacing it", candidate.display());
                break;
            }
            at += TimeDelta::milliseconds(1);
            candidate = archive_name_at(path, format, at);
        }

        state.last_archive = Some((at, candidate.clone()));
        candidate
    }
}

impl State {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no active file"))?;

        let (written, err) = write_counted(file, buf);
        self.size += written as u64;
        match err {
            None => Ok(written),
            Some(source) if written == 0 => Err(source.into()),
            Some(source) => Err(Error::PartialWrite { written, source }),
        }
    }
}

/// Write all of `buf`, returning how many bytes landed and the error that
/// stopped the write, if any.
fn write_counted(w: &mut impl Write, buf: &[u8]) -> (usize, Option<io::Error>) {
    let mut written = 0;
    while written < buf.len() {
        match w.write(&buf[written..]) {
            Ok(0) => return (written, Some(io::ErrorKind::WriteZero.into())),
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return (written, Some(e)),
        }
    }
    (written, None)
}

// A short write is a success under `io::Write`; the failure resurfaces on
// the caller's next write.
fn accepted(result: Result<usize>) -> io::Result<usize> {
    match result {
        Ok(n) | Err(Error::PartialWrite { written: n, .. }) => Ok(n),
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn new_file_options(permissions: Option<Permissions>) -> OpenOptions {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut options = OpenOptions::new();
    options
        .create(true)
        .append(true)
        .mode(permissions.map_or(0o644, |p| p.mode() & 0o7777));
    options
}

#[cfg(not(unix))]
fn new_file_options(_permissions: Option<Permissions>) -> OpenOptions {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    options
}

/// Delete and compress archives of the configured active file.
fn handle_archives(config: &Config) -> Result<()> {
    if !config.rotates() {
        return Ok(());
    }
    let archives = list_archives(config.path(), config.time_format(), config.codec())?;
    config
        .retention_policy()
        .plan(archives, Local::now().naive_local())
        .apply(config.codec())
}

// Retention passes queued by rotations, run one at a time off the write path.
struct RetentionWorker {
    request_tx: Option<mpsc::Sender<()>>,
    pending: Arc<(Mutex<usize>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl RetentionWorker {
    fn spawn(config: Arc<Config>) -> Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<()>();
        let pending = Arc::new((Mutex::new(0usize), Condvar::new()));
        let worker_pending = Arc::clone(&pending);

        let handle = thread::Builder::new()
            .name("logrotate-retention".to_string())
            .spawn(move || {
                for () in request_rx {
                    if let Err(e) = handle_archives(&config) {
                        warn!(
                            "retention pass for {} failed: {e}",
                            config.path().display()
                        );
                    }
                    let (count, done) = &*worker_pending;
                    let mut count = count.lock().unwrap_or_else(PoisonError::into_inner);
                    *count -= 1;
                    done.notify_all();
                }
            })?;

        Ok(RetentionWorker {
            request_tx: Some(request_tx),
            pending,
            handle: Some(handle),
        })
    }

    fn request(&self) {
        let Some(tx) = &self.request_tx else {
            return;
        };
        let (count, _) = &*self.pending;
        *count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        if tx.send(()).is_err() {
            *count.lock().unwrap_or_else(PoisonError::into_inner) -= 1;
        }
    }

    fn wait_idle(&self) {
        let (count, done) = &*self.pending;
        let mut count = count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count > 0 {
            count = done.wait(count).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl Drop for RetentionWorker {
    fn drop(&mut self) {
        // Disconnecting lets the worker drain queued passes and exit.
        self.request_tx = None;
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}
