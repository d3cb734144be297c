//! Size-rotated file destination
//!
//! Records are written as JSON lines to an active file. Before a write that
//! would push the file past its maximum size, the file is rotated:
//!
//! - `<path>.<n>` (and `<path>.<n>.gz`) shift to `<path>.<n+1>`
//! - the active file becomes `<path>.1`, gzip-compressed if requested
//! - backups beyond `max_backups` or older than `max_age` are deleted

use crate::core::{Destination, Encoder, LogLevel, LogRecord, LoggerError, Result};
use parking_lot::Mutex;
use std::ffi::{OsStr, OsString};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

/// Maximum file size used when none is configured
pub const DEFAULT_MAX_SIZE_MB: u64 = 100;

const MEGABYTE: u64 = 1024 * 1024;
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// When to rotate and what to keep
///
/// # Examples
///
/// ```
/// use rust_fanout_logger::destinations::RotationPolicy;
/// use std::time::Duration;
///
/// // 50 MiB files, 7 compressed backups, none older than two weeks
/// let policy = RotationPolicy::new()
///     .with_max_size_mb(50)
///     .with_max_backups(7)
///     .with_max_age(Duration::from_secs(14 * 24 * 3600))
///     .with_compression(true);
///
/// assert_eq!(policy.max_bytes, 50 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Size in bytes the active file may not exceed
    pub max_bytes: u64,
    /// Number of rotated files to keep, 0 keeps all of them
    pub max_backups: usize,
    /// Rotated files older than this are deleted
    pub max_age: Option<Duration>,
    /// Whether to gzip rotated files
    pub compress: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_SIZE_MB * MEGABYTE,
            max_backups: 0,
            max_age: None,
            compress: false,
        }
    }
}

impl RotationPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a policy from signed settings, as they arrive from configuration
    ///
    /// Zero selects the default for each setting: 100 MiB files, every backup
    /// kept, no age limit.
    ///
    /// # Errors
    ///
    /// Fails if any setting is negative.
    pub fn from_signed(
        max_size_mb: i64,
        max_backups: i64,
        max_age_days: i64,
        compress: bool,
    ) -> Result<Self> {
        if max_size_mb < 0 || max_backups < 0 || max_age_days < 0 {
            return Err(LoggerError::config(
                "file",
                "rotation parameters must be non-negative",
            ));
        }

        let mut policy = Self::new()
            .with_max_size_mb(max_size_mb as u64)
            .with_max_backups(max_backups as usize)
            .with_compression(compress);
        if max_age_days > 0 {
            policy = policy.with_max_age(Duration::from_secs(
                (max_age_days as u64).saturating_mul(SECONDS_PER_DAY),
            ));
        }
        Ok(policy)
    }

    /// Set the size limit in bytes; 0 restores the default
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_bytes(mut self, bytes: u64) -> Self {
        self.max_bytes = if bytes == 0 {
            DEFAULT_MAX_SIZE_MB * MEGABYTE
        } else {
            bytes
        };
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_size_mb(self, megabytes: u64) -> Self {
        self.with_max_bytes(megabytes.saturating_mul(MEGABYTE))
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backups = count;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_age(mut self, age: Duration) -> Self {
        self.max_age = Some(age);
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }
}

struct FileState {
    writer: Option<BufWriter<File>>,
    current_size: u64,
}

/// File destination with size-based rotation
///
/// # Examples
///
/// ```no_run
/// use rust_fanout_logger::destinations::{RotatingFileDestination, RotationPolicy};
///
/// let policy = RotationPolicy::from_signed(10, 5, 30, true).unwrap();
/// let destination = RotatingFileDestination::open("/var/log/app.log", policy).unwrap();
/// ```
pub struct RotatingFileDestination {
    path: PathBuf,
    policy: RotationPolicy,
    encoder: Encoder,
    min_level: LogLevel,
    state: Mutex<FileState>,
    released: AtomicBool,
}

impl RotatingFileDestination {
    /// Create the parent directory and open `path` for appending
    ///
    /// # Errors
    ///
    /// Returns error if the directory or the file cannot be created
    pub fn open<P: AsRef<Path>>(path: P, policy: RotationPolicy) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "create log directory",
                    format!("Failed to create directory '{}'", parent.display()),
                    e,
                )
            })?;
        }

        let (file, current_size) = Self::open_active(&path)?;

        Ok(Self {
            path,
            policy,
            encoder: Encoder::json(),
            min_level: LogLevel::Debug,
            state: Mutex::new(FileState {
                writer: Some(BufWriter::new(file)),
                current_size,
            }),
            released: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Bytes written to the active file, including anything still buffered
    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.state.lock().current_size
    }

    /// Rotated files that currently exist, ordered from newest to oldest
    pub fn backups(&self) -> Vec<PathBuf> {
        self.list_backups().into_iter().map(|(_, path)| path).collect()
    }

    fn open_active(path: &Path) -> Result<(File, u64)> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                LoggerError::file_destination(
                    path.display().to_string(),
                    format!("Failed to open: {}", e),
                )
            })?;

        let size = file
            .metadata()
            .map_err(|e| {
                LoggerError::file_destination(
                    path.display().to_string(),
                    format!("Cannot access file metadata: {}", e),
                )
            })?
            .len();
        Ok((file, size))
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name: OsString = self.path.as_os_str().to_owned();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// `(index, path)` of every backup, sorted by index
    ///
    /// Names are matched as raw OS strings so that paths which are not valid
    /// UTF-8 still find their backups.
    fn list_backups(&self) -> Vec<(usize, PathBuf)> {
        let Some(file_name) = self.path.file_name() else {
            return Vec::new();
        };

        let Ok(entries) = fs::read_dir(self.dir()) else {
            return Vec::new();
        };

        let mut backups: Vec<(usize, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                backup_index(file_name, &entry.file_name()).map(|i| (i, entry.path()))
            })
            .collect();
        backups.sort();
        backups
    }

    fn rotate(&self, state: &mut FileState) -> Result<()> {
        if let Some(mut writer) = state.writer.take() {
            writer.flush().map_err(|e| {
                LoggerError::file_rotation(
                    self.path.display().to_string(),
                    format!("Failed to flush before rotation: {}", e),
                )
            })?;
        }

        // Shift from the oldest down so nothing is overwritten
        let highest = self
            .list_backups()
            .last()
            .map(|(index, _)| *index)
            .unwrap_or(0);
        for index in (1..=highest).rev() {
            let old_path = self.backup_path(index);
            let new_path = self.backup_path(index + 1);
            for (from, to) in [
                (gz_path(&old_path), gz_path(&new_path)),
                (old_path, new_path),
            ] {
                if from.exists() {
                    fs::rename(&from, &to).map_err(|e| {
                        LoggerError::file_rotation(
                            from.display().to_string(),
                            format!("Failed to shift backup file: {}", e),
                        )
                    })?;
                }
            }
        }

        let first_backup = self.backup_path(1);
        fs::rename(&self.path, &first_backup).map_err(|e| {
            LoggerError::file_rotation(
                self.path.display().to_string(),
                format!("Failed to rotate current log file: {}", e),
            )
        })?;

        let (file, _) = Self::open_active(&self.path)?;
        state.writer = Some(BufWriter::new(file));
        state.current_size = 0;

        if self.policy.compress {
            if let Err(e) = compress_file(&first_backup) {
                eprintln!("[LOGGER WARNING] Failed to compress rotated log file: {}", e);
            }
        }

        self.remove_stale_backups();
        Ok(())
    }

    /// Delete backups beyond the count limit or past the age limit
    fn remove_stale_backups(&self) {
        let cutoff = self
            .policy
            .max_age
            .and_then(|age| SystemTime::now().checked_sub(age));

        for (index, path) in self.list_backups() {
            let too_many = self.policy.max_backups > 0 && index > self.policy.max_backups;
            let too_old = match cutoff {
                Some(cutoff) => fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .map(|modified| modified < cutoff)
                    .unwrap_or(false),
                None => false,
            };

            if too_many || too_old {
                if let Err(e) = fs::remove_file(&path) {
                    eprintln!(
                        "[LOGGER WARNING] Failed to remove old backup {}: {}",
                        path.display(),
                        e
                    );
                }
            }
        }
    }
}

impl Destination for RotatingFileDestination {
    fn name(&self) -> &str {
        "file"
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }

    fn emit(&self, record: &LogRecord) -> Result<()> {
        if self.released.load(Ordering::Acquire) {
            return Err(LoggerError::Released(self.name().to_string()));
        }

        let line = self.encoder.encode(record);
        let len = line.len() as u64;
        if len > self.policy.max_bytes {
            return Err(LoggerError::file_destination(
                self.path.display().to_string(),
                format!(
                    "write length {} exceeds maximum file size {}",
                    len, self.policy.max_bytes
                ),
            ));
        }

        let mut state = self.state.lock();

        if state.current_size + len > self.policy.max_bytes {
            if let Err(e) = self.rotate(&mut state) {
                eprintln!(
                    "[LOGGER WARNING] Log rotation failed: {}. Continuing with current file.",
                    e
                );
                if state.writer.is_none() {
                    let (file, _) = Self::open_active(&self.path).map_err(|reopen_err| {
                        eprintln!(
                            "[LOGGER ERROR] Failed to reopen log file after rotation failure: {}",
                            reopen_err
                        );
                        e
                    })?;
                    state.writer = Some(BufWriter::new(file));
                }
                // Let the file grow past the limit rather than retry on every write
                state.current_size = 0;
            }
        }

        let writer = state
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::writer("Writer not initialized"))?;
        writer.write_all(&line).map_err(|e| {
            LoggerError::file_destination(
                self.path.display().to_string(),
                format!("Failed to write log entry: {}", e),
            )
        })?;
        state.current_size += len;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        if let Some(ref mut writer) = self.state.lock().writer {
            writer.flush().map_err(|e| {
                LoggerError::file_destination(
                    self.path.display().to_string(),
                    format!("Failed to flush: {}", e),
                )
            })?;
        }
        Ok(())
    }

    fn release(&self) -> Result<()> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        // Dropping the writer closes the file handle
        if let Some(mut writer) = self.state.lock().writer.take() {
            writer.flush().map_err(|e| {
                LoggerError::file_destination(
                    self.path.display().to_string(),
                    format!("Failed to flush on close: {}", e),
                )
            })?;
        }
        Ok(())
    }
}

impl Drop for RotatingFileDestination {
    fn drop(&mut self) {
        if let Some(mut writer) = self.state.get_mut().writer.take() {
            let _ = writer.flush();
        }
    }
}

/// Index of `candidate` if it is `<file_name>.<n>` or `<file_name>.<n>.gz`
fn backup_index(file_name: &OsStr, candidate: &OsStr) -> Option<usize> {
    let suffix = candidate
        .as_encoded_bytes()
        .strip_prefix(file_name.as_encoded_bytes())?
        .strip_prefix(b".")?;
    let index = suffix.strip_suffix(b".gz").unwrap_or(suffix);
    if index.is_empty() || !index.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(index).ok()?.parse().ok()
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

/// Gzip `path` into `<path>.gz`, removing the original only on success
///
/// The archive is written to a temporary file first and renamed into place.
fn compress_file(path: &Path) -> Result<()> {
    let gz = gz_path(path);
    let mut temp_name: OsString = gz.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp = PathBuf::from(temp_name);

    let input = File::open(path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to open file for compression: {}", path.display()),
            e,
        )
    })?;
    let mut reader = BufReader::with_capacity(64 * 1024, input);

    let output = File::create(&temp).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to create temporary compressed file: {}", temp.display()),
            e,
        )
    })?;
    let mut encoder = flate2::write::GzEncoder::new(
        BufWriter::with_capacity(64 * 1024, output),
        flate2::Compression::default(),
    );

    let finished = std::io::copy(&mut reader, &mut encoder)
        .and_then(|_| encoder.finish())
        .and_then(|mut out| out.flush());
    if let Err(e) = finished {
        let _ = fs::remove_file(&temp);
        return Err(LoggerError::io_operation(
            "compress log file",
            format!("Failed to compress {}", path.display()),
            e,
        ));
    }

    fs::rename(&temp, &gz).map_err(|e| {
        let _ = fs::remove_file(&temp);
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to rename compressed file to: {}", gz.display()),
            e,
        )
    })?;

    if let Err(e) = fs::remove_file(path) {
        eprintln!(
            "[LOGGER WARNING] Compression succeeded but failed to remove original file {}: {}",
            path.display(),
            e
        );
    }

    Ok(())
}
