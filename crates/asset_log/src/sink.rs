//! Output destinations, and the fan-out sink combining them.

use std::{
    fmt, fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Duration, Instant, SystemTime},
};

use file_rotate::{compression::Compression, suffix::AppendCount, ContentLimit, FileRotate};
use serde::Deserialize;
use tracing_subscriber::fmt::{writer::BoxMakeWriter, MakeWriter};

/// Identifier routing records to the standard output stream.
pub const STDOUT: &str = "stdout";

/// Identifier routing records to the standard error stream.
pub const STDERR: &str = "stderr";

const BYTES_PER_MEGABYTE: usize = 1024 * 1024;
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Interval between two sweeps for expired backups of an open file.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Rotation and retention policy applied to file destinations.
///
/// The active file always lives at the configured path. Once it grows past `max_size_mb`, it is
/// renamed to `<path>.1` (shifting older backups to `<path>.2`, ...) and a fresh file is started.
/// A zero value disables the corresponding limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RotationPolicy {
    /// Size in megabytes after which the active file is rotated.
    pub max_size_mb: usize,

    /// Number of rotated files kept besides the active one.
    pub max_backups: usize,

    /// Age in days after which rotated files are removed.
    pub max_age_days: usize,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_size_mb: 50,
            max_backups: 1,
            max_age_days: 1,
        }
    }
}

impl RotationPolicy {
    pub(crate) fn content_limit(&self) -> ContentLimit {
        match self.max_size_mb {
            0 => ContentLimit::None,
            // Records are never split across files: rotation happens after the write which
            // crossed the limit.
            megabytes => ContentLimit::BytesSurpassed(megabytes.saturating_mul(BYTES_PER_MEGABYTE)),
        }
    }

    pub(crate) fn max_age(&self) -> Option<Duration> {
        match self.max_age_days {
            0 => None,
            days => u64::try_from(days)
                .ok()
                .map(|days| Duration::from_secs(days.saturating_mul(SECONDS_PER_DAY))),
        }
    }
}

/// A concrete destination for log records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputDestination {
    /// The process's standard output stream.
    Stdout,

    /// The process's standard error stream.
    Stderr,

    /// A file rotated according to the contained policy.
    RotatingFile {
        /// Path of the active log file.
        path: PathBuf,

        /// Rotation and retention policy.
        policy: RotationPolicy,
    },
}

impl OutputDestination {
    /// Resolves a symbolic output identifier into a destination.
    ///
    /// `"stdout"` and `"stderr"` select the standard streams; any other identifier is taken to be a
    /// file path and is not validated. Files are only opened when the first record is written.
    pub fn resolve(identifier: &str, policy: RotationPolicy) -> Self {
        match identifier {
            STDOUT => Self::Stdout,
            STDERR => Self::Stderr,
            path => Self::RotatingFile {
                path: PathBuf::from(path),
                policy,
            },
        }
    }

    /// Converts the destination into a boxed [`MakeWriter`].
    pub fn into_make_writer(self) -> BoxMakeWriter {
        match self {
            Self::Stdout => BoxMakeWriter::new(io::stdout),
            Self::Stderr => BoxMakeWriter::new(io::stderr),
            Self::RotatingFile { path, policy } => BoxMakeWriter::new(RotatingFile::new(path, policy)),
        }
    }
}

impl fmt::Display for OutputDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str(STDOUT),
            Self::Stderr => f.write_str(STDERR),
            Self::RotatingFile { path, .. } => write!(f, "{}", path.display()),
        }
    }
}

/// A size-rotated log file which is opened on first use.
///
/// Rotation is carried out by [`FileRotate`], numbering backups with [`AppendCount`]. Backups
/// older than the policy's maximum age are removed when the file is opened, and then hourly.
struct RotatingFile {
    path: PathBuf,
    policy: RotationPolicy,
    state: Mutex<Option<OpenFile>>,
}

struct OpenFile {
    file: FileRotate<AppendCount>,
    next_cleanup: Instant,
}

impl RotatingFile {
    fn new(path: PathBuf, policy: RotationPolicy) -> Self {
        Self {
            path,
            policy,
            state: Mutex::new(None),
        }
    }

    fn directory(&self) -> &Path {
        self.path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    fn open(&self) -> io::Result<OpenFile> {
        fs::create_dir_all(self.directory())?;
        self.remove_expired_backups();

        // `FileRotate` expects a path with a parent directory.
        let path = match self.path.file_name() {
            Some(file_name) => self.directory().join(file_name),
            None => self.path.clone(),
        };
        let file = FileRotate::new(
            path,
            AppendCount::new(self.policy.max_backups),
            self.policy.content_limit(),
            Compression::None,
            #[cfg(unix)]
            None,
        );

        Ok(OpenFile {
            file,
            next_cleanup: Instant::now() + CLEANUP_INTERVAL,
        })
    }

    /// Removes rotated files (`<path>.<n>`) last modified longer ago than the maximum age.
    ///
    /// Returns the number of removed files.
    fn remove_expired_backups(&self) -> usize {
        let Some(max_age) = self.policy.max_age() else {
            return 0;
        };
        let Some(file_name) = self.path.file_name() else {
            return 0;
        };
        let Ok(entries) = fs::read_dir(self.directory()) else {
            return 0;
        };

        let backup_prefix = format!("{}.", file_name.to_string_lossy());
        let now = SystemTime::now();
        let mut removed = 0;

        for entry in entries.flatten() {
            if !entry
                .file_name()
                .to_string_lossy()
                .starts_with(backup_prefix.as_str())
            {
                continue;
            }

            let expired = entry
                .metadata()
                .and_then(|metadata| metadata.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age > max_age);

            if expired {
                match fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    Err(error) => tracing::debug!(
                        "Failed to remove expired log file `{}`: {error}",
                        entry.path().display()
                    ),
                }
            }
        }

        removed
    }

    /// Writes `buf` in one piece, opening the file first if needed.
    ///
    /// A failed open is retried on the next write.
    fn write_locked(&self, buf: &[u8]) -> io::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::other("rotating file lock poisoned"))?;

        if let Some(open) = state.as_mut() {
            if Instant::now() >= open.next_cleanup {
                open.next_cleanup = Instant::now() + CLEANUP_INTERVAL;
                if self.remove_expired_backups() > 0 {
                    // Backup numbering is scanned on open.
                    *state = None;
                }
            }
        }

        if state.is_none() {
            *state = Some(self.open()?);
        }

        match state.as_mut() {
            Some(open) => {
                open.file.write_all(buf)?;
                open.file.flush()
            }
            None => Err(io::Error::other("rotating file is not open")),
        }
    }
}

impl fmt::Debug for RotatingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingFile")
            .field("path", &self.path)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<'a> MakeWriter<'a> for RotatingFile {
    type Writer = RotatingFileWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingFileWriter { file: self }
    }
}

struct RotatingFileWriter<'a> {
    file: &'a RotatingFile,
}

impl Write for RotatingFileWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_locked(buf)?;
        Ok(buf.len())
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.file.write_locked(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Delivers each record to every one of its writers.
///
/// Delivery is best-effort per writer: a failure on one writer does not prevent the record from
/// reaching the others.
#[derive(Debug)]
pub struct FanOutWriter {
    writers: Vec<BoxMakeWriter>,
}

impl FanOutWriter {
    /// Creates a fan-out writer over arbitrary writers.
    pub fn new(writers: impl IntoIterator<Item = BoxMakeWriter>) -> Self {
        Self {
            writers: writers.into_iter().collect(),
        }
    }

    /// Creates a fan-out writer over resolved destinations.
    pub fn from_destinations(destinations: impl IntoIterator<Item = OutputDestination>) -> Self {
        Self::new(
            destinations
                .into_iter()
                .map(OutputDestination::into_make_writer),
        )
    }

    /// Number of writers records are delivered to.
    pub fn len(&self) -> usize {
        self.writers.len()
    }

    /// Whether records are delivered nowhere.
    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }

    /// Writes one complete record to every writer, with a single `write_all` call per writer.
    ///
    /// All writers are attempted. If any of them fails, the last error is returned.
    pub fn write_record(&self, record: &[u8]) -> io::Result<()> {
        let mut result = Ok(());

        for (index, writer) in self.writers.iter().enumerate() {
            if let Err(error) = writer.make_writer().write_all(record) {
                tracing::debug!("Failed to write log record to destination #{index}: {error}");
                result = Err(error);
            }
        }

        result
    }
}
