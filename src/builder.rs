use {
    crate::{
        clock::{Clock, SystemClock},
        compress::Compression,
        error::RollerError,
        fsinfo::{FileStat, OsStat},
        housekeeping::{DetachedThreads, Housekeeper},
        naming::{BackupNaming, TimeZone},
        retention::RetentionPolicy,
        roller::{LogRoller, LogRollerMeta},
    },
    std::{
        env,
        path::{Path, PathBuf},
        sync::Arc,
    },
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Size of the live log file above which it is rotated when nothing else is
/// configured: 100 MiB.
pub const DEFAULT_MAX_SIZE: u64 = 100 * 1024 * 1024;

/// Mode given to a new log file when there is no previous file to copy it
/// from (Unix only).
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Defines the size threshold for rotating log files in various units.
///
/// A write that would make the live file reach this size is preceded by a
/// rotation, and a single write larger than this is rejected.
///
/// * `Bytes` - Direct byte count (e.g., 1048576 bytes)
/// * `KB` - Kilobytes (1 KB = 1024 bytes)
/// * `MB` - Megabytes (1 MB = 1024 KB)
/// * `GB` - Gigabytes (1 GB = 1024 MB)
///
/// A size of zero means "use the default" of 100 MB.
///
/// # Examples
/// ```
/// use preroll::{LogRollerBuilder, RotationSize};
///
/// // Rotate before the file reaches 2 GB
/// let appender = LogRollerBuilder::new("./logs/huge.log")
///     .max_size(RotationSize::GB(2))
///     .build()
///     .unwrap();
/// assert_eq!(appender.max_size(), 2 * 1024 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationSize {
    /// Raw byte count
    Bytes(u64),
    /// Kilobytes (1 KB = 1024 bytes)
    KB(u64),
    /// Megabytes (1 MB = 1024 KB = 1,048,576 bytes)
    MB(u64),
    /// Gigabytes (1 GB = 1024 MB = 1,073,741,824 bytes)
    GB(u64),
}

impl RotationSize {
    /// Get the size in bytes.
    pub fn bytes(&self) -> u64 {
        match self {
            RotationSize::Bytes(b) => *b,
            RotationSize::KB(kb) => kb.saturating_mul(1024),
            RotationSize::MB(mb) => mb.saturating_mul(1024 * 1024),
            RotationSize::GB(gb) => gb.saturating_mul(1024 * 1024 * 1024),
        }
    }
}

impl Default for RotationSize {
    fn default() -> Self {
        RotationSize::Bytes(DEFAULT_MAX_SIZE)
    }
}

/// Plain configuration for a [`LogRoller`], suitable for loading from a
/// config file when the `serde` feature is enabled.
///
/// Every field is optional; zero and `None` select the defaults described on
/// [`LogRollerBuilder`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct RollerConfig {
    /// The live log file.
    pub filename: Option<PathBuf>,
    /// Where rotated files are moved.
    pub archive_dir: Option<PathBuf>,
    /// Rotation threshold in bytes.
    pub max_size_bytes: u64,
    /// Number of backups to keep.
    pub max_backups: usize,
    /// Age in days after which backups are deleted.
    pub max_age_days: u32,
    /// Gzip rotated files.
    pub compress_backups: bool,
    /// Stamp backups with local time instead of UTC.
    pub local_time: bool,
    /// Number of leading writes replayed at the top of every new file.
    pub preamble_line_count: usize,
}

#[derive(Clone)]
struct BuilderMeta {
    filename: Option<PathBuf>,
    archive_dir: Option<PathBuf>,
    max_size: RotationSize,
    retention: RetentionPolicy,
    compression: Option<Compression>,
    time_zone: TimeZone,
    preamble_lines: usize,
    file_mode: u32,
    clock: Arc<dyn Clock>,
    file_stat: Arc<dyn FileStat>,
    housekeeper: Arc<dyn Housekeeper>,
}

impl Default for BuilderMeta {
    fn default() -> Self {
        BuilderMeta {
            filename: None,
            archive_dir: None,
            max_size: RotationSize::default(),
            retention: RetentionPolicy::default(),
            compression: None,
            time_zone: TimeZone::UTC,
            preamble_lines: 0,
            file_mode: DEFAULT_FILE_MODE,
            clock: Arc::new(SystemClock),
            file_stat: Arc::new(OsStat),
            housekeeper: Arc::new(DetachedThreads),
        }
    }
}

/// Provides a fluent interface for configuring [`LogRoller`] instances.
///
/// # Default Configuration
///
/// If not explicitly configured, a roller uses these defaults:
/// * `<temp dir>/<process name>-preroll.log` as the live file
/// * `<live file>.rotated` as the archive directory
/// * Rotation at 100 MB
/// * Keep all backups, regardless of age
/// * No compression
/// * Backup names stamped in UTC
/// * No preamble
///
/// # Examples
///
/// ```rust
/// use preroll::{Compression, LogRollerBuilder, RotationSize, TimeZone};
///
/// let appender = LogRollerBuilder::new("./logs/app.log")
///     .archive_dir("./logs/old")
///     .max_size(RotationSize::MB(10))
///     .max_backups(24)                 // Keep at most 24 backups
///     .max_age_days(7)                 // and none older than a week
///     .compression(Compression::Gzip)  // Compress old logs
///     .time_zone(TimeZone::Local)
///     .preamble_lines(3)               // Repeat the first 3 writes in every file
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Default)]
pub struct LogRollerBuilder {
    meta: BuilderMeta,
}

impl LogRollerBuilder {
    /// Create a new log roller builder writing to `filename`.
    pub fn new<P: AsRef<Path>>(filename: P) -> Self {
        LogRollerBuilder {
            meta: BuilderMeta {
                filename: Some(filename.as_ref().to_path_buf()),
                ..BuilderMeta::default()
            },
        }
    }

    /// Set the directory rotated files are moved to.
    pub fn archive_dir<P: AsRef<Path>>(self, archive_dir: P) -> Self {
        Self {
            meta: BuilderMeta {
                archive_dir: Some(archive_dir.as_ref().to_path_buf()),
                ..self.meta
            },
        }
    }

    /// Set the rotation threshold.
    pub fn max_size(self, max_size: RotationSize) -> Self {
        Self {
            meta: BuilderMeta { max_size, ..self.meta },
        }
    }

    /// Set the maximum number of backups to keep. Zero keeps all of them.
    pub fn max_backups(self, max_backups: usize) -> Self {
        Self {
            meta: BuilderMeta {
                retention: self.meta.retention.with_max_backups(max_backups),
                ..self.meta
            },
        }
    }

    /// Set the maximum backup age in days. Zero disables age-based deletion.
    pub fn max_age_days(self, max_age_days: u32) -> Self {
        Self {
            meta: BuilderMeta {
                retention: self.meta.retention.with_max_age_days(max_age_days),
                ..self.meta
            },
        }
    }

    /// Compress rotated files.
    pub fn compression(self, compression: Compression) -> Self {
        Self {
            meta: BuilderMeta {
                compression: Some(compression),
                ..self.meta
            },
        }
    }

    /// Set the time zone used in backup names.
    pub fn time_zone(self, time_zone: TimeZone) -> Self {
        Self {
            meta: BuilderMeta { time_zone, ..self.meta },
        }
    }

    /// Set how many leading writes are captured and replayed at the top of
    /// every new file.
    pub fn preamble_lines(self, preamble_lines: usize) -> Self {
        Self {
            meta: BuilderMeta {
                preamble_lines,
                ..self.meta
            },
        }
    }

    /// Set the permissions for a new log file when there is no previous file
    /// to copy them from (Unix-like systems only). This is specified in octal
    /// notation like when using chmod, e.g. 0o640 for rw-r-----.
    pub fn file_mode(self, mode: u32) -> Self {
        Self {
            meta: BuilderMeta {
                file_mode: mode,
                ..self.meta
            },
        }
    }

    /// Replace the source of the current time.
    pub fn clock(self, clock: Arc<dyn Clock>) -> Self {
        Self {
            meta: BuilderMeta { clock, ..self.meta },
        }
    }

    /// Replace the source of file metadata.
    pub fn file_stat(self, file_stat: Arc<dyn FileStat>) -> Self {
        Self {
            meta: BuilderMeta { file_stat, ..self.meta },
        }
    }

    /// Replace where deletions of expired backups run.
    pub fn housekeeper(self, housekeeper: Arc<dyn Housekeeper>) -> Self {
        Self {
            meta: BuilderMeta {
                housekeeper,
                ..self.meta
            },
        }
    }

    /// Build the log roller.
    ///
    /// No file is touched until the first write or rotation. Fails with
    /// [`RollerError::InvalidFilename`] if the path has no file name or the
    /// file name is not valid UTF-8, since backup names are matched as text.
    pub fn build(self) -> Result<LogRoller, RollerError> {
        let meta = self.meta;
        let filename = meta.filename.unwrap_or_else(default_filename);
        let archive_dir = meta.archive_dir.unwrap_or_else(|| default_archive_dir(&filename));
        let naming = BackupNaming::new(&filename, meta.compression)?;
        let max_size = match meta.max_size.bytes() {
            0 => DEFAULT_MAX_SIZE,
            bytes => bytes,
        };

        Ok(LogRoller::new(
            LogRollerMeta {
                filename,
                archive_dir,
                max_size,
                retention: meta.retention,
                time_zone: meta.time_zone,
                preamble_lines: meta.preamble_lines,
                file_mode: meta.file_mode,
                naming,
                clock: meta.clock,
                file_stat: meta.file_stat,
                housekeeper: meta.housekeeper,
            },
            meta.compression,
        ))
    }
}

impl From<RollerConfig> for LogRollerBuilder {
    fn from(config: RollerConfig) -> Self {
        LogRollerBuilder {
            meta: BuilderMeta {
                filename: config.filename,
                archive_dir: config.archive_dir,
                max_size: RotationSize::Bytes(config.max_size_bytes),
                retention: RetentionPolicy {
                    max_backups: config.max_backups,
                    max_age_days: config.max_age_days,
                },
                compression: config.compress_backups.then_some(Compression::Gzip),
                time_zone: if config.local_time { TimeZone::Local } else { TimeZone::UTC },
                preamble_lines: config.preamble_line_count,
                ..BuilderMeta::default()
            },
        }
    }
}

/// `<temp dir>/<process name>-preroll.log`
fn default_filename() -> PathBuf {
    let process = env::args_os()
        .next()
        .and_then(|arg0| Path::new(&arg0).file_name().map(|name| name.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "preroll".to_string());
    env::temp_dir().join(format!("{process}-preroll.log"))
}

/// `<filename>.rotated`
fn default_archive_dir(filename: &Path) -> PathBuf {
    let mut dir = filename.as_os_str().to_owned();
    dir.push(".rotated");
    PathBuf::from(dir)
}
