use {
    crate::{compress::Compression, error::RollerError},
    chrono::{DateTime, FixedOffset, Local, SecondsFormat, Utc},
    regex::Regex,
    std::path::{Path, PathBuf},
};

/// Specifies the time zone used when stamping backup file names.
///
/// The zone only changes how the rotation instant is written into the name;
/// decoding always yields the same UTC instant, so retention works the same
/// whichever zone was used.
///
/// # Examples
/// ```
/// use preroll::TimeZone;
/// use chrono::FixedOffset;
///
/// // Default: names end in `Z`
/// let utc = TimeZone::UTC;
///
/// // Use local system time zone (changes with system settings)
/// let local = TimeZone::Local;
///
/// // Use a fixed offset for a specific region (e.g., UTC+8)
/// let china = TimeZone::Fix(FixedOffset::east_opt(8 * 3600).unwrap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeZone {
    /// Coordinated universal time.
    #[default]
    UTC,
    /// The system's local time zone at the moment of rotation.
    Local,
    /// A fixed offset from UTC.
    Fix(FixedOffset),
}

impl TimeZone {
    /// Formats `at` as RFC 3339 with exactly nine fractional digits, so names
    /// written in one zone have a fixed width and sort lexically.
    pub fn format(&self, at: DateTime<Utc>) -> String {
        match self {
            TimeZone::UTC => at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            TimeZone::Local => at.with_timezone(&Local).to_rfc3339_opts(SecondsFormat::Nanos, false),
            TimeZone::Fix(offset) => at.with_timezone(offset).to_rfc3339_opts(SecondsFormat::Nanos, false),
        }
    }
}

/// A backup name that was successfully decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    /// The rotation instant embedded in the name.
    pub timestamp: DateTime<Utc>,
    /// Whether the name ends with the compressed suffix.
    pub compressed: bool,
}

/// Maps between a live log file name and the names of its backups.
///
/// For a log file `/var/log/app/server.log` the prefix is `server` and the
/// extension `.log`; a backup taken at 18:30 UTC on 4 Nov 2016 is named
/// `server-2016-11-04T18:30:00.000000000Z.log`, and `.gz` is appended once it
/// has been compressed.
#[derive(Debug, Clone)]
pub struct BackupNaming {
    prefix: String,
    ext: String,
    pattern: Regex,
}

impl BackupNaming {
    /// Build the naming scheme for `filename`.
    ///
    /// When `compression` is given, decoded names may carry its suffix. The
    /// file name must be valid UTF-8.
    pub fn new(filename: &Path, compression: Option<Compression>) -> Result<Self, RollerError> {
        let base = filename
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| RollerError::InvalidFilename(filename.to_path_buf()))?;
        let (prefix, ext) = match base.rfind('.') {
            Some(idx) => base.split_at(idx),
            None => (base, ""),
        };
        let compressed_suffix = compression
            .map(|c| format!("(?P<compressed>\\.{})?", regex::escape(c.extension())))
            .unwrap_or_default();
        let pattern = Regex::new(&format!(
            r"^{}-(?P<timestamp>.+?){}{compressed_suffix}$",
            regex::escape(prefix),
            regex::escape(ext),
        ))
        .map_err(|_| RollerError::InvalidFilename(filename.to_path_buf()))?;

        Ok(BackupNaming {
            prefix: prefix.to_string(),
            ext: ext.to_string(),
            pattern,
        })
    }

    /// The backup file name for a rotation at `at`.
    pub fn backup_file_name(&self, at: DateTime<Utc>, time_zone: &TimeZone) -> String {
        format!("{}-{}{}", self.prefix, time_zone.format(at), self.ext)
    }

    /// The full backup path inside `archive_dir` for a rotation at `at`.
    pub fn backup_path(&self, archive_dir: &Path, at: DateTime<Utc>, time_zone: &TimeZone) -> PathBuf {
        archive_dir.join(self.backup_file_name(at, time_zone))
    }

    /// Decode a directory entry name.
    ///
    /// Returns `None` unless the name is exactly `<prefix>-<timestamp><ext>`
    /// (plus the compressed suffix, if configured) with a timestamp this
    /// codec could have written.
    pub fn decode(&self, file_name: &str) -> Option<Decoded> {
        let captures = self.pattern.captures(file_name)?;
        let timestamp = DateTime::parse_from_rfc3339(captures.name("timestamp")?.as_str()).ok()?;
        Some(Decoded {
            timestamp: timestamp.with_timezone(&Utc),
            compressed: captures.name("compressed").is_some(),
        })
    }
}
