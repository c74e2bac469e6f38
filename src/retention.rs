use {
    crate::{error::RollerError, naming::BackupNaming},
    chrono::{DateTime, TimeDelta, Utc},
    std::{
        fs,
        path::{Path, PathBuf},
    },
};

/// An archived log file and the rotation instant decoded from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    pub timestamp: DateTime<Utc>,
    pub path: PathBuf,
    pub compressed: bool,
}

/// List the backups in `archive_dir`, in directory order.
///
/// Entries that are not regular files or whose names do not decode are
/// skipped: the archive directory may hold files that have nothing to do
/// with this logger. Compressed backups are only listed when
/// `include_compressed` is set.
pub fn scan_backups(
    archive_dir: &Path,
    naming: &BackupNaming,
    include_compressed: bool,
) -> Result<Vec<Backup>, RollerError> {
    let entries = fs::read_dir(archive_dir).map_err(|error| RollerError::ListDirectoryFailed {
        path: archive_dir.to_path_buf(),
        error,
    })?;

    let mut backups = Vec::new();
    for entry in entries.flatten() {
        if !entry.file_type().is_ok_and(|t| t.is_file()) {
            continue;
        }
        let Some(decoded) = entry.file_name().to_str().and_then(|name| naming.decode(name)) else {
            continue;
        };
        if decoded.compressed && !include_compressed {
            continue;
        }
        backups.push(Backup {
            timestamp: decoded.timestamp,
            path: entry.path(),
            compressed: decoded.compressed,
        });
    }
    Ok(backups)
}

/// Controls which backups are deleted after a rotation.
///
/// A zero field means "no limit". With both fields zero nothing is ever
/// deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Maximum number of backups to keep.
    pub max_backups: usize,
    /// Maximum age of a backup in days, judged by the timestamp in its name.
    /// A day is 24 hours.
    pub max_age_days: u32,
}

impl RetentionPolicy {
    /// Specifies the maximum number of backups.
    pub fn with_max_backups(mut self, max_backups: usize) -> Self {
        self.max_backups = max_backups;
        self
    }

    /// Specifies the maximum backup age in days.
    pub fn with_max_age_days(mut self, max_age_days: u32) -> Self {
        self.max_age_days = max_age_days;
        self
    }

    /// True when neither cap is set, so nothing is ever deleted.
    pub fn is_disabled(&self) -> bool {
        self.max_backups == 0 && self.max_age_days == 0
    }

    /// Pick the backups to delete.
    ///
    /// Backups are ordered newest first (a stable sort, so equal timestamps
    /// keep their listing order). Everything past `max_backups` goes; of the
    /// rest, everything stamped before `now - max_age_days` goes too.
    pub fn select_expired(&self, mut backups: Vec<Backup>, now: DateTime<Utc>) -> Vec<Backup> {
        if self.is_disabled() {
            return Vec::new();
        }

        backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let mut expired = Vec::new();
        if self.max_backups > 0 && backups.len() > self.max_backups {
            expired = backups.split_off(self.max_backups);
        }

        // A cutoff before the earliest representable instant expires nothing.
        let cutoff = match self.max_age_days {
            0 => None,
            days => now.checked_sub_signed(TimeDelta::days(i64::from(days))),
        };
        if let Some(cutoff) = cutoff {
            expired.extend(backups.into_iter().filter(|b| b.timestamp < cutoff));
        }

        expired
    }
}
