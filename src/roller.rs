use {
    crate::{
        clock::Clock,
        compress::{Compression, Compressor},
        error::RollerError,
        fsinfo::{FileInfo, FileStat},
        housekeeping::{Deletion, Housekeeper},
        naming::{BackupNaming, TimeZone},
        retention::{scan_backups, RetentionPolicy},
    },
    std::{
        fmt, fs,
        io::{self, Write as _},
        iter,
        path::{Path, PathBuf},
        sync::{Arc, Mutex, MutexGuard, PoisonError},
    },
    tracing::{debug, info},
};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

/// Line written after the replayed preamble at the top of each new file.
pub const PREAMBLE_SENTINEL: &str = "___***___END_OF_PREAMBLE___***___\n";

/// Resolved configuration of a roller. Fixed once built.
pub(crate) struct LogRollerMeta {
    pub(crate) filename: PathBuf,
    pub(crate) archive_dir: PathBuf,
    pub(crate) max_size: u64,
    pub(crate) retention: RetentionPolicy,
    pub(crate) time_zone: TimeZone,
    pub(crate) preamble_lines: usize,
    pub(crate) file_mode: u32,
    pub(crate) naming: BackupNaming,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) file_stat: Arc<dyn FileStat>,
    pub(crate) housekeeper: Arc<dyn Housekeeper>,
}

/// The open file and everything that changes with each write.
#[derive(Default)]
struct LiveFile {
    file: Option<fs::File>,
    /// Bytes written to `file`, counted in memory.
    size: u64,
    /// The first writes ever accepted, up to the configured budget.
    preamble: Vec<Vec<u8>>,
}

impl LiveFile {
    fn close(&mut self) -> io::Result<()> {
        match self.file.take() {
            Some(mut file) => file.flush(),
            None => Ok(()),
        }
    }

    /// Write all of `buf`, counting whatever reached the file even when the
    /// write fails part way.
    fn append(&mut self, buf: &[u8], path: &Path) -> Result<usize, RollerError> {
        let Some(file) = self.file.as_mut() else {
            return Err(RollerError::Write {
                path: path.to_path_buf(),
                written: 0,
                source: io::Error::new(io::ErrorKind::NotConnected, "log file is not open"),
            });
        };
        let (written, result) = write_counted(file, buf);
        self.size += written as u64;
        result.map(|()| written).map_err(|source| RollerError::Write {
            path: path.to_path_buf(),
            written,
            source,
        })
    }

    /// Copy the captured preamble, then the sentinel, into a fresh file.
    fn replay_preamble(&mut self, path: &Path) -> Result<(), RollerError> {
        if self.preamble.is_empty() {
            return Ok(());
        }
        let lines: Vec<Vec<u8>> = self.preamble.clone();
        for line in lines.iter().map(Vec::as_slice).chain(iter::once(PREAMBLE_SENTINEL.as_bytes())) {
            self.append(line, path)?;
        }
        Ok(())
    }
}

fn write_counted(file: &mut fs::File, buf: &[u8]) -> (usize, io::Result<()>) {
    let mut written = 0;
    while written < buf.len() {
        match file.write(&buf[written..]) {
            Ok(0) => return (written, Err(io::ErrorKind::WriteZero.into())),
            Ok(n) => written += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return (written, Err(err)),
        }
    }
    (written, Ok(()))
}

/// A log file that rolls over to a new file before it grows past a size
/// limit.
///
/// The roller opens or creates its file on the first write. An existing file
/// is appended to if the write fits; otherwise it is archived first. Whenever
/// a write would make the file reach the size limit, the file is closed,
/// moved into the archive directory as `<name>-<timestamp><ext>`, and a new
/// file is started under the original name. The configured number of leading
/// writes is repeated at the top of each new file, followed by
/// [`PREAMBLE_SENTINEL`].
///
/// After every rotation backups are compressed (if enabled) and expired ones
/// are handed to the [`Housekeeper`] for deletion.
///
/// All methods take `&self`; writes and rotations are serialized on an
/// internal lock, so a roller can be shared between threads with an `Arc`.
pub struct LogRoller {
    meta: LogRollerMeta,
    compressor: Option<Compressor>,
    state: Mutex<LiveFile>,
}

impl LogRoller {
    pub(crate) fn new(meta: LogRollerMeta, compression: Option<Compression>) -> Self {
        LogRoller {
            meta,
            compressor: compression.map(Compressor::new),
            state: Mutex::new(LiveFile::default()),
        }
    }

    /// The live log file.
    pub fn filename(&self) -> &Path {
        &self.meta.filename
    }

    /// Where rotated files are kept.
    pub fn archive_dir(&self) -> &Path {
        &self.meta.archive_dir
    }

    /// The rotation threshold in bytes.
    pub fn max_size(&self) -> u64 {
        self.meta.max_size
    }

    /// The algorithm backups are compressed with, if any.
    pub fn compression(&self) -> Option<Compression> {
        self.compressor.as_ref().map(Compressor::compression)
    }

    /// Bytes written to the current file, including any replayed preamble.
    pub fn size(&self) -> u64 {
        self.lock_state().size
    }

    /// The writes captured so far for replay.
    pub fn preamble(&self) -> Vec<Vec<u8>> {
        self.lock_state().preamble.clone()
    }

    /// Write one payload.
    ///
    /// Rotates first if the payload would make the current file reach the
    /// size limit. A payload larger than the limit is rejected without
    /// touching anything.
    pub fn write_payload(&self, payload: &[u8]) -> Result<usize, RollerError> {
        let len = payload.len() as u64;
        if len > self.meta.max_size {
            return Err(RollerError::PayloadTooLarge {
                len,
                max: self.meta.max_size,
            });
        }

        let mut state = self.lock_state();
        if state.file.is_none() {
            self.open_existing_or_new(&mut state, len)?;
            if let Some(compressor) = &self.compressor {
                compressor.sweep(&self.meta.archive_dir, &self.meta.naming);
            }
        }

        if state.size + len >= self.meta.max_size {
            self.rotate_locked(&mut state)?;
        }

        let written = state.append(payload, &self.meta.filename);
        if state.preamble.len() < self.meta.preamble_lines {
            state.preamble.push(payload.to_vec());
        }
        written
    }

    /// Close the current file and start a new one right away.
    ///
    /// For applications that want to rotate outside of the size rule, e.g.
    /// in response to SIGHUP. Cleanup of old files runs as after any other
    /// rotation.
    pub fn rotate(&self) -> Result<(), RollerError> {
        let mut state = self.lock_state();
        self.rotate_locked(&mut state)
    }

    /// Close the current file. Closing a closed roller does nothing; the next
    /// write opens the file again.
    pub fn close(&self) -> Result<(), RollerError> {
        self.lock_state().close().map_err(RollerError::from)
    }

    /// Flush the current file to stable storage.
    pub fn sync(&self) -> Result<(), RollerError> {
        if let Some(file) = &self.lock_state().file {
            file.sync_all()?;
        }
        Ok(())
    }

    fn lock_state(&self) -> MutexGuard<'_, LiveFile> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open the log file if the next write of `len` bytes fits, otherwise
    /// start a new one.
    fn open_existing_or_new(&self, state: &mut LiveFile, len: u64) -> Result<(), RollerError> {
        let filename = &self.meta.filename;
        let info = match self.meta.file_stat.stat(filename) {
            Ok(info) => info,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return self.open_new(state),
            Err(error) => {
                return Err(RollerError::StatFailed {
                    path: filename.clone(),
                    error,
                })
            }
        };

        if info.len + len >= self.meta.max_size {
            return self.rotate_locked(state);
        }

        match fs::OpenOptions::new().append(true).open(filename) {
            Ok(file) => {
                debug!(path = %filename.display(), size = info.len, "appending to existing log file");
                state.file = Some(file);
                state.size = info.len;
                Ok(())
            }
            Err(err) => {
                debug!(path = %filename.display(), error = %err, "unable to reopen log file, starting a new one");
                self.open_new(state)
            }
        }
    }

    fn rotate_locked(&self, state: &mut LiveFile) -> Result<(), RollerError> {
        state.close()?;
        self.open_new(state)?;
        self.cleanup()
    }

    /// Move the current log file into the archive (if there is one) and
    /// create a fresh file in its place. The current file must be closed.
    fn open_new(&self, state: &mut LiveFile) -> Result<(), RollerError> {
        let filename = &self.meta.filename;
        if let Some(dir) = filename.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            create_dir(dir)?;
        }
        create_dir(&self.meta.archive_dir)?;

        let mut mode = self.meta.file_mode;
        match self.meta.file_stat.stat(filename) {
            Ok(info) => {
                mode = info.mode.unwrap_or(mode);
                let backup = self
                    .meta
                    .naming
                    .backup_path(&self.meta.archive_dir, self.meta.clock.now(), &self.meta.time_zone);
                fs::rename(filename, &backup).map_err(|error| RollerError::RenameFileError {
                    from: filename.clone(),
                    to: backup.clone(),
                    error,
                })?;
                preserve_owner(filename, mode, &info)?;
                info!(from = %filename.display(), to = %backup.display(), "rotated log file");
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => {
                return Err(RollerError::StatFailed {
                    path: filename.clone(),
                    error,
                })
            }
        }

        // Truncate: we only get here after moving the old file away, so
        // anything at this path now belongs to someone else racing us.
        state.file = Some(create_truncated(filename, mode)?);
        state.size = 0;
        state.replay_preamble(filename)
    }

    /// Compress backups and hand expired ones over for deletion.
    fn cleanup(&self) -> Result<(), RollerError> {
        if let Some(compressor) = &self.compressor {
            compressor.sweep(&self.meta.archive_dir, &self.meta.naming);
        }

        if self.meta.retention.is_disabled() {
            return Ok(());
        }

        let backups = scan_backups(&self.meta.archive_dir, &self.meta.naming, self.compressor.is_some())?;
        let expired = self.meta.retention.select_expired(backups, self.meta.clock.now());
        if expired.is_empty() {
            return Ok(());
        }

        debug!(count = expired.len(), "removing old log files");
        self.meta
            .housekeeper
            .submit(Deletion::new(expired.into_iter().map(|backup| backup.path).collect()));
        Ok(())
    }
}

fn create_dir(dir: &Path) -> Result<(), RollerError> {
    fs::create_dir_all(dir).map_err(|error| RollerError::CreateDirectoryFailed {
        path: dir.to_path_buf(),
        error,
    })
}

fn create_truncated(path: &Path, mode: u32) -> Result<fs::File, RollerError> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;

    options.open(path).map_err(|error| RollerError::CreateFileFailed {
        path: path.to_path_buf(),
        error,
    })
}

/// Recreate `path` owned by the user and group of the file just moved away.
#[cfg(target_os = "linux")]
fn preserve_owner(path: &Path, mode: u32, info: &FileInfo) -> Result<(), RollerError> {
    let Some((uid, gid)) = info.owner else {
        return Ok(());
    };
    let failed = |error| RollerError::PreserveOwnerFailed {
        path: path.to_path_buf(),
        error,
    };
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)
        .map_err(failed)?;
    std::os::unix::fs::chown(path, Some(uid), Some(gid)).map_err(failed)
}

#[cfg(not(target_os = "linux"))]
fn preserve_owner(_path: &Path, _mode: u32, _info: &FileInfo) -> Result<(), RollerError> {
    Ok(())
}

impl fmt::Debug for LogRoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogRoller")
            .field("filename", &self.meta.filename)
            .field("archive_dir", &self.meta.archive_dir)
            .field("max_size", &self.meta.max_size)
            .field("retention", &self.meta.retention)
            .field("compression", &self.compression())
            .field("time_zone", &self.meta.time_zone)
            .field("preamble_lines", &self.meta.preamble_lines)
            .finish_non_exhaustive()
    }
}

impl io::Write for &LogRoller {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_payload(buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.lock_state().file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }

    /// Formats the whole message first so that `writeln!` hands over one
    /// payload rather than one per formatting fragment.
    fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        match args.as_str() {
            Some(message) => self.write_all(message.as_bytes()),
            None => self.write_all(fmt::format(args).as_bytes()),
        }
    }
}

impl io::Write for LogRoller {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&*self).flush()
    }

    fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        (&*self).write_fmt(args)
    }
}
