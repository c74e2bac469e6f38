use {
    crate::{error::RollerError, naming::BackupNaming, retention::scan_backups},
    flate2::write::GzEncoder,
    std::{
        fs,
        io::{self, Write as _},
        path::{Path, PathBuf},
        sync::{Mutex, PoisonError},
    },
    tracing::{debug, warn},
};

/// Specifies the compression algorithm to use for archived log files.
///
/// A compressed backup keeps its original name with the algorithm's
/// extension appended (e.g. `server-2024-01-01T00:00:00.000000000Z.log.gz`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Gzip compression at the default level. Compressed files will have the
    /// `.gz` extension.
    Gzip,
    /// XZ compression. Slower than gzip with a better ratio. Compressed files
    /// will have the `.xz` extension.
    #[cfg(feature = "xz")]
    Xz,
}

impl Compression {
    /// Get the extension for the compressed log file, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::Gzip => "gz",
            #[cfg(feature = "xz")]
            Compression::Xz => "xz",
        }
    }

    fn encode(&self, reader: &mut impl io::BufRead, writer: impl io::Write) -> io::Result<()> {
        match self {
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(writer, flate2::Compression::default());
                io::copy(reader, &mut encoder)?;
                encoder.finish()?.flush()
            }
            #[cfg(feature = "xz")]
            Compression::Xz => {
                let mut writer = writer;
                lzma_rs::xz_compress(reader, &mut writer)?;
                writer.flush()
            }
        }
    }
}

/// The path a compressed copy of `path` is written to.
pub fn compressed_path(path: &Path, compression: Compression) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(compression.extension());
    PathBuf::from(name)
}

/// Compress one archived file.
///
/// Writes `<path>.<ext>`, gives it the source file's permissions, then
/// removes the source. If anything before the removal fails the partial
/// output is deleted and the source is left untouched.
pub fn compress_file(path: &Path, compression: Compression) -> Result<PathBuf, RollerError> {
    let failed = |error: io::Error| RollerError::CompressFailed {
        path: path.to_path_buf(),
        error,
    };

    let infile = fs::File::open(path).map_err(failed)?;
    let permissions = infile.metadata().map_err(failed)?.permissions();
    let mut reader = io::BufReader::new(infile);

    let target = compressed_path(path, compression);
    let outfile = fs::File::create(&target).map_err(failed)?;
    let written = compression
        .encode(&mut reader, io::BufWriter::new(outfile))
        .and_then(|()| fs::set_permissions(&target, permissions));
    if let Err(error) = written {
        let _ = fs::remove_file(&target);
        return Err(failed(error));
    }
    // Release the source handle before removing it.
    drop(reader);

    fs::remove_file(path).map_err(failed)?;
    Ok(target)
}

/// Compresses the plain backups in an archive directory.
///
/// Sweeps are serialized on a lock of their own, so a sweep started while
/// opening the first file and one started after a rotation never touch the
/// same file at once. The lock is independent of the writer's.
#[derive(Debug)]
pub struct Compressor {
    compression: Compression,
    lock: Mutex<()>,
}

impl Compressor {
    pub fn new(compression: Compression) -> Self {
        Compressor {
            compression,
            lock: Mutex::new(()),
        }
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Compress every uncompressed backup in `archive_dir`.
    ///
    /// Failures are reported through `tracing` and never stop the sweep.
    /// Returns how many files were compressed.
    pub fn sweep(&self, archive_dir: &Path, naming: &BackupNaming) -> usize {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let backups = match scan_backups(archive_dir, naming, false) {
            Ok(backups) => backups,
            Err(err) => {
                warn!(error = %err, "unable to compress log files");
                return 0;
            }
        };

        let mut compressed = 0;
        for backup in backups.iter().filter(|b| !b.compressed) {
            match compress_file(&backup.path, self.compression) {
                Ok(target) => {
                    debug!(path = %target.display(), "compressed backup log file");
                    compressed += 1;
                }
                Err(err) => warn!(error = %err, "unable to compress backup log file"),
            }
        }
        compressed
    }
}
