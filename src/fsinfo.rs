use std::{fs, io, path::Path};

#[cfg(unix)]
use std::os::unix::fs::{MetadataExt, PermissionsExt};

/// The parts of a file's metadata the roller cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileInfo {
    /// Length in bytes.
    pub len: u64,
    /// Permission bits (Unix only).
    pub mode: Option<u32>,
    /// Owning user and group ids (Unix only).
    pub owner: Option<(u32, u32)>,
}

impl FileInfo {
    /// A file of the given length with no mode or owner information.
    pub fn with_len(len: u64) -> Self {
        FileInfo {
            len,
            ..FileInfo::default()
        }
    }
}

impl From<&fs::Metadata> for FileInfo {
    fn from(metadata: &fs::Metadata) -> Self {
        #[cfg(unix)]
        {
            FileInfo {
                len: metadata.len(),
                mode: Some(metadata.permissions().mode() & 0o7777),
                owner: Some((metadata.uid(), metadata.gid())),
            }
        }
        #[cfg(not(unix))]
        {
            FileInfo::with_len(metadata.len())
        }
    }
}

/// Looks up metadata for the live log file.
///
/// The roller consults this when deciding whether an existing file can be
/// appended to and when carrying the file's mode and owner over a rotation.
/// Tests can substitute a fake to simulate large files without writing them.
pub trait FileStat: Send + Sync + 'static {
    /// Returns the metadata of `path`, or an error of kind
    /// [`io::ErrorKind::NotFound`] if nothing is there.
    fn stat(&self, path: &Path) -> io::Result<FileInfo>;
}

/// Reads metadata straight from the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsStat;

impl FileStat for OsStat {
    fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        fs::metadata(path).map(|metadata| FileInfo::from(&metadata))
    }
}
