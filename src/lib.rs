//! # preroll
//!
//! preroll is a rolling log writer for size-limited log files. It behaves
//! like a plain append-only file, but before a write would make the file
//! reach its size limit, the file is moved into an archive directory under a
//! timestamped name and a fresh file is started in its place. Archived files
//! can be gzip-compressed and are pruned by count and by age.
//!
//! **Every new file starts with a preamble**: the first N writes the roller
//! ever accepted, followed by the line `___***___END_OF_PREAMBLE___***___`.
//! Log your version, configuration and command line first and they survive
//! every rotation.
//!
//! preroll sits at the bottom of a logging stack. It takes opaque byte
//! payloads from anything that writes to an [`std::io::Write`], including
//! `tracing_appender::non_blocking`, and assumes it is the only process
//! writing to its files.
//!
//! ## Example
//!
//! ```rust,no_run
//! use {
//!     preroll::{Compression, LogRollerBuilder, RotationSize},
//!     std::io::Write,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut logger = LogRollerBuilder::new("/var/log/myapp/foo.log")
//!         .max_size(RotationSize::MB(500))
//!         .max_backups(3)
//!         .max_age_days(28)
//!         .compression(Compression::Gzip)
//!         // each new log file starts with the first 10 lines ever written
//!         .preamble_lines(10)
//!         .build()?;
//!
//!     writeln!(logger, "myapp v1.2.3 starting")?;
//!     writeln!(logger, "config: /etc/myapp.toml")?;
//!     Ok(())
//! }
//! ```
//!
//! ## File layout
//!
//! For a live file `/var/log/myapp/foo.log` with the default archive
//! directory, a rotation at 18:30 UTC on 4 Nov 2016 produces
//!
//! ```text
//! /var/log/myapp/foo.log
//! /var/log/myapp/foo.log.rotated/foo-2016-11-04T18:30:00.000000000Z.log
//! ```
//!
//! and, with compression on, the backup becomes `...Z.log.gz`. Retention
//! uses the timestamp in the name, which is the rotation time rather than the
//! time of the last write to that file.
//!
//! ## Diagnostics
//!
//! Rotations, compression failures and failed deletions are reported through
//! [`tracing`]. If the subscriber writes into the same roller it observes,
//! give it a `tracing_appender::non_blocking` writer: a blocking writer would
//! wait on the roller's own lock.
//!
//! ## Rotating on demand
//!
//! [`LogRoller::rotate`] starts a new file immediately, e.g. on SIGHUP.
//! Cleanup then runs as it does after a size-triggered rotation.
mod builder;
mod clock;
mod compress;
mod error;
mod fsinfo;
mod housekeeping;
mod naming;
mod retention;
mod roller;

pub use {
    builder::{LogRollerBuilder, RollerConfig, RotationSize, DEFAULT_FILE_MODE, DEFAULT_MAX_SIZE},
    clock::{Clock, ManualClock, SystemClock},
    compress::{compress_file, compressed_path, Compression, Compressor},
    error::RollerError,
    fsinfo::{FileInfo, FileStat, OsStat},
    housekeeping::{Deletion, DetachedThreads, Housekeeper, InlineHousekeeper, TrackedThreads},
    naming::{BackupNaming, Decoded, TimeZone},
    retention::{scan_backups, Backup, RetentionPolicy},
    roller::{LogRoller, PREAMBLE_SENTINEL},
};
