//! Integration tests for the rolling writer
//!
//! Tests cover:
//! - Open-or-append on first write
//! - Size-triggered and explicit rotation
//! - Preamble replay
//! - Count and age retention
//! - Compression of backups

use {
    chrono::{DateTime, FixedOffset, TimeDelta, TimeZone as _, Utc},
    flate2::read::GzDecoder,
    preroll::{
        BackupNaming, Clock, Compression, FileInfo, FileStat, LogRoller, LogRollerBuilder, ManualClock,
        RollerError, RotationSize, TimeZone, TrackedThreads, PREAMBLE_SENTINEL,
    },
    std::{
        fs,
        io::{self, Read as _, Write as _},
        path::{Path, PathBuf},
        sync::{
            atomic::{AtomicI64, Ordering},
            Arc,
        },
        thread,
    },
    tempfile::TempDir,
};

/// Moves forward one second every time it is read, so every rotation gets
/// its own backup name.
struct TickClock {
    start: DateTime<Utc>,
    ticks: AtomicI64,
}

impl TickClock {
    fn new() -> Arc<Self> {
        Arc::new(TickClock {
            start: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            ticks: AtomicI64::new(0),
        })
    }
}

impl Clock for TickClock {
    fn now(&self) -> DateTime<Utc> {
        self.start + TimeDelta::seconds(self.ticks.fetch_add(1, Ordering::SeqCst))
    }
}

/// Reports the real file but claims it is enormous.
struct HugeStat;

impl FileStat for HugeStat {
    fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        let metadata = fs::metadata(path)?;
        Ok(FileInfo {
            len: 1 << 40,
            ..FileInfo::from(&metadata)
        })
    }
}

fn builder(dir: &TempDir) -> LogRollerBuilder {
    LogRollerBuilder::new(dir.path().join("foo.log")).clock(TickClock::new())
}

/// Sorted names in `dir`, or nothing if it does not exist.
fn list(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

fn backups(logger: &LogRoller) -> Vec<PathBuf> {
    list(logger.archive_dir())
        .into_iter()
        .map(|name| logger.archive_dir().join(name))
        .collect()
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

fn gunzip(path: &Path) -> String {
    let mut out = String::new();
    GzDecoder::new(fs::File::open(path).unwrap())
        .read_to_string(&mut out)
        .unwrap();
    out
}

#[test]
fn rotates_before_a_write_would_reach_the_cap() {
    let dir = TempDir::new().unwrap();
    let logger = builder(&dir).max_size(RotationSize::Bytes(30)).build().unwrap();

    for i in 0..5 {
        let payload = format!("payload-{i}\n");
        assert_eq!(payload.len(), 10);
        assert_eq!(logger.write_payload(payload.as_bytes()).unwrap(), 10);
    }

    assert_eq!(read(logger.filename()), "payload-4\n");
    assert_eq!(logger.size(), 10);

    let archived = backups(&logger);
    assert_eq!(archived.len(), 2);
    assert_eq!(read(&archived[0]), "payload-0\npayload-1\n");
    assert_eq!(read(&archived[1]), "payload-2\npayload-3\n");
}

#[test]
fn oversized_payload_is_rejected_untouched() {
    let dir = TempDir::new().unwrap();
    let logger = builder(&dir).max_size(RotationSize::Bytes(10)).build().unwrap();

    let err = logger.write_payload(&[b'x'; 11]).unwrap_err();

    assert!(matches!(err, RollerError::PayloadTooLarge { len: 11, max: 10 }));
    assert!(!logger.filename().exists());
    assert!(!logger.archive_dir().exists());
    assert!(logger.preamble().is_empty());

    let err = (&logger).write(&[b'x'; 11]).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
}

#[test]
fn appends_to_existing_file() {
    let dir = TempDir::new().unwrap();
    let logger = builder(&dir).max_size(RotationSize::Bytes(100)).build().unwrap();
    fs::write(logger.filename(), "old\n").unwrap();

    logger.write_payload(b"new\n").unwrap();

    assert_eq!(read(logger.filename()), "old\nnew\n");
    assert_eq!(logger.size(), 8);
    assert!(!logger.archive_dir().exists());
}

#[test]
fn existing_file_that_would_overflow_is_archived_first() {
    let dir = TempDir::new().unwrap();
    let logger = builder(&dir).max_size(RotationSize::Bytes(30)).build().unwrap();
    fs::write(logger.filename(), "x".repeat(25)).unwrap();

    logger.write_payload(b"0123456789").unwrap();

    assert_eq!(read(logger.filename()), "0123456789");
    let archived = backups(&logger);
    assert_eq!(archived.len(), 1);
    assert_eq!(read(&archived[0]), "x".repeat(25));
}

#[test]
fn injected_stat_drives_first_open() {
    let dir = TempDir::new().unwrap();
    let logger = builder(&dir)
        .max_size(RotationSize::MB(1))
        .file_stat(Arc::new(HugeStat))
        .build()
        .unwrap();
    fs::write(logger.filename(), "tiny\n").unwrap();

    logger.write_payload(b"fresh\n").unwrap();

    assert_eq!(read(logger.filename()), "fresh\n");
    let archived = backups(&logger);
    assert_eq!(archived.len(), 1);
    assert_eq!(read(&archived[0]), "tiny\n");
}

#[test]
fn preamble_is_replayed_after_rotation() {
    let dir = TempDir::new().unwrap();
    let logger = builder(&dir)
        .max_size(RotationSize::Bytes(1024))
        .preamble_lines(2)
        .build()
        .unwrap();

    logger.write_payload(b"v1.0\n").unwrap();
    logger.write_payload(b"cfg\n").unwrap();
    logger.write_payload(b"a\n").unwrap();
    logger.rotate().unwrap();

    let header = format!("v1.0\ncfg\n{PREAMBLE_SENTINEL}");
    assert_eq!(read(logger.filename()), header);
    assert_eq!(logger.size(), header.len() as u64);
    assert_eq!(logger.preamble(), vec![b"v1.0\n".to_vec(), b"cfg\n".to_vec()]);

    logger.write_payload(b"b\n").unwrap();
    assert_eq!(read(logger.filename()), format!("{header}b\n"));

    let archived = backups(&logger);
    assert_eq!(archived.len(), 1);
    assert_eq!(read(&archived[0]), "v1.0\ncfg\na\n");
}

#[test]
fn preamble_counts_toward_size() {
    let dir = TempDir::new().unwrap();
    let header = format!("banner\n{PREAMBLE_SENTINEL}");
    let cap = header.len() as u64 + 15;
    let logger = builder(&dir)
        .max_size(RotationSize::Bytes(cap))
        .preamble_lines(1)
        .build()
        .unwrap();

    logger.write_payload(b"banner\n").unwrap();
    for _ in 0..6 {
        logger.write_payload(b"0123456789").unwrap();
    }

    // The first file takes the banner and four payloads. Every later file
    // starts with the replayed header, leaving room for one payload only.
    assert_eq!(read(logger.filename()), format!("{header}0123456789"));
    assert_eq!(logger.size(), header.len() as u64 + 10);
    let archived = backups(&logger);
    assert_eq!(archived.len(), 2);
    assert_eq!(read(&archived[0]), format!("banner\n{}", "0123456789".repeat(4)));
    assert_eq!(read(&archived[1]), format!("{header}0123456789"));
}

#[cfg(unix)]
#[test]
fn failed_rename_leaves_file_closed_and_reopenable() {
    let dir = TempDir::new().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    let logger = LogRollerBuilder::new(dir.path().join("foo.log"))
        .clock(Arc::new(ManualClock::new(now)))
        .build()
        .unwrap();

    logger.write_payload(b"first\n").unwrap();
    let naming = BackupNaming::new(logger.filename(), None).unwrap();
    let blocked = naming.backup_path(logger.archive_dir(), now, &TimeZone::UTC);
    fs::create_dir(&blocked).unwrap();

    match logger.rotate() {
        Err(RollerError::RenameFileError { from, to, .. }) => {
            assert_eq!(from, logger.filename());
            assert_eq!(to, blocked);
        }
        other => panic!("expected a rename failure, got {other:?}"),
    }

    assert_eq!(logger.write_payload(b"b\n").unwrap(), 2);
    assert_eq!(read(logger.filename()), "first\nb\n");
    assert!(blocked.is_dir());
}

#[test]
fn unbounded_age_cap_rotates_normally() {
    let dir = TempDir::new().unwrap();
    let housekeeper = Arc::new(TrackedThreads::new());
    let logger = builder(&dir)
        .max_age_days(u32::MAX)
        .housekeeper(housekeeper.clone())
        .build()
        .unwrap();

    logger.write_payload(b"a\n").unwrap();
    logger.rotate().unwrap();
    logger.write_payload(b"b\n").unwrap();
    logger.rotate().unwrap();
    housekeeper.wait();

    assert_eq!(backups(&logger).len(), 2);
    assert_eq!(read(logger.filename()), "");
}

#[test]
fn repeated_rotate_and_close_are_harmless() {
    let dir = TempDir::new().unwrap();
    let logger = builder(&dir)
        .max_size(RotationSize::Bytes(1024))
        .preamble_lines(1)
        .build()
        .unwrap();

    logger.close().unwrap();
    logger.write_payload(b"banner\n").unwrap();
    logger.rotate().unwrap();
    logger.rotate().unwrap();
    logger.close().unwrap();
    logger.close().unwrap();

    let header = format!("banner\n{PREAMBLE_SENTINEL}");
    assert_eq!(read(logger.filename()), header);
    let archived = backups(&logger);
    assert_eq!(archived.len(), 2);
    assert_eq!(read(&archived[0]), "banner\n");
    assert_eq!(read(&archived[1]), header);

    // Writing after close reopens and appends.
    logger.write_payload(b"x\n").unwrap();
    assert_eq!(read(logger.filename()), format!("{header}x\n"));
}

#[test]
fn rotate_without_a_file_creates_one() {
    let dir = TempDir::new().unwrap();
    let logger = LogRollerBuilder::new(dir.path().join("nested/deeper/foo.log"))
        .build()
        .unwrap();

    logger.rotate().unwrap();

    assert_eq!(read(logger.filename()), "");
    assert!(logger.archive_dir().is_dir());
    assert!(backups(&logger).is_empty());
}

#[test]
fn file_never_reaches_past_the_cap() {
    let dir = TempDir::new().unwrap();
    let cap = 50;
    let logger = builder(&dir).max_size(RotationSize::Bytes(cap)).build().unwrap();

    let mut total = 0;
    for i in 0..200u64 {
        let payload = vec![b'a' + (i % 26) as u8; (i * 7 % cap + 1) as usize];
        logger.write_payload(&payload).unwrap();
        total += payload.len() as u64;

        let on_disk = fs::metadata(logger.filename()).unwrap().len();
        assert_eq!(on_disk, logger.size());
        assert!(on_disk <= cap, "write {i} left {on_disk} bytes");
    }

    let archived: u64 = backups(&logger)
        .iter()
        .map(|path| fs::metadata(path).unwrap().len())
        .sum();
    assert_eq!(archived + logger.size(), total);
}

#[test]
fn count_retention_keeps_newest_backups() {
    let dir = TempDir::new().unwrap();
    let housekeeper = Arc::new(TrackedThreads::new());
    let logger = builder(&dir)
        .max_backups(2)
        .housekeeper(housekeeper.clone())
        .build()
        .unwrap();
    fs::create_dir_all(logger.archive_dir()).unwrap();
    fs::write(logger.archive_dir().join("notes.txt"), "not a backup").unwrap();

    for i in 0..5 {
        logger.write_payload(format!("{i}\n").as_bytes()).unwrap();
        logger.rotate().unwrap();
    }
    housekeeper.wait();

    let archived = backups(&logger);
    assert_eq!(archived.len(), 3);
    assert_eq!(read(&archived[0]), "3\n");
    assert_eq!(read(&archived[1]), "4\n");
    assert!(archived[2].ends_with("notes.txt"));
}

#[test]
fn age_retention_removes_stale_backups() {
    let dir = TempDir::new().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
    let housekeeper = Arc::new(TrackedThreads::new());
    let logger = LogRollerBuilder::new(dir.path().join("foo.log"))
        .max_age_days(2)
        .clock(Arc::new(ManualClock::new(now)))
        .housekeeper(housekeeper.clone())
        .build()
        .unwrap();

    let naming = BackupNaming::new(logger.filename(), None).unwrap();
    fs::create_dir_all(logger.archive_dir()).unwrap();
    for days in [10, 3, 1] {
        let path = naming.backup_path(logger.archive_dir(), now - TimeDelta::days(days), &TimeZone::UTC);
        fs::write(path, format!("{days} days old\n")).unwrap();
    }

    logger.write_payload(b"current\n").unwrap();
    logger.rotate().unwrap();
    housekeeper.wait();

    let contents: Vec<String> = backups(&logger).iter().map(|p| read(p)).collect();
    assert_eq!(contents, vec!["1 days old\n".to_string(), "current\n".to_string()]);
}

#[test]
fn retention_disabled_keeps_everything() {
    let dir = TempDir::new().unwrap();
    let housekeeper = Arc::new(TrackedThreads::new());
    let logger = builder(&dir).housekeeper(housekeeper.clone()).build().unwrap();

    for _ in 0..4 {
        logger.write_payload(b"line\n").unwrap();
        logger.rotate().unwrap();
    }
    housekeeper.wait();

    assert_eq!(backups(&logger).len(), 4);
}

#[test]
fn rotated_files_are_compressed() {
    let dir = TempDir::new().unwrap();
    let logger = builder(&dir).compression(Compression::Gzip).build().unwrap();

    logger.write_payload(b"hello\n").unwrap();
    logger.rotate().unwrap();

    let archived = backups(&logger);
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].extension().unwrap(), "gz");
    assert_eq!(gunzip(&archived[0]), "hello\n");
}

#[test]
fn first_write_compresses_leftover_backups() {
    let dir = TempDir::new().unwrap();
    let logger = builder(&dir).compression(Compression::Gzip).build().unwrap();
    let naming = BackupNaming::new(logger.filename(), Some(Compression::Gzip)).unwrap();
    fs::create_dir_all(logger.archive_dir()).unwrap();
    let leftover = naming.backup_path(
        logger.archive_dir(),
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        &TimeZone::UTC,
    );
    fs::write(&leftover, "from last run\n").unwrap();

    logger.write_payload(b"first\n").unwrap();

    assert_eq!(
        list(logger.archive_dir()),
        vec!["foo-2024-01-01T00:00:00.000000000Z.log.gz".to_string()]
    );
    assert_eq!(gunzip(&logger.archive_dir().join(&list(logger.archive_dir())[0])), "from last run\n");
    assert_eq!(read(logger.filename()), "first\n");
}

#[test]
fn retention_counts_compressed_backups() {
    let dir = TempDir::new().unwrap();
    let housekeeper = Arc::new(TrackedThreads::new());
    let logger = builder(&dir)
        .compression(Compression::Gzip)
        .max_backups(1)
        .housekeeper(housekeeper.clone())
        .build()
        .unwrap();

    for i in 0..3 {
        logger.write_payload(format!("{i}\n").as_bytes()).unwrap();
        logger.rotate().unwrap();
    }
    housekeeper.wait();

    let archived = backups(&logger);
    assert_eq!(archived.len(), 1);
    assert_eq!(gunzip(&archived[0]), "2\n");
}

#[test]
fn backup_names_follow_time_zone() {
    let dir = TempDir::new().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 6, 15, 20, 0, 0).unwrap();
    let logger = LogRollerBuilder::new(dir.path().join("foo.log"))
        .time_zone(TimeZone::Fix(FixedOffset::east_opt(8 * 3600).unwrap()))
        .clock(Arc::new(ManualClock::new(now)))
        .build()
        .unwrap();

    logger.write_payload(b"x\n").unwrap();
    logger.rotate().unwrap();

    assert_eq!(
        list(logger.archive_dir()),
        vec!["foo-2024-06-16T04:00:00.000000000+08:00.log".to_string()]
    );
}

#[test]
fn writeln_is_one_payload() {
    let dir = TempDir::new().unwrap();
    let mut logger = builder(&dir).preamble_lines(1).build().unwrap();

    writeln!(logger, "{} v{}", "myapp", 3).unwrap();
    writeln!(logger, "second").unwrap();
    logger.flush().unwrap();

    assert_eq!(logger.preamble(), vec![b"myapp v3\n".to_vec()]);
    assert_eq!(read(logger.filename()), "myapp v3\nsecond\n");
}

#[test]
fn concurrent_writers_lose_nothing() {
    let dir = TempDir::new().unwrap();
    let logger = Arc::new(builder(&dir).max_size(RotationSize::Bytes(100)).build().unwrap());

    let workers: Vec<_> = (0..4)
        .map(|t| {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for i in 0..100 {
                    logger.write_payload(format!("{t}:{i:06}\n").as_bytes()).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    logger.sync().unwrap();

    let mut lines: Vec<String> = backups(&logger)
        .iter()
        .chain(std::iter::once(&logger.filename().to_path_buf()))
        .flat_map(|path| read(path).lines().map(str::to_string).collect::<Vec<_>>())
        .collect();
    lines.sort();

    let mut expected: Vec<String> = (0..4)
        .flat_map(|t| (0..100).map(move |i| format!("{t}:{i:06}")))
        .collect();
    expected.sort();
    assert_eq!(lines, expected);
}

#[cfg(unix)]
#[test]
fn rotation_keeps_file_mode() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let logger = builder(&dir).build().unwrap();
    logger.write_payload(b"x\n").unwrap();
    fs::set_permissions(logger.filename(), fs::Permissions::from_mode(0o600)).unwrap();

    logger.rotate().unwrap();

    let mode = fs::metadata(logger.filename()).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
    assert_eq!(read(logger.filename()), "");
}
