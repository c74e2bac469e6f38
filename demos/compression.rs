use {
    preroll::{Compression, LogRollerBuilder, RotationSize},
    std::{io::Write, time::Instant},
};

const LOG_FOLDER: &str = "./logs/compression";

/// Compression rate depends heavily on the log pattern.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let mut logger = LogRollerBuilder::new(format!("{LOG_FOLDER}/gzip.log"))
        .max_size(RotationSize::MB(1))
        .max_backups(2)
        .compression(Compression::Gzip)
        .build()?;

    for i in 1..=35_000 {
        writeln!(
            logger,
            "Log entry #{i}: This is a sample log message that will contribute to file size"
        )?;
    }
    logger.close()?;
    println!("Done compressing: {:?}", start.elapsed());

    println!("File | Bytes");
    for entry in std::fs::read_dir(logger.archive_dir())?.flatten() {
        let size = entry.metadata().map_or(0, |m| m.len());
        println!("{:?} | {size}", entry.file_name());
    }

    Ok(())
}
