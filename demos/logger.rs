use {
    preroll::{LogRollerBuilder, RotationSize},
    std::io::Write,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut logger = LogRollerBuilder::new("./logs/logger.log")
        .max_size(RotationSize::KB(256))
        .max_backups(3)
        .build()?;

    for i in 1..=10_000 {
        writeln!(logger, "[{i:05}] request served in {}ms", i % 97)?;
    }
    logger.close()?;

    println!("live file: {}", logger.filename().display());
    println!("backups:   {}", logger.archive_dir().display());

    Ok(())
}
