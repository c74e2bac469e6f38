use {
    preroll::{LogRollerBuilder, RotationSize},
    std::io::Write,
};

/// Every rotated file starts with the version and argument lines below,
/// followed by the end-of-preamble marker.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut logger = LogRollerBuilder::new("./logs/preamble/server.log")
        .max_size(RotationSize::KB(4))
        .max_backups(5)
        .preamble_lines(2)
        .build()?;

    writeln!(logger, "server v{} starting", env!("CARGO_PKG_VERSION"))?;
    writeln!(logger, "args: {:?}", std::env::args().collect::<Vec<_>>())?;

    for i in 1..=500 {
        writeln!(logger, "Log entry #{i}: request handled")?;
    }

    println!("Rotated files are in {}", logger.archive_dir().display());
    Ok(())
}
