use {
    preroll::{Compression, LogRollerBuilder, RotationSize, TimeZone},
    tracing_subscriber::util::SubscriberInitExt,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let appender = LogRollerBuilder::new("./logs/tracing.log")
        .max_size(RotationSize::MB(10))
        .max_backups(3)
        .time_zone(TimeZone::Local)
        .compression(Compression::Gzip)
        .preamble_lines(1)
        .build()?;
    // The roller reports its own rotations through tracing, so it must sit
    // behind a non-blocking writer.
    let (non_blocking, _guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .finish()
        .try_init()?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting");
    tracing::info!("This is an info message");
    tracing::warn!("This is a warning message");
    tracing::error!("This is an error message");

    Ok(())
}
