use {
    preroll::LogRollerBuilder,
    std::{io::Write, sync::Arc, thread, time::Duration},
};

/// Rotates from a second thread, the way a SIGHUP handler would.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logger = Arc::new(
        LogRollerBuilder::new("./logs/on_demand/app.log")
            .max_backups(10)
            .build()?,
    );

    let trigger = {
        let logger = Arc::clone(&logger);
        thread::spawn(move || {
            for _ in 0..3 {
                thread::sleep(Duration::from_millis(50));
                if let Err(err) = logger.rotate() {
                    eprintln!("rotation failed: {err}");
                }
            }
        })
    };

    for i in 0..200 {
        writeln!(&*logger, "tick {i}")?;
        thread::sleep(Duration::from_millis(1));
    }
    trigger.join().map_err(|_| "rotation thread panicked")?;
    logger.close()?;

    Ok(())
}
