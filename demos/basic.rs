//! Basic buffered logging example.
//!
//! Records a few entries at different levels and flushes them to the
//! default dated file layout under a temp directory.

use batchlog::{Level, Logger, RunMode, SinkConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::temp_dir().join("batchlog_basic");

    let logger = Logger::default();
    logger.init(
        SinkConfig::new()
            .with_path(&dir)
            .with_mode(RunMode::Serve),
    )?;

    logger.info("application started");
    logger.record("SELECT * FROM users", Level::Sql);
    logger.error("something went wrong");

    if logger.save() {
        println!("flushed to {}", dir.display());
    }

    Ok(())
}
