//! JSON Lines output example.
//!
//! Flushes a buffered batch as one compact JSON object per flush, with
//! the timestamp key first and one key per level.

use batchlog::{Level, Logger, RunMode, SinkConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::temp_dir().join("batchlog_json");

    let logger = Logger::default();
    logger.init(
        SinkConfig::new()
            .with_path(&dir)
            .with_single_name("app")
            .with_json(true)
            .with_mode(RunMode::Serve),
    )?;

    logger.info("service listening");
    logger.record("login user=alice", Level::Notice);
    logger.save();

    let content = std::fs::read_to_string(dir.join("app.log"))?;
    for line in content.lines() {
        println!("{line}");
    }

    Ok(())
}
