//! Per-level file routing example.
//!
//! Diverts error and sql entries into their own dedicated files while
//! everything else lands in the shared master file.

use batchlog::{Level, Logger, SinkConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::temp_dir().join("batchlog_apart");

    let logger = Logger::default();
    logger.init(
        SinkConfig::new()
            .with_path(&dir)
            .with_apart_levels(vec![Level::Error, Level::Sql]),
    )?;

    // cli mode flushes each record immediately
    logger.log("a plain entry for the master file");
    logger.error("an error entry for its own file");
    logger.sql("UPDATE accounts SET balance = 0");

    println!("wrote master and per-level files under {}", dir.display());
    Ok(())
}
