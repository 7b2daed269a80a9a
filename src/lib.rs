//! # Batchlog
//!
//! A buffered, level-routed logging library with file rotation and retention.
//!
//! ## Features
//!
//! - In-memory buffering by level with immediate or batched flushing
//! - Pluggable sinks (rotating file sink, discarding test sink)
//! - Per-level file routing, size-based rotation, count-based retention
//! - Plain text or JSON Lines output
//!
//! ## Example
//!
//! ```rust
//! use batchlog::{Logger, SinkConfig, Level, RunMode};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let logger = Logger::new(
//!     SinkConfig::new()
//!         .with_path(dir.path())
//!         .with_mode(RunMode::Serve),
//! );
//!
//! logger.info("starting up");
//! logger.record("SELECT 1", Level::Sql);
//! assert!(logger.save());
//! ```

pub mod config;
pub mod error;
pub mod file;
pub mod level;
pub mod logger;
pub mod sink;

pub use config::{ApartLevels, RunMode, SingleFile, SinkConfig};
pub use error::{Error, Result};
pub use file::FileSink;
pub use level::Level;
pub use logger::{Logger, trace};
pub use sink::{Entries, NullSink, Sink, SinkFactory, SinkRegistry};
