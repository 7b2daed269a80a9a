use std::fmt;
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::config::RunMode;
use crate::sink::{SinkFactory, SinkRegistry};
use crate::{Entries, Level, Result, SinkConfig};

static GLOBAL: Lazy<Logger> = Lazy::new(Logger::default);

/// Buffering logger that routes flushes to a configured sink.
///
/// Entries are collected in memory by level and handed to the sink on
/// flush. In [`RunMode::Cli`] every record flushes immediately; in
/// [`RunMode::Serve`] entries accumulate until [`Logger::save`] or
/// [`Logger::write`] is called.
///
/// The logger is safe to share across threads; all state sits behind one
/// mutex, and each operation runs to completion while holding it.
pub struct Logger {
    inner: Mutex<Inner>,
}

struct Inner {
    buffer: Entries,
    config: SinkConfig,
    sink: Option<Box<dyn crate::Sink>>,
    key: Option<String>,
    registry: SinkRegistry,
}

impl Inner {
    fn bind_sink(&mut self) -> Result<()> {
        let sink = self.registry.build(&self.config.sink_type, &self.config)?;
        self.sink = Some(sink);
        Ok(())
    }

    fn init_marker(&self) -> String {
        format!("[ LOG ] INIT {}", self.config.sink_type)
    }

    fn check(&self) -> bool {
        match &self.key {
            None => true,
            Some(key) => self.config.allow_key.is_empty() || self.config.allow_key.contains(key),
        }
    }
}

impl Logger {
    /// Create a logger with the given configuration. No sink is bound
    /// until [`Logger::init`] or the first flush.
    pub fn new(config: SinkConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                buffer: Entries::new(),
                config,
                sink: None,
                key: None,
                registry: SinkRegistry::default(),
            }),
        }
    }

    /// The process-wide default logger used by [`trace`] when no instance
    /// is passed.
    pub fn global() -> &'static Logger {
        &GLOBAL
    }

    /// Register a custom sink factory under `name`.
    pub fn register_sink(&self, name: impl Into<String>, factory: SinkFactory) {
        self.inner.lock().unwrap().registry.register(name, factory);
    }

    /// Replace the configuration and bind a freshly constructed sink.
    ///
    /// Resolves the sink type via the registry and fails with
    /// [`crate::Error::SinkNotFound`] when it is unknown. Records a
    /// synthetic init entry at info level; the buffer is otherwise left
    /// as it was.
    pub fn init(&self, config: SinkConfig) -> Result<()> {
        let mode = config.mode;
        {
            let mut inner = self.inner.lock().unwrap();
            let sink = inner.registry.build(&config.sink_type, &config)?;
            inner.sink = Some(sink);
            inner.config = config;
            let marker = inner.init_marker();
            inner.buffer.push(Level::Info, marker);
        }
        if mode == RunMode::Cli {
            self.save();
        }
        Ok(())
    }

    /// Append a message to the buffer under `level`.
    ///
    /// In [`RunMode::Cli`] the buffer is flushed immediately afterwards.
    pub fn record(&self, msg: impl fmt::Display, level: Level) {
        let mode;
        {
            let mut inner = self.inner.lock().unwrap();
            inner.buffer.push(level, msg.to_string());
            mode = inner.config.mode;
        }
        if mode == RunMode::Cli {
            self.save();
        }
    }

    /// Record a non-string payload via its verbose debug rendering.
    pub fn record_debug(&self, value: impl fmt::Debug, level: Level) {
        self.record(format!("{:#?}", value), level);
    }

    /// Record at [`Level::Log`].
    pub fn log(&self, msg: impl fmt::Display) {
        self.record(msg, Level::Log);
    }

    /// Record at [`Level::Error`].
    pub fn error(&self, msg: impl fmt::Display) {
        self.record(msg, Level::Error);
    }

    /// Record at [`Level::Info`].
    pub fn info(&self, msg: impl fmt::Display) {
        self.record(msg, Level::Info);
    }

    /// Record at [`Level::Sql`].
    pub fn sql(&self, msg: impl fmt::Display) {
        self.record(msg, Level::Sql);
    }

    /// Record at [`Level::Notice`].
    pub fn notice(&self, msg: impl fmt::Display) {
        self.record(msg, Level::Notice);
    }

    /// Record at [`Level::Alert`].
    pub fn alert(&self, msg: impl fmt::Display) {
        self.record(msg, Level::Alert);
    }

    /// Record at [`Level::Debug`].
    pub fn debug(&self, msg: impl fmt::Display) {
        self.record(msg, Level::Debug);
    }

    /// A snapshot of the buffered entries.
    pub fn entries(&self) -> Entries {
        self.inner.lock().unwrap().buffer.clone()
    }

    /// The messages buffered under one level.
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .buffer
            .get(level)
            .map(|messages| messages.to_vec())
            .unwrap_or_default()
    }

    /// Empty the buffer without flushing.
    pub fn clear(&self) {
        self.inner.lock().unwrap().buffer.clear();
    }

    /// Set the access key gating subsequent flushes.
    pub fn key(&self, key: impl Into<String>) {
        self.inner.lock().unwrap().key = Some(key.into());
    }

    /// Whether the current key passes `config`'s allow-list: true when no
    /// key is set, the list is empty, or the key is a member.
    pub fn check(&self, config: &SinkConfig) -> bool {
        match &self.inner.lock().unwrap().key {
            None => true,
            Some(key) => config.allow_key.is_empty() || config.allow_key.contains(key),
        }
    }

    /// Flush the buffer to the sink.
    ///
    /// Succeeds immediately on an empty buffer. Lazily binds the sink
    /// from the stored configuration when none is bound yet. Returns
    /// false without writing when the access key is rejected. Only the
    /// levels in the configured allow-list are handed to the sink (empty
    /// list means all); the buffer is cleared only when the sink reports
    /// success.
    pub fn save(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.buffer.is_empty() {
            return true;
        }

        if inner.sink.is_none() {
            match inner.bind_sink() {
                Ok(()) => {
                    let marker = inner.init_marker();
                    inner.buffer.push(Level::Info, marker);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "sink binding failed");
                    return false;
                }
            }
        }

        if !inner.check() {
            return false;
        }

        let batch = if inner.config.level.is_empty() {
            inner.buffer.clone()
        } else {
            inner.buffer.filtered(&inner.config.level)
        };

        let Some(sink) = inner.sink.as_ref() else {
            return false;
        };
        let ok = sink.save(&batch, true);
        if ok {
            inner.buffer.clear();
        }
        ok
    }

    /// Realtime single-entry flush.
    ///
    /// Unless `force` is set, entries at levels outside the configured
    /// allow-list are rejected without being buffered or written. The
    /// entry is merged into a snapshot of the current buffer and sent to
    /// the sink, lazily binding one from the stored configuration when
    /// none is bound yet; on success the whole live buffer is cleared,
    /// including entries recorded after the snapshot was taken.
    pub fn write(&self, msg: impl fmt::Display, level: Level, force: bool) -> bool {
        let mut inner = self.inner.lock().unwrap();

        if !force && !inner.config.level.is_empty() && !inner.config.level.contains(&level) {
            return false;
        }

        let mut snapshot = inner.buffer.clone();
        snapshot.push(level, msg.to_string());

        if inner.sink.is_none() {
            match inner.bind_sink() {
                Ok(()) => {
                    let marker = inner.init_marker();
                    inner.buffer.push(Level::Info, marker.clone());
                    snapshot.push(Level::Info, marker);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "sink binding failed");
                    return false;
                }
            }
        }

        let Some(sink) = inner.sink.as_ref() else {
            return false;
        };
        let ok = sink.save(&snapshot, false);
        if ok {
            inner.buffer.clear();
        }
        ok
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(SinkConfig::default())
    }
}

/// Record a message through `logger`, or through the process-wide default
/// logger when none is given.
pub fn trace(msg: impl fmt::Display, level: Level, logger: Option<&Logger>) {
    match logger {
        Some(logger) => logger.record(msg, level),
        None => Logger::global().record(msg, level),
    }
}
