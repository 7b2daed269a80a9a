use std::collections::HashMap;

use crate::{Error, Level, Result, SinkConfig};

/// Ordered batch of buffered log entries, keyed by level.
///
/// Levels keep the order they were first recorded under, and messages keep
/// their insertion order within a level. A level key is created the moment
/// the first message is pushed under it, so no key ever maps to nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entries {
    items: Vec<(Level, Vec<String>)>,
}

impl Entries {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message under `level`.
    pub fn push(&mut self, level: Level, message: String) {
        match self.items.iter_mut().find(|(l, _)| *l == level) {
            Some((_, messages)) => messages.push(message),
            None => self.items.push((level, vec![message])),
        }
    }

    /// Messages buffered under `level`, if any.
    pub fn get(&self, level: Level) -> Option<&[String]> {
        self.items
            .iter()
            .find(|(l, _)| *l == level)
            .map(|(_, messages)| messages.as_slice())
    }

    /// Remove and return the messages buffered under `level`.
    pub fn remove(&mut self, level: Level) -> Option<Vec<String>> {
        let index = self.items.iter().position(|(l, _)| *l == level)?;
        Some(self.items.remove(index).1)
    }

    /// Iterate levels and their messages in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Level, &[String])> {
        self.items
            .iter()
            .map(|(level, messages)| (*level, messages.as_slice()))
    }

    /// A copy containing only the levels in `allowed`.
    pub fn filtered(&self, allowed: &[Level]) -> Entries {
        Entries {
            items: self
                .items
                .iter()
                .filter(|(level, _)| allowed.contains(level))
                .cloned()
                .collect(),
        }
    }

    /// Drop all buffered entries.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// True when no messages are buffered.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of levels with buffered messages.
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Pluggable destination that persists a batch of log entries.
///
/// `save` returns whether the write succeeded; no error ever crosses this
/// boundary. `append` distinguishes a buffered flush (true) from a
/// realtime single-entry flush (false); sinks may ignore it.
pub trait Sink: Send {
    /// Persist a batch of categorized entries.
    fn save(&self, entries: &Entries, append: bool) -> bool;
}

/// Sink that discards everything, used to silence output during tests.
#[derive(Debug, Default)]
pub struct NullSink;

impl Sink for NullSink {
    fn save(&self, _entries: &Entries, _append: bool) -> bool {
        true
    }
}

/// Factory constructing a sink from configuration.
pub type SinkFactory = fn(&SinkConfig) -> Result<Box<dyn Sink>>;

/// Registry resolving sink type names to factories.
///
/// Ships with `file` (the rotating file sink) and `test`/`null` (the
/// discarding sink); custom factories can be registered under new names.
pub struct SinkRegistry {
    factories: HashMap<String, SinkFactory>,
}

impl SinkRegistry {
    /// Register a factory under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, factory: SinkFactory) {
        self.factories.insert(name.into().to_lowercase(), factory);
    }

    /// Construct the sink registered under `name` (case-insensitive).
    pub fn build(&self, name: &str, config: &SinkConfig) -> Result<Box<dyn Sink>> {
        match self.factories.get(&name.to_lowercase()) {
            Some(factory) => factory(config),
            None => Err(Error::SinkNotFound {
                name: name.to_string(),
            }),
        }
    }
}

impl Default for SinkRegistry {
    fn default() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("file", |config| {
            Ok(Box::new(crate::FileSink::new(config)?))
        });
        registry.register("test", |_| Ok(Box::new(NullSink)));
        registry.register("null", |_| Ok(Box::new(NullSink)));
        registry
    }
}
