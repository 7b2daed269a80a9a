use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::Level;

/// Parse a size string with optional units (K/M/G, case-insensitive), defaulting to bytes if no unit.
fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".to_string());
    }

    let last = s.chars().last().unwrap();
    let (num_str, unit) = if last.is_alphabetic() {
        // strip by the char's encoded width, units may be non-ASCII letters
        let num_part = &s[..s.len() - last.len_utf8()];
        (num_part, Some(last.to_ascii_uppercase()))
    } else {
        (s, None)
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid number: {}", num_str))?;

    let multiplier = match unit {
        None => 1,
        Some('K') => 1024,
        Some('M') => 1024 * 1024,
        Some('G') => 1024 * 1024 * 1024,
        Some(other) => return Err(format!("invalid unit: {}, supported: K/M/G", other)),
    };

    num.checked_mul(multiplier)
        .ok_or_else(|| "size too large".to_string())
}

/// Size value that can be a number (bytes) or string with units.
#[derive(Deserialize)]
#[serde(untagged)]
enum SizeValue {
    Number(u64),
    String(String),
}

fn deserialize_file_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match SizeValue::deserialize(deserializer)? {
        SizeValue::Number(n) => Ok(n),
        SizeValue::String(s) => parse_size(&s).map_err(de::Error::custom),
    }
}

/// Single-file collapsing: off, on with the default name, or on with a custom name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SingleFile {
    /// `true` collapses all levels into one file named `single`, `false` disables.
    Flag(bool),
    /// Collapse all levels into one file with this name.
    Name(String),
}

impl SingleFile {
    /// The file name stem when single-file mode is active.
    pub fn name(&self) -> Option<&str> {
        match self {
            SingleFile::Flag(false) => None,
            SingleFile::Flag(true) => Some("single"),
            SingleFile::Name(name) => Some(name),
        }
    }
}

impl Default for SingleFile {
    fn default() -> Self {
        SingleFile::Flag(false)
    }
}

/// Levels diverted to their own dedicated files instead of the master file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApartLevels {
    /// `true` diverts every level, `false` diverts none.
    Flag(bool),
    /// Divert exactly these levels.
    Levels(Vec<Level>),
}

impl ApartLevels {
    /// Whether entries at `level` go to a dedicated per-level file.
    pub fn contains(&self, level: Level) -> bool {
        match self {
            ApartLevels::Flag(all) => *all,
            ApartLevels::Levels(levels) => levels.contains(&level),
        }
    }
}

impl Default for ApartLevels {
    fn default() -> Self {
        ApartLevels::Levels(Vec::new())
    }
}

/// The flush discipline the logger runs under.
///
/// `Cli` flushes immediately on every record and tags file names with a
/// `_cli` suffix; `Serve` buffers entries until an explicit flush and
/// delimits successive flushes with a separator line in text output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Immediate per-record flushing (command-line style execution).
    #[default]
    Cli,
    /// Buffered flushing (request/response style execution).
    Serve,
}

impl RunMode {
    /// Suffix appended to file name stems in this mode.
    pub fn file_suffix(&self) -> &'static str {
        match self {
            RunMode::Cli => "_cli",
            RunMode::Serve => "",
        }
    }
}

/// Configuration for a logger and its sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink type to construct ("file" or "test"), resolved via the registry.
    #[serde(rename = "type", default = "default_sink_type")]
    pub sink_type: String,
    /// Timestamp rendering pattern (a `time` format description).
    /// `None` renders RFC 3339.
    #[serde(default)]
    pub time_format: Option<String>,
    /// Collapse all levels into one file.
    #[serde(default)]
    pub single: SingleFile,
    /// Byte threshold that triggers size rotation of a destination file.
    /// Deserializes from a bare number (bytes) or a string with K/M/G units.
    #[serde(
        default = "default_file_size",
        deserialize_with = "deserialize_file_size"
    )]
    pub file_size: u64,
    /// Base directory for log files.
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// Levels written to separate per-level files.
    #[serde(default)]
    pub apart_level: ApartLevels,
    /// Count-based retention threshold; 0 disables retention and enables
    /// the month-subdirectory layout.
    #[serde(default)]
    pub max_files: usize,
    /// Emit JSON Lines instead of bracketed plain text.
    #[serde(default)]
    pub json: bool,
    /// Allow-list of levels that may be flushed; empty means all levels pass.
    #[serde(default)]
    pub level: Vec<Level>,
    /// Allow-list of access keys; empty means unrestricted.
    #[serde(default)]
    pub allow_key: Vec<String>,
    /// Flush discipline.
    #[serde(default)]
    pub mode: RunMode,
}

impl SinkConfig {
    /// Create a new SinkConfig with defaults
    pub fn new() -> Self {
        Self {
            sink_type: default_sink_type(),
            time_format: None,
            single: SingleFile::default(),
            file_size: default_file_size(),
            path: default_path(),
            apart_level: ApartLevels::default(),
            max_files: 0,
            json: false,
            level: Vec::new(),
            allow_key: Vec::new(),
            mode: RunMode::default(),
        }
    }

    /// Set the sink type
    pub fn with_sink_type(mut self, sink_type: impl Into<String>) -> Self {
        self.sink_type = sink_type.into();
        self
    }

    /// Set the timestamp format
    pub fn with_time_format(mut self, format: impl Into<String>) -> Self {
        self.time_format = Some(format.into());
        self
    }

    /// Enable or disable single-file mode with the default name
    pub fn with_single(mut self, single: bool) -> Self {
        self.single = SingleFile::Flag(single);
        self
    }

    /// Enable single-file mode with a custom name
    pub fn with_single_name(mut self, name: impl Into<String>) -> Self {
        self.single = SingleFile::Name(name.into());
        self
    }

    /// Set the size rotation threshold in bytes
    pub fn with_file_size(mut self, file_size: u64) -> Self {
        self.file_size = file_size;
        self
    }

    /// Set the base directory
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Divert these levels to dedicated per-level files
    pub fn with_apart_levels(mut self, levels: Vec<Level>) -> Self {
        self.apart_level = ApartLevels::Levels(levels);
        self
    }

    /// Divert every level to a dedicated per-level file
    pub fn with_apart_all(mut self) -> Self {
        self.apart_level = ApartLevels::Flag(true);
        self
    }

    /// Set the retention threshold
    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    /// Enable or disable JSON Lines output
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Restrict flushing to these levels
    pub fn with_levels(mut self, levels: Vec<Level>) -> Self {
        self.level = levels;
        self
    }

    /// Restrict flushing to callers holding one of these keys
    pub fn with_allow_keys(mut self, keys: Vec<String>) -> Self {
        self.allow_key = keys;
        self
    }

    /// Set the flush discipline
    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_sink_type() -> String {
    "file".to_string()
}

fn default_file_size() -> u64 {
    2 * 1024 * 1024
}

fn default_path() -> PathBuf {
    std::env::temp_dir()
}
