use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Severity/category tag attached to every log entry.
///
/// Levels are categories rather than a strict ordering: `sql` entries are
/// not "more severe" than `info` entries, they are just routed and
/// filtered independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// General log output.
    Log,
    /// Error conditions.
    Error,
    /// Informational messages.
    Info,
    /// SQL query traces.
    Sql,
    /// Notices worth surfacing.
    Notice,
    /// Alerts that demand attention.
    Alert,
    /// Debug output.
    Debug,
}

impl Level {
    /// All known levels, in their conventional order.
    pub const ALL: [Level; 7] = [
        Level::Log,
        Level::Error,
        Level::Info,
        Level::Sql,
        Level::Notice,
        Level::Alert,
        Level::Debug,
    ];

    /// The lowercase tag used in file names and record prefixes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Log => "log",
            Level::Error => "error",
            Level::Info => "info",
            Level::Sql => "sql",
            Level::Notice => "notice",
            Level::Alert => "alert",
            Level::Debug => "debug",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "log" => Ok(Level::Log),
            "error" => Ok(Level::Error),
            "info" => Ok(Level::Info),
            "sql" => Ok(Level::Sql),
            "notice" => Ok(Level::Notice),
            "alert" => Ok(Level::Alert),
            "debug" => Ok(Level::Debug),
            other => Err(Error::UnknownLevel(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_as_str_round_trip() {
        for level in Level::ALL {
            assert_eq!(level.as_str().parse::<Level>().unwrap(), level);
        }
    }

    #[test]
    fn test_level_display_matches_as_str() {
        assert_eq!(Level::Sql.to_string(), "sql");
        assert_eq!(Level::Error.to_string(), "error");
    }

    #[test]
    fn test_level_from_str_unknown() {
        let err = "fatal".parse::<Level>().unwrap_err();
        assert!(err.to_string().contains("fatal"));
    }

    #[test]
    fn test_level_serde_lowercase() {
        let levels: Vec<Level> = serde_yaml::from_str("[error, sql]").unwrap();
        assert_eq!(levels, vec![Level::Error, Level::Sql]);

        let yaml = serde_yaml::to_string(&Level::Notice).unwrap();
        assert_eq!(yaml.trim(), "notice");
    }
}
