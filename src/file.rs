use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use time::OffsetDateTime;
use time::format_description::OwnedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

use crate::config::{ApartLevels, RunMode};
use crate::{Entries, Error, Level, Result, Sink, SinkConfig};

/// Separator line written between flushes sharing a file in serve mode.
const FLUSH_SEPARATOR: &str =
    "---------------------------------------------------------------";

/// Sink that writes batches to the filesystem with per-level routing,
/// size-based rotation and count-based retention.
///
/// Destinations are derived from the configuration on every save; there is
/// no persisted rotation state, only the size of the file on disk at write
/// time. Rotation renames and retention deletes are best-effort: their
/// failures are reported via `tracing` and never affect the save outcome.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    single: Option<String>,
    file_size: u64,
    apart_level: ApartLevels,
    max_files: usize,
    json: bool,
    mode: RunMode,
    time_format: Option<OwnedFormatItem>,
}

fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

impl FileSink {
    /// Build a file sink from configuration.
    ///
    /// Fails with [`Error::Config`] when `time_format` is not a valid
    /// `time` format description.
    pub fn new(config: &SinkConfig) -> Result<Self> {
        let time_format = match &config.time_format {
            Some(pattern) => Some(
                time::format_description::parse_owned::<2>(pattern).map_err(|e| {
                    Error::Config(format!("invalid time_format {:?}: {}", pattern, e))
                })?,
            ),
            None => None,
        };

        Ok(Self {
            path: config.path.clone(),
            single: config.single.name().map(str::to_string),
            file_size: config.file_size,
            apart_level: config.apart_level.clone(),
            max_files: config.max_files,
            json: config.json,
            mode: config.mode,
            time_format,
        })
    }

    /// The combined destination receiving all levels not diverted apart.
    fn master_path(&self) -> PathBuf {
        let suffix = self.mode.file_suffix();

        if let Some(name) = &self.single {
            return self.path.join(format!("{name}{suffix}.log"));
        }

        let now = local_now();
        if self.max_files > 0 {
            self.apply_retention();
            let date = now
                .format(format_description!("[year][month][day]"))
                .unwrap_or_default();
            self.path.join(format!("{date}{suffix}.log"))
        } else {
            let month = now
                .format(format_description!("[year][month]"))
                .unwrap_or_default();
            let day = now.format(format_description!("[day]")).unwrap_or_default();
            self.path.join(month).join(format!("{day}{suffix}.log"))
        }
    }

    /// Dedicated destination for a level diverted out of the master file.
    fn apart_path(&self, dir: &Path, level: Level) -> PathBuf {
        let suffix = self.mode.file_suffix();
        let now = local_now();

        let name = if let Some(name) = &self.single {
            name.clone()
        } else if self.max_files > 0 {
            now.format(format_description!("[year][month][day]"))
                .unwrap_or_default()
        } else {
            now.format(format_description!("[day]")).unwrap_or_default()
        };

        dir.join(format!("{name}_{level}{suffix}.log"))
    }

    /// Delete the sorted-first `*.log` file once the directory holds more
    /// than `max_files` of them. One file per save, best-effort.
    fn apply_retention(&self) {
        let Ok(read_dir) = fs::read_dir(&self.path) else {
            return;
        };

        let mut logs: Vec<PathBuf> = read_dir
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "log"))
            .collect();

        if logs.len() <= self.max_files {
            return;
        }

        logs.sort();
        if let Err(err) = fs::remove_file(&logs[0]) {
            tracing::warn!(
                path = %logs[0].display(),
                error = %err,
                "retention delete failed"
            );
        }
    }

    /// Move an oversized destination aside so the next write starts fresh.
    fn rotate_if_oversized(&self, destination: &Path) {
        let Ok(metadata) = destination.metadata() else {
            return;
        };
        if !metadata.is_file() || metadata.len() < self.file_size {
            return;
        }

        let unix_ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let backup = destination.with_file_name(format!("{unix_ts}-{name}"));

        if let Err(err) = fs::rename(destination, &backup) {
            tracing::warn!(
                path = %destination.display(),
                error = %err,
                "size rotation rename failed"
            );
        }
    }

    fn render_timestamp(&self) -> String {
        let now = local_now();
        match &self.time_format {
            Some(fmt) => now.format(fmt),
            None => now.format(&Rfc3339),
        }
        .unwrap_or_default()
    }

    /// Render one record from per-level blocks, in the shape the current
    /// mode and format call for.
    fn render_record(&self, fields: &[(Level, String)]) -> String {
        let timestamp = self.render_timestamp();

        if self.json {
            let mut object = serde_json::Map::new();
            object.insert(
                "timestamp".to_string(),
                serde_json::Value::String(timestamp),
            );
            match self.mode {
                RunMode::Cli => {
                    let joined = fields
                        .iter()
                        .map(|(_, block)| block.as_str())
                        .collect::<Vec<_>>()
                        .join("\n");
                    object.insert("msg".to_string(), serde_json::Value::String(joined));
                }
                RunMode::Serve => {
                    for (level, block) in fields {
                        object.insert(
                            level.as_str().to_string(),
                            serde_json::Value::String(block.clone()),
                        );
                    }
                }
            }
            let mut line = serde_json::Value::Object(object).to_string();
            line.push('\n');
            return line;
        }

        let blocks = fields
            .iter()
            .map(|(_, block)| block.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        match self.mode {
            RunMode::Cli => format!("[{timestamp}]{blocks}\n"),
            RunMode::Serve => format!("{FLUSH_SEPARATOR}\n[{timestamp}]\n{blocks}\n"),
        }
    }

    /// Append one rendered record to `destination`, rotating first if the
    /// file is already over the size threshold.
    fn write_record(&self, fields: &[(Level, String)], destination: &Path) -> bool {
        self.rotate_if_oversized(destination);

        let record = self.render_record(fields);
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(destination)
            .and_then(|mut file| file.write_all(record.as_bytes()));

        match result {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    path = %destination.display(),
                    error = %err,
                    "log write failed"
                );
                false
            }
        }
    }
}

impl Sink for FileSink {
    fn save(&self, entries: &Entries, _append: bool) -> bool {
        let destination = self.master_path();
        let dir = destination.parent().unwrap_or_else(|| Path::new("."));
        if let Err(err) = fs::create_dir_all(dir) {
            tracing::warn!(path = %dir.display(), error = %err, "log directory creation failed");
            return false;
        }

        let mut master: Vec<(Level, String)> = Vec::new();
        let mut ok = true;

        for (level, messages) in entries.iter() {
            let formatted: Vec<String> = messages
                .iter()
                .map(|msg| {
                    if self.json {
                        msg.clone()
                    } else {
                        format!("[ {level} ] {msg}")
                    }
                })
                .collect();
            let block = formatted.join("\n");

            if !self.json && self.apart_level.contains(level) {
                let apart = self.apart_path(dir, level);
                ok &= self.write_record(&[(level, block)], &apart);
            } else {
                master.push((level, block));
            }
        }

        if !master.is_empty() {
            ok &= self.write_record(&master, &destination);
        }

        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today_parts() -> (String, String, String) {
        let now = local_now();
        (
            now.format(format_description!("[year][month]")).unwrap(),
            now.format(format_description!("[day]")).unwrap(),
            now.format(format_description!("[year][month][day]")).unwrap(),
        )
    }

    fn entries(items: &[(Level, &str)]) -> Entries {
        let mut entries = Entries::new();
        for (level, msg) in items {
            entries.push(*level, msg.to_string());
        }
        entries
    }

    #[test]
    fn test_default_layout_writes_month_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(&SinkConfig::new().with_path(dir.path())).unwrap();

        assert!(sink.save(&entries(&[(Level::Log, "hello")]), true));

        let (month, day, _) = today_parts();
        let file = dir.path().join(month).join(format!("{day}_cli.log"));
        let content = fs::read_to_string(&file).unwrap();
        assert!(content.contains("[ log ] hello"));
        assert!(content.starts_with('['), "timestamp should lead the record");
    }

    #[test]
    fn test_single_file_routing() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(
            &SinkConfig::new()
                .with_path(dir.path())
                .with_single_name("app"),
        )
        .unwrap();

        assert!(sink.save(&entries(&[(Level::Error, "boom")]), true));

        let content = fs::read_to_string(dir.path().join("app_cli.log")).unwrap();
        assert!(content.contains("[ error ] boom"));
    }

    #[test]
    fn test_single_flag_uses_literal_name() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(
            &SinkConfig::new().with_path(dir.path()).with_single(true),
        )
        .unwrap();

        assert!(sink.save(&entries(&[(Level::Info, "msg")]), true));
        assert!(dir.path().join("single_cli.log").is_file());
    }

    #[test]
    fn test_max_files_flat_layout_and_retention() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["00000001.log", "00000002.log", "00000003.log"] {
            fs::write(dir.path().join(name), "old\n").unwrap();
        }

        let sink = FileSink::new(
            &SinkConfig::new().with_path(dir.path()).with_max_files(2),
        )
        .unwrap();
        assert!(sink.save(&entries(&[(Level::Log, "fresh")]), true));

        let (_, _, date) = today_parts();
        let todays = dir.path().join(format!("{date}_cli.log"));
        assert!(todays.is_file(), "flat dated file expected, no subdirectory");
        assert!(
            !dir.path().join("00000001.log").exists(),
            "sorted-first log file should have been retired"
        );
        assert!(dir.path().join("00000002.log").exists());
        assert!(dir.path().join("00000003.log").exists());
    }

    #[test]
    fn test_size_rotation_preserves_backup() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(
            &SinkConfig::new()
                .with_path(dir.path())
                .with_single_name("rot")
                .with_file_size(8),
        )
        .unwrap();

        assert!(sink.save(&entries(&[(Level::Log, "first message, long enough")]), true));
        assert!(sink.save(&entries(&[(Level::Log, "second message")]), true));

        let fresh = fs::read_to_string(dir.path().join("rot_cli.log")).unwrap();
        assert!(fresh.contains("second message"));
        assert!(!fresh.contains("first message"));

        let backup = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .find(|name| name.ends_with("-rot_cli.log"))
            .expect("renamed backup should exist");
        let backed_up = fs::read_to_string(dir.path().join(backup)).unwrap();
        assert!(backed_up.contains("first message"));
    }

    #[test]
    fn test_apart_level_routing() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(
            &SinkConfig::new()
                .with_path(dir.path())
                .with_apart_levels(vec![Level::Error, Level::Sql]),
        )
        .unwrap();

        let batch = entries(&[
            (Level::Error, "foo"),
            (Level::Sql, "bar"),
            (Level::Log, "baz"),
        ]);
        assert!(sink.save(&batch, true));

        let (month, day, _) = today_parts();
        let base = dir.path().join(month);

        let error_file = fs::read_to_string(base.join(format!("{day}_error_cli.log"))).unwrap();
        assert!(error_file.contains("[ error ] foo"));

        let sql_file = fs::read_to_string(base.join(format!("{day}_sql_cli.log"))).unwrap();
        assert!(sql_file.contains("[ sql ] bar"));

        let master = fs::read_to_string(base.join(format!("{day}_cli.log"))).unwrap();
        assert!(master.contains("[ log ] baz"));
        assert!(!master.contains("foo"));
        assert!(!master.contains("bar"));
    }

    #[test]
    fn test_serve_mode_separator_and_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(
            &SinkConfig::new()
                .with_path(dir.path())
                .with_single_name("srv")
                .with_mode(RunMode::Serve),
        )
        .unwrap();

        assert!(sink.save(&entries(&[(Level::Notice, "one")]), true));
        assert!(sink.save(&entries(&[(Level::Notice, "two")]), true));

        let content = fs::read_to_string(dir.path().join("srv.log")).unwrap();
        assert_eq!(content.matches(FLUSH_SEPARATOR).count(), 2);
        assert!(content.contains("[ notice ] one"));
        assert!(content.contains("[ notice ] two"));
    }

    #[test]
    fn test_json_cli_record_shape() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(
            &SinkConfig::new()
                .with_path(dir.path())
                .with_single_name("js")
                .with_json(true),
        )
        .unwrap();

        assert!(sink.save(&entries(&[(Level::Log, "payload / with slash")]), true));

        let content = fs::read_to_string(dir.path().join("js_cli.log")).unwrap();
        let line = content.lines().next().unwrap();
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value.get("timestamp").is_some());
        assert_eq!(value["msg"], "payload / with slash");
        // forward slashes stay unescaped on disk
        assert!(line.contains("payload / with slash"));
        // first key is the timestamp
        assert!(line.starts_with("{\"timestamp\""));
    }

    #[test]
    fn test_json_serve_record_uses_level_keys() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(
            &SinkConfig::new()
                .with_path(dir.path())
                .with_single_name("js")
                .with_json(true)
                .with_mode(RunMode::Serve),
        )
        .unwrap();

        let batch = entries(&[(Level::Error, "e1"), (Level::Error, "e2"), (Level::Info, "i1")]);
        assert!(sink.save(&batch, true));

        let content = fs::read_to_string(dir.path().join("js.log")).unwrap();
        let value: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(value["error"], "e1\ne2");
        assert_eq!(value["info"], "i1");
    }

    #[test]
    fn test_json_mode_never_diverts_apart_levels() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(
            &SinkConfig::new()
                .with_path(dir.path())
                .with_single_name("js")
                .with_json(true)
                .with_apart_levels(vec![Level::Error]),
        )
        .unwrap();

        assert!(sink.save(&entries(&[(Level::Error, "kept inline")]), true));
        assert!(dir.path().join("js_cli.log").is_file());
        assert!(!dir.path().join("js_error_cli.log").exists());
    }

    #[test]
    fn test_custom_time_format() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(
            &SinkConfig::new()
                .with_path(dir.path())
                .with_single_name("ts")
                .with_time_format("[year]-[month]-[day]"),
        )
        .unwrap();

        assert!(sink.save(&entries(&[(Level::Log, "x")]), true));

        let content = fs::read_to_string(dir.path().join("ts_cli.log")).unwrap();
        let now = local_now();
        let expected = now
            .format(format_description!("[year]-[month]-[day]"))
            .unwrap();
        assert!(content.starts_with(&format!("[{expected}]")));
    }

    #[test]
    fn test_invalid_time_format_rejected() {
        let err = FileSink::new(&SinkConfig::new().with_time_format("[bogus]")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
