//! Reads per-session log files back into records.

use regex::Regex;
use std::io;
use std::path::Path;
use tracker_core::error::{Result, TrackerError};
use tracker_core::record::LogRecord;
use walkdir::WalkDir;

/// Scans a log directory for session log files.
pub struct LogLoader {
    file_pattern: Regex,
}

impl LogLoader {
    /// Loader for files named `<digits>-<6 hex chars>.<extension>`.
    pub fn new(extension: &str) -> Result<Self> {
        let pattern = format!(r"^\d+-[a-f0-9]{{6}}\.{}$", regex::escape(extension));
        let file_pattern = Regex::new(&pattern)
            .map_err(|e| TrackerError::Config(format!("invalid log file pattern: {e}")))?;
        Ok(Self { file_pattern })
    }

    pub fn matches(&self, file_name: &str) -> bool {
        self.file_pattern.is_match(file_name)
    }

    /// Load every record from matching files, sorted by timestamp.
    ///
    /// Records with equal timestamps keep their file order. Malformed lines
    /// are skipped. A missing directory yields no records.
    pub fn load(&self, dir: &Path) -> Result<Vec<LogRecord>> {
        if !dir.is_dir() {
            tracing::warn!(path = %dir.display(), "Log directory not found");
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let mut files = 0usize;
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if !self.matches(name) {
                continue;
            }

            let contents = match std::fs::read(entry.path()) {
                Ok(contents) => contents,
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), "Failed to read log file: {e}");
                    continue;
                }
            };
            records.extend(parse_lines(&contents, entry.path()));
            files += 1;
        }

        records.sort_by_key(LogRecord::timestamp);
        tracing::debug!(files, records = records.len(), "Loaded session logs");
        Ok(records)
    }
}

fn parse_lines(contents: &[u8], path: &Path) -> Vec<LogRecord> {
    let mut records = Vec::new();
    for (index, raw) in contents.split(|b| *b == b'\n').enumerate() {
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim(),
            Err(e) => {
                tracing::debug!(
                    path = %path.display(),
                    line = index + 1,
                    "Skipping non-UTF-8 log line: {e}"
                );
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<LogRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => tracing::debug!(
                path = %path.display(),
                line = index + 1,
                "Skipping malformed log line: {e}"
            ),
        }
    }
    records
}

/// Load all session logs with the given extension from `dir`.
pub fn load_logs(dir: &Path, extension: &str) -> Result<Vec<LogRecord>> {
    LogLoader::new(extension)?.load(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn line(value: serde_json::Value) -> String {
        format!("{value}\n")
    }

    fn start(session_id: &str, timestamp: i64) -> String {
        line(json!({"type": "session_start", "session_id": session_id, "timestamp": timestamp}))
    }

    #[test]
    fn test_file_name_pattern() {
        let loader = LogLoader::new("log").unwrap();
        assert!(loader.matches("1700000000000-a1b2c3.log"));
        assert!(!loader.matches("1700000000000-A1B2C3.log"));
        assert!(!loader.matches("1700000000000-a1b2c.log"));
        assert!(!loader.matches("ses_a1b2c3.log"));
        assert!(!loader.matches("1700000000000-a1b2c3.log.bak"));
        assert!(!loader.matches("1700000000000-a1b2c3.jsonl"));

        let jsonl = LogLoader::new("jsonl").unwrap();
        assert!(jsonl.matches("1-abcdef.jsonl"));
    }

    #[test]
    fn test_load_merges_and_sorts() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("100-aaaaaa.log"),
            start("ses_aaaaaa", 300) + &start("ses_aaaaaa", 100),
        )
        .unwrap();
        fs::write(dir.path().join("200-bbbbbb.log"), start("ses_bbbbbb", 200)).unwrap();
        fs::write(dir.path().join("notes.txt"), start("ses_cccccc", 50)).unwrap();

        let records = load_logs(dir.path(), "log").unwrap();
        let stamps: Vec<i64> = records.iter().map(LogRecord::timestamp).collect();
        assert_eq!(stamps, vec![100, 200, 300]);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let contents = start("ses_aaaaaa", 1)
            + "{not json\n"
            + "\n"
            + &line(json!({"type": "token_usage", "timestamp": 2}))
            + &start("ses_aaaaaa", 3);
        fs::write(dir.path().join("1-aaaaaa.log"), contents).unwrap();

        let records = load_logs(dir.path(), "log").unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.windows(2).all(|w| w[0].timestamp() <= w[1].timestamp()));
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("1-aaaaaa.log"), start("ses_aaaaaa", 1)).unwrap();
        let mut contents = b"\xff\xfe garbage\n".to_vec();
        contents.extend_from_slice(start("ses_bbbbbb", 2).as_bytes());
        fs::write(dir.path().join("2-bbbbbb.log"), contents).unwrap();

        let records = load_logs(dir.path(), "log").unwrap();
        let stamps: Vec<i64> = records.iter().map(LogRecord::timestamp).collect();
        assert_eq!(stamps, vec![1, 2]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let dir = TempDir::new().unwrap();
        let contents = start("ses_aaaaaa", 1).replace('\n', "\r\n");
        fs::write(dir.path().join("1-aaaaaa.log"), contents).unwrap();

        assert_eq!(load_logs(dir.path(), "log").unwrap().len(), 1);
    }

    #[test]
    fn test_equal_timestamps_keep_file_order() {
        let dir = TempDir::new().unwrap();
        let contents = start("ses_aaaaaa", 5)
            + &line(json!({"type": "event", "session_id": "ses_aaaaaa", "event_type": "x", "properties": {}, "timestamp": 5}));
        fs::write(dir.path().join("5-aaaaaa.log"), contents).unwrap();

        let records = load_logs(dir.path(), "log").unwrap();
        assert_eq!(records[0].record_type(), "session_start");
        assert_eq!(records[1].record_type(), "event");
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let records = load_logs(&dir.path().join("nope"), "log").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_subdirectories_are_not_scanned() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("1-aaaaaa.log");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("2-bbbbbb.log"), start("ses_bbbbbb", 2)).unwrap();

        assert!(load_logs(dir.path(), "log").unwrap().is_empty());
    }
}
