//! Append-only JSON Lines files
//!
//! Every record is one line of compact JSON. A line is serialized before the
//! file lock is taken, then written and flushed as a whole.

use crate::output::traits::{OutputResult, RecordSink};
use serde_json::Value;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// A JSONL file opened for appending
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlSink {
    /// Opens (or creates) the file for appending
    pub fn open(path: impl Into<PathBuf>) -> OutputResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for JsonlSink {
    fn append(&self, record: &Value) -> OutputResult<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Collects the ids already present in a JSONL output file
///
/// Lines that fail to parse or lack a positive integer id are skipped with a
/// warning. A missing file yields an empty set.
pub fn scan_existing_ids(path: &Path, id_field: &str) -> std::io::Result<HashSet<u64>> {
    let mut ids = HashSet::new();
    if !path.exists() {
        return Ok(ids);
    }

    let reader = BufReader::new(File::open(path)?);
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<Value>(line) {
            Ok(record) => match record.get(id_field).and_then(Value::as_u64) {
                Some(id) if id > 0 => {
                    ids.insert(id);
                }
                _ => tracing::debug!("Line {} of {} has no id", index + 1, path.display()),
            },
            Err(e) => {
                tracing::warn!("Invalid line {} in {}: {}", index + 1, path.display(), e);
            }
        }
    }

    tracing::info!("{} existing ids found in {}", ids.len(), path.display());
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_append_writes_one_line_per_record() {
        let dir = TempDir::new().unwrap();
        let sink = JsonlSink::open(dir.path().join("out/details.jsonl")).unwrap();

        sink.append(&json!({"appid": 1, "name": "A"})).unwrap();
        sink.append(&json!({"appid": 2, "name": "B\nwith newline"})).unwrap();

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["name"], json!("B\nwith newline"));
    }

    #[test]
    fn test_reopen_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("details.jsonl");

        JsonlSink::open(&path).unwrap().append(&json!({"appid": 1})).unwrap();
        JsonlSink::open(&path).unwrap().append(&json!({"appid": 2})).unwrap();

        let ids = scan_existing_ids(&path, "appid").unwrap();
        assert_eq!(ids, [1, 2].into_iter().collect());
    }

    #[test]
    fn test_concurrent_appends_do_not_interleave() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(JsonlSink::open(dir.path().join("reviews.jsonl")).unwrap());

        let handles: Vec<_> = (0..8u64)
            .map(|worker| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for n in 0..50u64 {
                        let text = "x".repeat(500);
                        sink.append(&json!({"appid": worker * 1000 + n, "review": text}))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let content = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(content.lines().count(), 400);
        for line in content.lines() {
            serde_json::from_str::<Value>(line).unwrap();
        }
    }

    #[test]
    fn test_scan_skips_bad_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("details.jsonl");
        std::fs::write(
            &path,
            "{\"appid\": 10}\n\nnot json\n{\"appid\": \"11\"}\n{\"other\": 1}\n{\"appid\": 10}\n{\"appid\": 12}\n",
        )
        .unwrap();

        let ids = scan_existing_ids(&path, "appid").unwrap();
        assert_eq!(ids, [10, 12].into_iter().collect());
    }

    #[test]
    fn test_scan_missing_file() {
        let ids = scan_existing_ids(Path::new("/nonexistent/details.jsonl"), "appid").unwrap();
        assert!(ids.is_empty());
    }
}
