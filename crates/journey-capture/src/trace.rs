//! Append-only JSON Lines files
//!
//! Each record is written and flushed on its own so an interrupted run still
//! leaves a valid prefix.

use chrono::Utc;
use journey_core::Result;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Appends one JSON document per line
#[derive(Debug, Clone)]
pub struct JsonlWriter {
    path: PathBuf,
}

impl JsonlWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `record` as a single line
    pub async fn append<T: Serialize + ?Sized>(&self, record: &T) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Lifecycle marker: `{"ts", "event", "step", ...extra}`
    ///
    /// `extra` is merged when it is an object and ignored otherwise.
    pub async fn mark(&self, event: &str, step: Option<&str>, extra: Value) -> Result<()> {
        let mut record = json!({
            "ts": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "event": event,
            "step": step,
        });
        if let (Value::Object(target), Value::Object(extra)) = (&mut record, extra) {
            target.extend(extra);
        }
        self.append(&record).await
    }
}

/// Parse a JSON Lines file, skipping blank and malformed lines
///
/// A missing file reads as empty.
pub fn read_jsonl(path: &Path) -> Vec<Value> {
    let Ok(text) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter(Value::is_object)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_read_back() {
        let temp = tempfile::tempdir().unwrap();
        let writer = JsonlWriter::new(temp.path().join("nested").join("trace.jsonl"));
        writer.append(&json!({"a": 1})).await.unwrap();
        writer
            .mark("goto", Some("SETUP"), json!({"url": "https://x/"}))
            .await
            .unwrap();

        let records = read_jsonl(writer.path());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["a"], 1);
        assert_eq!(records[1]["event"], "goto");
        assert_eq!(records[1]["step"], "SETUP");
        assert_eq!(records[1]["url"], "https://x/");
    }

    #[test]
    fn test_read_skips_garbage() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("t.jsonl");
        std::fs::write(&path, "{\"ok\":true}\n\nnot json\n[1,2]\n{\"ok\":false}").unwrap();
        let records = read_jsonl(&path);
        assert_eq!(records.len(), 2);
        assert!(read_jsonl(&temp.path().join("missing.jsonl")).is_empty());
    }
}
