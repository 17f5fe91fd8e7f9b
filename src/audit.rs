//! Audit log of rejected requests and model failures.
//!
//! Entries are `{controller, level, message, timestamp}`. Writes are
//! best-effort: [`record`] logs a failed write and moves on. Without a
//! configured file the service keeps a bounded in-memory window.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

/// Severity of an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditLevel {
    /// Informational.
    Info,
    /// Degraded but served.
    Warning,
    /// Request rejected.
    Error,
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Component that wrote the entry.
    pub controller: String,
    /// Severity.
    pub level: AuditLevel,
    /// Human-readable message.
    pub message: String,
    /// When the entry was written.
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    /// Build an entry stamped with the current time.
    pub fn new(controller: &str, level: AuditLevel, message: impl Into<String>) -> Self {
        Self {
            controller: controller.to_string(),
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Append-only audit sink.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append `entry`.
    async fn append(&self, entry: AuditEntry) -> std::io::Result<()>;
}

/// Append `entry` to `log`, logging instead of failing on error.
pub async fn record(log: &dyn AuditLog, entry: AuditEntry) {
    let controller = entry.controller.clone();
    if let Err(e) = log.append(entry).await {
        warn!(controller = %controller, error = %e, "audit write failed");
    }
}

/// Entries a [`MemoryAuditLog`] keeps by default.
pub const DEFAULT_MEMORY_CAPACITY: usize = 1024;

/// Audit log kept in memory, holding at most `capacity` of the most recent
/// entries.
#[derive(Debug)]
pub struct MemoryAuditLog {
    capacity: usize,
    entries: Mutex<VecDeque<AuditEntry>>,
}

impl Default for MemoryAuditLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_CAPACITY)
    }
}

impl MemoryAuditLog {
    /// Create an empty log with [`DEFAULT_MEMORY_CAPACITY`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty log that keeps the last `capacity` entries.
    ///
    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
        }
    }

    /// Maximum number of entries retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy of the retained entries, oldest first.
    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().await.iter().cloned().collect()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(&self, entry: AuditEntry) -> std::io::Result<()> {
        let mut entries = self.entries.lock().await;
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
        Ok(())
    }
}

/// Audit log appended to a JSON-lines file.
#[derive(Debug)]
pub struct JsonlAuditLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlAuditLog {
    /// Append to the file at `path`, creating it on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// File being written.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditLog for JsonlAuditLog {
    async fn append(&self, entry: AuditEntry) -> std::io::Result<()> {
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');
        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_log_keeps_entries_in_order() {
        let log = MemoryAuditLog::new();
        record(&log, AuditEntry::new("predict", AuditLevel::Error, "first")).await;
        record(&log, AuditEntry::new("predict", AuditLevel::Warning, "second")).await;
        let entries = log.entries().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "first");
        assert_eq!(entries[1].level, AuditLevel::Warning);
    }

    #[tokio::test]
    async fn test_memory_log_drops_oldest_past_capacity() {
        let log = MemoryAuditLog::with_capacity(3);
        for i in 0..10 {
            record(&log, AuditEntry::new("predict", AuditLevel::Error, format!("e{i}"))).await;
        }
        let entries = log.entries().await;
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, "e7");
        assert_eq!(entries[2].message, "e9");
    }

    #[tokio::test]
    async fn test_default_memory_log_is_bounded() {
        let log = MemoryAuditLog::new();
        assert_eq!(log.capacity(), DEFAULT_MEMORY_CAPACITY);
        for _ in 0..DEFAULT_MEMORY_CAPACITY + 5 {
            record(&log, AuditEntry::new("predict", AuditLevel::Error, "bad")).await;
        }
        assert_eq!(log.entries().await.len(), DEFAULT_MEMORY_CAPACITY);
    }

    #[tokio::test]
    async fn test_jsonl_log_appends_lines() {
        let dir = tempfile::tempdir().expect("test: tempdir");
        let log = JsonlAuditLog::new(dir.path().join("audit.jsonl"));
        record(&log, AuditEntry::new("predict", AuditLevel::Error, "bad rate group")).await;
        record(&log, AuditEntry::new("predict/cost", AuditLevel::Error, "no model")).await;

        let content = std::fs::read_to_string(log.path()).expect("test: read");
        let lines: Vec<AuditEntry> = content
            .lines()
            .map(|l| serde_json::from_str(l).expect("test: parse line"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].controller, "predict/cost");
        assert!(content.contains("\"level\":\"ERROR\""));
    }

    #[tokio::test]
    async fn test_unwritable_path_does_not_fail_record() {
        let log = JsonlAuditLog::new("/definitely/not/here/audit.jsonl");
        record(&log, AuditEntry::new("predict", AuditLevel::Error, "lost")).await;
    }
}
