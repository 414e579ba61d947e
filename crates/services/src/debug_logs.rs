use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, path::PathBuf};
use tokio::{io::AsyncWriteExt, sync::RwLock};
use utoipa::ToSchema;

#[derive(Debug, thiserror::Error)]
pub enum DebugLogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Client-side log line shipped by the browser frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DebugLogEntry {
    pub timestamp: String,
    pub category: String,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct FileRecord<'a> {
    received_at: DateTime<Utc>,
    session_id: Option<&'a str>,
    #[serde(flatten)]
    entry: &'a DebugLogEntry,
}

/// Entries kept in memory; older ones survive only in the file.
pub const MAX_BUFFERED_ENTRIES: usize = 1000;

/// Bounded buffer of recent frontend logs, mirrored in full to a JSONL file.
pub struct DebugLogStore {
    entries: RwLock<VecDeque<DebugLogEntry>>,
    limit: usize,
    file: PathBuf,
}

impl DebugLogStore {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self::with_limit(file, MAX_BUFFERED_ENTRIES)
    }

    /// Store that buffers at most `limit` entries, dropping the oldest first.
    pub fn with_limit(file: impl Into<PathBuf>, limit: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(limit.min(MAX_BUFFERED_ENTRIES))),
            limit,
            file: file.into(),
        }
    }

    /// Buffer `logs` and append one file line per entry tagged with the receive time.
    pub async fn append(
        &self,
        logs: Vec<DebugLogEntry>,
        session_id: Option<&str>,
    ) -> Result<usize, DebugLogError> {
        let received_at = Utc::now();
        let mut lines = String::new();
        for entry in &logs {
            let record = FileRecord {
                received_at,
                session_id,
                entry,
            };
            lines.push_str(&serde_json::to_string(&record)?);
            lines.push('\n');
        }

        if let Some(parent) = self.file.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file)
            .await?;
        file.write_all(lines.as_bytes()).await?;

        let count = logs.len();
        let mut entries = self.entries.write().await;
        entries.extend(logs);
        let overflow = entries.len().saturating_sub(self.limit);
        entries.drain(..overflow);
        drop(entries);
        tracing::debug!(count, session_id = ?session_id, "Stored frontend debug logs");
        Ok(count)
    }

    pub async fn entries(&self) -> Vec<DebugLogEntry> {
        self.entries.read().await.iter().cloned().collect()
    }

    /// Raw lines of the log file; a missing file reads as empty.
    pub async fn file_lines(&self) -> Result<Vec<String>, DebugLogError> {
        match tokio::fs::read_to_string(&self.file).await {
            Ok(content) => Ok(content
                .lines()
                .map(|line| line.trim().to_string())
                .filter(|line| !line.is_empty())
                .collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}
