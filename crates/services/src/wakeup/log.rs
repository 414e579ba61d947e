use super::WakeupError;
use crate::agents::AgentMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs::OpenOptions,
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

const SUMMARY_MESSAGES: usize = 3;
const SUMMARY_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSummary {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// One line of an agent's wakeup log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WakeupLogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub response_count: usize,
    pub messages: Vec<MessageSummary>,
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

impl WakeupLogEntry {
    pub fn from_response(timestamp: DateTime<Utc>, response: &[AgentMessage]) -> Self {
        let messages = response
            .iter()
            .take(SUMMARY_MESSAGES)
            .map(|message| {
                let mut summary = MessageSummary {
                    message_type: if message.message_type.is_empty() {
                        "unknown".to_string()
                    } else {
                        message.message_type.clone()
                    },
                    content: None,
                    reasoning: None,
                };
                match message.message_type.as_str() {
                    "assistant_message" => {
                        summary.content =
                            Some(truncate(&message.text().unwrap_or_default(), SUMMARY_CHARS));
                    }
                    "reasoning_message" => {
                        summary.reasoning = Some(truncate(
                            message.reasoning.as_deref().unwrap_or_default(),
                            SUMMARY_CHARS,
                        ));
                    }
                    _ => {}
                }
                summary
            })
            .collect();

        Self {
            timestamp,
            entry_type: "wakeup".to_string(),
            response_count: response.len(),
            messages,
        }
    }
}

/// Per-agent JSONL files under one directory.
#[derive(Debug, Clone)]
pub struct WakeupLog {
    dir: PathBuf,
}

impl WakeupLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Agent ids are used as file names; anything outside `[A-Za-z0-9_-]` becomes `_`.
    pub fn path_for(&self, agent_id: &str) -> PathBuf {
        let file_stem: String = agent_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file_stem}.jsonl"))
    }

    pub fn append(&self, agent_id: &str, entry: &WakeupLogEntry) -> Result<(), WakeupError> {
        std::fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(agent_id))?;
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Last `limit` entries, oldest first.
    pub fn recent(&self, agent_id: &str, limit: usize) -> Result<Vec<WakeupLogEntry>, WakeupError> {
        let path = self.path_for(agent_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(std::fs::File::open(path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }

        let skip = entries.len().saturating_sub(limit);
        Ok(entries.split_off(skip))
    }
}
