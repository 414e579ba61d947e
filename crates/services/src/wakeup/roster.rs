use super::WakeupError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Agent enrolled in scheduled wakeups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub autonomous_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wakeup_prompt: Option<String>,
}

impl RosterEntry {
    pub fn enabled(agent_id: impl Into<String>, wakeup_prompt: Option<String>) -> Self {
        Self {
            agent_id: Some(agent_id.into()),
            autonomous_enabled: true,
            wakeup_prompt,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RosterFile {
    #[serde(default)]
    agents: Vec<RosterEntry>,
}

/// Read the roster. A missing file is an empty roster.
pub fn load_roster(path: &Path) -> Result<Vec<RosterEntry>, WakeupError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No agent roster found");
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    let roster: RosterFile = serde_json::from_str(&content)?;
    Ok(roster.agents)
}

/// Replace the roster file with `agents`.
pub fn save_roster(path: &Path, agents: Vec<RosterEntry>) -> Result<usize, WakeupError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let count = agents.len();
    let content = serde_json::to_string_pretty(&RosterFile { agents })?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), count, "Saved agent roster");
    Ok(count)
}
