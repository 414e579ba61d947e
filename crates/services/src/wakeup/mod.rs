pub mod log;
pub mod roster;

pub use log::{MessageSummary, WakeupLog, WakeupLogEntry};
pub use roster::{load_roster, save_roster, RosterEntry};

use crate::agents::{AgentBackend, AgentError, AgentMessage, MessageRole};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{path::PathBuf, sync::Arc};
use tracing::{info, warn};

pub const DEFAULT_WAKEUP_PROMPT: &str = "[AUTONOMOUS WAKEUP - {timestamp}]

You are waking up for your periodic autonomous check. Review your memory and consider:
1. Do you have any pending tasks or reminders?
2. Is there anything you should check on or follow up with?
3. Any actions you should take based on your goals?

If you have nothing to do, simply acknowledge this wakeup and wait for the next one.
Respond briefly with what you checked and any actions taken.";

#[derive(Debug, thiserror::Error)]
pub enum WakeupError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Agent(#[from] AgentError),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WakeupFailure {
    pub agent_id: String,
    pub error: String,
}

/// Outcome of one scheduled pass over the roster.
#[derive(Debug, Clone, Serialize)]
pub struct WakeupReport {
    pub timestamp: DateTime<Utc>,
    pub agents_processed: usize,
    pub agents_skipped: usize,
    pub errors: Vec<WakeupFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WakeupResult {
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    pub response: Vec<AgentMessage>,
}

/// Fill `{timestamp}` in a wakeup prompt.
pub fn render_prompt(template: &str, now: DateTime<Utc>) -> String {
    template.replace("{timestamp}", &now.format("%Y-%m-%d %H:%M UTC").to_string())
}

/// Periodic autonomous wakeups for the agents in the roster.
pub struct WakeupService {
    backend: Arc<dyn AgentBackend>,
    roster_path: PathBuf,
    log: WakeupLog,
}

impl WakeupService {
    pub fn new(
        backend: Arc<dyn AgentBackend>,
        roster_path: impl Into<PathBuf>,
        log_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend,
            roster_path: roster_path.into(),
            log: WakeupLog::new(log_dir),
        }
    }

    pub fn from_config(backend: Arc<dyn AgentBackend>, config: &config::SchedulerConfig) -> Self {
        Self::new(backend, config.roster_path(), config.logs_dir())
    }

    /// Wake every enabled agent. Per-agent failures are collected, never fatal.
    pub async fn run_all(&self) -> Result<WakeupReport, WakeupError> {
        let roster = load_roster(&self.roster_path)?;
        let mut report = WakeupReport {
            timestamp: Utc::now(),
            agents_processed: 0,
            agents_skipped: 0,
            errors: Vec::new(),
        };

        for entry in roster {
            let Some(agent_id) = entry.agent_id.filter(|id| !id.is_empty()) else {
                continue;
            };

            if !entry.autonomous_enabled {
                report.agents_skipped += 1;
                continue;
            }

            let template = entry
                .wakeup_prompt
                .as_deref()
                .unwrap_or(DEFAULT_WAKEUP_PROMPT);
            let prompt = render_prompt(template, Utc::now());

            match self.wake(&agent_id, &prompt).await {
                Ok(_) => report.agents_processed += 1,
                Err(e) => {
                    warn!(agent_id = %agent_id, error = %e, "Agent wakeup failed");
                    report.errors.push(WakeupFailure {
                        agent_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            processed = report.agents_processed,
            skipped = report.agents_skipped,
            errors = report.errors.len(),
            "Wakeup complete"
        );
        Ok(report)
    }

    /// One-off wakeup; `prompt` is sent verbatim when given.
    pub async fn wake_once(
        &self,
        agent_id: &str,
        prompt: Option<&str>,
    ) -> Result<WakeupResult, WakeupError> {
        let prompt = match prompt {
            Some(prompt) => prompt.to_string(),
            None => render_prompt(DEFAULT_WAKEUP_PROMPT, Utc::now()),
        };
        let response = self.wake(agent_id, &prompt).await?;
        Ok(WakeupResult {
            agent_id: agent_id.to_string(),
            timestamp: Utc::now(),
            response,
        })
    }

    async fn wake(&self, agent_id: &str, prompt: &str) -> Result<Vec<AgentMessage>, WakeupError> {
        let response = self
            .backend
            .send_message(agent_id, MessageRole::System, prompt)
            .await?;
        let entry = WakeupLogEntry::from_response(Utc::now(), &response);
        self.log.append(agent_id, &entry)?;
        Ok(response)
    }

    pub fn init_roster(&self, agents: Vec<RosterEntry>) -> Result<usize, WakeupError> {
        save_roster(&self.roster_path, agents)
    }

    pub fn roster(&self) -> Result<Vec<RosterEntry>, WakeupError> {
        load_roster(&self.roster_path)
    }

    pub fn recent_logs(
        &self,
        agent_id: &str,
        limit: usize,
    ) -> Result<Vec<WakeupLogEntry>, WakeupError> {
        self.log.recent(agent_id, limit)
    }
}
