pub mod bluesky;

pub use bluesky::{BlueskyClient, FeedItem};

use crate::agents::{AgentBackend, AgentError, MessageRole};
use chrono::{DateTime, Duration, Utc};
use config::{DigestConfig, FeedSource};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("{0}")]
    Fetch(String),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error("Look-back window must be a positive number of hours, got {0}")]
    InvalidWindow(i64),
}

/// Markdown for one post: author line, text, date and web link.
pub fn format_post(item: &FeedItem) -> String {
    let post = &item.post;
    let handle = if post.author.handle.is_empty() {
        "unknown"
    } else {
        post.author.handle.as_str()
    };
    let display_name = post
        .author
        .display_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .unwrap_or(handle);
    let text = post.record.text.as_deref().unwrap_or("[no text]");
    let date = post
        .record
        .created_at
        .as_deref()
        .filter(|created| !created.is_empty())
        .map(|created| created.chars().take(10).collect::<String>())
        .unwrap_or_else(|| "unknown date".to_string());

    format!(
        "**{display_name}** (@{handle})\n{text}\n[{date}] {}",
        web_url(&post.uri, handle)
    )
}

/// `at://did/app.bsky.feed.post/<id>` to `https://bsky.app/profile/<handle>/post/<id>`.
pub fn web_url(uri: &str, handle: &str) -> String {
    if !uri.contains("/app.bsky.feed.post/") {
        return String::new();
    }
    match uri.rsplit('/').next() {
        Some(post_id) if !post_id.is_empty() => {
            format!("https://bsky.app/profile/{handle}/post/{post_id}")
        }
        _ => String::new(),
    }
}

/// Posts at or after `cutoff`. Posts with a missing or unparseable date are kept.
pub fn filter_recent(items: &[FeedItem], cutoff: DateTime<Utc>) -> Vec<&FeedItem> {
    items
        .iter()
        .filter(|item| {
            let Some(created) = item.post.record.created_at.as_deref() else {
                return true;
            };
            match DateTime::parse_from_rfc3339(created) {
                Ok(time) => time.with_timezone(&Utc) >= cutoff,
                Err(_) => true,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceSection {
    pub source: FeedSource,
    pub posts: Vec<String>,
    pub error: Option<String>,
}

impl SourceSection {
    fn heading(&self) -> String {
        format!("## {} (@{})", self.source.description, self.source.handle)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Digest {
    pub generated_at: DateTime<Utc>,
    pub since_hours: i64,
    pub sections: Vec<SourceSection>,
}

impl Digest {
    pub fn total_posts(&self) -> usize {
        self.sections.iter().map(|s| s.posts.len()).sum()
    }

    pub fn to_markdown(&self) -> String {
        let mut lines = vec![
            "# Daily Digest".to_string(),
            format!(
                "Generated: {}",
                self.generated_at.format("%Y-%m-%dT%H:%M:%S%.6fZ")
            ),
            format!("Looking back: {} hours", self.since_hours),
            format!("Total new posts: {}", self.total_posts()),
            String::new(),
        ];

        for section in &self.sections {
            lines.push(section.heading());
            if let Some(error) = &section.error {
                lines.push(format!("Error fetching @{}: {error}", section.source.handle));
                lines.push(String::new());
            } else if section.posts.is_empty() {
                lines.push("_No new posts_".to_string());
            } else {
                for post in &section.posts {
                    lines.push(post.clone());
                    lines.push(String::new());
                }
            }
            lines.push(String::new());
        }

        lines.join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered {
        agent_id: String,
        response_count: usize,
    },
    DryRun,
}

/// Fetch, filter and format posts from the configured sources.
pub struct DigestService {
    client: BlueskyClient,
    config: DigestConfig,
}

impl DigestService {
    pub fn new(config: DigestConfig) -> Result<Self, DigestError> {
        Ok(Self {
            client: BlueskyClient::new(&config.bluesky)?,
            config,
        })
    }

    pub fn config(&self) -> &DigestConfig {
        &self.config
    }

    pub async fn generate(&self, since_hours: Option<i64>) -> Result<Digest, DigestError> {
        self.generate_at(Utc::now(), since_hours).await
    }

    /// Build a digest as of `now`. Fetch failures become per-source error lines.
    pub async fn generate_at(
        &self,
        now: DateTime<Utc>,
        since_hours: Option<i64>,
    ) -> Result<Digest, DigestError> {
        let since_hours = since_hours.unwrap_or(self.config.digest.since_hours);
        let cutoff = Duration::try_hours(since_hours)
            .filter(|_| since_hours > 0)
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or(DigestError::InvalidWindow(since_hours))?;

        let mut sections = Vec::with_capacity(self.config.bluesky.sources.len());
        for source in &self.config.bluesky.sources {
            let section = match self.client.author_feed(&source.handle).await {
                Ok(feed) => SourceSection {
                    source: source.clone(),
                    posts: filter_recent(&feed, cutoff)
                        .into_iter()
                        .map(format_post)
                        .collect(),
                    error: None,
                },
                Err(e) => {
                    warn!(handle = %source.handle, error = %e, "Failed to fetch feed");
                    SourceSection {
                        source: source.clone(),
                        posts: Vec::new(),
                        error: Some(e.to_string()),
                    }
                }
            };
            sections.push(section);
        }

        Ok(Digest {
            generated_at: now,
            since_hours,
            sections,
        })
    }

    /// Send the digest to `agent_id` as a user message; without a target this is a dry run.
    pub async fn deliver(
        &self,
        backend: Option<&dyn AgentBackend>,
        agent_id: Option<&str>,
        digest: &Digest,
    ) -> Result<DeliveryOutcome, DigestError> {
        let (Some(backend), Some(agent_id)) = (backend, agent_id.filter(|id| !id.is_empty()))
        else {
            info!(
                total_posts = digest.total_posts(),
                "No delivery target configured, digest not sent"
            );
            return Ok(DeliveryOutcome::DryRun);
        };

        let response = backend
            .send_message(agent_id, MessageRole::User, &digest.to_markdown())
            .await?;
        info!(agent_id, total_posts = digest.total_posts(), "Digest delivered");

        Ok(DeliveryOutcome::Delivered {
            agent_id: agent_id.to_string(),
            response_count: response.len(),
        })
    }
}
