use super::DigestError;
use config::BlueskyConfig;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedItem {
    #[serde(default)]
    pub post: Post,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub author: Author,
    #[serde(default)]
    pub record: PostRecord,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Deserialize)]
struct AuthorFeed {
    #[serde(default)]
    feed: Vec<FeedItem>,
}

/// Unauthenticated client for public Bluesky author feeds.
pub struct BlueskyClient {
    client: reqwest::Client,
    api_base: String,
    limit: u32,
    filter: String,
}

impl BlueskyClient {
    pub fn new(config: &BlueskyConfig) -> Result<Self, DigestError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| DigestError::Fetch(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            limit: config.default_limit,
            filter: config.default_filter.clone(),
        })
    }

    /// Most recent top-level posts for `handle`.
    pub async fn author_feed(&self, handle: &str) -> Result<Vec<FeedItem>, DigestError> {
        let url = format!("{}/app.bsky.feed.getAuthorFeed", self.api_base);
        let limit = self.limit.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("actor", handle),
                ("limit", limit.as_str()),
                ("filter", self.filter.as_str()),
            ])
            .send()
            .await
            .map_err(|e| DigestError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DigestError::Fetch(format!("{status}: {body}")));
        }

        let feed: AuthorFeed = response
            .json()
            .await
            .map_err(|e| DigestError::Fetch(format!("invalid feed response: {e}")))?;
        Ok(feed.feed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_author_feed_query() {
        let server = MockServer::start_async().await;
        let feed_mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/xrpc/app.bsky.feed.getAuthorFeed")
                    .query_param("actor", "void.comind.network")
                    .query_param("limit", "20")
                    .query_param("filter", "posts_no_replies");
                then.status(200).json_body(serde_json::json!({
                    "feed": [{
                        "post": {
                            "uri": "at://did:plc:abc/app.bsky.feed.post/3kxyz",
                            "author": {"handle": "void.comind.network", "displayName": "Void"},
                            "record": {"text": "Hello", "createdAt": "2025-12-30T07:00:00.000Z"}
                        }
                    }],
                    "cursor": "next"
                }));
            })
            .await;

        let client = BlueskyClient::new(&BlueskyConfig {
            api_base: server.url("/xrpc"),
            ..BlueskyConfig::default()
        })
        .unwrap();
        let feed = client.author_feed("void.comind.network").await.unwrap();

        feed_mock.assert_async().await;
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].post.author.display_name.as_deref(), Some("Void"));
        assert_eq!(feed[0].post.record.text.as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn test_author_feed_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/xrpc/app.bsky.feed.getAuthorFeed");
                then.status(400).body("Profile not found");
            })
            .await;

        let client = BlueskyClient::new(&BlueskyConfig {
            api_base: server.url("/xrpc"),
            ..BlueskyConfig::default()
        })
        .unwrap();
        let err = client.author_feed("nobody.test").await.unwrap_err();
        assert!(err.to_string().contains("Profile not found"));
    }
}
