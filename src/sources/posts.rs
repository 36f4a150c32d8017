//! # Posts poller: new posts of a social API become feed events.
//!
//! Each tick performs `GET <endpoint>?limit=<n>` with a bearer credential and
//! expects `{"posts": [{"id": .., "title": ..}, ..]}`, newest first.
//!
//! ## Outcomes per tick
//! ```text
//! 200 + posts    → one `post` event per post newer than the last-seen id
//!                  (recorded oldest first, so the newest ends on top)
//! 429            → one `rate_limit` event, no posts
//! timeout        → one `error` event "API timeout"
//! anything else  → one `error` event "Fetch error: <reason>"
//! ```
//! The next tick always happens at the normal interval.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::{ActivitySource, TickOutcome};
use crate::error::FetchError;
use crate::feed::{EventFeed, FeedEvent};

const TITLE_CHARS: usize = 60;
const ERROR_CHARS: usize = 50;

/// Connection settings of a [`PostsSource`].
#[derive(Clone, Debug)]
pub struct PostsConfig {
    /// Feed `source` name of recorded events.
    pub name: String,
    /// Posts listing endpoint.
    pub endpoint: String,
    /// Prefix of the public URL of a post; the id is appended.
    pub post_url_base: String,
    /// Bearer credential.
    pub api_key: String,
    /// Page size requested per tick.
    pub limit: u32,
    /// Request timeout.
    pub timeout: Duration,
}

impl PostsConfig {
    /// Moltbook defaults with the given credential.
    pub fn moltbook(api_key: impl Into<String>) -> Self {
        Self {
            name: "moltbook".to_string(),
            endpoint: "https://www.moltbook.com/api/v1/posts".to_string(),
            post_url_base: "https://www.moltbook.com/post".to_string(),
            api_key: api_key.into(),
            limit: 10,
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PostsPage {
    #[serde(default)]
    posts: Vec<Post>,
}

#[derive(Debug, Deserialize)]
struct Post {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    title: Option<String>,
}

impl Post {
    /// Id as a string; numeric ids are accepted too.
    fn id(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Polls the posts endpoint and records posts not seen before.
pub struct PostsSource {
    client: Client,
    cfg: PostsConfig,
    last_seen: Option<String>,
}

impl PostsSource {
    pub fn new(cfg: PostsConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            cfg,
            last_seen: None,
        })
    }

    /// Id of the newest post recorded so far.
    pub fn last_seen(&self) -> Option<&str> {
        self.last_seen.as_deref()
    }

    async fn fetch(&self) -> Result<Vec<Post>, FetchError> {
        let resp = self
            .client
            .get(&self.cfg.endpoint)
            .bearer_auth(&self.cfg.api_key)
            .query(&[("limit", self.cfg.limit)])
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        match resp.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(FetchError::RateLimited),
            s if !s.is_success() => return Err(FetchError::Status(s.as_u16())),
            _ => {}
        }

        let page: PostsPage = resp.json().await.map_err(|e| self.classify(e))?;
        Ok(page.posts)
    }

    fn classify(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.cfg.timeout)
        } else if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else {
            FetchError::Transport(e.to_string())
        }
    }

    /// Records posts newer than `last_seen`, oldest first; returns how many.
    fn record_new(&mut self, posts: &[Post], feed: &EventFeed) -> usize {
        let fresh: Vec<(String, &Post)> = posts
            .iter()
            .filter_map(|p| p.id().map(|id| (id, p)))
            .take_while(|(id, _)| self.last_seen.as_deref() != Some(id.as_str()))
            .collect();

        for (id, post) in fresh.iter().rev() {
            let title: String = post
                .title
                .as_deref()
                .unwrap_or("untitled")
                .chars()
                .take(TITLE_CHARS)
                .collect();
            let url = format!("{}/{}", self.cfg.post_url_base.trim_end_matches('/'), id);
            feed.record(
                FeedEvent::new(&self.cfg.name, "post", format!("New post: {title}"))
                    .with_metadata("post_id", id.as_str())
                    .with_metadata("url", url),
            );
        }

        if let Some((newest, _)) = fresh.first() {
            self.last_seen = Some(newest.clone());
        }
        fresh.len()
    }
}

#[async_trait]
impl ActivitySource for PostsSource {
    fn name(&self) -> &str {
        &self.cfg.name
    }

    async fn tick(&mut self, feed: &EventFeed) -> TickOutcome {
        match self.fetch().await {
            Ok(posts) => match self.record_new(&posts, feed) {
                0 => TickOutcome::Idle,
                n => TickOutcome::Recorded(n),
            },
            Err(FetchError::RateLimited) => {
                feed.push(&self.cfg.name, "rate_limit", "Rate limited — cooling down", None);
                TickOutcome::RateLimited
            }
            Err(e @ FetchError::Timeout(_)) => {
                feed.push(&self.cfg.name, "error", "API timeout", None);
                TickOutcome::Failed(e)
            }
            Err(e) => {
                let reason: String = e.to_string().chars().take(ERROR_CHARS).collect();
                feed.push(&self.cfg.name, "error", format!("Fetch error: {reason}"), None);
                TickOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::GET;
    use httpmock::MockServer;
    use serde_json::json;

    fn source_for(server: &MockServer) -> PostsSource {
        PostsSource::new(PostsConfig {
            endpoint: server.url("/api/v1/posts"),
            timeout: Duration::from_millis(300),
            ..PostsConfig::moltbook("test-key")
        })
        .unwrap()
    }

    fn kinds(feed: &EventFeed) -> Vec<String> {
        feed.recent(100).iter().map(|e| e.kind().to_string()).collect()
    }

    #[tokio::test]
    async fn test_new_posts_recorded_oldest_first() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v1/posts")
                    .query_param("limit", "10")
                    .header("authorization", "Bearer test-key");
                then.status(200).json_body(json!({
                    "posts": [
                        { "id": "p3", "title": "third" },
                        { "id": "p2" },
                        { "id": "p1", "title": "x".repeat(80) }
                    ]
                }));
            })
            .await;

        let feed = EventFeed::new(50);
        let mut source = source_for(&server);
        let outcome = source.tick(&feed).await;

        mock.assert_async().await;
        assert_eq!(outcome.recorded(), 3);
        assert_eq!(source.last_seen(), Some("p3"));

        let events = feed.recent(10);
        assert_eq!(events[0].message(), "New post: third");
        assert_eq!(events[1].message(), "New post: untitled");
        assert_eq!(events[2].message(), format!("New post: {}", "x".repeat(60)));
        assert_eq!(events[0].metadata()["post_id"], "p3");
        assert_eq!(events[0].metadata()["url"], "https://www.moltbook.com/post/p3");
    }

    #[tokio::test]
    async fn test_already_seen_posts_are_skipped() {
        let server = MockServer::start_async().await;
        let mut first = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/posts");
                then.status(200)
                    .json_body(json!({ "posts": [{ "id": "p2" }, { "id": "p1" }] }));
            })
            .await;

        let feed = EventFeed::new(50);
        let mut source = source_for(&server);
        assert_eq!(source.tick(&feed).await.recorded(), 2);
        first.delete_async().await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/posts");
                then.status(200).json_body(json!({
                    "posts": [{ "id": 4, "title": "four" }, { "id": "p2" }, { "id": "p1" }]
                }));
            })
            .await;

        assert_eq!(source.tick(&feed).await.recorded(), 1);
        assert_eq!(source.last_seen(), Some("4"));
        assert_eq!(feed.recent(1)[0].message(), "New post: four");

        assert!(matches!(source.tick(&feed).await, TickOutcome::Idle));
        assert_eq!(feed.len(), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_records_one_cooling_down_event() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/posts");
                then.status(429)
                    .json_body(json!({ "posts": [{ "id": "p1", "title": "hidden" }] }));
            })
            .await;

        let feed = EventFeed::new(50);
        let mut source = source_for(&server);
        let outcome = source.tick(&feed).await;

        assert!(matches!(outcome, TickOutcome::RateLimited));
        assert_eq!(kinds(&feed), ["rate_limit"]);
        assert_eq!(feed.recent(1)[0].message(), "Rate limited — cooling down");
        assert!(source.last_seen().is_none());
    }

    #[tokio::test]
    async fn test_timeout_records_api_timeout() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/posts");
                then.status(200)
                    .delay(Duration::from_secs(2))
                    .json_body(json!({ "posts": [] }));
            })
            .await;

        let feed = EventFeed::new(50);
        let outcome = source_for(&server).tick(&feed).await;

        assert!(matches!(outcome, TickOutcome::Failed(FetchError::Timeout(_))));
        assert_eq!(feed.recent(1)[0].message(), "API timeout");
    }

    #[tokio::test]
    async fn test_malformed_body_and_server_error_are_error_events() {
        let server = MockServer::start_async().await;
        let mut bad = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/posts");
                then.status(200).body("<html>not json</html>");
            })
            .await;

        let feed = EventFeed::new(50);
        let mut source = source_for(&server);
        assert!(matches!(
            source.tick(&feed).await,
            TickOutcome::Failed(FetchError::Decode(_))
        ));
        bad.delete_async().await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/posts");
                then.status(503);
            })
            .await;
        assert!(matches!(
            source.tick(&feed).await,
            TickOutcome::Failed(FetchError::Status(503))
        ));

        assert_eq!(kinds(&feed), ["error", "error"]);
        assert_eq!(feed.recent(1)[0].message(), "Fetch error: HTTP 503");
        assert!(feed.recent(2)[1].message().starts_with("Fetch error: malformed response"));
        assert!(feed.recent(2)[1].message().chars().count() <= "Fetch error: ".len() + 50);
    }
}
