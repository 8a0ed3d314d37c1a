//! Single requests against the Savant site with a flat retry policy.
//!
//! Every request is retried up to `max_attempts` times with the same fixed
//! delay between attempts. When the budget is spent the caller gets an absent
//! value back instead of an error, so one bad play or game page never takes
//! the rest of a run down with it.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::{Config, RetryConfig};
use crate::error::{Result, SavantError};

/// Something that can wait between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real wall-clock waiting
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Fixed number of attempts with a constant delay between them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            delay: config.delay(),
        }
    }
}

/// Result of a retried operation plus the error seen on each failed attempt
#[derive(Debug)]
pub struct Attempted<T> {
    pub value: Option<T>,
    pub failures: Vec<String>,
}

impl<T> Attempted<T> {
    pub fn into_value(self) -> Option<T> {
        self.value
    }

    pub fn attempts(&self) -> usize {
        self.failures.len() + usize::from(self.value.is_some())
    }
}

/// Run `op` until it succeeds or the policy's attempts are used up.
///
/// Each failure is logged against `target`. The delay is slept only between
/// attempts, never after the last one.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    target: &str,
    mut op: F,
) -> Attempted<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut failures = Vec::new();

    for attempt in 1..=policy.max_attempts {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("Succeeded on attempt {} for '{}'", attempt, target);
                }
                return Attempted {
                    value: Some(value),
                    failures,
                };
            }
            Err(e) => {
                warn!(
                    "Error: '{}' occurred on attempt {}/{} for '{}'",
                    e, attempt, policy.max_attempts, target
                );
                failures.push(e.to_string());
                if attempt < policy.max_attempts {
                    sleeper.sleep(policy.delay).await;
                }
            }
        }
    }

    Attempted {
        value: None,
        failures,
    }
}

/// The two upstream pages, each addressed by one identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// `gf?game_pk={game_id}`, JSON
    GameFeed,
    /// `sporty-videos?playId={play_id}`, HTML
    VideoPage,
}

impl Endpoint {
    fn path(self) -> &'static str {
        match self {
            Endpoint::GameFeed => "gf",
            Endpoint::VideoPage => "sporty-videos",
        }
    }

    fn query_key(self) -> &'static str {
        match self {
            Endpoint::GameFeed => "game_pk",
            Endpoint::VideoPage => "playId",
        }
    }
}

/// HTTP client that retries every request under one policy
#[derive(Clone)]
pub struct RetryableFetcher {
    client: Client,
    base_url: Url,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryableFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.savant.request_timeout_seconds))
            .user_agent(config.savant.user_agent.as_str())
            .build()?;

        let mut base_url = Url::parse(&config.savant.base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            policy: RetryPolicy::from(&config.retry),
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replace the sleeper used between attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn sleeper(&self) -> Arc<dyn Sleeper> {
        Arc::clone(&self.sleeper)
    }

    /// Substitute `id` into the endpoint's URL template
    pub fn url_for(&self, endpoint: Endpoint, id: &str) -> Result<Url> {
        let mut url = self.base_url.join(endpoint.path())?;
        url.query_pairs_mut().append_pair(endpoint.query_key(), id);
        Ok(url)
    }

    /// Fetch and decode a JSON document, retrying on any failure including an
    /// empty or `null` body
    pub async fn fetch_json(&self, endpoint: Endpoint, id: &str) -> Result<Attempted<Value>> {
        self.fetch_with(endpoint, id, parse_json_document).await
    }

    /// Fetch an HTML page and run `extract` over it. An `Err` from `extract`
    /// counts as a failed attempt.
    pub async fn fetch_html<T, F>(&self, endpoint: Endpoint, id: &str, extract: F) -> Result<Attempted<T>>
    where
        F: Fn(&str) -> Result<T>,
    {
        self.fetch_with(endpoint, id, extract).await
    }

    async fn fetch_with<T, F>(&self, endpoint: Endpoint, id: &str, parse: F) -> Result<Attempted<T>>
    where
        F: Fn(&str) -> Result<T>,
    {
        let url = self.url_for(endpoint, id)?;
        let url = &url;
        let parse = &parse;

        Ok(retry(&self.policy, self.sleeper.as_ref(), url.as_str(), || async move {
            let body = self.get_text(url).await?;
            parse(&body)
        })
        .await)
    }

    async fn get_text(&self, url: &Url) -> Result<String> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SavantError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = response.text().await?;
        debug!("📄 Downloaded {} characters from {}", body.len(), url);
        Ok(body)
    }
}

fn parse_json_document(raw: &str) -> Result<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(SavantError::EmptyDocument("response body".to_string()));
    }

    let value: Value = serde_json::from_str(trimmed)?;
    let empty = match &value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if empty {
        return Err(SavantError::EmptyDocument("response body".to_string()));
    }
    Ok(value)
}
