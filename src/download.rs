use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, SavantError};
use crate::fetch::{retry, RetryPolicy, RetryableFetcher, Sleeper};

/// Downloads one video to a path. Returns the written path, or `None` when
/// there was nothing to download or every attempt failed.
#[async_trait]
pub trait DownloadVideo: Send + Sync {
    async fn download(&self, video_url: Option<&str>, destination: &Path) -> Option<PathBuf>;
}

/// `{game_id}_{play_id}.mp4`, with anything unsafe in a file name replaced
pub fn video_file_name(game_id: u64, play_id: &str) -> String {
    let play_id: String = play_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{}_{}.mp4", game_id, play_id)
}

fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

/// Streams video bodies to disk with the same flat retry policy as page fetches
#[derive(Clone)]
pub struct VideoDownloader {
    client: Client,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl VideoDownloader {
    pub fn new(client: Client, policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            client,
            policy,
            sleeper,
        }
    }

    /// Own client, with the fetcher's retry policy and sleeper.
    ///
    /// Video bodies get a connect timeout and a per-read stall timeout but no
    /// limit on total transfer time.
    pub fn from_fetcher(config: &Config, fetcher: &RetryableFetcher) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.savant.request_timeout_seconds))
            .read_timeout(Duration::from_secs(config.download.stall_timeout_seconds))
            .user_agent(config.savant.user_agent.as_str())
            .build()?;
        Ok(Self::new(client, *fetcher.policy(), fetcher.sleeper()))
    }

    /// Stream into `<destination>.part`, then rename over `destination`
    async fn stream_to_file(&self, video_url: &str, destination: &Path) -> Result<u64> {
        let response = self.client.get(video_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SavantError::Status {
                status: status.as_u16(),
                url: video_url.to_string(),
            });
        }

        let part = part_path(destination);
        let written = match write_body(response, &part).await {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&part).await;
                return Err(e);
            }
        };

        if written == 0 {
            let _ = fs::remove_file(&part).await;
            return Err(SavantError::EmptyDocument(video_url.to_string()));
        }

        if let Err(e) = fs::rename(&part, destination).await {
            let _ = fs::remove_file(&part).await;
            return Err(e.into());
        }
        Ok(written)
    }
}

async fn write_body(response: reqwest::Response, path: &Path) -> Result<u64> {
    let mut file = fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}

#[async_trait]
impl DownloadVideo for VideoDownloader {
    async fn download(&self, video_url: Option<&str>, destination: &Path) -> Option<PathBuf> {
        let video_url = video_url.map(str::trim).filter(|url| !url.is_empty())?;

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(parent).await {
                warn!("Cannot create {}: {}", parent.display(), e);
                return None;
            }
        }

        let attempted = retry(&self.policy, self.sleeper.as_ref(), video_url, || {
            self.stream_to_file(video_url, destination)
        })
        .await;

        match attempted.into_value() {
            Some(bytes) => {
                info!("💾 Saved {} ({} bytes)", destination.display(), bytes);
                Some(destination.to_path_buf())
            }
            None => {
                debug!("Giving up on {}", video_url);
                None
            }
        }
    }
}
