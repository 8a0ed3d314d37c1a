//! End-to-end entry points: plays of interest in, video files out

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::config::Config;
use crate::download::VideoDownloader;
use crate::error::{Result, SavantError};
use crate::fetch::{RetryableFetcher, Sleeper};
use crate::join::{dedupe_records, distinct_games, filter_by_sv_ids, join_plays};
use crate::metadata::GameMetadataResolver;
use crate::models::{PlayOfInterest, ResolvedPlay};
use crate::processing::{CoordinatorOutcome, PipelineCoordinator, PoolSizing};
use crate::video_source::VideoSourceResolver;

/// Summary of one run. Only the video files themselves are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    /// Plays (or game records) asked for
    pub requested: usize,
    /// Plays matched to an upstream play id
    pub resolved: usize,
    /// Resolved plays whose page yielded a video URL
    pub with_video_url: usize,
    pub files: Vec<PathBuf>,
}

impl PipelineReport {
    pub fn downloaded(&self) -> usize {
        self.files.len()
    }
}

/// Game metadata lookup, join, and the two concurrent phases
pub struct VideoPipeline {
    metadata: GameMetadataResolver,
    coordinator: PipelineCoordinator,
}

impl VideoPipeline {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let fetcher = RetryableFetcher::new(config)?;
        Self::from_fetcher(config, fetcher)
    }

    /// Same as `new` but waits between retries with `sleeper`
    pub fn with_sleeper(config: &Config, sleeper: Arc<dyn Sleeper>) -> Result<Self> {
        config.validate()?;
        let fetcher = RetryableFetcher::new(config)?.with_sleeper(sleeper);
        Self::from_fetcher(config, fetcher)
    }

    fn from_fetcher(config: &Config, fetcher: RetryableFetcher) -> Result<Self> {
        let downloader = VideoDownloader::from_fetcher(config, &fetcher)?;
        let coordinator = PipelineCoordinator::new(
            Arc::new(VideoSourceResolver::new(fetcher.clone())),
            Arc::new(downloader),
            PoolSizing::from(&config.performance),
            config.download.output_dir.clone(),
        );
        Ok(Self::from_parts(GameMetadataResolver::new(fetcher), coordinator))
    }

    pub fn from_parts(metadata: GameMetadataResolver, coordinator: PipelineCoordinator) -> Self {
        Self {
            metadata,
            coordinator,
        }
    }

    /// Download video for specific pitches.
    ///
    /// Fails if any requested game cannot be read or if no request matches an
    /// upstream play. Plays whose video cannot be found or downloaded are
    /// simply missing from the report.
    pub async fn run(&self, plays: &[PlayOfInterest]) -> Result<PipelineReport> {
        let started_at = Utc::now();
        let start = Instant::now();

        let games = distinct_games(plays);
        info!("🚀 Fetching video for {} plays across {} games", plays.len(), games.len());

        let records = self.metadata.resolve_games(games).await?;
        let resolved = join_plays(plays, &records);
        if resolved.is_empty() {
            return Err(SavantError::NoMatchingPlays);
        }

        let resolved_count = resolved.len();
        let outcome = self.coordinator.run(resolved).await;
        Ok(report(started_at, start, plays.len(), resolved_count, outcome))
    }

    /// Download video for every pitch of one game, optionally only those
    /// whose `sv_id` is listed
    pub async fn run_game(&self, game_id: u64, sv_ids: Option<&[String]>) -> Result<PipelineReport> {
        let started_at = Utc::now();
        let start = Instant::now();

        info!("🚀 Fetching video for game {}", game_id);
        let records = self.metadata.resolve_records(game_id).await?;
        let records = dedupe_records(filter_by_sv_ids(records, sv_ids));
        if records.is_empty() {
            return Err(SavantError::NoMatchingPlays);
        }

        let resolved: Vec<ResolvedPlay> = records.iter().map(ResolvedPlay::from).collect();
        let requested = sv_ids.map_or(resolved.len(), <[String]>::len);
        let resolved_count = resolved.len();
        let outcome = self.coordinator.run(resolved).await;
        Ok(report(started_at, start, requested, resolved_count, outcome))
    }
}

fn report(
    started_at: DateTime<Utc>,
    start: Instant,
    requested: usize,
    resolved: usize,
    outcome: CoordinatorOutcome,
) -> PipelineReport {
    let report = PipelineReport {
        started_at,
        elapsed: start.elapsed(),
        requested,
        resolved,
        with_video_url: outcome.with_video_url(),
        files: outcome.downloaded.into_iter().map(|video| video.path).collect(),
    };
    info!(
        "🎉 Downloaded {} of {} resolved plays in {:.2}s",
        report.downloaded(),
        report.resolved,
        report.elapsed.as_secs_f64()
    );
    report
}
