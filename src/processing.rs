use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};

use crate::config::PerformanceConfig;
use crate::download::{video_file_name, DownloadVideo};
use crate::models::{ResolvedPlay, VideoLink};
use crate::video_source::ResolveVideo;

/// Absolute cap on in-flight requests per phase
pub const MAX_WORKERS: usize = 16;

/// Workers allowed per available CPU
pub const PARALLELISM_MULTIPLIER: usize = 4;

/// Worker pool sizing shared by both phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSizing {
    pub max_workers: usize,
    pub parallelism_multiplier: usize,
    pub available_parallelism: usize,
}

impl PoolSizing {
    /// `min(max_workers, item_count, available_parallelism * multiplier)`
    pub fn size(&self, item_count: usize) -> usize {
        let relative = self
            .available_parallelism
            .max(1)
            .saturating_mul(self.parallelism_multiplier.max(1));
        self.max_workers.max(1).min(item_count).min(relative)
    }
}

impl Default for PoolSizing {
    fn default() -> Self {
        Self {
            max_workers: MAX_WORKERS,
            parallelism_multiplier: PARALLELISM_MULTIPLIER,
            available_parallelism: num_cpus::get(),
        }
    }
}

impl From<&PerformanceConfig> for PoolSizing {
    fn from(config: &PerformanceConfig) -> Self {
        Self {
            max_workers: config.max_workers,
            parallelism_multiplier: config.parallelism_multiplier,
            available_parallelism: config.available_parallelism,
        }
    }
}

/// Pool size for `item_count` items on a host with `available_parallelism` CPUs
pub fn pool_size(item_count: usize, available_parallelism: usize) -> usize {
    PoolSizing {
        available_parallelism,
        ..PoolSizing::default()
    }
    .size(item_count)
}

/// Progress shared by every worker of a run
#[derive(Debug, Clone)]
pub struct Progress {
    completed: Arc<AtomicUsize>,
    total: usize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            completed: Arc::new(AtomicUsize::new(0)),
            total,
        }
    }

    /// Count one finished unit of work
    pub fn advance(&self, label: &str) -> usize {
        let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("[{}/{}] {}", done, self.total, label);
        done
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.completed() as f64 / self.total as f64 * 100.0
    }
}

/// A play whose video made it to disk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadedVideo {
    pub play: ResolvedPlay,
    pub path: PathBuf,
}

/// Everything both phases produced for one batch
#[derive(Debug, Clone, Default)]
pub struct CoordinatorOutcome {
    /// Every submitted play paired with its own resolution result
    pub links: Vec<(ResolvedPlay, VideoLink)>,
    pub downloaded: Vec<DownloadedVideo>,
}

impl CoordinatorOutcome {
    pub fn with_video_url(&self) -> usize {
        self.links
            .iter()
            .filter(|(_, link)| link.video_url.is_some())
            .count()
    }
}

/// Runs the resolve and download phases over bounded worker pools
#[derive(Clone)]
pub struct PipelineCoordinator {
    resolver: Arc<dyn ResolveVideo>,
    downloader: Arc<dyn DownloadVideo>,
    sizing: PoolSizing,
    output_dir: PathBuf,
}

impl PipelineCoordinator {
    pub fn new(
        resolver: Arc<dyn ResolveVideo>,
        downloader: Arc<dyn DownloadVideo>,
        sizing: PoolSizing,
        output_dir: PathBuf,
    ) -> Self {
        info!("🔧 Initializing coordinator (at most {} workers per phase)", sizing.max_workers);
        Self {
            resolver,
            downloader,
            sizing,
            output_dir,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn sizing(&self) -> PoolSizing {
        self.sizing
    }

    /// Resolve every play, drop those without a URL, download the rest.
    ///
    /// Progress runs over `2 * plays.len()` units for the whole call, so it
    /// stops short of 100% when some resolutions fail.
    pub async fn run(&self, plays: Vec<ResolvedPlay>) -> CoordinatorOutcome {
        let progress = Progress::new(plays.len() * 2);

        let links = self.resolve_all(plays, &progress).await;
        info!(
            "🔎 Resolve phase done: {}/{} ({:.1}%)",
            progress.completed(),
            progress.total(),
            progress.percent()
        );

        let downloadable: Vec<(ResolvedPlay, String)> = links
            .iter()
            .filter_map(|(play, link)| link.video_url.clone().map(|url| (play.clone(), url)))
            .collect();

        let dropped = links.len() - downloadable.len();
        if dropped > 0 {
            warn!("{} plays have no video URL and will be skipped", dropped);
        }

        if downloadable.is_empty() {
            info!("Nothing to download");
            return CoordinatorOutcome {
                links,
                downloaded: Vec::new(),
            };
        }

        let downloaded = self.download_all(downloadable, &progress).await;
        info!(
            "📥 Download phase done: {}/{} ({:.1}%)",
            progress.completed(),
            progress.total(),
            progress.percent()
        );

        CoordinatorOutcome { links, downloaded }
    }

    /// Phase 1. Results arrive in completion order, each paired with the
    /// play it was submitted for.
    pub async fn resolve_all(
        &self,
        plays: Vec<ResolvedPlay>,
        progress: &Progress,
    ) -> Vec<(ResolvedPlay, VideoLink)> {
        let workers = self.sizing.size(plays.len());
        if workers == 0 {
            return Vec::new();
        }
        info!("🔎 Resolving {} video pages with {} workers", plays.len(), workers);

        let semaphore = Arc::new(Semaphore::new(workers));
        let (tx, mut rx) = mpsc::channel(workers);
        let submitted = plays.len();

        for play in plays {
            let resolver = Arc::clone(&self.resolver);
            let semaphore = Arc::clone(&semaphore);
            let tx = tx.clone();

            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };
                let link = resolver.resolve(&play.play_id).await;
                if let Err(e) = tx.send((play, link)).await {
                    error!("Failed to send resolve result: {}", e);
                }
            });
        }

        // Channel closes once every task has dropped its sender
        drop(tx);

        let mut results = Vec::with_capacity(submitted);
        while let Some((play, link)) = rx.recv().await {
            progress.advance(&play.play_id);
            if link.play_id != play.play_id {
                warn!(
                    "Resolver answered {} for play {}; treating as unresolved",
                    link.play_id, play.play_id
                );
                let missing = VideoLink::missing(play.play_id.clone());
                results.push((play, missing));
                continue;
            }
            results.push((play, link));
        }

        if results.len() != submitted {
            error!("{} resolve tasks did not report back", submitted - results.len());
        }
        results
    }

    /// Phase 2, sized against the rows that survived filtering
    pub async fn download_all(
        &self,
        rows: Vec<(ResolvedPlay, String)>,
        progress: &Progress,
    ) -> Vec<DownloadedVideo> {
        let workers = self.sizing.size(rows.len());
        if workers == 0 {
            return Vec::new();
        }
        info!("📥 Downloading {} videos with {} workers", rows.len(), workers);

        let semaphore = Arc::new(Semaphore::new(workers));
        let (tx, mut rx) = mpsc::channel(workers);

        for (play, url) in rows {
            let downloader = Arc::clone(&self.downloader);
            let semaphore = Arc::clone(&semaphore);
            let tx = tx.clone();
            let destination = self
                .output_dir
                .join(video_file_name(play.game_id(), &play.play_id));

            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };
                let saved = downloader.download(Some(url.as_str()), &destination).await;
                if let Err(e) = tx.send((play, saved)).await {
                    error!("Failed to send download result: {}", e);
                }
            });
        }

        drop(tx);

        let mut downloaded = Vec::new();
        while let Some((play, saved)) = rx.recv().await {
            progress.advance(&play.play_id);
            match saved {
                Some(path) => downloaded.push(DownloadedVideo { play, path }),
                None => warn!("❌ Download failed for play {}", play.play_id),
            }
        }
        downloaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlayOfInterest;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Answers after a per-play delay so completions arrive out of order
    struct DelayedResolver {
        missing: Vec<String>,
    }

    #[async_trait]
    impl ResolveVideo for DelayedResolver {
        async fn resolve(&self, play_id: &str) -> VideoLink {
            let n: u64 = play_id.trim_start_matches("play-").parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis((n * 37) % 23)).await;
            if self.missing.iter().any(|m| m == play_id) {
                VideoLink::missing(play_id)
            } else {
                VideoLink::found(play_id, format!("https://cdn.test/{}.mp4", play_id))
            }
        }
    }

    /// Records what it was asked to write instead of touching the network
    #[derive(Default)]
    struct RecordingDownloader {
        calls: Mutex<HashMap<PathBuf, String>>,
    }

    #[async_trait]
    impl DownloadVideo for RecordingDownloader {
        async fn download(&self, video_url: Option<&str>, destination: &Path) -> Option<PathBuf> {
            let url = video_url?;
            self.calls
                .lock()
                .unwrap()
                .insert(destination.to_path_buf(), url.to_string());
            Some(destination.to_path_buf())
        }
    }

    fn plays(count: usize) -> Vec<ResolvedPlay> {
        (0..count)
            .map(|i| ResolvedPlay {
                play: PlayOfInterest::new(775302, 1 + (i as u32 / 10), i as u32, 1),
                play_id: format!("play-{}", i),
                sv_id: None,
            })
            .collect()
    }

    fn coordinator(missing: Vec<String>, downloader: Arc<RecordingDownloader>, dir: &Path) -> PipelineCoordinator {
        PipelineCoordinator::new(
            Arc::new(DelayedResolver { missing }),
            downloader,
            PoolSizing {
                max_workers: 16,
                parallelism_multiplier: 4,
                available_parallelism: 2,
            },
            dir.to_path_buf(),
        )
    }

    #[test]
    fn test_pool_size() {
        assert_eq!(pool_size(3, 16), 3);
        assert_eq!(pool_size(1000, 4), 16);
        assert_eq!(pool_size(1000, 2), 8);
        assert_eq!(pool_size(0, 8), 0);
        assert_eq!(pool_size(5, 0), 4);
    }

    #[test]
    fn test_progress_counts() {
        let progress = Progress::new(4);
        progress.advance("a");
        let clone = progress.clone();
        clone.advance("b");
        assert_eq!(progress.completed(), 2);
        assert_eq!(progress.percent(), 50.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_results_attributed_to_their_play() {
        let temp_dir = TempDir::new().unwrap();
        let downloader = Arc::new(RecordingDownloader::default());
        let coordinator = coordinator(Vec::new(), Arc::clone(&downloader), temp_dir.path());

        let progress = Progress::new(100);
        let links = coordinator.resolve_all(plays(50), &progress).await;

        assert_eq!(links.len(), 50);
        assert_eq!(progress.completed(), 50);
        for (play, link) in &links {
            assert_eq!(link.play_id, play.play_id);
            assert_eq!(
                link.video_url.as_deref(),
                Some(format!("https://cdn.test/{}.mp4", play.play_id).as_str())
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_missing_urls_are_not_downloaded() {
        let temp_dir = TempDir::new().unwrap();
        let downloader = Arc::new(RecordingDownloader::default());
        let missing = vec!["play-3".to_string(), "play-7".to_string()];
        let coordinator = coordinator(missing, Arc::clone(&downloader), temp_dir.path());

        let outcome = coordinator.run(plays(10)).await;

        assert_eq!(outcome.links.len(), 10);
        assert_eq!(outcome.with_video_url(), 8);
        assert_eq!(outcome.downloaded.len(), 8);

        let calls = downloader.calls.lock().unwrap();
        assert_eq!(calls.len(), 8);
        for (path, url) in calls.iter() {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            let play_id = name.trim_start_matches("775302_").trim_end_matches(".mp4");
            assert_eq!(url, &format!("https://cdn.test/{}.mp4", play_id));
            assert_ne!(play_id, "play-3");
            assert_ne!(play_id, "play-7");
        }
    }

    #[tokio::test]
    async fn test_all_missing_ends_without_downloads() {
        let temp_dir = TempDir::new().unwrap();
        let downloader = Arc::new(RecordingDownloader::default());
        let missing = vec!["play-0".to_string(), "play-1".to_string()];
        let coordinator = coordinator(missing, Arc::clone(&downloader), temp_dir.path());

        let outcome = coordinator.run(plays(2)).await;
        assert_eq!(outcome.links.len(), 2);
        assert!(outcome.downloaded.is_empty());
        assert!(downloader.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let temp_dir = TempDir::new().unwrap();
        let coordinator = coordinator(Vec::new(), Arc::default(), temp_dir.path());
        let outcome = coordinator.run(Vec::new()).await;
        assert!(outcome.links.is_empty());
        assert!(outcome.downloaded.is_empty());
    }
}
