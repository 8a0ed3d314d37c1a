/// Savant Video - pitch video retrieval for Baseball Savant
///
/// Resolves requested pitches to the site's play ids through per-game
/// metadata, scrapes each play's video page for its MP4 source, and downloads
/// the files over bounded worker pools.

pub mod config;
pub mod download;
pub mod error;
pub mod fetch;
pub mod join;
pub mod metadata;
pub mod models;
pub mod pipeline;
pub mod processing;
pub mod video_source;

// Re-export main types for easy access
pub use crate::config::{Config, ConfigBuilder};
pub use crate::download::{video_file_name, DownloadVideo, VideoDownloader};
pub use crate::error::{Result, SavantError, ScrapeError};
pub use crate::fetch::{RetryPolicy, RetryableFetcher, Sleeper, TokioSleeper};
pub use crate::join::{dedupe_records, join_plays};
pub use crate::metadata::{GameMetadata, GameMetadataResolver};
pub use crate::models::{PlayOfInterest, PlayRecord, ResolvedPlay, VideoLink};
pub use crate::pipeline::{PipelineReport, VideoPipeline};
pub use crate::processing::{pool_size, PipelineCoordinator, PoolSizing, Progress};
pub use crate::video_source::{ResolveVideo, VideoSourceResolver};
