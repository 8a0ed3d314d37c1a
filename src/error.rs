//! Error types shared by every stage of the video pipeline

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, SavantError>;

/// Errors raised while resolving and downloading play videos.
///
/// Only `MissingBatters`, `GameMetadataUnavailable` and `NoMatchingPlays` abort
/// a run. Everything else is consumed by the retry loop and turns into an
/// absent result for a single game, play or download.
#[derive(thiserror::Error, Debug)]
pub enum SavantError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("bad response code {status} from {url}")]
    Status { status: u16, url: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("empty document returned from {0}")]
    EmptyDocument(String),

    #[error("scrape error: {0}")]
    Scrape(#[from] ScrapeError),

    #[error("batter data unavailable for game {game_id} (missing {side}_batters)")]
    MissingBatters { game_id: u64, side: &'static str },

    #[error("game metadata for {0} could not be fetched")]
    GameMetadataUnavailable(u64),

    #[error("no requested plays matched the upstream play records")]
    NoMatchingPlays,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Missing pieces of the video page, in the order they are looked up
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("div w/ class=video-box not found in page")]
    ContainerNotFound,

    #[error("video element not found in video container")]
    VideoNotFound,

    #[error("mp4 source not found in video element")]
    SourceNotFound,

    #[error("video source has no src attribute")]
    SrcNotFound,

    #[error("invalid selector: {0}")]
    Selector(String),
}

impl SavantError {
    /// Whether this error ends the whole invocation instead of a single item
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SavantError::MissingBatters { .. }
                | SavantError::GameMetadataUnavailable(_)
                | SavantError::NoMatchingPlays
                | SavantError::Config(_)
        )
    }
}
