//! Video page scraping: play id -> direct MP4 URL

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::error::ScrapeError;
use crate::fetch::{Endpoint, RetryableFetcher};
use crate::models::VideoLink;

/// Resolves a play id to its video URL. Failures come back as a link
/// without a URL, never as an error.
#[async_trait]
pub trait ResolveVideo: Send + Sync {
    async fn resolve(&self, play_id: &str) -> VideoLink;
}

fn selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|e| ScrapeError::Selector(format!("{}: {:?}", css, e)))
}

/// Walk `div.video-box` -> `video` -> `source[type="video/mp4"]` -> `src`.
///
/// A missing element is an error so the page gets fetched again; an empty
/// `src` is a final answer of "no video".
pub fn extract_video_src(html: &str) -> Result<Option<String>, ScrapeError> {
    let document = Html::parse_document(html);

    let container_selector = selector("div.video-box")?;
    let video_selector = selector("video")?;
    let source_selector = selector(r#"source[type="video/mp4"]"#)?;

    let container = document
        .select(&container_selector)
        .next()
        .ok_or(ScrapeError::ContainerNotFound)?;
    let video = container
        .select(&video_selector)
        .next()
        .ok_or(ScrapeError::VideoNotFound)?;
    let source = video
        .select(&source_selector)
        .next()
        .ok_or(ScrapeError::SourceNotFound)?;
    let src = source
        .value()
        .attr("src")
        .ok_or(ScrapeError::SrcNotFound)?
        .trim();

    if src.is_empty() {
        Ok(None)
    } else {
        Ok(Some(src.to_string()))
    }
}

/// Scrapes `sporty-videos` pages through the retrying fetcher
#[derive(Clone)]
pub struct VideoSourceResolver {
    fetcher: RetryableFetcher,
}

impl VideoSourceResolver {
    pub fn new(fetcher: RetryableFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl ResolveVideo for VideoSourceResolver {
    async fn resolve(&self, play_id: &str) -> VideoLink {
        let attempted = self
            .fetcher
            .fetch_html(Endpoint::VideoPage, play_id, |html| {
                extract_video_src(html).map_err(Into::into)
            })
            .await;

        match attempted {
            Ok(attempted) => match attempted.into_value().flatten() {
                Some(url) => {
                    debug!("🎬 Resolved {} -> {}", play_id, url);
                    VideoLink::found(play_id, url)
                }
                None => {
                    debug!("No playable source for {}", play_id);
                    VideoLink::missing(play_id)
                }
            },
            Err(e) => {
                warn!("Could not build video page URL for {}: {}", play_id, e);
                VideoLink::missing(play_id)
            }
        }
    }
}
