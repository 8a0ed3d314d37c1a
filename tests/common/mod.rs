//! In-process stand-in for the Savant site.
//!
//! Serves `/gf?game_pk=`, `/sporty-videos?playId=` and `/videos/{play_id}.mp4`
//! over plain HTTP/1.1, one thread per connection, closing after each reply.
//! Video bodies can be dripped out slowly or fail a set number of times.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// How a play's video page looks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    /// Container, video and MP4 source pointing at `/videos/{play_id}.mp4`
    Mp4,
    /// Container without a video element
    NoVideo,
    /// MP4 source with an empty `src`
    EmptySrc,
}

#[derive(Debug, Default)]
pub struct Site {
    pub games: HashMap<u64, Value>,
    pub pages: HashMap<String, Page>,
    /// Leading 500 responses per play page before it behaves normally
    pub page_failures: HashMap<String, usize>,
    /// Leading 500 responses for every game feed
    pub game_failures: usize,
    /// Random-looking per-play delay on video pages
    pub jitter: bool,
    /// Prefix written into every video body
    pub body_prefix: String,
    /// Leading 500 responses per video file before it is served
    pub video_failures: HashMap<String, usize>,
    /// Video files served as `200 OK` with no bytes
    pub empty_videos: HashSet<String>,
    /// Serve video bodies in eight pieces with this pause after each
    pub drip: Option<Duration>,
}

pub struct FakeSavant {
    pub base_url: String,
    site: Arc<Mutex<Site>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl FakeSavant {
    pub fn start(site: Site) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let site = Arc::new(Mutex::new(site));
        let hits = Arc::new(Mutex::new(HashMap::new()));

        let server_site = Arc::clone(&site);
        let server_hits = Arc::clone(&hits);
        let server_base = base_url.clone();
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let site = Arc::clone(&server_site);
                let hits = Arc::clone(&server_hits);
                let base = server_base.clone();
                thread::spawn(move || handle(stream, &site, &hits, &base));
            }
        });

        Self { base_url, site, hits }
    }

    /// Requests seen for an exact path and query, e.g. `/gf?game_pk=1`
    pub fn hits(&self, target: &str) -> usize {
        self.hits.lock().unwrap().get(target).copied().unwrap_or(0)
    }

    pub fn update(&self, f: impl FnOnce(&mut Site)) {
        f(&mut self.site.lock().unwrap());
    }
}

/// Bytes served for a play's video
pub fn video_body(prefix: &str, play_id: &str) -> Vec<u8> {
    format!("{}mp4-bytes-for:{}", prefix, play_id).repeat(64).into_bytes()
}

/// Game feed with one home batter per entry in `plays`
/// (`(inning, ab_number, pitch_number, play_id, sv_id)`)
pub fn game_feed(game_id: u64, plays: &[(u32, u32, u32, &str, &str)]) -> Value {
    let entries: Vec<Value> = plays
        .iter()
        .map(|(inning, ab, pitch, play_id, sv_id)| {
            json!({
                "game_pk": game_id,
                "inning": inning,
                "ab_number": ab,
                "pitch_number": pitch,
                "play_id": play_id,
                "sv_id": sv_id,
            })
        })
        .collect();
    json!({
        "game_pk": game_id,
        "home_batters": {"100": entries},
        "away_batters": {},
    })
}

fn handle(
    mut stream: TcpStream,
    site: &Mutex<Site>,
    hits: &Mutex<HashMap<String, usize>>,
    base: &str,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let Some(target) = read_target(&mut stream) else {
        return;
    };

    let hit = {
        let mut hits = hits.lock().unwrap();
        let count = hits.entry(target.clone()).or_insert(0);
        *count += 1;
        *count
    };

    let (path, query) = target.split_once('?').unwrap_or((target.as_str(), ""));
    let param = query.split_once('=').map(|(_, v)| v.to_string()).unwrap_or_default();

    let (status, content_type, body, delay, drip) = {
        let site = site.lock().unwrap();
        let (status, content_type, body, delay) = route(&site, path, &param, hit, base);
        let drip = site.drip.filter(|_| path.starts_with("/videos/"));
        (status, content_type, body, delay, drip)
    };

    if let Some(delay) = delay {
        thread::sleep(delay);
    }

    let header = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        content_type,
        body.len()
    );
    let _ = stream.write_all(header.as_bytes());
    match drip {
        Some(pause) => {
            for piece in body.chunks(body.len().div_ceil(8).max(1)) {
                if stream.write_all(piece).and_then(|_| stream.flush()).is_err() {
                    return;
                }
                thread::sleep(pause);
            }
        }
        None => {
            let _ = stream.write_all(&body);
        }
    }
    let _ = stream.flush();
}

fn route(
    site: &Site,
    path: &str,
    param: &str,
    hit: usize,
    base: &str,
) -> (&'static str, &'static str, Vec<u8>, Option<Duration>) {
    const ERROR: &str = "500 Internal Server Error";

    match path {
        "/gf" => {
            if hit <= site.game_failures {
                return (ERROR, "text/plain", b"busy".to_vec(), None);
            }
            match param.parse::<u64>().ok().and_then(|id| site.games.get(&id)) {
                Some(feed) => ("200 OK", "application/json", feed.to_string().into_bytes(), None),
                None => ("200 OK", "application/json", b"null".to_vec(), None),
            }
        }
        "/sporty-videos" => {
            let delay = site.jitter.then(|| jitter(param));
            if hit <= site.page_failures.get(param).copied().unwrap_or(0) {
                return (ERROR, "text/plain", b"busy".to_vec(), delay);
            }
            let inner = match site.pages.get(param) {
                Some(Page::Mp4) => format!(
                    r#"<video controls><source src="{}/videos/{}.mp4" type="video/mp4"></video>"#,
                    base, param
                ),
                Some(Page::EmptySrc) => {
                    r#"<video><source src="" type="video/mp4"></video>"#.to_string()
                }
                Some(Page::NoVideo) | None => "<p>Video not available</p>".to_string(),
            };
            let html = format!(
                "<html><body><div class=\"video-box\">{}</div></body></html>",
                inner
            );
            ("200 OK", "text/html", html.into_bytes(), delay)
        }
        _ => match path
            .strip_prefix("/videos/")
            .and_then(|rest| rest.strip_suffix(".mp4"))
        {
            Some(play_id) if hit <= site.video_failures.get(play_id).copied().unwrap_or(0) => {
                (ERROR, "text/plain", b"busy".to_vec(), None)
            }
            Some(play_id) if site.empty_videos.contains(play_id) => {
                ("200 OK", "video/mp4", Vec::new(), None)
            }
            Some(play_id) => (
                "200 OK",
                "video/mp4",
                video_body(&site.body_prefix, play_id),
                None,
            ),
            None => ("404 Not Found", "text/plain", b"not found".to_vec(), None),
        },
    }
}

fn jitter(key: &str) -> Duration {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    Duration::from_millis(hasher.finish() % 40)
}

fn read_target(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > 64 * 1024 {
            return None;
        }
    }
    let request = String::from_utf8_lossy(&buf);
    let line = request.lines().next()?;
    let mut parts = line.split_whitespace();
    let _method = parts.next()?;
    parts.next().map(str::to_string)
}
