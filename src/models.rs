use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single pitch the caller wants video for.
///
/// The four fields together form the composite join key; the struct itself is
/// used as that key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayOfInterest {
    pub game_id: u64,
    pub inning: u32,
    pub at_bat_number: u32,
    pub pitch_number: u32,
}

impl PlayOfInterest {
    pub fn new(game_id: u64, inning: u32, at_bat_number: u32, pitch_number: u32) -> Self {
        Self {
            game_id,
            inning,
            at_bat_number,
            pitch_number,
        }
    }
}

impl fmt::Display for PlayOfInterest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.game_id, self.inning, self.at_bat_number, self.pitch_number
        )
    }
}

/// Parses `GAME:INNING:AT_BAT:PITCH`
impl FromStr for PlayOfInterest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != 4 {
            return Err(format!("expected GAME:INNING:AT_BAT:PITCH, got '{}'", s));
        }

        let field = |idx: usize, name: &str| -> Result<u64, String> {
            parts[idx]
                .trim()
                .parse::<u64>()
                .map_err(|e| format!("invalid {} '{}': {}", name, parts[idx], e))
        };
        let narrow = |value: u64, name: &str| -> Result<u32, String> {
            u32::try_from(value).map_err(|_| format!("{} out of range: {}", name, value))
        };

        Ok(Self {
            game_id: field(0, "game id")?,
            inning: narrow(field(1, "inning")?, "inning")?,
            at_bat_number: narrow(field(2, "at-bat number")?, "at-bat number")?,
            pitch_number: narrow(field(3, "pitch number")?, "pitch number")?,
        })
    }
}

/// One pitch as listed in a game's feed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayRecord {
    pub game_id: u64,
    pub inning: u32,
    pub at_bat_number: u32,
    pub pitch_number: u32,
    /// Key the site uses to locate the play's video
    pub play_id: String,
    pub sv_id: Option<String>,
}

impl PlayRecord {
    pub fn key(&self) -> PlayOfInterest {
        PlayOfInterest::new(self.game_id, self.inning, self.at_bat_number, self.pitch_number)
    }
}

/// A requested play matched to its upstream record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedPlay {
    pub play: PlayOfInterest,
    pub play_id: String,
    pub sv_id: Option<String>,
}

impl ResolvedPlay {
    pub fn from_record(play: PlayOfInterest, record: &PlayRecord) -> Self {
        Self {
            play,
            play_id: record.play_id.clone(),
            sv_id: record.sv_id.clone(),
        }
    }

    pub fn game_id(&self) -> u64 {
        self.play.game_id
    }
}

impl From<&PlayRecord> for ResolvedPlay {
    fn from(record: &PlayRecord) -> Self {
        Self::from_record(record.key(), record)
    }
}

/// Outcome of resolving one play's video page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VideoLink {
    pub play_id: String,
    /// `None` when resolution failed or the page had no playable source
    pub video_url: Option<String>,
}

impl VideoLink {
    pub fn found(play_id: impl Into<String>, video_url: impl Into<String>) -> Self {
        Self {
            play_id: play_id.into(),
            video_url: Some(video_url.into()),
        }
    }

    pub fn missing(play_id: impl Into<String>) -> Self {
        Self {
            play_id: play_id.into(),
            video_url: None,
        }
    }
}
