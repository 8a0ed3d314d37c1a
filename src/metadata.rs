//! Game feed lookup and play record extraction

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{Result, SavantError};
use crate::fetch::{Endpoint, RetryableFetcher};
use crate::models::PlayRecord;

/// Decoded `gf` document for one game.
///
/// Construction guarantees both batter collections are present.
#[derive(Debug, Clone)]
pub struct GameMetadata {
    game_id: u64,
    document: Value,
}

impl GameMetadata {
    /// Wrap a decoded feed, failing if either batter collection is missing
    pub fn from_value(game_id: u64, document: Value) -> Result<Self> {
        for side in ["home", "away"] {
            let key = format!("{}_batters", side);
            if document.get(&key).and_then(Value::as_object).is_none() {
                return Err(SavantError::MissingBatters { game_id, side });
            }
        }
        Ok(Self { game_id, document })
    }

    pub fn game_id(&self) -> u64 {
        self.game_id
    }

    fn batters(&self, side: &str) -> Option<&Map<String, Value>> {
        self.document
            .get(format!("{}_batters", side).as_str())
            .and_then(Value::as_object)
    }

    /// One record per pitch entry across home and away batters.
    ///
    /// Entries without a `play_id` or with a key field that cannot be read
    /// as an integer are skipped.
    pub fn play_records(&self) -> Vec<PlayRecord> {
        let mut records = Vec::new();
        let mut skipped = 0usize;

        let entries = ["home", "away"]
            .into_iter()
            .filter_map(|side| self.batters(side))
            .flat_map(|batters| batters.values())
            .filter_map(Value::as_array)
            .flatten();

        for entry in entries {
            match parse_play_entry(self.game_id, entry) {
                Some(record) => records.push(record),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!(
                "Skipped {} unreadable play entries in game {}",
                skipped, self.game_id
            );
        }
        debug!("Extracted {} play records from game {}", records.len(), self.game_id);
        records
    }
}

fn parse_play_entry(game_id: u64, entry: &Value) -> Option<PlayRecord> {
    let play_id = entry
        .get("play_id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())?
        .to_string();

    let inning = field_u32(entry, &["inning"])?;
    let at_bat_number = field_u32(entry, &["ab_number", "at_bat_number"])?;
    let pitch_number = field_u32(entry, &["pitch_number"])?;

    let sv_id = entry
        .get("sv_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string);

    Some(PlayRecord {
        game_id,
        inning,
        at_bat_number,
        pitch_number,
        play_id,
        sv_id,
    })
}

fn field_u32(entry: &Value, keys: &[&str]) -> Option<u32> {
    keys.iter()
        .find_map(|key| entry.get(*key).and_then(coerce_u64))
        .and_then(|value| u32::try_from(value).ok())
}

/// Accept `3`, `3.0` and `"3"` alike so join keys compare as integers
pub(crate) fn coerce_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Fetches game feeds and turns them into play records
#[derive(Clone)]
pub struct GameMetadataResolver {
    fetcher: RetryableFetcher,
}

impl GameMetadataResolver {
    pub fn new(fetcher: RetryableFetcher) -> Self {
        Self { fetcher }
    }

    /// Fetch one game's feed.
    ///
    /// Missing batter collections and an exhausted retry budget are both
    /// fatal; a game that cannot be read is not a transient condition.
    pub async fn resolve(&self, game_id: u64) -> Result<GameMetadata> {
        info!("📡 Fetching game metadata for {}", game_id);
        let attempted = self
            .fetcher
            .fetch_json(Endpoint::GameFeed, &game_id.to_string())
            .await?;

        let document = attempted
            .into_value()
            .ok_or(SavantError::GameMetadataUnavailable(game_id))?;
        GameMetadata::from_value(game_id, document)
    }

    /// Fetch one game and extract its play records
    pub async fn resolve_records(&self, game_id: u64) -> Result<Vec<PlayRecord>> {
        Ok(self.resolve(game_id).await?.play_records())
    }

    /// Fetch several games one after another and merge their records
    pub async fn resolve_games<I>(&self, game_ids: I) -> Result<Vec<PlayRecord>>
    where
        I: IntoIterator<Item = u64>,
    {
        let mut records = Vec::new();
        for game_id in game_ids {
            records.extend(self.resolve_records(game_id).await?);
        }
        info!("📚 Resolved {} play records", records.len());
        Ok(records)
    }
}
