//! Matching requested plays against upstream play records

use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::models::{PlayOfInterest, PlayRecord, ResolvedPlay};

/// Inner join on `(game_id, inning, at_bat_number, pitch_number)`.
///
/// Requests without a matching record are dropped. Each request yields at most
/// one resolved play, so the output is never longer than `requested`. When
/// several records share a key the first one wins. Output order is not
/// meaningful.
pub fn join_plays(requested: &[PlayOfInterest], records: &[PlayRecord]) -> Vec<ResolvedPlay> {
    let index: HashMap<PlayOfInterest, &PlayRecord> = first_by_key(records)
        .map(|record| (record.key(), record))
        .collect();

    let mut seen = HashSet::with_capacity(requested.len());
    let resolved: Vec<ResolvedPlay> = requested
        .iter()
        .filter(|play| seen.insert(**play))
        .filter_map(|play| index.get(play).map(|record| ResolvedPlay::from_record(*play, record)))
        .collect();

    let unmatched = seen.len() - resolved.len();
    if unmatched > 0 {
        warn!("{} requested plays had no upstream play record", unmatched);
    }
    info!("🔗 Joined {} of {} requested plays", resolved.len(), requested.len());
    resolved
}

/// Records in input order, skipping any whose key was already seen
fn first_by_key(records: &[PlayRecord]) -> impl Iterator<Item = &PlayRecord> {
    let mut seen: HashMap<PlayOfInterest, String> = HashMap::with_capacity(records.len());
    records.iter().filter(move |record| {
        if let Some(kept) = seen.get(&record.key()) {
            debug!(
                "Duplicate play record for {}: keeping {}, ignoring {}",
                record.key(),
                kept,
                record.play_id
            );
            return false;
        }
        seen.insert(record.key(), record.play_id.clone());
        true
    })
}

/// One record per composite key, the first one seen winning
pub fn dedupe_records(records: Vec<PlayRecord>) -> Vec<PlayRecord> {
    let total = records.len();
    let kept: Vec<PlayRecord> = first_by_key(&records).cloned().collect();
    if kept.len() < total {
        warn!("Dropped {} play records with a duplicate key", total - kept.len());
    }
    kept
}

/// Keep records whose `sv_id` is in `sv_ids`; `None` keeps everything
pub fn filter_by_sv_ids(records: Vec<PlayRecord>, sv_ids: Option<&[String]>) -> Vec<PlayRecord> {
    let Some(sv_ids) = sv_ids else {
        return records;
    };
    let wanted: HashSet<&str> = sv_ids.iter().map(String::as_str).collect();
    records
        .into_iter()
        .filter(|record| {
            record
                .sv_id
                .as_deref()
                .is_some_and(|sv_id| wanted.contains(sv_id))
        })
        .collect()
}

/// Distinct game ids in first-seen order
pub fn distinct_games(requested: &[PlayOfInterest]) -> Vec<u64> {
    let mut seen = HashSet::new();
    requested
        .iter()
        .map(|play| play.game_id)
        .filter(|game_id| seen.insert(*game_id))
        .collect()
}
