// src/aggregate.rs
//! Cross-region ranking: sum traffic per lower-cased query over every stored
//! region snapshot.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::regions;
use crate::store::{RegionSnapshot, SnapshotDatabase};

pub const DEFAULT_SUMMARY_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScoredTitle {
    pub title: String,
    pub score: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSummary {
    pub updated_at: Option<DateTime<Utc>>,
    pub top: Vec<ScoredTitle>,
}

/// Snapshots in registry order, followed by stored codes the registry no
/// longer tracks (in key order).
fn snapshots_in_order(db: &SnapshotDatabase) -> impl Iterator<Item = &RegionSnapshot> {
    let tracked = regions::all().iter().filter_map(|r| db.region(*r));
    let untracked = db
        .regions
        .iter()
        .filter(|(code, _)| regions::Region::parse(code).is_none())
        .map(|(_, snap)| snap);
    tracked.chain(untracked)
}

pub fn global_summary(db: &SnapshotDatabase, size: usize) -> GlobalSummary {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut scored: Vec<ScoredTitle> = Vec::new();

    for snap in snapshots_in_order(db) {
        for e in &snap.entries {
            let key = if e.query.trim().is_empty() {
                e.title.trim().to_lowercase()
            } else {
                e.query.trim().to_lowercase()
            };
            if key.is_empty() {
                continue;
            }
            match index.get(&key) {
                Some(&i) => scored[i].score = scored[i].score.saturating_add(e.traffic),
                None => {
                    index.insert(key.clone(), scored.len());
                    scored.push(ScoredTitle {
                        title: key,
                        score: e.traffic,
                    });
                }
            }
        }
    }

    // Stable: ties keep registry-then-entry first-seen order.
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(size);

    GlobalSummary {
        updated_at: db.last_global_build_at,
        top: scored,
    }
}
