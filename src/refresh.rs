// src/refresh.rs
//! Refresh passes: fetch every registry region in order, fold the outcomes
//! into the snapshot database, persist once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{FetchFailed, StoreError};
use crate::ingest::types::{Entry, TrendSource};
use crate::ingest::{self, FetchOptions};
use crate::regions::{self, Region};
use crate::store::{RegionSnapshot, SnapshotDatabase, SnapshotStore};

/// Outcome of fetching one region during a pass.
#[derive(Debug)]
pub struct RegionAttempt {
    pub region: Region,
    pub outcome: Result<Vec<Entry>, FetchFailed>,
}

/// What a persisted pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub refreshed: Vec<Region>,
    pub failed: Vec<(Region, String)>,
}

/// Fold attempts into `db`: successes replace the region snapshot stamped with
/// `started_at`, failures leave whatever was stored untouched.
pub fn apply_attempts(
    db: &mut SnapshotDatabase,
    attempts: Vec<RegionAttempt>,
    started_at: DateTime<Utc>,
) -> PassReport {
    let mut refreshed = Vec::new();
    let mut failed = Vec::new();

    for RegionAttempt { region, outcome } in attempts {
        match outcome {
            Ok(entries) => {
                db.regions.insert(
                    region.code().to_string(),
                    RegionSnapshot {
                        updated_at: started_at,
                        entries,
                    },
                );
                refreshed.push(region);
            }
            Err(e) => {
                tracing::warn!(target: "trends", region = %region, "region refresh failed: {e:#}");
                failed.push((region, e.cause.to_string()));
            }
        }
    }

    db.last_global_build_at = Some(started_at);

    PassReport {
        started_at,
        refreshed,
        failed,
    }
}

/// Exclusive right to run one pass, taken without waiting.
#[must_use = "dropping the claim releases the pass lock"]
pub struct PassClaim {
    _guard: OwnedMutexGuard<()>,
}

pub struct Refresher {
    source: Arc<dyn TrendSource>,
    store: SnapshotStore,
    opts: FetchOptions,
    // Held for the whole pass; every trigger goes through it.
    pass_lock: Arc<Mutex<()>>,
}

impl Refresher {
    pub fn new(source: Arc<dyn TrendSource>, store: SnapshotStore, opts: FetchOptions) -> Self {
        Self {
            source,
            store,
            opts,
            pass_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// True while a pass holds the lock.
    pub fn is_running(&self) -> bool {
        self.pass_lock.try_lock().is_err()
    }

    /// Run a full pass, waiting for any pass already in flight to finish first.
    pub async fn run_full_pass(&self) -> Result<PassReport, StoreError> {
        let _guard = self.pass_lock.lock().await;
        self.run_locked().await
    }

    /// Take the pass lock if it is free. The claim can be moved into a task
    /// and spent with [`Refresher::run_claimed`].
    pub fn try_claim(&self) -> Option<PassClaim> {
        self.pass_lock
            .clone()
            .try_lock_owned()
            .ok()
            .map(|guard| PassClaim { _guard: guard })
    }

    /// Run a full pass under a claim obtained from [`Refresher::try_claim`].
    pub async fn run_claimed(&self, claim: PassClaim) -> Result<PassReport, StoreError> {
        let report = self.run_locked().await;
        drop(claim);
        report
    }

    /// Run a full pass unless one is already running, in which case the
    /// trigger is dropped and `None` is returned.
    pub async fn try_run_full_pass(&self) -> Option<Result<PassReport, StoreError>> {
        let Some(claim) = self.try_claim() else {
            counter!("trends_passes_skipped_total").increment(1);
            tracing::warn!(target: "trends", "refresh pass already running, trigger dropped");
            return None;
        };
        Some(self.run_claimed(claim).await)
    }

    async fn attempt_all(&self) -> Vec<RegionAttempt> {
        let mut attempts = Vec::with_capacity(regions::all().len());
        for &region in regions::all() {
            let outcome = ingest::fetch_region(self.source.as_ref(), region, &self.opts).await;
            attempts.push(RegionAttempt { region, outcome });
        }
        attempts
    }

    async fn run_locked(&self) -> Result<PassReport, StoreError> {
        ingest::ensure_metrics_described();
        let started_at = Utc::now();
        let mut db = self.store.load().await;

        let attempts = self.attempt_all().await;
        let report = apply_attempts(&mut db, attempts, started_at);

        if let Err(e) = self.store.save(&db).await {
            counter!("trends_store_errors_total").increment(1);
            tracing::error!(target: "trends", "persisting refresh pass failed: {e}");
            return Err(e);
        }

        counter!("trends_passes_total").increment(1);
        gauge!("trends_last_pass_ts").set(started_at.timestamp().max(0) as f64);
        tracing::info!(
            target: "trends",
            refreshed = report.refreshed.len(),
            failed = report.failed.len(),
            started_at = %started_at,
            "refresh pass persisted"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchCause;
    use std::time::Duration;

    fn entry(q: &str, v: u64) -> Entry {
        Entry {
            title: q.into(),
            query: q.into(),
            formatted_traffic: String::new(),
            traffic: v,
            articles: vec![],
            related_queries: vec![],
        }
    }

    #[test]
    fn failures_keep_prior_snapshot_and_stamp_build_time() {
        let us = Region::parse("US").unwrap();
        let jp = Region::parse("JP").unwrap();
        let old = Utc::now() - chrono::Duration::hours(3);
        let now = Utc::now();

        let mut db = SnapshotDatabase::default();
        db.regions.insert(
            "JP".into(),
            RegionSnapshot {
                updated_at: old,
                entries: vec![entry("old", 1)],
            },
        );

        let attempts = vec![
            RegionAttempt {
                region: us,
                outcome: Ok(vec![entry("new", 9)]),
            },
            RegionAttempt {
                region: jp,
                outcome: Err(FetchFailed {
                    region: jp,
                    cause: FetchCause::TimedOut(Duration::from_secs(1)),
                }),
            },
        ];
        let report = apply_attempts(&mut db, attempts, now);

        assert_eq!(report.refreshed, vec![us]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(db.region(us).unwrap().updated_at, now);
        assert_eq!(db.region(jp).unwrap().updated_at, old);
        assert_eq!(db.region(jp).unwrap().entries[0].query, "old");
        assert_eq!(db.last_global_build_at, Some(now));
    }

    #[test]
    fn all_failed_still_records_pass_time() {
        let gb = Region::parse("GB").unwrap();
        let now = Utc::now();
        let mut db = SnapshotDatabase::default();
        let attempts = vec![RegionAttempt {
            region: gb,
            outcome: Err(FetchFailed {
                region: gb,
                cause: FetchCause::Unavailable(anyhow::anyhow!("boom")),
            }),
        }];
        let report = apply_attempts(&mut db, attempts, now);
        assert!(db.regions.is_empty());
        assert_eq!(db.last_global_build_at, Some(now));
        assert!(report.failed[0].1.contains("boom"));
    }
}
