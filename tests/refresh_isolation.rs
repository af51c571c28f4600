// tests/refresh_isolation.rs
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use regional_trends::error::LookupError;
use regional_trends::ingest::types::TrendSource;
use regional_trends::ingest::FetchOptions;
use regional_trends::regions;
use regional_trends::{Refresher, Region, SnapshotStore};

const US_BODY: &str = include_str!("fixtures/daily_trends_us.json");
const JP_BODY: &str = include_str!("fixtures/daily_trends_jp.json");

fn region(code: &str) -> Region {
    Region::parse(code).unwrap()
}

/// Serves configured bodies; everything else fails. Records call order.
#[derive(Default)]
struct ScriptedSource {
    bodies: Mutex<HashMap<Region, String>>,
    calls: Mutex<Vec<Region>>,
    delay: Option<Duration>,
}

impl ScriptedSource {
    fn serve(&self, r: Region, body: &str) {
        self.bodies.lock().insert(r, body.to_string());
    }
    fn fail(&self, r: Region) {
        self.bodies.lock().remove(&r);
    }
}

#[async_trait]
impl TrendSource for ScriptedSource {
    async fn fetch_raw(&self, r: Region) -> Result<String> {
        self.calls.lock().push(r);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        self.bodies
            .lock()
            .get(&r)
            .cloned()
            .ok_or_else(|| anyhow!("upstream 503 for {r}"))
    }
    fn name(&self) -> &'static str {
        "Scripted"
    }
}

fn setup(source: Arc<ScriptedSource>) -> (tempfile::TempDir, Refresher) {
    let tmp = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(tmp.path().join("data/trends.json"));
    let refresher = Refresher::new(source, store, FetchOptions::default());
    (tmp, refresher)
}

#[tokio::test]
async fn failed_region_keeps_previous_snapshot() {
    let source = Arc::new(ScriptedSource::default());
    source.serve(region("US"), US_BODY);
    source.serve(region("JP"), JP_BODY);
    let (_tmp, refresher) = setup(source.clone());

    let first = refresher.run_full_pass().await.unwrap();
    assert_eq!(first.refreshed, vec![region("US"), region("JP")]);
    let jp_before = refresher.store().get_region_snapshot("JP").await.unwrap();

    source.fail(region("JP"));
    let second = refresher.run_full_pass().await.unwrap();
    assert!(second.started_at > first.started_at);
    assert_eq!(second.refreshed, vec![region("US")]);
    assert!(second.failed.iter().any(|(r, _)| *r == region("JP")));

    let us_after = refresher.store().get_region_snapshot("US").await.unwrap();
    assert_eq!(us_after.updated_at, second.started_at);
    let jp_after = refresher.store().get_region_snapshot("JP").await.unwrap();
    assert_eq!(jp_after, jp_before);

    let db = refresher.store().load().await;
    assert_eq!(db.last_global_build_at, Some(second.started_at));
}

#[tokio::test]
async fn never_fetched_region_is_not_found() {
    let source = Arc::new(ScriptedSource::default());
    source.serve(region("US"), US_BODY);
    let (_tmp, refresher) = setup(source);

    refresher.run_full_pass().await.unwrap();
    assert!(refresher.store().get_region_snapshot("US").await.is_ok());
    assert_eq!(
        refresher.store().get_region_snapshot("JP").await,
        Err(LookupError::NotFetched(region("JP")))
    );
}

#[tokio::test]
async fn every_region_attempted_in_registry_order() {
    let source = Arc::new(ScriptedSource::default());
    let (_tmp, refresher) = setup(source.clone());

    let report = refresher.run_full_pass().await.unwrap();
    assert_eq!(report.failed.len(), regions::all().len());
    assert_eq!(source.calls.lock().as_slice(), regions::all());

    // Pass time recorded even though nothing succeeded.
    let db = refresher.store().load().await;
    assert!(db.regions.is_empty());
    assert_eq!(db.last_global_build_at, Some(report.started_at));
}

#[tokio::test(start_paused = true)]
async fn overlapping_trigger_is_dropped() {
    let source = Arc::new(ScriptedSource {
        delay: Some(Duration::from_millis(50)),
        ..Default::default()
    });
    source.serve(region("US"), US_BODY);
    let (_tmp, refresher) = setup(source.clone());
    let refresher = Arc::new(refresher);

    let running = {
        let r = refresher.clone();
        tokio::spawn(async move { r.run_full_pass().await })
    };
    // Let the spawned pass take the lock.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(refresher.is_running());
    assert!(refresher.try_run_full_pass().await.is_none());

    running.await.unwrap().unwrap();
    assert!(!refresher.is_running());
    assert_eq!(source.calls.lock().len(), regions::all().len());
}

#[tokio::test]
async fn store_write_failure_is_reported() {
    let source = Arc::new(ScriptedSource::default());
    source.serve(region("US"), US_BODY);
    let tmp = tempfile::tempdir().unwrap();
    // A regular file where the data directory should be.
    let blocker = tmp.path().join("blocked");
    std::fs::write(&blocker, "x").unwrap();
    let store = SnapshotStore::new(blocker.join("trends.json"));
    let refresher = Refresher::new(source, store, FetchOptions::default());

    assert!(refresher.run_full_pass().await.is_err());
    assert!(refresher.store().load().await.is_empty());
}

#[tokio::test]
async fn claim_blocks_other_triggers_until_spent() {
    let source = Arc::new(ScriptedSource::default());
    source.serve(region("US"), US_BODY);
    let (_tmp, refresher) = setup(source.clone());

    let claim = refresher.try_claim().expect("lock is free");
    assert!(refresher.is_running());
    assert!(refresher.try_claim().is_none());
    assert!(refresher.try_run_full_pass().await.is_none());
    assert!(source.calls.lock().is_empty());

    let report = refresher.run_claimed(claim).await.unwrap();
    assert_eq!(report.refreshed, vec![region("US")]);
    assert!(!refresher.is_running());
    assert!(refresher.try_claim().is_some());
}
