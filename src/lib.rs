// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregate;
pub mod api;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod refresh;
pub mod regions;
pub mod store;
pub mod traffic;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::refresh::{PassClaim, PassReport, Refresher};
pub use crate::regions::Region;
pub use crate::store::{RegionSnapshot, SnapshotDatabase, SnapshotStore};

use std::sync::Arc;

use axum::Router;

use crate::ingest::config::TrendsConfig;
use crate::ingest::providers::google_trends::GoogleTrendsSource;
use crate::ingest::scheduler::{bootstrap, TrendScheduler, TrendSchedulerCfg};
use crate::metrics::Metrics;

/// Wire the production refresher (HTTP source + file store) from config.
pub fn refresher_from_config(cfg: &TrendsConfig) -> Refresher {
    let source = Arc::new(GoogleTrendsSource::http(cfg.source.clone()));
    Refresher::new(
        source,
        SnapshotStore::new(cfg.data_file.clone()),
        cfg.fetch_options(),
    )
}

/// Bootstrap the snapshot, start the hourly scheduler and build the router.
///
/// Takes an already installed recorder (if any) so the bootstrap pass is
/// counted on `/metrics`.
pub async fn start_app(
    cfg: &TrendsConfig,
    refresher: Arc<Refresher>,
    metrics: Option<Metrics>,
) -> (Router, TrendScheduler) {
    // First served response must have data.
    if let Err(e) = bootstrap(&refresher).await {
        tracing::error!(target: "trends", "bootstrap pass not persisted: {e}");
    }

    let scheduler = TrendScheduler::start(
        refresher.clone(),
        TrendSchedulerCfg {
            refresh_minute: cfg.refresh_minute,
        },
    );

    let mut router = create_router(AppState {
        refresher,
        summary_size: cfg.summary_size,
        static_dir: Some(cfg.static_dir.clone()),
    });
    if let Some(m) = metrics {
        router = router.merge(m.router());
    }

    (router, scheduler)
}
