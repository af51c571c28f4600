//! Regional Trends Service: binary entrypoint.
//! Loads config, bootstraps the snapshot, starts the hourly refresh and
//! serves the HTTP relay.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use regional_trends::ingest::config::load_config_default;
use regional_trends::ingest::scheduler::TrendScheduler;
use regional_trends::metrics::Metrics;
use regional_trends::{refresher_from_config, start_app};

/// Compact tracing logs for local runs. Activation requires TRENDS_DEV_LOG=1;
/// the hosting runtime may already own the global subscriber.
fn enable_dev_tracing() {
    let dev_flag = std::env::var("TRENDS_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");
    if !dev_flag {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trends=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

/// Router plus the scheduler it must stop on shutdown.
pub struct TrendsService {
    router: Router,
    scheduler: TrendScheduler,
}

#[async_trait::async_trait]
impl shuttle_runtime::Service for TrendsService {
    async fn bind(self, addr: SocketAddr) -> Result<(), shuttle_runtime::Error> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(anyhow::Error::from)?;

        let served = axum::serve(listener, self.router)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await;

        self.scheduler.stop().await?;
        served.map_err(anyhow::Error::from)?;
        Ok(())
    }
}

#[shuttle_runtime::main]
async fn service() -> Result<TrendsService, shuttle_runtime::Error> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    enable_dev_tracing();

    let cfg = load_config_default()?;
    let refresher = Arc::new(refresher_from_config(&cfg));

    // Recorder goes in before the first pass so its series are kept.
    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(target: "trends", "metrics disabled: {e:#}");
            None
        }
    };

    let (router, scheduler) = start_app(&cfg, refresher, metrics).await;

    Ok(TrendsService { router, scheduler })
}
