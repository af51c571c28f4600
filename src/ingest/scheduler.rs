// src/ingest/scheduler.rs
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, DurationRound, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;
use crate::refresh::{PassReport, Refresher};

#[derive(Clone, Copy, Debug)]
pub struct TrendSchedulerCfg {
    /// Minute of every hour (UTC) at which a pass fires.
    pub refresh_minute: u32,
}

/// Next instant strictly after `now` whose minute equals `minute` (seconds zeroed).
pub fn next_tick_after(now: DateTime<Utc>, minute: u32) -> DateTime<Utc> {
    let minute = i64::from(minute.min(59));
    let hour_start = now
        .duration_trunc(Duration::hours(1))
        .unwrap_or(now);
    let candidate = hour_start + Duration::minutes(minute);
    if candidate > now {
        candidate
    } else {
        candidate + Duration::hours(1)
    }
}

/// Run one pass synchronously when nothing has ever been persisted.
/// Returns `Ok(None)` when data already exists.
pub async fn bootstrap(refresher: &Refresher) -> Result<Option<PassReport>, StoreError> {
    if !refresher.store().load().await.is_empty() {
        tracing::info!(target: "trends", "snapshot present, bootstrap pass not needed");
        return Ok(None);
    }
    tracing::info!(target: "trends", "no snapshot yet, running bootstrap pass");
    refresher.run_full_pass().await.map(Some)
}

/// Owns the periodic refresh task. Create once at startup, `stop` on shutdown.
pub struct TrendScheduler {
    handle: Option<JoinHandle<()>>,
    cancel_token: CancellationToken,
}

impl TrendScheduler {
    pub fn start(refresher: Arc<Refresher>, cfg: TrendSchedulerCfg) -> Self {
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();

        let handle = tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let next = next_tick_after(now, cfg.refresh_minute);
                let wait = (next - now).to_std().unwrap_or_default();
                tracing::debug!(target: "trends", next = %next, "scheduled refresh armed");

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }

                // An in-flight pass runs to completion even if stop() is called.
                match refresher.try_run_full_pass().await {
                    Some(Ok(report)) => tracing::info!(
                        target: "trends",
                        refreshed = report.refreshed.len(),
                        failed = report.failed.len(),
                        "scheduled refresh tick"
                    ),
                    Some(Err(e)) => {
                        tracing::error!(target: "trends", "scheduled refresh not persisted: {e}")
                    }
                    None => {}
                }
            }
            tracing::info!(target: "trends", "refresh scheduler stopped");
        });

        Self {
            handle: Some(handle),
            cancel_token,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub async fn stop(mut self) -> Result<()> {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("refresh scheduler task failed to join")
        } else {
            Ok(())
        }
    }
}

impl Drop for TrendScheduler {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
