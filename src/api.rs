// src/api.rs
//! Thin HTTP relay over the snapshot store, aggregator and refresher.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
};

use crate::aggregate::GlobalSummary;
use crate::error::{ApiError, LookupError};
use crate::ingest::types::Entry;
use crate::refresh::Refresher;
use crate::regions::{self, Region};

const DEFAULT_REGION: &str = "US";

#[derive(Clone)]
pub struct AppState {
    pub refresher: Arc<Refresher>,
    pub summary_size: usize,
    /// Admin assets served under /public when set.
    pub static_dir: Option<PathBuf>,
}

pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/api/trends/regions", get(list_regions))
        .route("/api/trends/top", get(region_top))
        .route("/api/trends/summary", get(summary))
        .route("/admin/refresh", post(admin_refresh));

    if let Some(dir) = &state.static_dir {
        router = router
            .route_service("/admin", ServeFile::new(dir.join("admin.html")))
            .nest_service("/public", ServeDir::new(dir));
    }

    router
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(serde::Serialize)]
struct RegionsOut {
    regions: &'static [Region],
}

async fn list_regions() -> Json<RegionsOut> {
    Json(RegionsOut {
        regions: regions::all(),
    })
}

#[derive(serde::Deserialize)]
struct TopQuery {
    #[serde(default)]
    region: Option<String>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct TopOut {
    region: Region,
    updated_at: DateTime<Utc>,
    top: Vec<Entry>,
}

async fn region_top(
    State(state): State<AppState>,
    Query(q): Query<TopQuery>,
) -> Result<Json<TopOut>, ApiError> {
    let code = q
        .region
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_REGION.to_string());

    let region = Region::parse(&code)
        .ok_or_else(|| LookupError::UnknownRegion(code.trim().to_uppercase()))?;
    let snap = state
        .refresher
        .store()
        .get_region_snapshot(region.code())
        .await?;

    Ok(Json(TopOut {
        region,
        updated_at: snap.updated_at,
        top: snap.entries,
    }))
}

async fn summary(State(state): State<AppState>) -> Json<GlobalSummary> {
    Json(
        state
            .refresher
            .store()
            .global_summary(state.summary_size)
            .await,
    )
}

async fn admin_refresh(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    // Claimed here so a 202 always means this request's pass will run.
    let Some(claim) = state.refresher.try_claim() else {
        return Err(ApiError::RefreshBusy);
    };

    let refresher = state.refresher.clone();
    tokio::spawn(async move {
        match refresher.run_claimed(claim).await {
            Ok(report) => tracing::info!(
                target: "trends",
                refreshed = report.refreshed.len(),
                failed = report.failed.len(),
                "admin refresh finished"
            ),
            Err(e) => tracing::error!(target: "trends", "admin refresh not persisted: {e}"),
        }
    });

    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "started" }))))
}
