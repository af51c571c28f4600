// src/error.rs
use std::{io, path::PathBuf, time::Duration};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::regions::Region;

/// A single region's fetch did not produce entries.
#[derive(Debug, Error)]
#[error("fetch failed for region {region}: {cause}")]
pub struct FetchFailed {
    pub region: Region,
    #[source]
    pub cause: FetchCause,
}

#[derive(Debug, Error)]
pub enum FetchCause {
    #[error("source unavailable: {0:#}")]
    Unavailable(anyhow::Error),

    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

/// Persisting the snapshot database failed. Fatal to the pass that hit it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("creating data dir {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("serializing snapshot database: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("writing {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("replacing {path}: {source}")]
    Rename { path: PathBuf, source: io::Error },
}

/// Region lookups that have no data to return.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("Region {0} not found")]
    UnknownRegion(String),

    #[error("Region {0} not found")]
    NotFetched(Region),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("A refresh pass is already running")]
    RefreshBusy,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Lookup(_) => StatusCode::NOT_FOUND,
            ApiError::RefreshBusy => StatusCode::CONFLICT,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
