// src/store.rs
//! Durable snapshot database: one JSON file holding the latest successful
//! snapshot per region plus the timestamp of the last refresh pass.
//!
//! Every read re-loads from disk; nothing keeps a mutable copy between passes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::aggregate::{self, GlobalSummary};
use crate::error::{LookupError, StoreError};
use crate::ingest::types::Entry;
use crate::regions::Region;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegionSnapshot {
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "top", default)]
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDatabase {
    #[serde(default)]
    pub regions: BTreeMap<String, RegionSnapshot>,
    #[serde(default)]
    pub last_global_build_at: Option<DateTime<Utc>>,
}

impl SnapshotDatabase {
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn region(&self, region: Region) -> Option<&RegionSnapshot> {
        self.regions.get(region.code())
    }
}

/// Handle to the snapshot file. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: Arc<PathBuf>,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Read the database. Missing or corrupt files yield the empty default.
    pub async fn load(&self) -> SnapshotDatabase {
        let raw = match fs::read_to_string(self.path.as_path()).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return SnapshotDatabase::default();
            }
            Err(e) => {
                tracing::warn!(target: "trends", path = %self.path.display(), "snapshot unreadable: {e:#}");
                return SnapshotDatabase::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(db) => db,
            Err(e) => {
                tracing::warn!(target: "trends", path = %self.path.display(), "snapshot malformed, using empty default: {e}");
                SnapshotDatabase::default()
            }
        }
    }

    /// Overwrite the database: write a sibling temp file, then rename it
    /// into place.
    pub async fn save(&self, db: &SnapshotDatabase) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .map_err(|source| StoreError::CreateDir {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        let bytes = serde_json::to_vec_pretty(db)?;
        let tmp = self.tmp_path();
        fs::write(&tmp, bytes)
            .await
            .map_err(|source| StoreError::Write {
                path: tmp.clone(),
                source,
            })?;
        fs::rename(&tmp, self.path.as_path())
            .await
            .map_err(|source| StoreError::Rename {
                path: self.path.to_path_buf(),
                source,
            })?;
        Ok(())
    }

    /// Latest successful snapshot for a registry region.
    pub async fn get_region_snapshot(&self, code: &str) -> Result<RegionSnapshot, LookupError> {
        let region = Region::parse(code)
            .ok_or_else(|| LookupError::UnknownRegion(code.trim().to_ascii_uppercase()))?;
        self.load()
            .await
            .regions
            .remove(region.code())
            .ok_or(LookupError::NotFetched(region))
    }

    pub async fn global_summary(&self, size: usize) -> GlobalSummary {
        aggregate::global_summary(&self.load().await, size)
    }
}
