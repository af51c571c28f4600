// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::regions::Region;

/// Article reference attached to a trending item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ArticleRef {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub url: String,
}

/// One trending item as the source reports it, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawTrendRecord {
    pub title: String,
    pub formatted_traffic: String,
    pub articles: Vec<ArticleRef>,
    pub related_queries: Vec<String>,
}

/// Canonical, deduplicated trending item within a region snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub title: String,
    pub query: String, // lower-cased title; dedup key
    #[serde(default)]
    pub formatted_traffic: String,
    #[serde(rename = "formattedTrafficValue", default)]
    pub traffic: u64,
    #[serde(default)]
    pub articles: Vec<ArticleRef>,
    #[serde(default)]
    pub related_queries: Vec<String>,
}

/// External trend-data collaborator: one raw payload per region.
#[async_trait::async_trait]
pub trait TrendSource: Send + Sync {
    async fn fetch_raw(&self, region: Region) -> Result<String>;
    fn name(&self) -> &'static str;
}
