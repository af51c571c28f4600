// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod scheduler;
pub mod types;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::error::{FetchCause, FetchFailed};
use crate::ingest::types::{ArticleRef, Entry, RawTrendRecord, TrendSource};
use crate::regions::Region;
use crate::traffic::parse_traffic;

pub const MAX_ARTICLES: usize = 3;
pub const MAX_RELATED_QUERIES: usize = 5;
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("trends_fetch_total", "Region fetch attempts.");
        describe_counter!(
            "trends_fetch_errors_total",
            "Region fetches that failed (source error, timeout, malformed payload)."
        );
        describe_counter!(
            "trends_dedup_total",
            "Raw records collapsed into an existing entry by query."
        );
        describe_counter!("trends_passes_total", "Completed refresh passes.");
        describe_counter!(
            "trends_passes_skipped_total",
            "Refresh triggers dropped because a pass was already running."
        );
        describe_counter!(
            "trends_store_errors_total",
            "Snapshot database writes that failed."
        );
        describe_histogram!("trends_fetch_ms", "Region fetch time in milliseconds.");
        describe_gauge!(
            "trends_last_pass_ts",
            "Unix ts when the last refresh pass was persisted."
        );
    });
}

/// Per-fetch knobs, derived from config.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub max_entries: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Counts of records dropped during normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub empty: usize,
    pub duplicates: usize,
}

/// Decode HTML entities, collapse whitespace, trim.
pub fn clean_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_record(rec: RawTrendRecord) -> Entry {
    let title = clean_text(&rec.title);
    let query = title.to_lowercase();
    let traffic = parse_traffic(&rec.formatted_traffic);

    let articles = rec
        .articles
        .into_iter()
        .take(MAX_ARTICLES)
        .map(|a| ArticleRef {
            title: clean_text(&a.title),
            source: a.source.trim().to_string(),
            url: a.url.trim().to_string(),
        })
        .collect();

    let related_queries = rec
        .related_queries
        .iter()
        .map(|q| q.trim())
        .filter(|q| !q.is_empty())
        .take(MAX_RELATED_QUERIES)
        .map(str::to_string)
        .collect();

    Entry {
        title,
        query,
        formatted_traffic: rec.formatted_traffic.trim().to_string(),
        traffic,
        articles,
        related_queries,
    }
}

/// Normalize raw records, collapse duplicates by query (larger traffic wins,
/// ties keep the first seen), rank by traffic descending, truncate to `max`.
pub fn normalize_dedup(raw: Vec<RawTrendRecord>, max: usize) -> (Vec<Entry>, NormalizeStats) {
    let mut stats = NormalizeStats::default();
    let mut index: HashMap<String, usize> = HashMap::with_capacity(raw.len());
    let mut kept: Vec<Entry> = Vec::with_capacity(raw.len());

    for rec in raw {
        let entry = normalize_record(rec);
        if entry.query.is_empty() {
            stats.empty += 1;
            continue;
        }
        match index.get(&entry.query) {
            Some(&i) => {
                stats.duplicates += 1;
                if entry.traffic > kept[i].traffic {
                    kept[i] = entry;
                }
            }
            None => {
                index.insert(entry.query.clone(), kept.len());
                kept.push(entry);
            }
        }
    }

    // Stable: equal traffic keeps first-seen order.
    kept.sort_by(|a, b| b.traffic.cmp(&a.traffic));
    kept.truncate(max);
    (kept, stats)
}

/* ----------------------------
Daily trends payload
---------------------------- */

const XSSI_GUARD: &str = ")]}',";

#[derive(Debug, Deserialize)]
struct DailyTrends {
    default: DailyTrendsBody,
}

#[derive(Debug, Deserialize)]
struct DailyTrendsBody {
    #[serde(rename = "trendingSearchesDays", default)]
    days: Option<Vec<TrendingDay>>,
}

#[derive(Debug, Deserialize)]
struct TrendingDay {
    #[serde(rename = "trendingSearches", default)]
    searches: Option<Vec<TrendingSearch>>,
}

// Any leaf may be absent or null upstream; neither fails the region.
#[derive(Debug, Deserialize)]
struct TrendingSearch {
    #[serde(default)]
    title: Option<TitleQuery>,
    #[serde(rename = "formattedTraffic", default)]
    formatted_traffic: Option<String>,
    #[serde(default)]
    articles: Option<Vec<WireArticle>>,
    #[serde(rename = "relatedQueries", default)]
    related_queries: Option<Vec<TitleQuery>>,
}

#[derive(Debug, Deserialize)]
struct TitleQuery {
    #[serde(default)]
    query: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireArticle {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl From<WireArticle> for ArticleRef {
    fn from(a: WireArticle) -> Self {
        ArticleRef {
            title: a.title.unwrap_or_default(),
            source: a.source.unwrap_or_default(),
            url: a.url.unwrap_or_default(),
        }
    }
}

/// Parse a daily-trends body (optionally XSSI-guarded) and flatten all days.
pub fn parse_daily_trends(body: &str) -> Result<Vec<RawTrendRecord>, serde_json::Error> {
    let body = body.trim_start();
    let body = body.strip_prefix(XSSI_GUARD).unwrap_or(body);
    let parsed: DailyTrends = serde_json::from_str(body)?;

    let out = parsed
        .default
        .days
        .unwrap_or_default()
        .into_iter()
        .flat_map(|day| day.searches.unwrap_or_default())
        .map(|s| RawTrendRecord {
            title: s.title.and_then(|t| t.query).unwrap_or_default(),
            formatted_traffic: s.formatted_traffic.unwrap_or_default(),
            articles: s
                .articles
                .unwrap_or_default()
                .into_iter()
                .map(ArticleRef::from)
                .collect(),
            related_queries: s
                .related_queries
                .unwrap_or_default()
                .into_iter()
                .map(|q| q.query.unwrap_or_default())
                .collect(),
        })
        .collect();
    Ok(out)
}

/// Fetch one region from `source` and produce its ranked entry list.
/// Never touches the store.
pub async fn fetch_region(
    source: &dyn TrendSource,
    region: Region,
    opts: &FetchOptions,
) -> Result<Vec<Entry>, FetchFailed> {
    ensure_metrics_described();
    counter!("trends_fetch_total").increment(1);
    let t0 = Instant::now();

    let outcome = match tokio::time::timeout(opts.timeout, source.fetch_raw(region)).await {
        Err(_) => Err(FetchCause::TimedOut(opts.timeout)),
        Ok(Err(e)) => Err(FetchCause::Unavailable(e)),
        Ok(Ok(body)) => parse_daily_trends(&body).map_err(FetchCause::from),
    };

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("trends_fetch_ms").record(ms);

    let raw = outcome.map_err(|cause| {
        counter!("trends_fetch_errors_total").increment(1);
        FetchFailed { region, cause }
    })?;

    let raw_len = raw.len();
    let (entries, stats) = normalize_dedup(raw, opts.max_entries);
    counter!("trends_dedup_total").increment(stats.duplicates as u64);

    tracing::debug!(
        target: "trends",
        region = %region,
        source = source.name(),
        raw = raw_len,
        kept = entries.len(),
        empty = stats.empty,
        dedup = stats.duplicates,
        ms,
        "region fetched"
    );

    Ok(entries)
}
