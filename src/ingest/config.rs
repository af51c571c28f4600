// src/ingest/config.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::aggregate::DEFAULT_SUMMARY_SIZE;
use crate::ingest::{FetchOptions, DEFAULT_MAX_ENTRIES};

pub const ENV_CONFIG_PATH: &str = "TRENDS_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/trends.toml";
pub const DEFAULT_JSON_PATH: &str = "config/trends.json";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrendsConfig {
    /// Snapshot database file.
    pub data_file: PathBuf,
    /// Minute of every hour (UTC) at which the scheduled pass runs.
    pub refresh_minute: u32,
    pub fetch_timeout_secs: u64,
    /// Entries kept per region.
    pub max_entries: usize,
    /// Items in the global summary.
    pub summary_size: usize,
    /// Static admin assets served under /public.
    pub static_dir: PathBuf,
    pub source: SourceConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub hl: String,
    pub tz: i32,
}

impl Default for TrendsConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("data/trends.json"),
            refresh_minute: 5,
            fetch_timeout_secs: 20,
            max_entries: DEFAULT_MAX_ENTRIES,
            summary_size: DEFAULT_SUMMARY_SIZE,
            static_dir: PathBuf::from("public"),
            source: SourceConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://trends.google.com/trends/api/dailytrends".to_string(),
            hl: "en-US".to_string(),
            tz: 0,
        }
    }
}

impl TrendsConfig {
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: Duration::from_secs(self.fetch_timeout_secs),
            max_entries: self.max_entries,
        }
    }

    fn validate(self) -> Result<Self> {
        if self.refresh_minute >= 60 {
            bail!("refresh_minute must be < 60, got {}", self.refresh_minute);
        }
        if self.fetch_timeout_secs == 0 {
            bail!("fetch_timeout_secs must be > 0");
        }
        if self.max_entries == 0 || self.summary_size == 0 {
            bail!("max_entries and summary_size must be > 0");
        }
        Ok(self)
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<TrendsConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading trends config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing trends config {}", path.display()))
}

/// Load config using env var + fallbacks:
/// 1) $TRENDS_CONFIG_PATH
/// 2) config/trends.toml
/// 3) config/trends.json
/// 4) built-in defaults
pub fn load_config_default() -> Result<TrendsConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        } else {
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from(DEFAULT_TOML_PATH);
    if toml_p.exists() {
        return load_config_from(&toml_p);
    }
    let json_p = PathBuf::from(DEFAULT_JSON_PATH);
    if json_p.exists() {
        return load_config_from(&json_p);
    }
    tracing::info!(target: "trends", "no trends config file found, using defaults");
    Ok(TrendsConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<TrendsConfig> {
    let looks_json = s.trim_start().starts_with('{');
    let cfg = if hint_ext == "json" || (hint_ext != "toml" && looks_json) {
        serde_json::from_str::<TrendsConfig>(s)?
    } else {
        toml::from_str::<TrendsConfig>(s)?
    };
    cfg.validate()
}
