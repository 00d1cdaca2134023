use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::HarvestError;
use crate::types::ListingKind;

/// TOML-backed harvest configuration. Every section is optional.
/// Secrets (access token) stay as env vars, see [`ApiConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub harvest: HarvestConfig,
    pub authors: AuthorsConfig,
    pub rebloggers: RebloggersConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarvestConfig {
    /// Work units executing at the same time.
    pub concurrency: usize,
    /// Cap on pending units attempted in one run. `None` attempts all of them.
    pub batch_size: Option<usize>,
    /// Pause before every page request after the first one of a unit.
    pub page_delay_ms: u64,
    /// Cap on records collected by a cursor-paged unit.
    pub max_records_per_unit: Option<usize>,
    /// Root of the per-kind checkpoint directories.
    pub checkpoint_dir: PathBuf,
    /// Where merged datasets land when no explicit output path is given.
    pub output_dir: PathBuf,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            concurrency: 7,
            batch_size: None,
            page_delay_ms: 1000,
            max_records_per_unit: None,
            checkpoint_dir: PathBuf::from("data/checkpoints"),
            output_dir: PathBuf::from("data"),
        }
    }
}

impl HarvestConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    /// Each listing kind keeps its artifacts in its own subdirectory.
    pub fn checkpoint_dir_for(&self, kind: ListingKind) -> PathBuf {
        self.checkpoint_dir.join(kind.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorsConfig {
    /// Instances whose trending lists are harvested.
    pub hosts: Vec<String>,
    /// Offset ranges each host's trending list is split into.
    pub chunks_per_host: usize,
    /// Records requested from each offset range.
    pub records_per_unit: usize,
}

impl Default for AuthorsConfig {
    fn default() -> Self {
        Self {
            hosts: [
                "mastodon.social",
                "mstdn.social",
                "mastodon.world",
                "mas.to",
                "techhub.social",
                "universeodon.com",
                "mastodonapp.uk",
                "c.im",
                "fosstodon.org",
                "mstdn.party",
                "mastodon.nl",
                "piaille.fr",
                "kolektiva.social",
                "mastodon.art",
                "mamot.fr",
            ]
            .iter()
            .map(|h| h.to_string())
            .collect(),
            chunks_per_host: 5,
            records_per_unit: 1000,
        }
    }
}

/// Upstream table for a rebloggers run and the columns a work unit is built from.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RebloggersConfig {
    /// CSV or Parquet file, usually a merged authors dataset.
    pub source: PathBuf,
    pub target_column: String,
    pub parent_column: String,
    pub host_column: String,
}

impl Default for RebloggersConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("data/authors.csv"),
            target_column: "parent_id".to_string(),
            parent_column: "id".to_string(),
            host_column: "host".to_string(),
        }
    }
}

impl FileConfig {
    /// Reject values that would make a run meaningless.
    pub fn validate(&self, kind: ListingKind) -> std::result::Result<(), HarvestError> {
        let harvest = &self.harvest;
        if harvest.concurrency == 0 {
            return Err(HarvestError::Config("harvest.concurrency must be at least 1".into()));
        }
        if harvest.batch_size == Some(0) {
            return Err(HarvestError::Config("harvest.batch_size must be at least 1".into()));
        }
        if harvest.max_records_per_unit == Some(0) {
            return Err(HarvestError::Config(
                "harvest.max_records_per_unit must be at least 1".into(),
            ));
        }
        match kind {
            ListingKind::Authors => {
                if self.authors.hosts.is_empty() {
                    return Err(HarvestError::Config("authors.hosts is empty".into()));
                }
                let a = &self.authors;
                let span = a.chunks_per_host.checked_mul(a.records_per_unit);
                if span.map_or(true, |n| n > u32::MAX as usize) {
                    return Err(HarvestError::Config(
                        "authors.chunks_per_host * authors.records_per_unit exceeds the trending offset range"
                            .into(),
                    ));
                }
                if self.authors.chunks_per_host == 0 || self.authors.records_per_unit == 0 {
                    return Err(HarvestError::Config(
                        "authors.chunks_per_host and authors.records_per_unit must be at least 1"
                            .into(),
                    ));
                }
            }
            ListingKind::Rebloggers => {
                let r = &self.rebloggers;
                if r.target_column.is_empty() || r.parent_column.is_empty() || r.host_column.is_empty() {
                    return Err(HarvestError::Config("rebloggers column names must not be empty".into()));
                }
            }
        }
        Ok(())
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(config)
}

/// Remote API settings loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub access_token: Option<String>,
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let timeout_secs: u64 = std::env::var("MASTODON_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .context("MASTODON_TIMEOUT_SECS must be a number")?;

        let config = Self {
            access_token: std::env::var("MASTODON_ACCESS_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            timeout: Duration::from_secs(timeout_secs),
        };

        config.log_keys();
        Ok(config)
    }

    fn log_keys(&self) {
        tracing::info!("API config loaded:");
        tracing::info!("  MASTODON_ACCESS_TOKEN: {}", preview_secret(&self.access_token));
        tracing::info!("  MASTODON_TIMEOUT_SECS: {}", self.timeout.as_secs());
    }
}

/// First five characters of a secret and its length.
fn preview_secret(val: &Option<String>) -> String {
    match val {
        Some(v) => {
            let head: String = v.chars().take(5).collect();
            format!("{}...({} chars)", head, v.chars().count())
        }
        None => "<not set>".to_string(),
    }
}
