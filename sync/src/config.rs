//! Engine configuration loading
//!
//! Loads configuration from `~/.config/riskboard/riskboard.toml` (or the
//! `RISKBOARD_CONFIG` env var). Missing files fall back to defaults;
//! `RISKBOARD_API_BASE_URL` and `RISKBOARD_USE_FALLBACK` override the file.

use crate::errors::{Result, SyncError};
use riskboard_protocol::FieldKind;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use strum::IntoEnumIterator;

/// Diagnostic code reported when a production build targets a loopback API.
pub const LOCALHOST_IN_PRODUCTION: &str = "API-BASE-LOCALHOST-PROD";

/// Root configuration for the dashboard engine
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RiskboardConfig {
    /// Backend API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Aggregate dashboard settings
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Fallback (sample data) policy
    #[serde(default)]
    pub fallback: FallbackConfig,

    /// Paginated article list settings
    #[serde(default)]
    pub articles: ArticlesConfig,

    /// Background refresh settings
    #[serde(default)]
    pub poller: PollerConfig,

    /// Snapshot cache settings
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Backend API configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Base URL every endpoint path is joined onto
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Whether this is a production deployment (enables the loopback guardrail)
    #[serde(default)]
    pub production: bool,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_timeout_ms() -> u64 {
    12_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            production: false,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// `Some(code)` when the base URL points at a loopback or unspecified
    /// host while `production` is set.
    pub fn guardrail(&self) -> Option<&'static str> {
        if !self.production {
            return None;
        }
        let parsed = url::Url::parse(&self.base_url).ok()?;
        let loopback = match parsed.host()? {
            url::Host::Domain(domain) => domain.eq_ignore_ascii_case("localhost"),
            url::Host::Ipv4(ip) => ip.is_loopback() || ip.is_unspecified(),
            url::Host::Ipv6(ip) => ip.is_loopback() || ip.is_unspecified(),
        };
        loopback.then_some(LOCALHOST_IN_PRODUCTION)
    }
}

/// Aggregate dashboard configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    /// Fields fetched on every resolution
    #[serde(default = "default_fields")]
    pub fields: Vec<FieldKind>,

    /// Fields whose failure blocks caching
    #[serde(default = "default_mandatory")]
    pub mandatory: Vec<FieldKind>,

    /// Page part of every diagnostic scope (`DASH` → `DASH-RISK-HTTP-502`)
    #[serde(default = "default_scope_prefix")]
    pub scope_prefix: String,

    /// Time-series window in hours
    #[serde(default = "default_timeseries_hours")]
    pub timeseries_hours: u32,

    /// Maximum time-series points
    #[serde(default = "default_timeseries_limit")]
    pub timeseries_limit: u32,

    /// Rows requested from theme/outlet breakdowns
    #[serde(default = "default_breakdown_limit")]
    pub breakdown_limit: u32,

    /// Clusters requested from the cluster summary
    #[serde(default = "default_cluster_limit")]
    pub cluster_limit: u32,

    /// Burst events requested
    #[serde(default = "default_burst_limit")]
    pub burst_limit: u32,
}

fn default_fields() -> Vec<FieldKind> {
    FieldKind::iter().collect()
}
fn default_mandatory() -> Vec<FieldKind> {
    vec![FieldKind::Risk, FieldKind::Timeseries]
}
fn default_scope_prefix() -> String {
    "DASH".to_string()
}
fn default_timeseries_hours() -> u32 {
    168
}
fn default_timeseries_limit() -> u32 {
    600
}
fn default_breakdown_limit() -> u32 {
    10
}
fn default_cluster_limit() -> u32 {
    6
}
fn default_burst_limit() -> u32 {
    50
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            fields: default_fields(),
            mandatory: default_mandatory(),
            scope_prefix: default_scope_prefix(),
            timeseries_hours: default_timeseries_hours(),
            timeseries_limit: default_timeseries_limit(),
            breakdown_limit: default_breakdown_limit(),
            cluster_limit: default_cluster_limit(),
            burst_limit: default_burst_limit(),
        }
    }
}

/// Fallback policy configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct FallbackConfig {
    /// Substitute sample data when mandatory fields are empty or failed
    #[serde(default)]
    pub enabled: bool,

    /// JSON dataset to substitute; the built-in sample is used when unset
    #[serde(default)]
    pub dataset_path: Option<String>,
}

/// Article list configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ArticlesConfig {
    /// Paginated list endpoint path
    #[serde(default = "default_articles_endpoint")]
    pub endpoint: String,

    /// Items requested per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Area part of the article diagnostic scope
    #[serde(default = "default_articles_scope")]
    pub scope: String,
}

fn default_articles_endpoint() -> String {
    "/api/articles".to_string()
}
fn default_page_size() -> usize {
    20
}
fn default_articles_scope() -> String {
    "ART".to_string()
}

impl Default for ArticlesConfig {
    fn default() -> Self {
        Self {
            endpoint: default_articles_endpoint(),
            page_size: default_page_size(),
            scope: default_articles_scope(),
        }
    }
}

/// Background poller configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PollerConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    60
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Snapshot cache configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CacheConfig {
    /// LRU cap on cached keys (0 = unbounded)
    #[serde(default)]
    pub max_entries: usize,
}

impl RiskboardConfig {
    /// Environment variable for config path override
    pub const ENV_CONFIG_PATH: &'static str = "RISKBOARD_CONFIG";

    /// Environment variable overriding `api.base_url`
    pub const ENV_BASE_URL: &'static str = "RISKBOARD_API_BASE_URL";

    /// Environment variable overriding `fallback.enabled`
    pub const ENV_USE_FALLBACK: &'static str = "RISKBOARD_USE_FALLBACK";

    /// Default config filename
    pub const DEFAULT_CONFIG_FILENAME: &'static str = "riskboard.toml";

    /// Load configuration from file plus environment overrides
    ///
    /// Resolution order:
    /// 1. `RISKBOARD_CONFIG` environment variable
    /// 2. `~/.config/riskboard/riskboard.toml`
    ///
    /// If the config file doesn't exist, defaults are used.
    pub fn load() -> Result<Self> {
        let path = Self::resolve_config_path();

        let mut cfg = if path.exists() {
            Self::read_file(&path)?
        } else {
            tracing::info!(
                path = %path.display(),
                "riskboard config not found, using defaults"
            );
            Self::default()
        };

        cfg.apply_overrides(|name| std::env::var(name).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from a specific path (no env overrides)
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let cfg = Self::read_file(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse configuration from a TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let cfg = Self::parse_unvalidated(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SyncError::config_with_source(format!("failed to read config at {}", path.display()), e)
        })?;
        Self::parse_unvalidated(&contents)
    }

    fn parse_unvalidated(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| SyncError::config_with_source("failed to parse config", e))
    }

    /// Apply env-style overrides through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(base_url) = lookup(Self::ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.api.base_url = base_url.trim().to_string();
        }
        if let Some(flag) = lookup(Self::ENV_USE_FALLBACK) {
            self.fallback.enabled = flag.trim().eq_ignore_ascii_case("true");
        }
    }

    fn resolve_config_path() -> PathBuf {
        if let Ok(path) = std::env::var(Self::ENV_CONFIG_PATH) {
            return PathBuf::from(path);
        }

        dirs::home_dir()
            .map(|h| {
                h.join(".config")
                    .join("riskboard")
                    .join(Self::DEFAULT_CONFIG_FILENAME)
            })
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CONFIG_FILENAME))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api.base_url).map_err(|e| {
            SyncError::config_with_source(format!("invalid api.base_url {:?}", self.api.base_url), e)
        })?;

        if self.api.timeout_ms == 0 {
            return Err(SyncError::config("api.timeout_ms must be greater than zero"));
        }
        if self.articles.page_size == 0 {
            return Err(SyncError::config("articles.page_size must be greater than zero"));
        }
        if self.poller.interval_secs == 0 {
            return Err(SyncError::config("poller.interval_secs must be greater than zero"));
        }
        if self.dashboard.fields.is_empty() {
            return Err(SyncError::config("dashboard.fields must name at least one field"));
        }
        if let Some(stray) = self
            .dashboard
            .mandatory
            .iter()
            .find(|kind| !self.dashboard.fields.contains(kind))
        {
            return Err(SyncError::config(format!(
                "dashboard.mandatory lists `{stray}` which is not in dashboard.fields"
            )));
        }

        if let Some(code) = self.api.guardrail() {
            tracing::warn!(
                code,
                base_url = %self.api.base_url,
                "production build points at a loopback API"
            );
        }

        Ok(())
    }

    /// Fallback dataset path with `~/` expanded
    pub fn resolved_dataset_path(&self) -> Option<PathBuf> {
        let path = self.fallback.dataset_path.as_deref()?;
        if let Some(stripped) = path.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return Some(home.join(stripped));
        }
        Some(PathBuf::from(path))
    }
}
