//! Data-synchronisation engine for the risk dashboard.
//!
//! The engine turns a user's selection key into a coherent dashboard view:
//! it fans out concurrent reads, discards superseded responses, caches
//! per-key snapshots, pages through the article list and refreshes volatile
//! fields in the background. Backend trouble never surfaces as `Err`; it is
//! classified into a [`FailureRecord`] and returned as data.
//!
//! ```rust,ignore
//! let engine = DashboardEngine::load()?;
//! let key = SelectionKey::from("maplestory");
//!
//! match engine.resolve(&key).await {
//!     Resolution::Cached(entry) | Resolution::Fresh(entry) => render(&entry.snapshot),
//!     Resolution::Blocked(snapshot) => render_blocking_error(&snapshot),
//!     Resolution::Superseded => {}
//! }
//! engine.load_page(&ListQuery::new(key.clone()), LoadMode::Reset).await;
//! let mut poller = engine.spawn_poller(key);
//! ```

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod fallback;
pub mod fetch;
pub mod http;
pub mod paginator;
pub mod poller;
pub mod sequencer;
pub mod snapshot;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use aggregator::{Aggregator, DashboardPlan, Resolution};
pub use cache::{CacheEntry, SnapshotCache};
pub use config::RiskboardConfig;
pub use diagnostics::{DiagnosticScope, FailureRecord, classify, diagnostic_code};
pub use errors::{ErrorCategory, Result, SyncError};
pub use fallback::{FallbackDataset, FallbackPolicy, Sufficiency};
pub use fetch::{FetchFailure, FetchOutcome, FetchRequest, Transport, fetch};
pub use http::HttpTransport;
pub use paginator::{ListQuery, LoadMode, PageOutcome, PageState, Paginator};
pub use poller::{HostVisibility, PollOutcome, Poller, PollerHandle};
pub use riskboard_async_utils::CancellationToken;
pub use riskboard_protocol::{FieldKind, SelectionKey};
pub use sequencer::{RequestSlot, SlotId, SlotTicket};
pub use snapshot::{FallbackReason, Field, Notice, Snapshot, VolatileUpdate};

use std::sync::Arc;

/// One engine per session: owns the cache, the request slots and the
/// article list state.
pub struct DashboardEngine {
    config: RiskboardConfig,
    cache: Arc<SnapshotCache>,
    aggregator: Arc<Aggregator>,
    paginator: Paginator,
    poll_slot: Arc<RequestSlot>,
    visibility: HostVisibility,
}

impl DashboardEngine {
    /// Engine from the user's config file and environment.
    pub fn load() -> Result<Self> {
        Self::from_config(RiskboardConfig::load()?)
    }

    /// Engine talking HTTP to `config.api.base_url`.
    pub fn from_config(config: RiskboardConfig) -> Result<Self> {
        let transport = HttpTransport::from_config(&config.api)?;
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(config: RiskboardConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let fallback = FallbackPolicy::from_config(&config)?;
        let cache = Arc::new(SnapshotCache::new(config.cache.max_entries));
        let aggregator = Arc::new(Aggregator::new(
            Arc::clone(&transport),
            Arc::clone(&cache),
            DashboardPlan::from_config(&config.dashboard),
            fallback,
        ));
        let paginator = Paginator::from_config(transport, &config.articles);

        tracing::info!(
            base_url = %config.api.base_url,
            fields = config.dashboard.fields.len(),
            fallback = config.fallback.enabled,
            "dashboard engine ready"
        );

        Ok(Self {
            config,
            cache,
            aggregator,
            paginator,
            poll_slot: Arc::new(RequestSlot::new(SlotId::Poll)),
            visibility: HostVisibility::default(),
        })
    }

    pub fn config(&self) -> &RiskboardConfig {
        &self.config
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    pub fn visibility(&self) -> &HostVisibility {
        &self.visibility
    }

    /// Snapshot for `key`, from the cache when possible.
    pub async fn resolve(&self, key: &SelectionKey) -> Resolution {
        self.aggregator.resolve(key).await
    }

    /// Explicit refresh: re-fetch `key` even if it is cached.
    pub async fn refresh(&self, key: &SelectionKey) -> Resolution {
        self.aggregator.refresh(key).await
    }

    pub async fn load_page(&self, query: &ListQuery, mode: LoadMode) -> PageOutcome {
        self.paginator.load_page(query, mode).await
    }

    pub fn page_state(&self) -> PageState {
        self.paginator.state()
    }

    /// Abort the article list's in-flight request (view teardown).
    pub fn cancel_pages(&self) {
        self.paginator.cancel();
    }

    /// One volatile refresh for `key`, outside any background loop.
    pub async fn poll_once(&self, key: &SelectionKey) -> PollOutcome {
        poller::poll_tick(
            &self.aggregator,
            key,
            &self.poll_slot,
            &CancellationToken::new(),
        )
        .await
    }

    /// Start the background poller for `key` at the configured interval.
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn_poller(&self, key: SelectionKey) -> PollerHandle {
        Poller::spawn(
            Arc::clone(&self.aggregator),
            key,
            self.config.poller.interval(),
            self.visibility.clone(),
            Arc::clone(&self.poll_slot),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedTransport;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn engine(transport: &Arc<ScriptedTransport>, config: RiskboardConfig) -> DashboardEngine {
        DashboardEngine::with_transport(config, Arc::clone(transport) as Arc<dyn Transport>)
            .expect("engine")
    }

    fn script(transport: &ScriptedTransport) {
        transport.respond(
            "/api/risk-score",
            json!({ "meta": { "totalCount": 120 }, "value": 42.0 }),
        );
        transport.respond(
            "/api/risk-timeseries",
            json!({ "items": [{ "timestamp": "2026-01-01T00:00:00Z", "value": 40.0 }] }),
        );
        transport.respond("/api/health", json!({ "ok": true }));
        transport.respond(
            "/api/articles",
            json!({ "items": [{ "title": "a" }, { "title": "b" }], "total": 2 }),
        );
    }

    fn two_field_config() -> RiskboardConfig {
        RiskboardConfig::parse(
            r#"
            [dashboard]
            fields = ["risk", "timeseries", "health"]
            "#,
        )
        .expect("config")
    }

    #[tokio::test]
    async fn resolve_then_cache_hit() {
        let transport = Arc::new(ScriptedTransport::new());
        script(&transport);
        let engine = engine(&transport, two_field_config());
        let key = SelectionKey::from("A");

        assert!(matches!(engine.resolve(&key).await, Resolution::Fresh(_)));
        assert!(matches!(engine.resolve(&key).await, Resolution::Cached(_)));
        assert_eq!(transport.call_count(), 3);
        assert_eq!(engine.cache().len(), 1);

        assert!(matches!(engine.refresh(&key).await, Resolution::Fresh(_)));
        assert_eq!(transport.call_count(), 6);
    }

    #[tokio::test]
    async fn pages_and_cancel() {
        let transport = Arc::new(ScriptedTransport::new());
        script(&transport);
        let engine = engine(&transport, two_field_config());

        let outcome = engine
            .load_page(&ListQuery::new("A"), LoadMode::Reset)
            .await;

        assert!(matches!(outcome, PageOutcome::Loaded(_)));
        assert_eq!(engine.page_state().items.len(), 2);
        assert!(!engine.page_state().has_more);

        engine.cancel_pages();
        assert!(!engine.page_state().loading);
    }

    #[tokio::test]
    async fn poll_once_never_touches_cache() {
        let transport = Arc::new(ScriptedTransport::new());
        script(&transport);
        let engine = engine(&transport, two_field_config());

        let outcome = engine.poll_once(&SelectionKey::from("A")).await;

        let PollOutcome::Updated(update) = outcome else {
            panic!("expected update");
        };
        assert_eq!(update.fields(), vec![FieldKind::Risk, FieldKind::Health]);
        assert!(engine.cache().is_empty());
    }

    #[test]
    fn fallback_config_with_missing_dataset_fails_fast() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut config = RiskboardConfig::default();
        config.fallback.enabled = true;
        config.fallback.dataset_path = Some("/nonexistent/riskboard-sample.json".into());

        let err = DashboardEngine::with_transport(config, transport as Arc<dyn Transport>)
            .err()
            .expect("dataset error");

        assert_eq!(err.category(), ErrorCategory::FallbackError);
    }
}
