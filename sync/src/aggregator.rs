//! Aggregate dashboard resolution.
//!
//! `resolve` fires one request per planned field concurrently, settles each
//! through the fallback policy and commits the merged snapshot to the cache
//! only if the dashboard slot was not superseded in the meantime and every
//! mandatory field resolved without a transport error.

use crate::cache::{CacheEntry, SnapshotCache};
use crate::config::DashboardConfig;
use crate::diagnostics::{DiagnosticScope, FailureRecord, classify, diagnostic_code};
use crate::fallback::{FallbackPolicy, FieldPayload, Observed};
use crate::fetch::{FetchOutcome, FetchRequest, Transport, fetch};
use crate::sequencer::{RequestSlot, SlotId};
use crate::snapshot::{FallbackReason, Field, Snapshot, VolatileUpdate};
use chrono::Utc;
use futures::future::join_all;
use riskboard_async_utils::CancellationToken;
use riskboard_protocol::{BurstEvents, FieldKind, HealthState, RiskMetric, SelectionKey};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Which fields a resolution fetches and which of them are mandatory.
#[derive(Debug, Clone)]
pub struct DashboardPlan {
    fields: Vec<FieldKind>,
    mandatory: Vec<FieldKind>,
    scope: DiagnosticScope,
    timeseries_hours: u32,
    timeseries_limit: u32,
    breakdown_limit: u32,
    cluster_limit: u32,
    burst_limit: u32,
}

/// First occurrence wins; order is preserved.
fn dedup_kinds(kinds: &[FieldKind]) -> Vec<FieldKind> {
    let mut unique = Vec::with_capacity(kinds.len());
    for kind in kinds {
        if !unique.contains(kind) {
            unique.push(*kind);
        }
    }
    unique
}

fn mandatory_among(mandatory: &[FieldKind], fields: &[FieldKind]) -> Vec<FieldKind> {
    dedup_kinds(mandatory)
        .into_iter()
        .filter(|kind| fields.contains(kind))
        .collect()
}

impl Default for DashboardPlan {
    fn default() -> Self {
        Self::from_config(&DashboardConfig::default())
    }
}

impl DashboardPlan {
    pub fn from_config(config: &DashboardConfig) -> Self {
        let fields = dedup_kinds(&config.fields);
        Self {
            mandatory: mandatory_among(&config.mandatory, &fields),
            fields,
            scope: DiagnosticScope::new(&config.scope_prefix),
            timeseries_hours: config.timeseries_hours,
            timeseries_limit: config.timeseries_limit,
            breakdown_limit: config.breakdown_limit,
            cluster_limit: config.cluster_limit,
            burst_limit: config.burst_limit,
        }
    }

    /// Restrict the plan to `fields`, with `mandatory` among them.
    pub fn with_fields(mut self, fields: &[FieldKind], mandatory: &[FieldKind]) -> Self {
        self.fields = dedup_kinds(fields);
        self.mandatory = mandatory_among(mandatory, &self.fields);
        self
    }

    pub fn fields(&self) -> &[FieldKind] {
        &self.fields
    }

    pub fn mandatory(&self) -> &[FieldKind] {
        &self.mandatory
    }

    pub fn is_mandatory(&self, kind: FieldKind) -> bool {
        self.mandatory.contains(&kind)
    }

    pub fn scope(&self) -> &DiagnosticScope {
        &self.scope
    }

    /// The request that backs `kind` for `key`.
    pub fn request_for(&self, kind: FieldKind, key: &SelectionKey) -> FetchRequest {
        match kind {
            FieldKind::Risk => FetchRequest::new("/api/risk-score").param("ip", key),
            FieldKind::Timeseries => FetchRequest::new("/api/risk-timeseries")
                .param("ip", key)
                .param("hours", self.timeseries_hours)
                .param("limit", self.timeseries_limit),
            FieldKind::Themes => FetchRequest::new("/api/risk-themes")
                .param("ip", key)
                .param("limit", self.breakdown_limit),
            FieldKind::Outlets => FetchRequest::new("/api/risk-outlets")
                .param("ip", key)
                .param("limit", self.breakdown_limit),
            FieldKind::Clusters => FetchRequest::new("/api/ip-clusters")
                .param("ip", key)
                .param("limit", self.cluster_limit),
            FieldKind::Health => FetchRequest::new("/api/health"),
            FieldKind::Bursts => FetchRequest::new("/api/burst-events")
                .param("ip", key)
                .param("limit", self.burst_limit),
        }
    }
}

fn unavailable_message(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Risk => "Risk score is unavailable right now.",
        FieldKind::Timeseries => "Risk trend is unavailable right now.",
        FieldKind::Themes => "Theme breakdown is unavailable right now.",
        FieldKind::Outlets => "Outlet breakdown is unavailable right now.",
        FieldKind::Clusters => "Issue clusters are unavailable right now.",
        FieldKind::Health => "Service health is unavailable right now.",
        FieldKind::Bursts => "Burst events are unavailable right now.",
    }
}

/// Result of one `resolve`/`refresh` call.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Served from the cache without any request.
    Cached(Arc<CacheEntry>),
    /// Freshly fetched and committed to the cache.
    Fresh(Arc<CacheEntry>),
    /// A mandatory field failed; shown with a blocking failure, not cached.
    Blocked(Box<Snapshot>),
    /// A newer resolution started while this one was in flight.
    Superseded,
}

impl Resolution {
    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            Self::Cached(entry) | Self::Fresh(entry) => Some(entry.snapshot.as_ref()),
            Self::Blocked(snapshot) => Some(snapshot.as_ref()),
            Self::Superseded => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded)
    }
}

// Per-resolution bookkeeping while fields settle.
#[derive(Default)]
struct Tally {
    mandatory_failures: HashMap<FieldKind, FailureRecord>,
    soft_failures: BTreeMap<FieldKind, FailureRecord>,
    fallback: Option<FallbackReason>,
}

pub struct Aggregator {
    transport: Arc<dyn Transport>,
    cache: Arc<SnapshotCache>,
    plan: DashboardPlan,
    fallback: FallbackPolicy,
    slot: RequestSlot,
}

impl Aggregator {
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: Arc<SnapshotCache>,
        plan: DashboardPlan,
        fallback: FallbackPolicy,
    ) -> Self {
        Self {
            transport,
            cache,
            plan,
            fallback,
            slot: RequestSlot::new(SlotId::Dashboard),
        }
    }

    pub fn plan(&self) -> &DashboardPlan {
        &self.plan
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    /// Resolve `key`, serving a cached snapshot when there is one.
    pub async fn resolve(&self, key: &SelectionKey) -> Resolution {
        self.run(key, false).await
    }

    /// Resolve `key` from the backend, bypassing the cache.
    pub async fn refresh(&self, key: &SelectionKey) -> Resolution {
        self.run(key, true).await
    }

    async fn run(&self, key: &SelectionKey, force: bool) -> Resolution {
        let ticket = self.slot.begin();

        if !force && let Some(entry) = self.cache.get(key) {
            tracing::debug!(%key, sequence = ticket.sequence(), "dashboard cache hit");
            return Resolution::Cached(entry);
        }

        let snapshot = self.collect(key).await;

        if !self.slot.is_current(&ticket) {
            tracing::debug!(%key, sequence = ticket.sequence(), "discarding superseded dashboard result");
            return Resolution::Superseded;
        }

        if let Some(failure) = &snapshot.failure {
            tracing::warn!(%key, code = %failure.code, "mandatory dashboard field failed");
            return Resolution::Blocked(Box::new(snapshot));
        }

        let using_fallback = snapshot.using_fallback;
        match self
            .cache
            .put_if(key.clone(), snapshot, || self.slot.is_current(&ticket))
        {
            Some(entry) => {
                tracing::info!(%key, using_fallback, "dashboard snapshot resolved");
                Resolution::Fresh(entry)
            }
            None => Resolution::Superseded,
        }
    }

    // Fire every planned request at once and settle the results.
    async fn collect(&self, key: &SelectionKey) -> Snapshot {
        // Aggregate requests are never aborted; a superseded result is
        // simply discarded once it settles.
        let token = CancellationToken::new();
        let mut outcomes = self.fetch_all(self.plan.fields(), key, &token).await;

        let mut tally = Tally::default();
        let mut snapshot = Snapshot::empty(key.clone());
        snapshot.risk = self.settle(&mut outcomes, key, &mut tally);
        snapshot.timeseries = self.settle(&mut outcomes, key, &mut tally);
        snapshot.themes = self.settle(&mut outcomes, key, &mut tally);
        snapshot.outlets = self.settle(&mut outcomes, key, &mut tally);
        snapshot.clusters = self.settle(&mut outcomes, key, &mut tally);
        snapshot.health = self.settle(&mut outcomes, key, &mut tally);
        snapshot.bursts = self.settle(&mut outcomes, key, &mut tally);

        snapshot.mandatory = self.plan.mandatory().to_vec();
        snapshot.failure = self
            .plan
            .fields()
            .iter()
            .find_map(|kind| tally.mandatory_failures.remove(kind));
        snapshot.field_failures = tally.soft_failures;
        snapshot.fallback_reason = tally.fallback;
        snapshot.refreshed_at = Utc::now();
        snapshot.refresh_notices();
        snapshot
    }

    async fn fetch_all(
        &self,
        kinds: &[FieldKind],
        key: &SelectionKey,
        token: &CancellationToken,
    ) -> HashMap<FieldKind, FetchOutcome> {
        let requests: Vec<(FieldKind, FetchRequest)> = kinds
            .iter()
            .map(|kind| (*kind, self.plan.request_for(*kind, key)))
            .collect();

        let outcomes = join_all(requests.iter().map(|(kind, request)| async move {
            (*kind, fetch(self.transport.as_ref(), request, token).await)
        }))
        .await;

        outcomes.into_iter().collect()
    }

    fn observe<T: FieldPayload>(&self, outcome: FetchOutcome) -> Observed<T> {
        let outcome = match outcome {
            // 204 / empty body: the query succeeded with nothing in it.
            FetchOutcome::Data(Value::Null) => return Observed::Data(T::default()),
            other => other.decode::<T>(),
        };
        match outcome {
            FetchOutcome::Data(value) => Observed::Data(value),
            FetchOutcome::Cancelled => Observed::Cancelled,
            FetchOutcome::Failed(failure) => {
                let scope = self.plan.scope().for_field(T::KIND);
                let record = classify(&failure, &scope, unavailable_message(T::KIND));
                tracing::warn!(
                    field = %T::KIND,
                    code = %record.code,
                    error = %failure,
                    "dashboard field fetch failed"
                );
                Observed::Failed(record)
            }
        }
    }

    fn settle<T: FieldPayload>(
        &self,
        outcomes: &mut HashMap<FieldKind, FetchOutcome>,
        key: &SelectionKey,
        tally: &mut Tally,
    ) -> Field<T> {
        let Some(outcome) = outcomes.remove(&T::KIND) else {
            return Field::Missing;
        };
        let mandatory = self.plan.is_mandatory(T::KIND);
        let settled = self
            .fallback
            .settle(self.observe::<T>(outcome), mandatory, key);

        if let Some(reason) = settled.fallback {
            // A degraded fetch outranks a genuine zero.
            if tally.fallback != Some(FallbackReason::FetchFailed) {
                tally.fallback = Some(reason);
            }
        }
        if let Some(record) = settled.failure {
            if mandatory {
                tally.mandatory_failures.insert(T::KIND, record);
            } else {
                tally.soft_failures.insert(T::KIND, record);
            }
        }
        settled.field
    }

    /// Re-fetch the volatile fields of the plan for `key`.
    ///
    /// Returns `None` when `token` fired. Only successful payloads are
    /// carried; a mandatory field is carried only when it is sufficient, so
    /// a poll never swaps good data for an empty reading.
    pub async fn fetch_volatile(
        &self,
        key: &SelectionKey,
        token: &CancellationToken,
    ) -> Option<VolatileUpdate> {
        let kinds: Vec<FieldKind> = self
            .plan
            .fields()
            .iter()
            .copied()
            .filter(|kind| kind.is_volatile())
            .collect();

        let mut outcomes = self.fetch_all(&kinds, key, token).await;
        if token.is_cancelled() {
            return None;
        }

        let mut update = VolatileUpdate::new(key.clone());
        update.risk = self.poll_value::<RiskMetric>(&mut outcomes);
        update.health = self.poll_value::<HealthState>(&mut outcomes);
        update.bursts = self.poll_value::<BurstEvents>(&mut outcomes);
        Some(update)
    }

    fn poll_value<T: FieldPayload>(
        &self,
        outcomes: &mut HashMap<FieldKind, FetchOutcome>,
    ) -> Option<T> {
        let outcome = outcomes.remove(&T::KIND)?;
        let value = match outcome {
            FetchOutcome::Data(Value::Null) => T::default(),
            other => match other.decode::<T>() {
                FetchOutcome::Data(value) => value,
                FetchOutcome::Cancelled => return None,
                FetchOutcome::Failed(failure) => {
                    let scope = self.plan.scope().for_field(T::KIND);
                    tracing::debug!(
                        field = %T::KIND,
                        code = %diagnostic_code(&failure, &scope),
                        "poll fetch failed, keeping last good value"
                    );
                    return None;
                }
            },
        };
        if self.plan.is_mandatory(T::KIND) && !value.is_sufficient() {
            return None;
        }
        Some(value)
    }
}
