//! Aggregate snapshot model.

use crate::diagnostics::FailureRecord;
use crate::fallback::Sufficiency;
use chrono::{DateTime, Utc};
use riskboard_protocol::{
    Breakdown, BurstEvents, ClusterRow, FieldKind, HealthState, OutletRow, RiskMetric,
    SelectionKey, ThemeRow, Timeseries,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Resolution state of one snapshot field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Field<T> {
    /// Live data with a non-zero primary count.
    Live(T),
    /// The query succeeded but returned nothing.
    Empty,
    /// Sample data substituted for a mandatory field.
    Fallback(T),
    /// Failed or not requested.
    Missing,
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Missing
    }
}

impl<T> Field<T> {
    /// The displayed value, live or fallback.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Live(v) | Self::Fallback(v) => Some(v),
            Self::Empty | Self::Missing => None,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    pub fn state_name(&self) -> &'static str {
        match self {
            Self::Live(_) => "live",
            Self::Empty => "empty",
            Self::Fallback(_) => "fallback",
            Self::Missing => "missing",
        }
    }
}

impl<T: Sufficiency> Field<T> {
    /// `Live` for a sufficient payload, `Empty` otherwise.
    pub fn observed(value: T) -> Self {
        if value.is_sufficient() {
            Self::Live(value)
        } else {
            Self::Empty
        }
    }
}

/// Why sample data is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// The backend answered with zero results.
    NoData,
    /// The backend could not be reached or returned an error.
    FetchFailed,
}

/// Soft, non-blocking messages for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// Some optional fields could not be loaded.
    PartialData { fields: Vec<FieldKind> },
    /// Sample data is shown in place of live data.
    Fallback { reason: FallbackReason },
    /// A mandatory field resolved without any data for this key.
    NoLiveData,
}

/// Immutable result of one aggregate resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub key: SelectionKey,
    pub risk: Field<RiskMetric>,
    pub timeseries: Field<Timeseries>,
    pub themes: Field<Breakdown<ThemeRow>>,
    pub outlets: Field<Breakdown<OutletRow>>,
    pub clusters: Field<Breakdown<ClusterRow>>,
    pub health: Field<HealthState>,
    pub bursts: Field<BurstEvents>,
    /// Fields whose failure blocks caching.
    pub mandatory: Vec<FieldKind>,
    pub using_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
    pub notices: Vec<Notice>,
    /// Blocking failure of a mandatory field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureRecord>,
    /// Soft failures of optional fields.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub field_failures: BTreeMap<FieldKind, FailureRecord>,
    pub refreshed_at: DateTime<Utc>,
}

impl Snapshot {
    /// A snapshot with every field `Missing`.
    pub fn empty(key: SelectionKey) -> Self {
        Self {
            key,
            risk: Field::Missing,
            timeseries: Field::Missing,
            themes: Field::Missing,
            outlets: Field::Missing,
            clusters: Field::Missing,
            health: Field::Missing,
            bursts: Field::Missing,
            mandatory: Vec::new(),
            using_fallback: false,
            fallback_reason: None,
            notices: Vec::new(),
            failure: None,
            field_failures: BTreeMap::new(),
            refreshed_at: Utc::now(),
        }
    }

    /// State name of `kind`, for compact rendering.
    pub fn field_state(&self, kind: FieldKind) -> &'static str {
        match kind {
            FieldKind::Risk => self.risk.state_name(),
            FieldKind::Timeseries => self.timeseries.state_name(),
            FieldKind::Themes => self.themes.state_name(),
            FieldKind::Outlets => self.outlets.state_name(),
            FieldKind::Clusters => self.clusters.state_name(),
            FieldKind::Health => self.health.state_name(),
            FieldKind::Bursts => self.bursts.state_name(),
        }
    }

    fn is_empty_field(&self, kind: FieldKind) -> bool {
        self.field_state(kind) == "empty"
    }

    fn any_fallback(&self) -> bool {
        self.risk.is_fallback()
            || self.timeseries.is_fallback()
            || self.themes.is_fallback()
            || self.outlets.is_fallback()
            || self.clusters.is_fallback()
            || self.health.is_fallback()
            || self.bursts.is_fallback()
    }

    /// Recompute `using_fallback` and `notices` from the field states.
    pub(crate) fn refresh_notices(&mut self) {
        self.using_fallback = self.any_fallback();
        if !self.using_fallback {
            self.fallback_reason = None;
        }

        let mut notices = Vec::new();
        if !self.field_failures.is_empty() {
            notices.push(Notice::PartialData {
                fields: self.field_failures.keys().copied().collect(),
            });
        }
        if self.using_fallback {
            notices.push(Notice::Fallback {
                reason: self.fallback_reason.unwrap_or(FallbackReason::NoData),
            });
        }
        if self.failure.is_none() && self.mandatory.iter().any(|kind| self.is_empty_field(*kind)) {
            notices.push(Notice::NoLiveData);
        }
        self.notices = notices;
    }

    /// Fold a poll result into a copy of this snapshot.
    ///
    /// Only the fields carried by `update` change; everything else, including
    /// chart and list data, is left as it was. Updates for another key are
    /// ignored.
    pub fn merge_volatile(&self, update: &VolatileUpdate) -> Snapshot {
        let mut merged = self.clone();
        if update.key != self.key || update.is_empty() {
            return merged;
        }

        if let Some(risk) = &update.risk {
            merged.risk = Field::observed(risk.clone());
            merged.field_failures.remove(&FieldKind::Risk);
        }
        if let Some(health) = &update.health {
            merged.health = Field::observed(health.clone());
            merged.field_failures.remove(&FieldKind::Health);
        }
        if let Some(bursts) = &update.bursts {
            merged.bursts = Field::observed(bursts.clone());
            merged.field_failures.remove(&FieldKind::Bursts);
        }

        merged.refreshed_at = update.fetched_at;
        merged.refresh_notices();
        merged
    }

    /// Drop the blocking failure once live data has arrived again.
    pub fn clear_failure(&mut self) {
        if self.failure.take().is_some() {
            self.refresh_notices();
        }
    }
}

/// Successfully re-fetched volatile fields from one poll tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolatileUpdate {
    pub key: SelectionKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskMetric>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bursts: Option<BurstEvents>,
    pub fetched_at: DateTime<Utc>,
}

impl VolatileUpdate {
    pub fn new(key: SelectionKey) -> Self {
        Self {
            key,
            risk: None,
            health: None,
            bursts: None,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.risk.is_none() && self.health.is_none() && self.bursts.is_none()
    }

    pub fn fields(&self) -> Vec<FieldKind> {
        let mut fields = Vec::new();
        if self.risk.is_some() {
            fields.push(FieldKind::Risk);
        }
        if self.health.is_some() {
            fields.push(FieldKind::Health);
        }
        if self.bursts.is_some() {
            fields.push(FieldKind::Bursts);
        }
        fields
    }
}
