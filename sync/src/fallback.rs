//! Centralised fallback policy.
//!
//! One sufficiency predicate and one settle rule shared by every field, so
//! the "live, empty or sample data" decision is made in exactly one place.

use crate::config::RiskboardConfig;
use crate::diagnostics::FailureRecord;
use crate::errors::{Result, SyncError};
use crate::snapshot::{FallbackReason, Field};
use riskboard_protocol::{
    Breakdown, BreakdownMeta, BurstEvents, ClusterRow, FieldKind, HealthState, OutletRow,
    RiskMeta, RiskMetric, SelectionKey, ThemeRow, Timeseries, TimeseriesPoint,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Primary count/size indicator of a payload.
pub trait Sufficiency {
    fn primary_count(&self) -> Option<u64>;

    /// Sufficient iff the indicator is present and non-zero.
    fn is_sufficient(&self) -> bool {
        matches!(self.primary_count(), Some(n) if n > 0)
    }
}

impl Sufficiency for RiskMetric {
    fn primary_count(&self) -> Option<u64> {
        self.meta.total_count
    }
}

impl Sufficiency for Timeseries {
    fn primary_count(&self) -> Option<u64> {
        Some(self.items.len() as u64)
    }
}

impl<T> Sufficiency for Breakdown<T> {
    fn primary_count(&self) -> Option<u64> {
        Some(self.count())
    }
}

impl Sufficiency for BurstEvents {
    fn primary_count(&self) -> Option<u64> {
        Some(self.items.len() as u64)
    }
}

impl Sufficiency for HealthState {
    fn primary_count(&self) -> Option<u64> {
        self.recent_count
    }

    // A health report is meaningful even when nothing was ingested recently.
    fn is_sufficient(&self) -> bool {
        true
    }
}

/// A payload type that backs one snapshot field.
pub trait FieldPayload: Sufficiency + DeserializeOwned + Clone + Default + Send {
    const KIND: FieldKind;

    /// Sample value for `key`, if the dataset has one.
    fn from_dataset(dataset: &FallbackDataset, key: &SelectionKey) -> Option<Self>;
}

impl FieldPayload for RiskMetric {
    const KIND: FieldKind = FieldKind::Risk;

    fn from_dataset(dataset: &FallbackDataset, key: &SelectionKey) -> Option<Self> {
        let mut risk = dataset.risk.clone()?;
        risk.meta.key = Some(key.to_string());
        Some(risk)
    }
}

impl FieldPayload for Timeseries {
    const KIND: FieldKind = FieldKind::Timeseries;

    fn from_dataset(dataset: &FallbackDataset, _key: &SelectionKey) -> Option<Self> {
        dataset.timeseries.clone()
    }
}

impl FieldPayload for Breakdown<ThemeRow> {
    const KIND: FieldKind = FieldKind::Themes;

    fn from_dataset(dataset: &FallbackDataset, _key: &SelectionKey) -> Option<Self> {
        dataset.themes.clone()
    }
}

impl FieldPayload for Breakdown<OutletRow> {
    const KIND: FieldKind = FieldKind::Outlets;

    fn from_dataset(dataset: &FallbackDataset, _key: &SelectionKey) -> Option<Self> {
        dataset.outlets.clone()
    }
}

impl FieldPayload for Breakdown<ClusterRow> {
    const KIND: FieldKind = FieldKind::Clusters;

    fn from_dataset(dataset: &FallbackDataset, _key: &SelectionKey) -> Option<Self> {
        dataset.clusters.clone()
    }
}

impl FieldPayload for HealthState {
    const KIND: FieldKind = FieldKind::Health;

    fn from_dataset(dataset: &FallbackDataset, _key: &SelectionKey) -> Option<Self> {
        dataset.health.clone()
    }
}

impl FieldPayload for BurstEvents {
    const KIND: FieldKind = FieldKind::Bursts;

    fn from_dataset(dataset: &FallbackDataset, _key: &SelectionKey) -> Option<Self> {
        dataset.bursts.clone()
    }
}

/// What one field fetch produced, after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum Observed<T> {
    Data(T),
    Failed(FailureRecord),
    Cancelled,
}

/// A settled field plus what the aggregator needs to record about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Settled<T> {
    pub field: Field<T>,
    pub failure: Option<FailureRecord>,
    pub fallback: Option<FallbackReason>,
}

impl<T> Settled<T> {
    fn plain(field: Field<T>) -> Self {
        Self {
            field,
            failure: None,
            fallback: None,
        }
    }
}

/// Sample data served when mandatory fields come back empty or fail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FallbackDataset {
    #[serde(default)]
    pub risk: Option<RiskMetric>,
    #[serde(default)]
    pub timeseries: Option<Timeseries>,
    #[serde(default)]
    pub themes: Option<Breakdown<ThemeRow>>,
    #[serde(default)]
    pub outlets: Option<Breakdown<OutletRow>>,
    #[serde(default)]
    pub clusters: Option<Breakdown<ClusterRow>>,
    #[serde(default)]
    pub health: Option<HealthState>,
    #[serde(default)]
    pub bursts: Option<BurstEvents>,
}

impl FallbackDataset {
    /// Read a dataset from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SyncError::fallback_with_source(format!("failed to read {}", path.display()), e)
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            SyncError::fallback_with_source(format!("failed to parse {}", path.display()), e)
        })
    }

    /// Built-in sample dataset.
    pub fn sample() -> Self {
        let mut components = riskboard_protocol::Extra::new();
        components.insert("volume".into(), 0.42.into());
        components.insert("sentiment".into(), 0.31.into());
        components.insert("spread".into(), 0.18.into());

        let series = [28.0, 31.5, 30.0, 36.5, 41.0, 38.0, 35.0];
        let timeseries = Timeseries {
            items: series
                .iter()
                .enumerate()
                .map(|(day, value)| TimeseriesPoint {
                    timestamp: format!("2026-01-{:02}T00:00:00Z", day + 1),
                    value: Some(*value),
                    ..TimeseriesPoint::default()
                })
                .collect(),
        };

        let themes = ["billing", "service outage", "update"]
            .iter()
            .zip([18_u64, 12, 7])
            .map(|(theme, count)| ThemeRow {
                theme: (*theme).to_string(),
                article_count: count,
                negative_ratio: Some(0.4),
                ..ThemeRow::default()
            })
            .collect();

        let outlets = ["Daily Wire Service", "Game Weekly", "Tech Herald"]
            .iter()
            .zip([20_u64, 16, 12])
            .map(|(outlet, count)| OutletRow {
                outlet: (*outlet).to_string(),
                article_count: count,
                positive_ratio: Some(0.2),
                neutral_ratio: Some(0.5),
                negative_ratio: Some(0.3),
                ..OutletRow::default()
            })
            .collect();

        let clusters = vec![
            ClusterRow {
                cluster: "probability disclosure".into(),
                article_count: 14,
                negative_ratio: Some(0.6),
                keywords: vec!["rates".into(), "disclosure".into()],
                ..ClusterRow::default()
            },
            ClusterRow {
                cluster: "server maintenance".into(),
                article_count: 9,
                negative_ratio: Some(0.3),
                keywords: vec!["downtime".into(), "compensation".into()],
                ..ClusterRow::default()
            },
        ];

        Self {
            risk: Some(RiskMetric {
                meta: RiskMeta {
                    total_count: Some(48),
                    window_hours: Some(168),
                    ..RiskMeta::default()
                },
                value: Some(35.0),
                components,
                alert_level: Some("P3".into()),
                confidence: Some(0.5),
                ..RiskMetric::default()
            }),
            timeseries: Some(timeseries),
            themes: Some(Breakdown {
                meta: BreakdownMeta::default(),
                items: themes,
            }),
            outlets: Some(Breakdown {
                meta: BreakdownMeta::default(),
                items: outlets,
            }),
            clusters: Some(Breakdown {
                meta: BreakdownMeta::default(),
                items: clusters,
            }),
            health: Some(HealthState {
                ok: true,
                mode: Some("sample".into()),
                ..HealthState::default()
            }),
            bursts: Some(BurstEvents::default()),
        }
    }
}

/// Decides between live, empty, sample and missing for every field.
#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    enabled: bool,
    dataset: Arc<FallbackDataset>,
}

impl FallbackPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            dataset: Arc::new(FallbackDataset::default()),
        }
    }

    pub fn enabled(dataset: FallbackDataset) -> Self {
        Self {
            enabled: true,
            dataset: Arc::new(dataset),
        }
    }

    /// Policy from `[fallback]`: a configured dataset file, else the sample.
    pub fn from_config(config: &RiskboardConfig) -> Result<Self> {
        if !config.fallback.enabled {
            return Ok(Self::disabled());
        }
        let dataset = match config.resolved_dataset_path() {
            Some(path) => FallbackDataset::load(&path)?,
            None => FallbackDataset::sample(),
        };
        Ok(Self::enabled(dataset))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Settle one observed field.
    ///
    /// Sample data only ever replaces mandatory fields. A failed mandatory
    /// field keeps its failure even when sample data is shown, so it still
    /// blocks caching.
    pub fn settle<T: FieldPayload>(
        &self,
        observed: Observed<T>,
        mandatory: bool,
        key: &SelectionKey,
    ) -> Settled<T> {
        let substitute = || {
            if mandatory && self.enabled {
                T::from_dataset(&self.dataset, key)
            } else {
                None
            }
        };

        match observed {
            Observed::Data(value) if value.is_sufficient() => Settled::plain(Field::Live(value)),
            Observed::Data(_) => match substitute() {
                Some(sample) => Settled {
                    field: Field::Fallback(sample),
                    failure: None,
                    fallback: Some(FallbackReason::NoData),
                },
                None => Settled::plain(Field::Empty),
            },
            Observed::Failed(record) => match substitute() {
                Some(sample) => Settled {
                    field: Field::Fallback(sample),
                    failure: Some(record),
                    fallback: Some(FallbackReason::FetchFailed),
                },
                None => Settled {
                    field: Field::Missing,
                    failure: Some(record),
                    fallback: None,
                },
            },
            Observed::Cancelled => Settled::plain(Field::Missing),
        }
    }
}
