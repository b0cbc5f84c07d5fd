use serde::Deserialize;
use serde::Serialize;
use strum_macros::AsRefStr;
use strum_macros::Display;
use strum_macros::EnumIter;
use strum_macros::EnumString;

/// One independently fetched part of a dashboard snapshot.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FieldKind {
    /// Primary risk metric (score, components, article count).
    Risk,
    /// Risk score over time.
    Timeseries,
    /// Breakdown by risk theme (category).
    Themes,
    /// Breakdown by news outlet (source).
    Outlets,
    /// Issue cluster summary.
    Clusters,
    /// Backend operational health.
    Health,
    /// Recent burst/alert events.
    Bursts,
}

impl FieldKind {
    /// Fields re-fetched by the background poller.
    pub fn is_volatile(self) -> bool {
        matches!(self, Self::Risk | Self::Health | Self::Bursts)
    }

    /// Short area tag used when building diagnostic scopes.
    pub fn scope_area(self) -> &'static str {
        match self {
            Self::Risk => "RISK",
            Self::Timeseries => "TS",
            Self::Themes => "THEME",
            Self::Outlets => "OUTLET",
            Self::Clusters => "CLUSTER",
            Self::Health => "HEALTH",
            Self::Bursts => "BURST",
        }
    }
}
