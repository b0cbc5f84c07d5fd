//! Wire types for the backend read endpoints consumed by the dashboard
//! engine.
//!
//! Every payload keeps unknown fields in a flattened `extra` map so the
//! presentation layer can render attributes this crate does not model.

pub mod alerts;
pub mod articles;
pub mod breakdown;
pub mod field;
pub mod health;
pub mod key;
pub mod risk;
pub mod timeseries;

pub use alerts::BurstEvent;
pub use alerts::BurstEvents;
pub use articles::Article;
pub use articles::ArticlePage;
pub use breakdown::Breakdown;
pub use breakdown::BreakdownMeta;
pub use breakdown::ClusterRow;
pub use breakdown::OutletRow;
pub use breakdown::ThemeRow;
pub use field::FieldKind;
pub use health::HealthState;
pub use key::SelectionKey;
pub use risk::RiskMeta;
pub use risk::RiskMetric;
pub use timeseries::Timeseries;
pub use timeseries::TimeseriesPoint;

use serde::Deserialize;
use serde::Deserializer;

/// Unknown attributes carried through untouched.
pub type Extra = serde_json::Map<String, serde_json::Value>;

/// Treat an explicit `null` like a missing key.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
