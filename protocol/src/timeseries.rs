use serde::Deserialize;
use serde::Serialize;

use crate::Extra;

/// Payload of the time-series endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Timeseries {
    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub items: Vec<TimeseriesPoint>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeseriesPoint {
    #[serde(
        default,
        deserialize_with = "crate::null_as_default",
        alias = "ts",
        alias = "date"
    )]
    pub timestamp: String,

    #[serde(default, alias = "risk_score")]
    pub value: Option<f64>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn null_timestamp_keeps_the_point() {
        let series: Timeseries = serde_json::from_value(json!({
            "items": [{ "timestamp": null, "value": 12.5 }, { "ts": "2026-01-01T00:00:00Z" }]
        }))
        .unwrap();

        assert_eq!(series.items.len(), 2);
        assert_eq!(series.items[0].timestamp, "");
        assert_eq!(series.items[0].value, Some(12.5));
        assert_eq!(series.items[1].timestamp, "2026-01-01T00:00:00Z");
    }
}
