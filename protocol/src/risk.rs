use serde::Deserialize;
use serde::Serialize;

use crate::Extra;

/// Payload of the aggregate risk metric endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskMetric {
    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub meta: RiskMeta,

    /// Headline risk score.
    #[serde(default, alias = "risk_score")]
    pub value: Option<f64>,

    /// Named sub-scores that make up `value`.
    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub components: Extra,

    #[serde(default)]
    pub alert_level: Option<String>,

    #[serde(default)]
    pub confidence: Option<f64>,

    #[serde(default)]
    pub issue_heat: Option<f64>,

    #[serde(default)]
    pub risk_formula_version: Option<String>,

    #[serde(default)]
    pub data_quality_flag: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskMeta {
    /// Number of articles the metric was computed from.
    #[serde(default, alias = "totalCount", alias = "total_articles")]
    pub total_count: Option<u64>,

    /// Selection key the backend computed this metric for.
    #[serde(default, alias = "ip_id")]
    pub key: Option<String>,

    #[serde(default)]
    pub window_hours: Option<u32>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn accepts_both_camel_and_backend_names() {
        let camel: RiskMetric = serde_json::from_value(json!({
            "meta": { "totalCount": 120 },
            "value": 42.0,
        }))
        .unwrap();
        let backend: RiskMetric = serde_json::from_value(json!({
            "meta": { "total_articles": 120, "ip_id": "maplestory", "window_hours": 24 },
            "risk_score": 42.0,
            "alert_level": "P2",
            "components": { "volume": 0.4 },
        }))
        .unwrap();

        assert_eq!(camel.meta.total_count, Some(120));
        assert_eq!(camel.value, Some(42.0));
        assert_eq!(backend.meta.total_count, Some(120));
        assert_eq!(backend.meta.key.as_deref(), Some("maplestory"));
        assert_eq!(backend.value, Some(42.0));
        assert_eq!(backend.alert_level.as_deref(), Some("P2"));
        assert_eq!(backend.components.get("volume"), Some(&json!(0.4)));
    }

    #[test]
    fn unknown_fields_survive() {
        let metric: RiskMetric = serde_json::from_value(json!({
            "value": 1.0,
            "uncertain_ratio": 0.25,
        }))
        .unwrap();

        assert_eq!(metric.extra.get("uncertain_ratio"), Some(&json!(0.25)));
    }
}
