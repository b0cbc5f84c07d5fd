use serde::Deserialize;
use serde::Serialize;

use crate::Extra;

/// Payload of the burst/alert event endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BurstEvents {
    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub items: Vec<BurstEvent>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BurstEvent {
    #[serde(default, deserialize_with = "crate::null_as_default", alias = "occurred_at")]
    pub timestamp: String,

    #[serde(
        default,
        deserialize_with = "crate::null_as_default",
        rename = "type",
        alias = "event_type"
    )]
    pub kind: String,

    #[serde(default, alias = "trigger_reason")]
    pub reason: Option<String>,

    /// Selection key the event belongs to, when the backend scopes it.
    #[serde(default, alias = "ip_id")]
    pub key: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn type_field_maps_to_kind() {
        let events: BurstEvents = serde_json::from_value(json!({
            "items": [
                { "timestamp": "2026-01-02T03:04:05Z", "type": "burst_start", "reason": "volume" },
                { "occurred_at": "2026-01-02T04:00:00Z", "event_type": "burst_end", "ip_id": "dnf" },
            ]
        }))
        .unwrap();

        assert_eq!(events.items[0].kind, "burst_start");
        assert_eq!(events.items[0].reason.as_deref(), Some("volume"));
        assert_eq!(events.items[1].kind, "burst_end");
        assert_eq!(events.items[1].timestamp, "2026-01-02T04:00:00Z");
        assert_eq!(events.items[1].key.as_deref(), Some("dnf"));
    }

    #[test]
    fn null_timestamp_and_type_do_not_drop_the_payload() {
        let events: BurstEvents = serde_json::from_value(json!({
            "items": [{ "timestamp": null, "type": null, "reason": "volume" }]
        }))
        .unwrap();

        assert_eq!(events.items[0].timestamp, "");
        assert_eq!(events.items[0].kind, "");
        assert_eq!(events.items[0].reason.as_deref(), Some("volume"));
    }
}
