use serde::Deserialize;
use serde::Serialize;

use crate::Extra;

/// Payload of the operational health endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HealthState {
    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub ok: bool,

    /// Collection mode reported by the backend (for example `live`).
    #[serde(default)]
    pub mode: Option<String>,

    #[serde(default, alias = "jobCount", alias = "scheduler_job_count")]
    pub job_count: Option<u64>,

    #[serde(default, alias = "recentCount", alias = "recent_articles_24h")]
    pub recent_count: Option<u64>,

    #[serde(flatten)]
    pub extra: Extra,
}
