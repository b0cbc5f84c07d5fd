use serde::Deserialize;
use serde::Serialize;

use crate::Extra;

/// Shared shape of the breakdown endpoints (by theme, outlet, cluster).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Breakdown<T> {
    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub meta: BreakdownMeta,

    #[serde(default = "Vec::new", deserialize_with = "crate::null_as_default")]
    pub items: Vec<T>,
}

impl<T> Default for Breakdown<T> {
    fn default() -> Self {
        Self {
            meta: BreakdownMeta::default(),
            items: Vec::new(),
        }
    }
}

impl<T> Breakdown<T> {
    /// Size indicator: `meta.count` when the backend sends it, the number of
    /// rows otherwise.
    pub fn count(&self) -> u64 {
        self.meta.count.unwrap_or(self.items.len() as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BreakdownMeta {
    #[serde(default, alias = "cluster_count", alias = "total")]
    pub count: Option<u64>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// Risk theme (category) row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ThemeRow {
    #[serde(default, deserialize_with = "crate::null_as_default", alias = "category")]
    pub theme: String,

    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub article_count: u64,

    #[serde(default)]
    pub negative_ratio: Option<f64>,

    #[serde(default)]
    pub risk_score: Option<f64>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// News outlet (source) row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutletRow {
    #[serde(default, deserialize_with = "crate::null_as_default", alias = "source")]
    pub outlet: String,

    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub article_count: u64,

    #[serde(default)]
    pub positive_ratio: Option<f64>,

    #[serde(default)]
    pub neutral_ratio: Option<f64>,

    #[serde(default)]
    pub negative_ratio: Option<f64>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// Issue cluster row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClusterRow {
    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub cluster: String,

    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub article_count: u64,

    #[serde(default)]
    pub negative_ratio: Option<f64>,

    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub keywords: Vec<String>,

    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub samples: Vec<String>,

    #[serde(flatten)]
    pub extra: Extra,
}
