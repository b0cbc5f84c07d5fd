use serde::Deserialize;
use serde::Serialize;

use crate::Extra;

/// One page of the offset-paginated article list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArticlePage {
    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub items: Vec<Article>,

    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub total: u64,

    /// Absent on older backends; callers derive it from `offset < total`.
    #[serde(default, alias = "hasMore")]
    pub has_more: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub id: Option<serde_json::Value>,

    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub title: String,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub outlet: Option<String>,

    #[serde(default, alias = "published_at")]
    pub date: Option<String>,

    #[serde(default)]
    pub sentiment: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}
