use serde::Deserialize;
use serde::Serialize;
use std::fmt;

/// Identifies the tracked subject currently in focus (for example a game
/// title id such as `maplestory`). Drives every fetch, cache lookup and
/// page load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionKey(String);

impl SelectionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SelectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SelectionKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SelectionKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for SelectionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
