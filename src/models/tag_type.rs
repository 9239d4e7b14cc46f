//! Tag type model.

use serde::{Deserialize, Serialize};

/// Name of the sentinel tag type that orphaned tags fall back to.
pub const DEFAULT_TAG_TYPE: &str = "default";

/// A category of tags, shown with its own color and sorted by `order`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TagType {
    pub name: String,
    /// Encoded hue/lightness value, interpreted by the presentation layer
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub order: i64,
}

impl TagType {
    pub fn new(name: impl Into<String>, color: impl Into<String>, order: i64) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            order,
        }
    }

    /// The sentinel type created by bootstrap.
    pub fn default_type() -> Self {
        Self::new(DEFAULT_TAG_TYPE, "", 0)
    }

    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_TAG_TYPE
    }
}
