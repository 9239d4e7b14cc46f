//! Tag model.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::DEFAULT_TAG_TYPE;

/// A node of the tag forest.
///
/// `parent` and `children` mirror each other: `a` is in `b.children` exactly
/// when `a.parent == b.name`. `refs` holds the ids of every item that carries
/// this tag or one of its descendants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub name: String,
    #[serde(rename = "type")]
    pub tag_type: String,
    /// Parent tag name, empty for roots
    #[serde(default)]
    pub parent: String,
    #[serde(default)]
    pub children: BTreeSet<String>,
    #[serde(default)]
    pub refs: BTreeSet<i64>,
}

impl Tag {
    pub fn new(name: impl Into<String>, tag_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag_type: tag_type.into(),
            parent: String::new(),
            children: BTreeSet::new(),
            refs: BTreeSet::new(),
        }
    }

    /// A root tag of the default type, as created when an item references an
    /// unknown tag name.
    pub fn auto(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_TAG_TYPE)
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = parent.into();
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_empty()
    }
}
