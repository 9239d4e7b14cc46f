//! Item model.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Media kind of an item, persisted as a small integer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Image,
    Video,
    Audio,
    Text,
    #[default]
    Other,
}

impl ItemKind {
    pub fn as_i32(&self) -> i32 {
        match self {
            ItemKind::Image => 0,
            ItemKind::Video => 1,
            ItemKind::Audio => 2,
            ItemKind::Text => 3,
            ItemKind::Other => 4,
        }
    }

    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => ItemKind::Image,
            1 => ItemKind::Video,
            2 => ItemKind::Audio,
            3 => ItemKind::Text,
            _ => ItemKind::Other,
        }
    }

    /// Classify an uploaded file by its MIME type.
    pub fn from_mime(mime: &str) -> Self {
        match mime.split('/').next().unwrap_or_default() {
            "image" => ItemKind::Image,
            "video" => ItemKind::Video,
            "audio" => ItemKind::Audio,
            "text" => ItemKind::Text,
            _ => ItemKind::Other,
        }
    }
}

/// A catalogued piece of content.
///
/// `tags` is the explicit membership only; ancestor tags reach the item
/// through their `refs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: i64,
    #[serde(default)]
    pub source: String,
    /// Epoch milliseconds
    pub date: i64,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub desc: String,
    #[serde(rename = "type", default)]
    pub kind: ItemKind,
    #[serde(rename = "pub", default)]
    pub public: bool,
    #[serde(default)]
    pub file_path: String,
}

impl Item {
    /// A private item dated now with no tags.
    pub fn new(id: i64, kind: ItemKind) -> Self {
        Self {
            id,
            source: String::new(),
            date: Utc::now().timestamp_millis(),
            tags: BTreeSet::new(),
            desc: String::new(),
            kind,
            public: false,
            file_path: String::new(),
        }
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn taken_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_mime() {
        assert_eq!(ItemKind::from_mime("image/png"), ItemKind::Image);
        assert_eq!(ItemKind::from_mime("video/webm"), ItemKind::Video);
        assert_eq!(ItemKind::from_mime("application/pdf"), ItemKind::Other);
        assert_eq!(ItemKind::from_mime(""), ItemKind::Other);
    }

    #[test]
    fn test_kind_code_stable() {
        for kind in [
            ItemKind::Image,
            ItemKind::Video,
            ItemKind::Audio,
            ItemKind::Text,
            ItemKind::Other,
        ] {
            assert_eq!(ItemKind::from_i32(kind.as_i32()), kind);
        }
    }

    #[test]
    fn test_taken_at() {
        let mut item = Item::new(1, ItemKind::Image);
        item.date = 86_400_000;
        assert_eq!(item.taken_at().unwrap().to_rfc3339(), "1970-01-02T00:00:00+00:00");
    }
}
