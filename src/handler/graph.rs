//! Tag-graph algorithms shared by every engine.

use std::collections::{BTreeMap, BTreeSet};

use super::{found, validate_key, DataHandler};
use crate::errors::{DataError, DataResult};
use crate::models::{Tag, TagType, DEFAULT_TAG_TYPE};
use crate::storage::Storage;

/// Canonical tag list of a raw search or input string: split on whitespace,
/// deduplicated, sorted.
pub fn tags_from_string(raw: &str) -> Vec<String> {
    raw.split_whitespace()
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn non_empty(names: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    names
        .iter()
        .filter(|n| !n.is_empty() && seen.insert(n.as_str()))
        .cloned()
        .collect()
}

impl<S: Storage> DataHandler<S> {
    /// Create the `default` tag type if it is missing.
    pub async fn ensure_default_type(&self) -> DataResult<()> {
        if found(self.storage.get_tag_type(DEFAULT_TAG_TYPE).await)?.is_some() {
            return Ok(());
        }
        match self.storage.insert_tag_type(&TagType::default_type()).await {
            Ok(()) => {
                tracing::info!("Created default tag type");
                Ok(())
            }
            // Lost a race with another bootstrap
            Err(DataError::AlreadyExists { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Move item `item_id` from tag list `old` to tag list `new`.
    ///
    /// Every ancestor of a tag in `new` also records the item, so that a
    /// search for a parent finds items tagged with its descendants.
    /// Unknown names in `new` become root tags of the default type. Running
    /// this twice with the same lists changes nothing.
    pub async fn change_tags(&self, old: &[String], new: &[String], item_id: i64) -> DataResult<()> {
        let old = non_empty(old);
        let mut new = non_empty(new);
        for name in &new {
            validate_key("Tag", name)?;
        }

        let mut added: Vec<String> = new.iter().filter(|n| !old.contains(n)).cloned().collect();
        let mut removed: Vec<String> = old.iter().filter(|n| !new.contains(n)).cloned().collect();

        let mut merge = old.clone();
        merge.extend(new.iter().filter(|n| !old.contains(n)).cloned());
        if merge.is_empty() {
            return Ok(());
        }

        let mut fetched: BTreeMap<String, Tag> = BTreeMap::new();
        for name in &merge {
            if let Some(tag) = found(self.storage.get_tag(name).await)? {
                fetched.insert(name.clone(), tag);
            }
        }

        // Walk every tag of the new list up to its root. Ancestors keep the
        // item even when the old list named them explicitly.
        let mut pending: Vec<String> = new
            .iter()
            .filter_map(|n| fetched.get(n))
            .map(|t| t.parent.clone())
            .filter(|p| !p.is_empty())
            .collect();
        let mut walked: BTreeSet<String> = BTreeSet::new();
        while let Some(parent) = pending.pop() {
            if !walked.insert(parent.clone()) {
                continue;
            }
            let grandparent = match fetched.get(&parent) {
                Some(tag) => tag.parent.clone(),
                None => {
                    let tag = self.storage.get_tag(&parent).await?;
                    let grandparent = tag.parent.clone();
                    fetched.insert(parent.clone(), tag);
                    grandparent
                }
            };
            if !grandparent.is_empty() {
                pending.push(grandparent);
            }
            if !new.contains(&parent) {
                new.push(parent.clone());
            }
            if !added.contains(&parent) {
                added.push(parent);
            }
        }
        removed.retain(|n| !new.contains(n));

        let missing: Vec<String> = new
            .iter()
            .filter(|n| !fetched.contains_key(*n))
            .cloned()
            .collect();
        if !missing.is_empty() {
            self.ensure_default_type().await?;
            for name in missing {
                let tag = Tag::auto(&name);
                self.storage.insert_tag(&tag).await?;
                tracing::debug!("Created tag '{}' for item {}", name, item_id);
                fetched.insert(name, tag);
            }
        }

        let mut dirty: BTreeSet<String> = BTreeSet::new();
        for name in &removed {
            if let Some(tag) = fetched.get_mut(name) {
                if tag.refs.remove(&item_id) {
                    dirty.insert(name.clone());
                }
            }
        }
        for name in &added {
            if let Some(tag) = fetched.get_mut(name) {
                if tag.refs.insert(item_id) {
                    dirty.insert(name.clone());
                }
            }
        }

        for name in &dirty {
            if let Some(tag) = fetched.get(name) {
                self.storage.store_tag(tag).await?;
            }
        }

        tracing::debug!(
            "Retagged item {}: +{:?} -{:?} ({} tags written)",
            item_id,
            added,
            removed,
            dirty.len()
        );
        Ok(())
    }

    /// Ids of the items carrying every tag named in `raw`.
    ///
    /// The order of the returned ids is unspecified.
    pub async fn reduce(&self, raw: &str) -> DataResult<Vec<i64>> {
        let names = tags_from_string(raw);
        match names.len() {
            0 => Ok(Vec::new()),
            1 => {
                let tag = self.storage.get_tag(&names[0]).await?;
                Ok(tag.refs.into_iter().collect())
            }
            _ => {
                let mut tags = self.storage.get_tags(&names).await?;
                tags.sort_by_key(|t| t.refs.len());
                let mut iter = tags.into_iter();
                let mut result = iter.next().map(|t| t.refs).unwrap_or_default();
                for tag in iter {
                    result.retain(|id| tag.refs.contains(id));
                    if result.is_empty() {
                        break;
                    }
                }
                Ok(result.into_iter().collect())
            }
        }
    }

    /// Names of every ancestor of `name`, nearest first.
    pub(super) async fn ancestors(&self, name: &str) -> DataResult<Vec<String>> {
        let mut chain = Vec::new();
        let mut current = self.storage.get_tag(name).await?.parent;
        while !current.is_empty() {
            if current == name || chain.contains(&current) {
                return Err(DataError::ConstraintViolation(format!(
                    "Tag hierarchy above '{}' contains a cycle",
                    name
                )));
            }
            let tag = self.storage.get_tag(&current).await?;
            chain.push(current);
            current = tag.parent;
        }
        Ok(chain)
    }
}
