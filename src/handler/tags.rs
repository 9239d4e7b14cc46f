//! Tag and tag type operations.

use std::collections::BTreeSet;

use super::{found, validate_key, DataHandler};
use crate::errors::{DataError, DataResult};
use crate::models::{Page, PageRequest, Tag, TagType, DEFAULT_TAG_TYPE};
use crate::storage::Storage;

impl<S: Storage> DataHandler<S> {
    // ==================== TAG TYPE OPERATIONS ====================

    pub async fn get_tag_type(&self, name: &str) -> DataResult<TagType> {
        self.storage.get_tag_type(name).await
    }

    pub async fn get_tag_types(&self, names: &[String]) -> DataResult<Vec<TagType>> {
        let mut tag_types = Vec::with_capacity(names.len());
        for name in names {
            tag_types.push(self.storage.get_tag_type(name).await?);
        }
        Ok(tag_types)
    }

    pub async fn add_tag_type(&self, tag_type: &TagType) -> DataResult<()> {
        validate_key("Tag type", &tag_type.name)?;
        self.storage.insert_tag_type(tag_type).await
    }

    /// Replace color and order, creating the type if it does not exist.
    pub async fn update_tag_type(&self, tag_type: &TagType) -> DataResult<()> {
        match self.storage.get_tag_type(&tag_type.name).await {
            Err(e) if e.is_not_found() => self.add_tag_type(tag_type).await,
            Err(e) => Err(e),
            Ok(_) => self.storage.store_tag_type(tag_type).await,
        }
    }

    /// Delete a tag type, moving its tags to the default type first.
    pub async fn delete_tag_type(&self, name: &str) -> DataResult<()> {
        if name == DEFAULT_TAG_TYPE {
            return Err(DataError::Validation(
                "The default tag type cannot be deleted".to_string(),
            ));
        }
        self.storage.get_tag_type(name).await?;
        self.ensure_default_type().await?;

        for mut tag in self.storage.tags_of_type(name).await? {
            tag.tag_type = DEFAULT_TAG_TYPE.to_string();
            self.storage.store_tag(&tag).await?;
        }

        self.storage.remove_tag_type(name).await?;
        tracing::debug!("Deleted tag type '{}'", name);
        Ok(())
    }

    pub async fn search_tag_types(
        &self,
        query: &str,
        page_size: i64,
        page_number: i64,
    ) -> DataResult<Page<TagType>> {
        self.storage
            .search_tag_types(query.trim(), PageRequest::new(page_size, page_number))
            .await
    }

    // ==================== TAG OPERATIONS ====================

    pub async fn get_tag(&self, name: &str) -> DataResult<Tag> {
        self.storage.get_tag(name).await
    }

    pub async fn get_tags(&self, names: &[String]) -> DataResult<Vec<Tag>> {
        self.storage.get_tags(names).await
    }

    /// Add a tag and attach it under its parent.
    ///
    /// `children` is maintained by the graph and ignored on input.
    pub async fn add_tag(&self, tag: &Tag) -> DataResult<()> {
        validate_key("Tag", &tag.name)?;
        self.require_tag_type(&tag.tag_type).await?;

        let mut parent = None;
        if !tag.parent.is_empty() {
            if tag.parent == tag.name {
                return Err(DataError::Validation(format!(
                    "Tag '{}' cannot be its own parent",
                    tag.name
                )));
            }
            parent = Some(self.storage.get_tag(&tag.parent).await?);
        }

        let mut record = tag.clone();
        record.children = BTreeSet::new();
        self.storage.insert_tag(&record).await?;

        if let Some(mut parent) = parent {
            parent.children.insert(record.name.clone());
            self.storage.store_tag(&parent).await?;
            self.propagate_refs(&record.parent, &record.refs).await?;
        }
        Ok(())
    }

    /// Update type, parent and refs of a tag, creating it if it does not exist.
    ///
    /// A parent change detaches from the old parent before attaching to the
    /// new one. A type change is cascaded to every descendant.
    pub async fn update_tag(&self, tag: &Tag) -> DataResult<()> {
        let existing = match self.storage.get_tag(&tag.name).await {
            Err(e) if e.is_not_found() => return self.add_tag(tag).await,
            Err(e) => return Err(e),
            Ok(existing) => existing,
        };

        if tag.tag_type != existing.tag_type {
            self.require_tag_type(&tag.tag_type).await?;
        }

        let reparented = tag.parent != existing.parent;
        if reparented && !tag.parent.is_empty() {
            self.check_new_parent(&tag.name, &tag.parent).await?;
        }

        let mut record = tag.clone();
        record.children = existing.children.clone();

        if reparented {
            if !existing.parent.is_empty() {
                if let Some(mut old_parent) = found(self.storage.get_tag(&existing.parent).await)? {
                    old_parent.children.remove(&tag.name);
                    self.storage.store_tag(&old_parent).await?;
                }
            }
            if !tag.parent.is_empty() {
                let mut new_parent = self.storage.get_tag(&tag.parent).await?;
                new_parent.children.insert(tag.name.clone());
                self.storage.store_tag(&new_parent).await?;
            }
        }

        self.storage.store_tag(&record).await?;

        if reparented && !tag.parent.is_empty() {
            self.propagate_refs(&tag.parent, &record.refs).await?;
        }

        if tag.tag_type != existing.tag_type && !record.children.is_empty() {
            self.cascade_type(&record).await?;
        }
        Ok(())
    }

    /// Delete a tag, detaching it from its parent, its children and its items.
    ///
    /// Children are orphaned (they become roots), not deleted.
    pub async fn delete_tag(&self, name: &str) -> DataResult<()> {
        let tag = self.storage.get_tag(name).await?;

        if !tag.parent.is_empty() {
            if let Some(mut parent) = found(self.storage.get_tag(&tag.parent).await)? {
                parent.children.remove(name);
                self.storage.store_tag(&parent).await?;
            }
        }

        for child_name in &tag.children {
            if let Some(mut child) = found(self.storage.get_tag(child_name).await)? {
                if child.parent == name {
                    child.parent.clear();
                    self.storage.store_tag(&child).await?;
                }
            }
        }

        for id in &tag.refs {
            if let Some(mut item) = found(self.storage.get_item(*id).await)? {
                if item.tags.remove(name) {
                    self.storage.store_item(&item).await?;
                }
            }
        }

        self.storage.remove_tag(name).await?;
        tracing::debug!(
            "Deleted tag '{}' ({} children orphaned)",
            name,
            tag.children.len()
        );
        Ok(())
    }

    pub async fn search_tags(
        &self,
        query: &str,
        page_size: i64,
        page_number: i64,
    ) -> DataResult<Page<Tag>> {
        self.storage
            .search_tags(query.trim(), PageRequest::new(page_size, page_number))
            .await
    }

    async fn require_tag_type(&self, name: &str) -> DataResult<()> {
        if name == DEFAULT_TAG_TYPE {
            return self.ensure_default_type().await;
        }
        self.storage.get_tag_type(name).await.map(|_| ())
    }

    /// Reject a parent that is missing, the tag itself, or one of its descendants.
    async fn check_new_parent(&self, name: &str, parent: &str) -> DataResult<()> {
        if parent == name {
            return Err(DataError::Validation(format!(
                "Tag '{}' cannot be its own parent",
                name
            )));
        }
        self.storage.get_tag(parent).await?;
        if self.ancestors(parent).await?.iter().any(|a| a == name) {
            return Err(DataError::Validation(format!(
                "Tag '{}' cannot be moved under its descendant '{}'",
                name, parent
            )));
        }
        Ok(())
    }

    /// Add `refs` to `start` and every ancestor above it.
    async fn propagate_refs(&self, start: &str, refs: &BTreeSet<i64>) -> DataResult<()> {
        if refs.is_empty() {
            return Ok(());
        }
        let mut chain = vec![start.to_string()];
        chain.extend(self.ancestors(start).await?);
        for name in chain {
            let mut tag = self.storage.get_tag(&name).await?;
            let before = tag.refs.len();
            tag.refs.extend(refs.iter().copied());
            if tag.refs.len() != before {
                self.storage.store_tag(&tag).await?;
            }
        }
        Ok(())
    }

    /// Give every descendant of `root` the type of `root`.
    async fn cascade_type(&self, root: &Tag) -> DataResult<()> {
        let mut pending: Vec<String> = root.children.iter().cloned().collect();
        let mut visited: BTreeSet<String> = BTreeSet::new();
        while let Some(name) = pending.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }
            let Some(mut child) = found(self.storage.get_tag(&name).await)? else {
                continue;
            };
            pending.extend(child.children.iter().cloned());
            if child.tag_type != root.tag_type {
                child.tag_type = root.tag_type.clone();
                self.storage.store_tag(&child).await?;
            }
        }
        tracing::debug!(
            "Cascaded type '{}' below '{}' to {} tags",
            root.tag_type,
            root.name,
            visited.len()
        );
        Ok(())
    }
}
