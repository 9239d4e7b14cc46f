//! Item operations.

use super::{validate_key, DataHandler};
use crate::errors::DataResult;
use crate::models::{Item, ItemQuery, Page, PageRequest, User};
use crate::storage::Storage;

impl<S: Storage> DataHandler<S> {
    pub async fn get_item(&self, id: i64) -> DataResult<Item> {
        self.storage.get_item(id).await
    }

    pub async fn get_items(&self, ids: &[i64]) -> DataResult<Vec<Item>> {
        self.storage.get_items(ids).await
    }

    /// Store a new item and register it with its tags.
    pub async fn add_item(&self, item: &Item) -> DataResult<()> {
        validate_tag_names(item)?;
        self.storage.insert_item(item).await?;
        let tags: Vec<String> = item.tags.iter().cloned().collect();
        self.change_tags(&[], &tags, item.id).await
    }

    /// Replace an item, moving its refs from the old tag list to the new one.
    pub async fn update_item(&self, item: &Item) -> DataResult<()> {
        validate_tag_names(item)?;
        let old = match self.storage.get_item(item.id).await {
            Err(e) if e.is_not_found() => return self.add_item(item).await,
            Err(e) => return Err(e),
            Ok(old) => old,
        };

        let old_tags: Vec<String> = old.tags.into_iter().collect();
        let new_tags: Vec<String> = item.tags.iter().cloned().collect();
        self.change_tags(&old_tags, &new_tags, item.id).await?;
        self.storage.store_item(item).await
    }

    /// Delete an item after removing its id from every tag that records it.
    ///
    /// This covers the listed tags, their ancestors and ancestors of tags the
    /// item was moved away from.
    pub async fn delete_item(&self, id: i64) -> DataResult<()> {
        self.storage.get_item(id).await?;

        let tags = self.storage.tags_referencing(id).await?;
        for mut tag in tags.iter().cloned() {
            tag.refs.remove(&id);
            self.storage.store_tag(&tag).await?;
        }

        self.storage.remove_item(id).await?;
        tracing::debug!("Deleted item {} ({} tags updated)", id, tags.len());
        Ok(())
    }

    /// Items matching every tag in `query`, newest first.
    ///
    /// An empty query lists every item. Callers without a privileged role
    /// only see public items; `after` and `before` bound `date` inclusively.
    pub async fn search_items(
        &self,
        query: &str,
        page_size: i64,
        page_number: i64,
        viewer: Option<&User>,
        after: Option<i64>,
        before: Option<i64>,
    ) -> DataResult<Page<Item>> {
        let ids = if query.trim().is_empty() {
            None
        } else {
            Some(self.reduce(query).await?)
        };

        let filter = ItemQuery {
            ids,
            include_private: viewer.map_or(false, |u| u.role.can_view_private()),
            after,
            before,
        };

        self.storage
            .search_items(&filter, PageRequest::new(page_size, page_number))
            .await
    }
}

/// Tag names end up in a space-joined column, so they are checked before the
/// item row is written.
fn validate_tag_names(item: &Item) -> DataResult<()> {
    item.tags
        .iter()
        .try_for_each(|name| validate_key("Tag", name))
}
