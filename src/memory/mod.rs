//! In-memory storage engine.
//!
//! Four containers keyed by natural key, owned by the engine and guarded by a
//! single lock. Records are cloned in and out so callers never alias stored
//! state. Nothing survives a restart, including the item id counter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::{DataError, DataResult, EntityKind};
use crate::models::{Item, ItemQuery, Page, PageRequest, Role, Tag, TagType, User};
use crate::storage::Storage;

#[derive(Default)]
struct Tables {
    tag_types: HashMap<String, TagType>,
    tags: HashMap<String, Tag>,
    items: HashMap<i64, Item>,
    users: HashMap<String, User>,
}

/// Volatile engine for tests and throwaway deployments.
pub struct MemoryStorage {
    tables: RwLock<Tables>,
    next_id: AtomicI64,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            next_id: AtomicI64::new(1),
        }
    }
}

fn get_cloned<K, V>(map: &HashMap<K, V>, key: &K, entity: EntityKind) -> DataResult<V>
where
    K: std::hash::Hash + Eq + ToString,
    V: Clone,
{
    map.get(key)
        .cloned()
        .ok_or_else(|| DataError::not_found(entity, key.to_string()))
}

fn insert_new<K, V>(map: &mut HashMap<K, V>, key: K, value: V, entity: EntityKind) -> DataResult<()>
where
    K: std::hash::Hash + Eq + ToString,
{
    if map.contains_key(&key) {
        return Err(DataError::already_exists(entity, key.to_string()));
    }
    map.insert(key, value);
    Ok(())
}

fn remove_existing<K, V>(map: &mut HashMap<K, V>, key: &K, entity: EntityKind) -> DataResult<()>
where
    K: std::hash::Hash + Eq + ToString,
{
    map.remove(key)
        .map(|_| ())
        .ok_or_else(|| DataError::not_found(entity, key.to_string()))
}

#[async_trait]
impl Storage for MemoryStorage {
    // ==================== TAG TYPES ====================

    async fn get_tag_type(&self, name: &str) -> DataResult<TagType> {
        let tables = self.tables.read().await;
        get_cloned(&tables.tag_types, &name.to_string(), EntityKind::TagType)
    }

    async fn insert_tag_type(&self, tag_type: &TagType) -> DataResult<()> {
        let mut tables = self.tables.write().await;
        insert_new(
            &mut tables.tag_types,
            tag_type.name.clone(),
            tag_type.clone(),
            EntityKind::TagType,
        )
    }

    async fn store_tag_type(&self, tag_type: &TagType) -> DataResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .tag_types
            .insert(tag_type.name.clone(), tag_type.clone());
        Ok(())
    }

    async fn remove_tag_type(&self, name: &str) -> DataResult<()> {
        let mut tables = self.tables.write().await;
        remove_existing(&mut tables.tag_types, &name.to_string(), EntityKind::TagType)
    }

    async fn search_tag_types(
        &self,
        query: &str,
        page: PageRequest,
    ) -> DataResult<Page<TagType>> {
        let tables = self.tables.read().await;
        let mut matches: Vec<TagType> = tables
            .tag_types
            .values()
            .filter(|t| t.name.contains(query))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
        Ok(Page::from_vec(matches, page))
    }

    // ==================== TAGS ====================

    async fn get_tag(&self, name: &str) -> DataResult<Tag> {
        let tables = self.tables.read().await;
        get_cloned(&tables.tags, &name.to_string(), EntityKind::Tag)
    }

    async fn get_tags(&self, names: &[String]) -> DataResult<Vec<Tag>> {
        let tables = self.tables.read().await;
        names
            .iter()
            .map(|name| get_cloned(&tables.tags, name, EntityKind::Tag))
            .collect()
    }

    async fn insert_tag(&self, tag: &Tag) -> DataResult<()> {
        let mut tables = self.tables.write().await;
        insert_new(&mut tables.tags, tag.name.clone(), tag.clone(), EntityKind::Tag)
    }

    async fn store_tag(&self, tag: &Tag) -> DataResult<()> {
        let mut tables = self.tables.write().await;
        tables.tags.insert(tag.name.clone(), tag.clone());
        Ok(())
    }

    async fn remove_tag(&self, name: &str) -> DataResult<()> {
        let mut tables = self.tables.write().await;
        remove_existing(&mut tables.tags, &name.to_string(), EntityKind::Tag)
    }

    async fn search_tags(&self, query: &str, page: PageRequest) -> DataResult<Page<Tag>> {
        let tables = self.tables.read().await;
        let mut matches: Vec<Tag> = tables
            .tags
            .values()
            .filter(|t| t.name.contains(query))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Page::from_vec(matches, page))
    }

    async fn tags_of_type(&self, type_name: &str) -> DataResult<Vec<Tag>> {
        let tables = self.tables.read().await;
        let mut tags: Vec<Tag> = tables
            .tags
            .values()
            .filter(|t| t.tag_type == type_name)
            .cloned()
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn tags_referencing(&self, item_id: i64) -> DataResult<Vec<Tag>> {
        let tables = self.tables.read().await;
        let mut tags: Vec<Tag> = tables
            .tags
            .values()
            .filter(|t| t.refs.contains(&item_id))
            .cloned()
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    // ==================== ITEMS ====================

    async fn get_item(&self, id: i64) -> DataResult<Item> {
        let tables = self.tables.read().await;
        get_cloned(&tables.items, &id, EntityKind::Item)
    }

    async fn get_items(&self, ids: &[i64]) -> DataResult<Vec<Item>> {
        let tables = self.tables.read().await;
        ids.iter()
            .map(|id| get_cloned(&tables.items, id, EntityKind::Item))
            .collect()
    }

    async fn insert_item(&self, item: &Item) -> DataResult<()> {
        let mut tables = self.tables.write().await;
        insert_new(&mut tables.items, item.id, item.clone(), EntityKind::Item)?;
        // Keep the counter ahead of explicitly chosen ids.
        self.next_id.fetch_max(item.id + 1, Ordering::SeqCst);
        Ok(())
    }

    async fn store_item(&self, item: &Item) -> DataResult<()> {
        let mut tables = self.tables.write().await;
        tables.items.insert(item.id, item.clone());
        self.next_id.fetch_max(item.id + 1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove_item(&self, id: i64) -> DataResult<()> {
        let mut tables = self.tables.write().await;
        remove_existing(&mut tables.items, &id, EntityKind::Item)
    }

    async fn search_items(&self, query: &ItemQuery, page: PageRequest) -> DataResult<Page<Item>> {
        let tables = self.tables.read().await;
        let mut matches: Vec<Item> = tables
            .items
            .values()
            .filter(|item| query.matches(item.id, item.public, item.date))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(Page::from_vec(matches, page))
    }

    async fn next_item_id(&self) -> DataResult<i64> {
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    // ==================== USERS ====================

    async fn get_user(&self, username: &str) -> DataResult<User> {
        let tables = self.tables.read().await;
        get_cloned(&tables.users, &username.to_string(), EntityKind::User)
    }

    async fn insert_user(&self, user: &User) -> DataResult<()> {
        let mut tables = self.tables.write().await;
        insert_new(
            &mut tables.users,
            user.username.clone(),
            user.clone(),
            EntityKind::User,
        )
    }

    async fn store_user(&self, user: &User) -> DataResult<()> {
        let mut tables = self.tables.write().await;
        tables.users.insert(user.username.clone(), user.clone());
        Ok(())
    }

    async fn remove_user(&self, username: &str) -> DataResult<()> {
        let mut tables = self.tables.write().await;
        remove_existing(&mut tables.users, &username.to_string(), EntityKind::User)
    }

    async fn search_users(&self, query: &str, page: PageRequest) -> DataResult<Page<User>> {
        let tables = self.tables.read().await;
        let mut matches: Vec<User> = tables
            .users
            .values()
            .filter(|u| u.username.contains(query))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(Page::from_vec(matches, page))
    }

    async fn count_users_with_role(&self, role: Role) -> DataResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().filter(|u| u.role == role).count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemKind;

    #[tokio::test]
    async fn test_ids_are_monotonic() {
        let storage = MemoryStorage::new();
        let first = storage.next_item_id().await.unwrap();
        let second = storage.next_item_id().await.unwrap();
        assert!(second > first);

        storage.insert_item(&Item::new(50, ItemKind::Image)).await.unwrap();
        storage.remove_item(50).await.unwrap();
        assert_eq!(storage.next_item_id().await.unwrap(), 51);
    }

    #[tokio::test]
    async fn test_returned_records_are_copies() {
        let storage = MemoryStorage::new();
        storage.insert_tag(&Tag::auto("sky")).await.unwrap();

        let mut tag = storage.get_tag("sky").await.unwrap();
        tag.refs.insert(9);
        assert!(storage.get_tag("sky").await.unwrap().refs.is_empty());
    }

    #[tokio::test]
    async fn test_get_tags_reports_first_missing() {
        let storage = MemoryStorage::new();
        storage.insert_tag(&Tag::auto("a")).await.unwrap();

        let err = storage
            .get_tags(&["a".to_string(), "b".to_string(), "c".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err, DataError::not_found(EntityKind::Tag, "b"));
    }
}
