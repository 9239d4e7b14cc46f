//! Primitive storage operations.
//!
//! Every engine implements this trait over its own containers. The primitives
//! store and load records as given and never touch neighbouring records;
//! graph repair lives in [`crate::handler::DataHandler`].

use async_trait::async_trait;

use crate::errors::DataResult;
use crate::models::{Item, ItemQuery, Page, PageRequest, Role, Tag, TagType, User};

#[async_trait]
pub trait Storage: Send + Sync {
    // ==================== TAG TYPES ====================

    async fn get_tag_type(&self, name: &str) -> DataResult<TagType>;

    /// Fails with `AlreadyExists` when the name is taken.
    async fn insert_tag_type(&self, tag_type: &TagType) -> DataResult<()>;

    /// Create or replace.
    async fn store_tag_type(&self, tag_type: &TagType) -> DataResult<()>;

    async fn remove_tag_type(&self, name: &str) -> DataResult<()>;

    /// Substring match on name, ordered by `order` then name.
    async fn search_tag_types(&self, query: &str, page: PageRequest)
        -> DataResult<Page<TagType>>;

    // ==================== TAGS ====================

    async fn get_tag(&self, name: &str) -> DataResult<Tag>;

    /// Fails with `NotFound` naming the first missing key.
    async fn get_tags(&self, names: &[String]) -> DataResult<Vec<Tag>>;

    async fn insert_tag(&self, tag: &Tag) -> DataResult<()>;

    async fn store_tag(&self, tag: &Tag) -> DataResult<()>;

    async fn remove_tag(&self, name: &str) -> DataResult<()>;

    /// Substring match on name, ordered by name.
    async fn search_tags(&self, query: &str, page: PageRequest) -> DataResult<Page<Tag>>;

    async fn tags_of_type(&self, type_name: &str) -> DataResult<Vec<Tag>>;

    /// Every tag whose refs contain `item_id`.
    async fn tags_referencing(&self, item_id: i64) -> DataResult<Vec<Tag>>;

    // ==================== ITEMS ====================

    async fn get_item(&self, id: i64) -> DataResult<Item>;

    async fn get_items(&self, ids: &[i64]) -> DataResult<Vec<Item>>;

    async fn insert_item(&self, item: &Item) -> DataResult<()>;

    async fn store_item(&self, item: &Item) -> DataResult<()>;

    async fn remove_item(&self, id: i64) -> DataResult<()>;

    /// Filtered item listing, newest id first.
    async fn search_items(&self, query: &ItemQuery, page: PageRequest) -> DataResult<Page<Item>>;

    /// Hand out the next unused item id.
    async fn next_item_id(&self) -> DataResult<i64>;

    // ==================== USERS ====================

    async fn get_user(&self, username: &str) -> DataResult<User>;

    async fn insert_user(&self, user: &User) -> DataResult<()>;

    async fn store_user(&self, user: &User) -> DataResult<()>;

    async fn remove_user(&self, username: &str) -> DataResult<()>;

    /// Substring match on username, ordered by username.
    async fn search_users(&self, query: &str, page: PageRequest) -> DataResult<Page<User>>;

    async fn count_users_with_role(&self, role: Role) -> DataResult<i64>;
}
