//! SQLite storage engine.
//!
//! Multi-valued fields (`tags`, `cldn`, `refs`) are stored as space-joined
//! token lists; the encoding is confined to the row helpers at the bottom of
//! this file. All values are bound as statement parameters.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};

use crate::errors::{DataError, DataResult, EntityKind};
use crate::models::{
    Item, ItemKind, ItemQuery, Page, PageRequest, Role, Tag, TagType, User, UserState,
};
use crate::storage::Storage;

use super::init_database;

const TAG_TYPE_COLUMNS: &str = "name, clr, ordr";
const TAG_COLUMNS: &str = "name, typ, prnt, cldn, refs";
const ITEM_COLUMNS: &str = "id, src, dt, tags, des, typ, pub, fp";
const USER_COLUMNS: &str = "uname, state, hash, salt, role, conf";

/// Shared predicate of the item count and page queries.
const ITEM_FILTER: &str = "(? IS NULL OR id IN (SELECT value FROM json_each(?))) \
     AND (? = 1 OR pub = 1) \
     AND (? IS NULL OR dt >= ?) \
     AND (? IS NULL OR dt <= ?)";

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Database repository backing the relational engine.
pub struct Repository {
    pool: SqlitePool,
    next_id: AtomicI64,
}

impl Repository {
    /// Wrap an initialized pool, seeding the id counter from the stored
    /// high-water mark so ids of deleted items are never handed out again.
    pub async fn new(pool: SqlitePool) -> DataResult<Self> {
        let row = sqlx::query(
            "SELECT MAX(m.next_item_id, COALESCE((SELECT MAX(id) FROM items), 0) + 1) AS next_id \
             FROM catalog_meta m WHERE m.id = 1",
        )
        .fetch_one(&pool)
        .await?;
        let next_id: i64 = row.get("next_id");
        Ok(Self {
            pool,
            next_id: AtomicI64::new(next_id),
        })
    }

    /// Open (creating if needed) the database file at `db_path`.
    pub async fn open(db_path: &Path) -> DataResult<Self> {
        let pool = init_database(db_path).await?;
        Self::new(pool).await
    }

    /// Raise the counter past `id` and persist the new high-water mark.
    async fn reserve_through(&self, id: i64) -> DataResult<()> {
        let next = id.saturating_add(1);
        self.next_id.fetch_max(next, Ordering::SeqCst);
        sqlx::query(
            "UPDATE catalog_meta SET next_item_id = MAX(next_item_id, ?) WHERE id = 1",
        )
        .bind(next)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count(&self, sql: &str, query: &str) -> DataResult<i64> {
        let row = sqlx::query(sql).bind(query.to_string()).fetch_one(&self.pool).await?;
        Ok(row.get("total"))
    }
}

#[async_trait]
impl Storage for Repository {
    // ==================== TAG TYPE OPERATIONS ====================

    async fn get_tag_type(&self, name: &str) -> DataResult<TagType> {
        let row = sqlx::query(&format!(
            "SELECT {TAG_TYPE_COLUMNS} FROM tag_types WHERE name = ?"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref()
            .map(tag_type_from_row)
            .ok_or_else(|| DataError::not_found(EntityKind::TagType, name))
    }

    async fn insert_tag_type(&self, tag_type: &TagType) -> DataResult<()> {
        sqlx::query("INSERT INTO tag_types (name, clr, ordr) VALUES (?, ?, ?)")
            .bind(&tag_type.name)
            .bind(&tag_type.color)
            .bind(tag_type.order)
            .execute(&self.pool)
            .await
            .map_err(|e| insert_error(e, EntityKind::TagType, &tag_type.name))?;
        Ok(())
    }

    async fn store_tag_type(&self, tag_type: &TagType) -> DataResult<()> {
        sqlx::query(
            "INSERT INTO tag_types (name, clr, ordr) VALUES (?, ?, ?) \
             ON CONFLICT(name) DO UPDATE SET clr = excluded.clr, ordr = excluded.ordr",
        )
        .bind(&tag_type.name)
        .bind(&tag_type.color)
        .bind(tag_type.order)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_tag_type(&self, name: &str) -> DataResult<()> {
        let result = sqlx::query("DELETE FROM tag_types WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DataError::not_found(EntityKind::TagType, name));
        }
        Ok(())
    }

    async fn search_tag_types(
        &self,
        query: &str,
        page: PageRequest,
    ) -> DataResult<Page<TagType>> {
        let total = self
            .count(
                "SELECT COUNT(*) AS total FROM tag_types WHERE instr(name, ?) > 0",
                query,
            )
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT {TAG_TYPE_COLUMNS} FROM tag_types WHERE instr(name, ?) > 0 \
             ORDER BY ordr, name LIMIT ? OFFSET ?"
        ))
        .bind(query)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(
            rows.iter().map(tag_type_from_row).collect(),
            total,
            page,
        ))
    }

    // ==================== TAG OPERATIONS ====================

    async fn get_tag(&self, name: &str) -> DataResult<Tag> {
        let row = sqlx::query(&format!("SELECT {TAG_COLUMNS} FROM tags WHERE name = ?"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref()
            .map(tag_from_row)
            .ok_or_else(|| DataError::not_found(EntityKind::Tag, name))
    }

    async fn get_tags(&self, names: &[String]) -> DataResult<Vec<Tag>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT {TAG_COLUMNS} FROM tags WHERE name IN (SELECT value FROM json_each(?))"
        ))
        .bind(serde_json::to_string(names)?)
        .fetch_all(&self.pool)
        .await?;

        let tags: Vec<Tag> = rows.iter().map(tag_from_row).collect();
        if let Some(missing) = names.iter().find(|n| !tags.iter().any(|t| &t.name == *n)) {
            return Err(DataError::not_found(EntityKind::Tag, missing));
        }
        Ok(tags)
    }

    async fn insert_tag(&self, tag: &Tag) -> DataResult<()> {
        sqlx::query("INSERT INTO tags (name, typ, prnt, cldn, refs) VALUES (?, ?, ?, ?, ?)")
            .bind(&tag.name)
            .bind(&tag.tag_type)
            .bind(&tag.parent)
            .bind(join_tokens(&tag.children))
            .bind(join_tokens(&tag.refs))
            .execute(&self.pool)
            .await
            .map_err(|e| insert_error(e, EntityKind::Tag, &tag.name))?;
        Ok(())
    }

    async fn store_tag(&self, tag: &Tag) -> DataResult<()> {
        sqlx::query(
            "INSERT INTO tags (name, typ, prnt, cldn, refs) VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(name) DO UPDATE SET typ = excluded.typ, prnt = excluded.prnt, \
             cldn = excluded.cldn, refs = excluded.refs",
        )
        .bind(&tag.name)
        .bind(&tag.tag_type)
        .bind(&tag.parent)
        .bind(join_tokens(&tag.children))
        .bind(join_tokens(&tag.refs))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_tag(&self, name: &str) -> DataResult<()> {
        let result = sqlx::query("DELETE FROM tags WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DataError::not_found(EntityKind::Tag, name));
        }
        Ok(())
    }

    async fn search_tags(&self, query: &str, page: PageRequest) -> DataResult<Page<Tag>> {
        let total = self
            .count(
                "SELECT COUNT(*) AS total FROM tags WHERE instr(name, ?) > 0",
                query,
            )
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT {TAG_COLUMNS} FROM tags WHERE instr(name, ?) > 0 \
             ORDER BY name LIMIT ? OFFSET ?"
        ))
        .bind(query)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(rows.iter().map(tag_from_row).collect(), total, page))
    }

    async fn tags_of_type(&self, type_name: &str) -> DataResult<Vec<Tag>> {
        let rows = sqlx::query(&format!(
            "SELECT {TAG_COLUMNS} FROM tags WHERE typ = ? ORDER BY name"
        ))
        .bind(type_name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(tag_from_row).collect())
    }

    async fn tags_referencing(&self, item_id: i64) -> DataResult<Vec<Tag>> {
        // Pad both sides so "1" does not match inside "12".
        let rows = sqlx::query(&format!(
            "SELECT {TAG_COLUMNS} FROM tags WHERE instr(' ' || refs || ' ', ?) > 0 ORDER BY name"
        ))
        .bind(format!(" {} ", item_id))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(tag_from_row)
            .filter(|t| t.refs.contains(&item_id))
            .collect())
    }

    // ==================== ITEM OPERATIONS ====================

    async fn get_item(&self, id: i64) -> DataResult<Item> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref()
            .map(item_from_row)
            .ok_or_else(|| DataError::not_found(EntityKind::Item, id))
    }

    async fn get_items(&self, ids: &[i64]) -> DataResult<Vec<Item>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id IN (SELECT value FROM json_each(?))"
        ))
        .bind(serde_json::to_string(ids)?)
        .fetch_all(&self.pool)
        .await?;

        let items: Vec<Item> = rows.iter().map(item_from_row).collect();
        if let Some(missing) = ids.iter().find(|id| !items.iter().any(|i| i.id == **id)) {
            return Err(DataError::not_found(EntityKind::Item, missing));
        }
        Ok(items)
    }

    async fn insert_item(&self, item: &Item) -> DataResult<()> {
        sqlx::query(
            "INSERT INTO items (id, src, dt, tags, des, typ, pub, fp) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(item.id)
        .bind(&item.source)
        .bind(item.date)
        .bind(join_tokens(&item.tags))
        .bind(&item.desc)
        .bind(item.kind.as_i32())
        .bind(item.public as i32)
        .bind(&item.file_path)
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error(e, EntityKind::Item, item.id))?;

        self.reserve_through(item.id).await
    }

    async fn store_item(&self, item: &Item) -> DataResult<()> {
        sqlx::query(
            "INSERT INTO items (id, src, dt, tags, des, typ, pub, fp) VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET src = excluded.src, dt = excluded.dt, \
             tags = excluded.tags, des = excluded.des, typ = excluded.typ, \
             pub = excluded.pub, fp = excluded.fp",
        )
        .bind(item.id)
        .bind(&item.source)
        .bind(item.date)
        .bind(join_tokens(&item.tags))
        .bind(&item.desc)
        .bind(item.kind.as_i32())
        .bind(item.public as i32)
        .bind(&item.file_path)
        .execute(&self.pool)
        .await?;

        self.reserve_through(item.id).await
    }

    async fn remove_item(&self, id: i64) -> DataResult<()> {
        let result = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DataError::not_found(EntityKind::Item, id));
        }
        Ok(())
    }

    async fn search_items(&self, query: &ItemQuery, page: PageRequest) -> DataResult<Page<Item>> {
        let ids_json = query
            .ids
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        // Count and page run as separate statements; concurrent writers can
        // make them disagree.
        let count_sql = format!("SELECT COUNT(*) AS total FROM items WHERE {ITEM_FILTER}");
        let row = bind_item_filter(sqlx::query(&count_sql), ids_json.clone(), query)
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = row.get("total");

        let page_sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE {ITEM_FILTER} ORDER BY id DESC LIMIT ? OFFSET ?"
        );
        let rows = bind_item_filter(sqlx::query(&page_sql), ids_json, query)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(rows.iter().map(item_from_row).collect(), total, page))
    }

    async fn next_item_id(&self) -> DataResult<i64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.reserve_through(id).await?;
        Ok(id)
    }

    // ==================== USER OPERATIONS ====================

    async fn get_user(&self, username: &str) -> DataResult<User> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE uname = ?"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref()
            .map(user_from_row)
            .ok_or_else(|| DataError::not_found(EntityKind::User, username))
    }

    async fn insert_user(&self, user: &User) -> DataResult<()> {
        sqlx::query(
            "INSERT INTO users (uname, state, hash, salt, role, conf) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.username)
        .bind(user.state.as_i32())
        .bind(&user.hash)
        .bind(&user.salt)
        .bind(user.role.as_i32())
        .bind(&user.config)
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error(e, EntityKind::User, &user.username))?;
        Ok(())
    }

    async fn store_user(&self, user: &User) -> DataResult<()> {
        sqlx::query(
            "INSERT INTO users (uname, state, hash, salt, role, conf) VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(uname) DO UPDATE SET state = excluded.state, hash = excluded.hash, \
             salt = excluded.salt, role = excluded.role, conf = excluded.conf",
        )
        .bind(&user.username)
        .bind(user.state.as_i32())
        .bind(&user.hash)
        .bind(&user.salt)
        .bind(user.role.as_i32())
        .bind(&user.config)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_user(&self, username: &str) -> DataResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE uname = ?")
            .bind(username)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DataError::not_found(EntityKind::User, username));
        }
        Ok(())
    }

    async fn search_users(&self, query: &str, page: PageRequest) -> DataResult<Page<User>> {
        let total = self
            .count(
                "SELECT COUNT(*) AS total FROM users WHERE instr(uname, ?) > 0",
                query,
            )
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE instr(uname, ?) > 0 \
             ORDER BY uname LIMIT ? OFFSET ?"
        ))
        .bind(query)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(rows.iter().map(user_from_row).collect(), total, page))
    }

    async fn count_users_with_role(&self, role: Role) -> DataResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM users WHERE role = ?")
            .bind(role.as_i32())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("total"))
    }
}

fn bind_item_filter<'q>(
    query: SqliteQuery<'q>,
    ids_json: Option<String>,
    filter: &ItemQuery,
) -> SqliteQuery<'q> {
    query
        .bind(ids_json.clone())
        .bind(ids_json)
        .bind(filter.include_private as i32)
        .bind(filter.after)
        .bind(filter.after)
        .bind(filter.before)
        .bind(filter.before)
}

fn insert_error(err: sqlx::Error, entity: EntityKind, key: impl ToString) -> DataError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            DataError::already_exists(entity, key)
        }
        _ => err.into(),
    }
}

// Helper functions for row conversion

fn tag_type_from_row(row: &SqliteRow) -> TagType {
    let color: Option<String> = row.get("clr");
    let order: Option<i64> = row.get("ordr");
    TagType {
        name: row.get("name"),
        color: color.unwrap_or_default(),
        order: order.unwrap_or_default(),
    }
}

fn tag_from_row(row: &SqliteRow) -> Tag {
    let tag_type: Option<String> = row.get("typ");
    let parent: Option<String> = row.get("prnt");
    let children: Option<String> = row.get("cldn");
    let refs: Option<String> = row.get("refs");
    Tag {
        name: row.get("name"),
        tag_type: tag_type.unwrap_or_default(),
        parent: parent.unwrap_or_default(),
        children: split_tokens(children.as_deref()),
        refs: split_tokens(refs.as_deref()),
    }
}

fn item_from_row(row: &SqliteRow) -> Item {
    let source: Option<String> = row.get("src");
    let date: Option<i64> = row.get("dt");
    let tags: Option<String> = row.get("tags");
    let desc: Option<String> = row.get("des");
    let kind: Option<i64> = row.get("typ");
    let public: Option<i64> = row.get("pub");
    let file_path: Option<String> = row.get("fp");
    Item {
        id: row.get("id"),
        source: source.unwrap_or_default(),
        date: date.unwrap_or_default(),
        tags: split_tokens(tags.as_deref()),
        desc: desc.unwrap_or_default(),
        kind: ItemKind::from_i32(kind.unwrap_or_default() as i32),
        public: public.unwrap_or_default() != 0,
        file_path: file_path.unwrap_or_default(),
    }
}

fn user_from_row(row: &SqliteRow) -> User {
    let state: Option<i64> = row.get("state");
    let hash: Option<String> = row.get("hash");
    let salt: Option<String> = row.get("salt");
    let role: Option<i64> = row.get("role");
    let config: Option<String> = row.get("conf");
    User {
        username: row.get("uname"),
        role: Role::from_i32(role.unwrap_or_default() as i32),
        // A missing state column reads as Error so the account must be reset.
        state: UserState::from_i32(state.map(|s| s as i32).unwrap_or(-1)),
        hash: hash.unwrap_or_default(),
        salt: salt.unwrap_or_default(),
        config: config.unwrap_or_default(),
    }
}

fn join_tokens<T: ToString>(values: &BTreeSet<T>) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tokens that fail to parse are dropped.
fn split_tokens<T: std::str::FromStr + Ord>(column: Option<&str>) -> BTreeSet<T> {
    column
        .unwrap_or_default()
        .split_whitespace()
        .filter_map(|token| token.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_columns() {
        let refs = BTreeSet::from([3i64, 1, 2]);
        assert_eq!(join_tokens(&refs), "1 2 3");
        assert_eq!(split_tokens::<i64>(Some("  4 x 5  ")), BTreeSet::from([4, 5]));
        assert!(split_tokens::<String>(None).is_empty());
        assert!(join_tokens::<String>(&BTreeSet::new()).is_empty());
    }

    #[tokio::test]
    async fn test_id_counter_seeded_from_table() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("ids.sqlite");

        let repo = Repository::open(&db_path).await.unwrap();
        repo.insert_item(&Item::new(41, ItemKind::Image)).await.unwrap();
        drop(repo);

        let reopened = Repository::open(&db_path).await.unwrap();
        assert_eq!(reopened.next_item_id().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_deleted_ids_not_reused_after_reopen() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("reuse.sqlite");

        let repo = Repository::open(&db_path).await.unwrap();
        let first = repo.next_item_id().await.unwrap();
        assert_eq!(first, 1);
        repo.insert_item(&Item::new(first, ItemKind::Image)).await.unwrap();
        repo.remove_item(first).await.unwrap();
        // Handed out but never stored
        assert_eq!(repo.next_item_id().await.unwrap(), 2);
        drop(repo);

        let reopened = Repository::open(&db_path).await.unwrap();
        assert_eq!(reopened.next_item_id().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_tags_referencing_matches_whole_ids() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let repo = Repository::open(&temp_dir.path().join("refs.sqlite"))
            .await
            .unwrap();

        let mut a = Tag::auto("a");
        a.refs.extend([1, 5]);
        let mut b = Tag::auto("b");
        b.refs.extend([12, 21]);
        repo.insert_tag(&a).await.unwrap();
        repo.insert_tag(&b).await.unwrap();

        let names: Vec<String> = repo
            .tags_referencing(1)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["a"]);
        assert!(repo.tags_referencing(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_already_exists() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let repo = Repository::open(&temp_dir.path().join("dup.sqlite"))
            .await
            .unwrap();

        repo.insert_tag(&Tag::auto("sea")).await.unwrap();
        let err = repo.insert_tag(&Tag::auto("sea")).await.unwrap_err();
        assert_eq!(err, DataError::already_exists(EntityKind::Tag, "sea"));
    }
}
