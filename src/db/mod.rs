//! Database module for SQLite persistence.
//!
//! The relational engine keeps the four catalog tables in the layout older
//! deployments already hold on disk, so the column names are fixed. A
//! one-row `catalog_meta` table next to them remembers the highest item id
//! ever handed out.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and create any missing tables.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    ensure_schema(&pool).await?;

    Ok(pool)
}

/// Create the catalog tables if they don't exist.
async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS items (id INT PRIMARY KEY, src TEXT, dt BIGINT, tags TEXT, des TEXT, typ INT, pub BOOLEAN, fp TEXT)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS tags (name TEXT PRIMARY KEY, typ TEXT, prnt TEXT, cldn TEXT, refs TEXT)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE TABLE IF NOT EXISTS tag_types (name TEXT PRIMARY KEY, clr TEXT, ordr INT)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (uname TEXT PRIMARY KEY, state INT, hash TEXT, salt TEXT, role INT, conf TEXT)",
    )
    .execute(pool)
    .await?;

    // Item id high-water mark; kept apart from the catalog tables so their
    // layout stays fixed.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS catalog_meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            next_item_id INTEGER NOT NULL DEFAULT 1
        );

        INSERT OR IGNORE INTO catalog_meta (id, next_item_id) VALUES (1, 1);
        "#,
    )
    .execute(pool)
    .await?;

    tracing::debug!("Catalog schema ready");
    Ok(())
}
