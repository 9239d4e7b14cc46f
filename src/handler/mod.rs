//! The catalog data contract.
//!
//! [`DataHandler`] wraps any [`Storage`] engine and implements the catalog
//! operations once on top of its primitives: tag diffing with ancestor
//! propagation, multi-tag intersection, consistency repair on delete, and the
//! admin/default-type bootstrap. Both engines therefore behave identically.
//!
//! Multi-step operations run their steps strictly in order but are not
//! atomic: a concurrent reader can observe a half-applied update, and two
//! writers racing on the same record lose one update. Callers must keep a
//! single logical writer per record.

mod graph;
mod items;
mod tags;
mod users;

pub use graph::tags_from_string;
pub use users::BOOTSTRAP_ADMIN;

use std::path::Path;

use crate::auth::{PasswordHasher, Sha256Hasher};
use crate::config::Config;
use crate::errors::{DataError, DataResult};
use crate::media::{LocalRehoster, Rehosted, Rehoster};
use crate::storage::Storage;

/// Catalog operations over a storage engine.
pub struct DataHandler<S: Storage> {
    storage: S,
    hasher: Box<dyn PasswordHasher>,
    rehoster: Box<dyn Rehoster>,
    page_limit: i64,
    admin_password: String,
}

impl<S: Storage> DataHandler<S> {
    /// Wrap `storage` using the default configuration.
    pub fn new(storage: S) -> Self {
        Self::from_config(storage, &Config::default())
    }

    pub fn from_config(storage: S, config: &Config) -> Self {
        Self {
            storage,
            hasher: Box::new(Sha256Hasher),
            rehoster: Box::new(LocalRehoster::new(
                config.media_dir.clone(),
                config.media_url.clone(),
            )),
            page_limit: config.page_limit,
            admin_password: config.admin_password.clone(),
        }
    }

    pub fn with_hasher(mut self, hasher: impl PasswordHasher + 'static) -> Self {
        self.hasher = Box::new(hasher);
        self
    }

    pub fn with_rehoster(mut self, rehoster: impl Rehoster + 'static) -> Self {
        self.rehoster = Box::new(rehoster);
        self
    }

    /// The underlying engine, for primitive access.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Default page size for listings.
    pub fn page_limit(&self) -> i64 {
        self.page_limit
    }

    pub async fn next_item_id(&self) -> DataResult<i64> {
        self.storage.next_item_id().await
    }

    pub fn generate_session_id(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    /// Move an uploaded temp file into permanent storage for item `id`.
    pub async fn rehost(
        &self,
        temp_path: &Path,
        mime_type: &str,
        extension: &str,
        id: i64,
    ) -> DataResult<Rehosted> {
        self.rehoster
            .rehost(temp_path, mime_type, extension, id)
            .await
    }
}

/// Keys end up in space-joined columns and query strings, so they must be
/// single non-empty tokens.
fn validate_key(kind: &str, key: &str) -> DataResult<()> {
    if key.is_empty() {
        return Err(DataError::Validation(format!("{} name is required", kind)));
    }
    if key.chars().any(char::is_whitespace) {
        return Err(DataError::Validation(format!(
            "{} name '{}' must not contain whitespace",
            kind, key
        )));
    }
    Ok(())
}

/// Treat `NotFound` as absence, propagate everything else.
fn found<T>(result: DataResult<T>) -> DataResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
