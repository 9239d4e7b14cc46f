//! Tagged media catalog storage.
//!
//! Users, hierarchical tags, tag types and content items, kept consistent by
//! one set of algorithms over two interchangeable engines: an in-memory store
//! and a SQLite store.

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod handler;
pub mod media;
pub mod memory;
pub mod models;
pub mod storage;

pub use config::{Config, EngineKind};
pub use db::Repository;
pub use errors::{DataError, DataResult, EntityKind};
pub use handler::{tags_from_string, DataHandler};
pub use memory::MemoryStorage;
pub use storage::Storage;
