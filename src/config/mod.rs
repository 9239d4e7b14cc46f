//! Configuration module for the catalog.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Which storage engine backs the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Memory,
    Sqlite,
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(EngineKind::Memory),
            "sqlite" => Ok(EngineKind::Sqlite),
            other => Err(format!("unknown engine '{}'", other)),
        }
    }
}

/// Catalog configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage engine to open
    pub engine: EngineKind,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Directory rehosted media is moved into
    pub media_dir: PathBuf,
    /// URL prefix rehosted media is served under
    pub media_url: String,
    /// Default page size handed to callers
    pub page_limit: i64,
    /// Password given to the bootstrap admin account
    pub admin_password: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineKind::Sqlite,
            db_path: PathBuf::from("./data/catalog.sqlite"),
            media_dir: PathBuf::from("./data/media"),
            media_url: "/media".to_string(),
            page_limit: 40,
            admin_password: "changeme".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let engine = parse_var("CATALOG_ENGINE", defaults.engine);

        let db_path = env::var("CATALOG_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let media_dir = env::var("CATALOG_MEDIA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.media_dir);

        let media_url = env::var("CATALOG_MEDIA_URL").unwrap_or(defaults.media_url);

        let page_limit = parse_var("CATALOG_PAGE_LIMIT", defaults.page_limit);

        let admin_password =
            env::var("CATALOG_ADMIN_PASSWORD").unwrap_or(defaults.admin_password);

        let log_level = env::var("CATALOG_LOG_LEVEL").unwrap_or(defaults.log_level);

        Self {
            engine,
            db_path,
            media_dir,
            media_url,
            page_limit,
            admin_password,
            log_level,
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}, using {:?}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        env::remove_var("CATALOG_ENGINE");
        env::remove_var("CATALOG_DB_PATH");
        env::remove_var("CATALOG_MEDIA_DIR");
        env::remove_var("CATALOG_MEDIA_URL");
        env::remove_var("CATALOG_PAGE_LIMIT");
        env::remove_var("CATALOG_ADMIN_PASSWORD");
        env::remove_var("CATALOG_LOG_LEVEL");

        let config = Config::from_env();

        assert_eq!(config.engine, EngineKind::Sqlite);
        assert_eq!(config.db_path, PathBuf::from("./data/catalog.sqlite"));
        assert_eq!(config.media_dir, PathBuf::from("./data/media"));
        assert_eq!(config.media_url, "/media");
        assert_eq!(config.page_limit, 40);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_engine_kind_parse() {
        assert_eq!("Memory".parse::<EngineKind>(), Ok(EngineKind::Memory));
        assert_eq!(" sqlite ".parse::<EngineKind>(), Ok(EngineKind::Sqlite));
        assert!("postgres".parse::<EngineKind>().is_err());
    }
}
