//! Error handling module for the catalog.
//!
//! Provides a single error type shared by every storage engine and by the
//! algorithms layered on top of them.

use std::fmt;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const ALREADY_EXISTS: &str = "ALREADY_EXISTS";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const CONSTRAINT_VIOLATION: &str = "CONSTRAINT_VIOLATION";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const IO_ERROR: &str = "IO_ERROR";
    pub const SERIALIZATION_ERROR: &str = "SERIALIZATION_ERROR";
}

/// The kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    TagType,
    Tag,
    Item,
    User,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::TagType => "tag type",
            EntityKind::Tag => "tag",
            EntityKind::Item => "item",
            EntityKind::User => "user",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog error type.
#[derive(Debug, Clone, PartialEq)]
pub enum DataError {
    /// Record not found
    NotFound { entity: EntityKind, key: String },
    /// Record with the same key already stored
    AlreadyExists { entity: EntityKind, key: String },
    /// The request itself is invalid
    Validation(String),
    /// The request would break a catalog-wide invariant
    ConstraintViolation(String),
    /// Database error
    Database(String),
    /// Filesystem error
    Io(String),
    /// Malformed stored or supplied data
    Serialization(String),
}

impl DataError {
    pub fn not_found(entity: EntityKind, key: impl ToString) -> Self {
        DataError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn already_exists(entity: EntityKind, key: impl ToString) -> Self {
        DataError::AlreadyExists {
            entity,
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DataError::NotFound { .. })
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            DataError::NotFound { .. } => codes::NOT_FOUND,
            DataError::AlreadyExists { .. } => codes::ALREADY_EXISTS,
            DataError::Validation(_) => codes::VALIDATION_ERROR,
            DataError::ConstraintViolation(_) => codes::CONSTRAINT_VIOLATION,
            DataError::Database(_) => codes::DATABASE_ERROR,
            DataError::Io(_) => codes::IO_ERROR,
            DataError::Serialization(_) => codes::SERIALIZATION_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            DataError::NotFound { entity, key } => format!("{} '{}' not found", entity, key),
            DataError::AlreadyExists { entity, key } => {
                format!("{} '{}' already exists", entity, key)
            }
            DataError::Validation(msg) => msg.clone(),
            DataError::ConstraintViolation(msg) => msg.clone(),
            DataError::Database(msg) => msg.clone(),
            DataError::Io(msg) => msg.clone(),
            DataError::Serialization(msg) => msg.clone(),
        }
    }
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for DataError {}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        DataError::Database(format!("Database error: {}", err))
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        tracing::error!("I/O error: {:?}", err);
        DataError::Io(format!("I/O error: {}", err))
    }
}

/// Shorthand result type for catalog operations.
pub type DataResult<T> = Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = DataError::not_found(EntityKind::Tag, "sunset");
        assert_eq!(err.to_string(), "NOT_FOUND: tag 'sunset' not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            DataError::ConstraintViolation("last admin".into()).error_code(),
            codes::CONSTRAINT_VIOLATION
        );
        assert_eq!(
            DataError::already_exists(EntityKind::User, "admin").error_code(),
            codes::ALREADY_EXISTS
        );
    }
}
