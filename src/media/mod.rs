//! Rehosting of uploaded files.
//!
//! Upload staging happens elsewhere; this module only moves a finished temp
//! file into permanent storage and reports where it ended up.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::errors::{DataError, DataResult};

/// Final location of a rehosted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rehosted {
    /// Public URL of the file
    pub url: String,
    /// Path the file is stored at
    pub path: PathBuf,
}

#[async_trait]
pub trait Rehoster: Send + Sync {
    async fn rehost(
        &self,
        temp_path: &Path,
        mime_type: &str,
        extension: &str,
        id: i64,
    ) -> DataResult<Rehosted>;
}

/// Stores files as `<media_dir>/<id>.<ext>` and serves them under `base_url`.
#[derive(Debug, Clone)]
pub struct LocalRehoster {
    media_dir: PathBuf,
    base_url: String,
}

impl LocalRehoster {
    pub fn new(media_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            media_dir: media_dir.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Rehoster for LocalRehoster {
    async fn rehost(
        &self,
        temp_path: &Path,
        mime_type: &str,
        extension: &str,
        id: i64,
    ) -> DataResult<Rehosted> {
        let extension = extension.trim_start_matches('.');
        if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DataError::Validation(format!(
                "Invalid file extension '{}'",
                extension
            )));
        }

        tokio::fs::create_dir_all(&self.media_dir).await?;

        let file_name = format!("{}.{}", id, extension.to_ascii_lowercase());
        let path = self.media_dir.join(&file_name);

        // rename fails across filesystems, fall back to copy
        if tokio::fs::rename(temp_path, &path).await.is_err() {
            tokio::fs::copy(temp_path, &path).await?;
            tokio::fs::remove_file(temp_path).await?;
        }

        tracing::debug!("Rehosted {} ({}) to {:?}", id, mime_type, path);

        Ok(Rehosted {
            url: format!("{}/{}", self.base_url, file_name),
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rehost_moves_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let upload = temp_dir.path().join("upload.tmp");
        tokio::fs::write(&upload, b"pixels").await.unwrap();

        let rehoster = LocalRehoster::new(temp_dir.path().join("media"), "/media/");
        let rehosted = rehoster
            .rehost(&upload, "image/png", ".PNG", 12)
            .await
            .unwrap();

        assert_eq!(rehosted.url, "/media/12.png");
        assert!(!upload.exists());
        assert_eq!(tokio::fs::read(&rehosted.path).await.unwrap(), b"pixels");
    }

    #[tokio::test]
    async fn test_rehost_rejects_path_extension() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let rehoster = LocalRehoster::new(temp_dir.path(), "/media");

        let err = rehoster
            .rehost(&temp_dir.path().join("x"), "image/png", "../png", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::Validation(_)));
    }
}
