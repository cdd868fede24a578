use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use super::{sanitize_file_name, AttachmentStorage, StoredAttachment};
use crate::config::ChatConfig;
use crate::error::{AppError, AppResult};

/// Writes attachments below a local directory served at `base_url`.
pub struct LocalAttachmentStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalAttachmentStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(&config.upload_dir, &config.upload_base_url)
    }
}

#[async_trait]
impl AttachmentStorage for LocalAttachmentStorage {
    async fn store(&self, file_name: &str, bytes: &[u8]) -> AppResult<StoredAttachment> {
        if bytes.is_empty() {
            return Err(AppError::validation_error("attachment must not be empty"));
        }

        let file_name = sanitize_file_name(file_name);
        let stored_name = format!("{}-{}", Uuid::new_v4(), file_name);
        let path = self.root.join(&stored_name);

        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("failed to create upload dir {}", self.root.display()))?;
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write attachment {}", path.display()))?;

        info!(file_name = %stored_name, file_size = bytes.len(), "attachment stored");
        Ok(StoredAttachment {
            file_url: format!("{}/{}", self.base_url, stored_name),
            file_name,
            file_size: bytes.len() as i64,
        })
    }
}
