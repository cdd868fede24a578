use std::sync::Mutex;

use async_trait::async_trait;
use marketplace_chat::error::AppResult;
use marketplace_chat::infrastructure::uploads::{
    sanitize_file_name, AttachmentStorage, StoredAttachment,
};

#[derive(Default)]
pub struct MemoryAttachmentStorage {
    stored: Mutex<Vec<StoredAttachment>>,
}

impl MemoryAttachmentStorage {
    pub fn stored(&self) -> Vec<StoredAttachment> {
        self.stored.lock().expect("stored mutex poisoned").clone()
    }
}

#[async_trait]
impl AttachmentStorage for MemoryAttachmentStorage {
    async fn store(&self, file_name: &str, bytes: &[u8]) -> AppResult<StoredAttachment> {
        let file_name = sanitize_file_name(file_name);
        let stored = StoredAttachment {
            file_url: format!("/uploads/chat/{file_name}"),
            file_name,
            file_size: bytes.len() as i64,
        };
        self.stored
            .lock()
            .expect("stored mutex poisoned")
            .push(stored.clone());
        Ok(stored)
    }
}
