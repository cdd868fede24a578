mod local;

pub use local::LocalAttachmentStorage;

use async_trait::async_trait;

use crate::domain::MessageKind;
use crate::error::AppResult;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "svg"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAttachment {
    pub file_url: String,
    pub file_name: String,
    pub file_size: i64,
}

#[async_trait]
pub trait AttachmentStorage: Send + Sync {
    async fn store(&self, file_name: &str, bytes: &[u8]) -> AppResult<StoredAttachment>;
}

/// Keeps `[A-Za-z0-9._-]`, replaces everything else with `_`, and never
/// yields an empty or dot-only name.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();
    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.chars().all(|c| c == '.' || c == '_') {
        "attachment".to_string()
    } else {
        sanitized
    }
}

pub fn kind_for_file_name(file_name: &str) -> MessageKind {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase());
    match extension {
        Some(extension) if IMAGE_EXTENSIONS.contains(&extension.as_str()) => MessageKind::Image,
        _ => MessageKind::File,
    }
}
