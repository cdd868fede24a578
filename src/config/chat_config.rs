use std::time::Duration;

use serde::Deserialize;

use super::ConfigError;

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "crate::config::defaults::default_max_message_length")]
    pub max_message_length: usize,
    #[serde(default = "crate::config::defaults::default_page_size")]
    pub default_page_size: i64,
    #[serde(default = "crate::config::defaults::default_max_page_size")]
    pub max_page_size: i64,
    #[serde(default = "crate::config::defaults::default_preview_length")]
    pub preview_length: usize,
    #[serde(default = "crate::config::defaults::default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    #[serde(default = "crate::config::defaults::default_upload_dir")]
    pub upload_dir: String,
    #[serde(default = "crate::config::defaults::default_upload_base_url")]
    pub upload_base_url: String,
    #[serde(default = "crate::config::defaults::default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        use crate::config::defaults;

        Self {
            max_message_length: defaults::default_max_message_length(),
            default_page_size: defaults::default_page_size(),
            max_page_size: defaults::default_max_page_size(),
            preview_length: defaults::default_preview_length(),
            store_timeout_ms: defaults::default_store_timeout_ms(),
            upload_dir: defaults::default_upload_dir(),
            upload_base_url: defaults::default_upload_base_url(),
            max_upload_bytes: defaults::default_max_upload_bytes(),
        }
    }
}

impl ChatConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_message_length == 0 {
            return Err(ConfigError::Chat(
                "max_message_length must be positive".to_string(),
            ));
        }
        if self.max_page_size < 1 {
            return Err(ConfigError::Chat("max_page_size must be positive".to_string()));
        }
        if self.default_page_size < 1 || self.default_page_size > self.max_page_size {
            return Err(ConfigError::Chat(
                "default_page_size must be between 1 and max_page_size".to_string(),
            ));
        }
        if self.store_timeout_ms == 0 {
            return Err(ConfigError::Chat(
                "store_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
