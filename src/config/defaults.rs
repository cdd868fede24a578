pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_port() -> u16 {
    8080
}

pub fn default_environment() -> String {
    "development".to_string()
}

pub fn default_db_acquire_timeout_seconds() -> u64 {
    10
}

pub fn default_db_idle_timeout_seconds() -> u64 {
    600
}

pub fn default_db_max_lifetime_seconds() -> u64 {
    1800
}

pub fn default_db_test_before_acquire() -> bool {
    true
}

pub fn default_jwt_kid() -> String {
    "v1".to_string()
}

pub fn default_jwt_expiration_seconds() -> u64 {
    900
}

pub fn default_cors_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

pub fn default_metrics_allow_private_only() -> bool {
    true
}

pub fn default_logging_level() -> String {
    "info".to_string()
}

pub fn default_logging_json_format() -> bool {
    true
}

pub fn default_max_message_length() -> usize {
    5000
}

pub fn default_page_size() -> i64 {
    50
}

pub fn default_max_page_size() -> i64 {
    100
}

pub fn default_preview_length() -> usize {
    100
}

pub fn default_store_timeout_ms() -> u64 {
    5000
}

pub fn default_upload_dir() -> String {
    "uploads/chat".to_string()
}

pub fn default_upload_base_url() -> String {
    "/uploads/chat".to_string()
}

pub fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

pub fn normalize_optional_string(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
