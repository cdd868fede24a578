use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Auth configuration is invalid: {0}")]
    Auth(String),

    #[error("Chat configuration is invalid: {0}")]
    Chat(String),

    #[error("Database configuration is invalid: {0}")]
    Database(String),
}

#[derive(Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "crate::config::defaults::default_jwt_kid")]
    pub jwt_kid: String,
    #[serde(default)]
    pub previous_jwt_secrets: Vec<String>,
    #[serde(default)]
    pub previous_jwt_kids: Vec<String>,
    #[serde(default = "crate::config::defaults::default_jwt_expiration_seconds")]
    pub jwt_expiration_seconds: u64,
    pub issuer: String,
    pub audience: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_kid", &self.jwt_kid)
            .field("previous_jwt_secrets", &"[REDACTED]")
            .field("previous_jwt_kids", &self.previous_jwt_kids)
            .field("jwt_expiration_seconds", &self.jwt_expiration_seconds)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let jwt_secret = self.jwt_secret.trim();
        if jwt_secret.is_empty() {
            return Err(ConfigError::Auth(
                "JWT_SECRET must be set via environment variable".to_string(),
            ));
        }
        if jwt_secret == "change-me-in-production" {
            return Err(ConfigError::Auth(
                "JWT_SECRET must be set to a secure value, not the default placeholder".to_string(),
            ));
        }
        if self.previous_jwt_kids.len() != self.previous_jwt_secrets.len() {
            return Err(ConfigError::Auth(
                "previous_jwt_kids and previous_jwt_secrets must have the same length".to_string(),
            ));
        }
        Ok(())
    }
}
