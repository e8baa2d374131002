//! Environment configuration.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing PUNCHCARD_HMAC_SECRET env")]
    MissingSecret,

    #[error("invalid PUNCHCARD_PORT: {0}")]
    InvalidPort(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// HS256 signing secret for session tokens.
    pub hmac_secret: String,
}

impl Config {
    /// Load from process environment. The HMAC secret is required; everything
    /// else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let hmac_secret = lookup("PUNCHCARD_HMAC_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingSecret)?;

        let port = match lookup("PUNCHCARD_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => 8080,
        };

        Ok(Self {
            host: lookup("PUNCHCARD_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            db_path: lookup("PUNCHCARD_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("punchcard.db")),
            hmac_secret,
        })
    }
}
