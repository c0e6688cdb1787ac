use anyhow::{Context, Result};

use crate::allocator::{DEFAULT_CODE_LENGTH, DEFAULT_MAX_ATTEMPTS};

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite connection string, e.g. "sqlite:./snaplink.db"
    pub database_url: String,

    /// Upper bound on pooled SQLite connections
    pub max_connections: u32,

    /// Host to bind the HTTP server to, e.g. "0.0.0.0"
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Public base URL used when building `shortUrl`, e.g. "https://go.example.com".
    /// Stored without a trailing slash.
    pub base_url: String,

    /// Length of generated short codes
    pub code_length: usize,

    /// How many random candidates the allocator draws before giving up
    pub code_max_attempts: u32,

    /// Resolve click countries through ip-api.com. Off by default, in which
    /// case every click lands in the "Unknown" country bucket.
    pub geo_lookup: bool,
}

impl AppConfig {
    /// Load configuration from environment variables (populated by dotenvy before this is called).
    pub fn from_env() -> Result<Self> {
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse::<u16>()
            .context("PORT must be a valid port number (1–65535)")?;

        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".into())
            .parse::<u32>()
            .context("DB_MAX_CONNECTIONS must be a positive integer")?;
        if max_connections == 0 {
            anyhow::bail!("DB_MAX_CONNECTIONS must be at least 1");
        }

        let code_length = std::env::var("CODE_LENGTH")
            .ok()
            .map(|v| v.parse::<usize>())
            .transpose()
            .context("CODE_LENGTH must be a positive integer")?
            .unwrap_or(DEFAULT_CODE_LENGTH);
        if !(4..=32).contains(&code_length) {
            anyhow::bail!("CODE_LENGTH must be between 4 and 32");
        }

        let code_max_attempts = std::env::var("CODE_MAX_ATTEMPTS")
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .context("CODE_MAX_ATTEMPTS must be a positive integer")?
            .unwrap_or(DEFAULT_MAX_ATTEMPTS)
            .max(1);

        let base_url = std::env::var("BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_owned();

        let geo_lookup = std::env::var("GEO_LOOKUP")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./snaplink.db".into()),
            max_connections,
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            base_url,
            code_length,
            code_max_attempts,
            geo_lookup,
        })
    }

    /// Build the public short URL for a code.
    pub fn short_url(&self, short_code: &str) -> String {
        format!("{}/{}", self.base_url, short_code)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:./snaplink.db".into(),
            max_connections: 10,
            host: "0.0.0.0".into(),
            port: 3000,
            base_url: "http://localhost:3000".into(),
            code_length: DEFAULT_CODE_LENGTH,
            code_max_attempts: DEFAULT_MAX_ATTEMPTS,
            geo_lookup: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_url_joins_base_and_code() {
        let config = AppConfig {
            base_url: "https://go.example.com".into(),
            ..AppConfig::default()
        };
        assert_eq!(config.short_url("abc123"), "https://go.example.com/abc123");
    }
}
