use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub hue_base_url: String,
    pub hue_client_id: String,
    pub hue_client_secret: String,
    pub hue_refresh_token: String,
    /// Bridge whitelist user; v1 path segment and v2 application key.
    pub hue_username: String,
    pub server_host: String,
    pub server_port: u16,
    /// Sensor polling interval in seconds.
    pub poll_interval_secs: u64,
    /// Readings older than this many days are deleted by the retention loop.
    pub retention_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            hue_base_url: optional("HUE_BASE_URL", "https://api.meethue.com"),
            hue_client_id: required("HUE_CLIENT_ID")?,
            hue_client_secret: required("HUE_CLIENT_SECRET")?,
            hue_refresh_token: required("HUE_REFRESH_TOKEN")?,
            hue_username: required("HUE_USERNAME")?,
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            poll_interval_secs: optional("POLL_INTERVAL_SECS", "60")
                .parse()
                .context("POLL_INTERVAL_SECS must be a positive integer")?,
            retention_days: optional("RETENTION_DAYS", "30")
                .parse()
                .context("RETENTION_DAYS must be a positive integer")?,
        })
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
