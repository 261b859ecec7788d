//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `mims.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::path::Path;

use serde::Deserialize;

use mims_adapter_line_reqwest::LineConfig;
use mims_adapter_webhook_reqwest::WebhookClientConfig;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Sessions, login throttling and the first administrator.
    pub auth: AuthConfig,
    /// Per-client API throttling.
    pub rate_limit: RateLimitConfig,
    /// Outbound webhook delivery.
    pub webhooks: WebhookClientConfig,
    /// LINE Messaging API client.
    pub line: LineConfig,
    /// Notification outbox worker.
    pub outbox: OutboxConfig,
    /// Attachment storage.
    pub attachments: AttachmentsConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Session lifetime, in seconds.
    pub session_ttl_secs: u64,
    /// Mark the session cookie `Secure` (serve behind HTTPS).
    pub secure_cookie: bool,
    /// Login attempts allowed per email within the window.
    pub login_max_attempts: usize,
    pub login_window_secs: u64,
    /// Created as administrator when the user table is empty.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests allowed per client within the window.
    pub max_requests: usize,
    pub window_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutboxConfig {
    /// Seconds between worker passes; `0` leaves processing to the cron endpoint.
    pub interval_secs: u64,
    /// Rows handled per pass.
    pub batch_size: u32,
    /// Attempts before a row is marked failed.
    pub max_attempts: u32,
    /// Shared secret for `POST /api/notifications/process`.
    pub cron_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AttachmentsConfig {
    /// Directory holding attachment contents.
    pub directory: String,
    /// Largest accepted upload, in bytes.
    pub max_bytes: u64,
}

impl Config {
    /// Load configuration from `mims.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// result fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("mims.toml")?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("MIMS_HOST") {
            self.server.host = val;
        }
        if let Some(port) = var("MIMS_PORT").and_then(|val| val.parse().ok()) {
            self.server.port = port;
        }
        if let Some(val) = var("MIMS_BIND")
            && let Some((host, port)) = val.rsplit_once(':')
        {
            self.server.host = host.to_string();
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Some(val) = var("MIMS_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = var("MIMS_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("MIMS_CRON_SECRET") {
            self.outbox.cron_secret = Some(val);
        }
        if let Some(val) = var("MIMS_ADMIN_EMAIL") {
            self.auth.admin_email = Some(val);
        }
        if let Some(val) = var("MIMS_ADMIN_PASSWORD") {
            self.auth.admin_password = Some(val);
        }
        if let Some(val) = var("MIMS_ATTACHMENTS_DIR") {
            self.attachments.directory = val;
        }
        // blank secrets mean "unset"
        self.outbox.cron_secret = self.outbox.cron_secret.take().filter(|s| !s.trim().is_empty());
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            (self.server.port == 0, "port must be non-zero"),
            (self.auth.session_ttl_secs == 0, "auth.session_ttl_secs must be non-zero"),
            (self.auth.login_max_attempts == 0, "auth.login_max_attempts must be non-zero"),
            (self.auth.login_window_secs == 0, "auth.login_window_secs must be non-zero"),
            (self.rate_limit.max_requests == 0, "rate_limit.max_requests must be non-zero"),
            (self.rate_limit.window_secs == 0, "rate_limit.window_secs must be non-zero"),
            (self.webhooks.timeout_secs == 0, "webhooks.timeout_secs must be non-zero"),
            (self.line.timeout_secs == 0, "line.timeout_secs must be non-zero"),
            (self.outbox.batch_size == 0, "outbox.batch_size must be non-zero"),
            (self.outbox.max_attempts == 0, "outbox.max_attempts must be non-zero"),
            (self.attachments.max_bytes == 0, "attachments.max_bytes must be non-zero"),
            (
                self.auth.admin_email.is_some() != self.auth.admin_password.is_some(),
                "auth.admin_email and auth.admin_password must be set together",
            ),
        ];
        match checks.into_iter().find(|(failed, _)| *failed) {
            Some((_, message)) => Err(ConfigError::Validation(message.to_string())),
            None => Ok(()),
        }
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:mims.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "mimsd=info,mims=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 12 * 60 * 60,
            secure_cookie: false,
            login_max_attempts: 5,
            login_window_secs: 15 * 60,
            admin_email: None,
            admin_password: None,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 300,
            window_secs: 60,
        }
    }
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            batch_size: 50,
            max_attempts: 5,
            cron_secret: None,
        }
    }
}

impl Default for AttachmentsConfig {
    fn default() -> Self {
        Self {
            directory: "data/attachments".to_string(),
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
