use once_cell::sync::OnceCell;
use serde::Deserialize;

mod app_env;

pub use app_env::app_env;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub claims: ClaimSettings,
    pub idempotency: IdempotencySettings,
    pub webhooks: WebhookSettings,
}

#[derive(Debug, Deserialize)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    /// Pepper mixed into every capability key before hashing. Rotating it
    /// invalidates every outstanding key, so it must be stable across
    /// restarts of a given deployment.
    pub key_pepper: String,
    pub cors: CorsSettings,
}

impl ApplicationSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize)]
pub struct CorsSettings {
    pub allowed_origins: Vec<String>,
}

impl CorsSettings {
    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// Filesystem path to the SQLite database file, or `:memory:` for tests.
    pub path: String,
}

impl DatabaseSettings {
    pub fn connect_options(&self) -> sqlx::sqlite::SqliteConnectOptions {
        use std::str::FromStr;

        sqlx::sqlite::SqliteConnectOptions::from_str(&format!("sqlite://{}", self.path))
            .expect("valid sqlite connection string")
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
    }
}

#[derive(Debug, Deserialize)]
pub struct ClaimSettings {
    pub default_expires_in_seconds: i64,
    pub min_expires_in_seconds: i64,
    pub max_expires_in_seconds: i64,
}

#[derive(Debug, Deserialize)]
pub struct IdempotencySettings {
    pub wait_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct WebhookSettings {
    pub request_timeout_ms: u64,
}

pub fn settings() -> &'static Settings {
    static SETTINGS: OnceCell<Settings> = OnceCell::new();

    SETTINGS.get_or_init(|| load_settings().expect("Failed to load settings"))
}

/// Loads settings from `config/base.{yaml,toml,json}`, an app_env-specific
/// override, and finally `BOARDLINE__*` environment variables, in that order
/// of increasing precedence. The config directory defaults to `./config`
/// relative to the process's working directory; set `APP_CONFIG_DIR` to
/// point at a different one (used by tests that run out of a tempdir).
fn load_settings() -> Result<Settings, config::ConfigError> {
    let config_dir = std::env::var("APP_CONFIG_DIR")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| {
            std::env::current_dir()
                .expect("the current directory to be available")
                .join("config")
        });

    let builder = config::Config::builder()
        .add_source(config::File::from(config_dir.join("base")).required(false))
        .add_source(config::File::from(config_dir.join(app_env().as_str())).required(false))
        .add_source(config::Environment::with_prefix("BOARDLINE").separator("__"))
        .set_default("application.host", "0.0.0.0")?
        .set_default("application.port", 8080)?
        .set_default("application.key_pepper", "development-only-pepper")?
        .set_default("application.cors.allowed_origins", vec!["*".to_string()])?
        .set_default("database.path", "boardline.sqlite3")?
        .set_default("claims.default_expires_in_seconds", 1800)?
        .set_default("claims.min_expires_in_seconds", 60)?
        .set_default("claims.max_expires_in_seconds", 86400)?
        .set_default("idempotency.wait_timeout_ms", 2000)?
        .set_default("idempotency.poll_interval_ms", 10)?
        .set_default("webhooks.request_timeout_ms", 5000)?;

    builder.build()?.try_deserialize()
}
