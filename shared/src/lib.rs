pub mod dialog;
pub mod export;
pub mod filter;
pub mod identity;
pub mod live;
pub mod map;
pub mod models;
pub mod status;
pub mod store;
pub mod timestamps;

use crate::error::{ConfigError, InitializationError};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

pub const ENV_VAR_PREFIX: &str = "LINE_CLEARANCE__";
pub const SETTINGS_FILE: &str = "Settings.toml";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub postgres: PostgresConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub identity: Option<IdentityConfig>,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IdentityConfig {
    pub api_key: String,
    /// Overrides the identity REST endpoint, e.g. to point at a local emulator.
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionsConfig {
    /// Humantime duration, e.g. `8h` or `30m`.
    #[serde(default = "default_inactivity")]
    pub inactivity: String,
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

fn default_inactivity() -> String {
    "8h".to_string()
}

const fn default_secure_cookies() -> bool {
    true
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            inactivity: default_inactivity(),
            secure_cookies: default_secure_cookies(),
        }
    }
}

impl SessionsConfig {
    pub fn inactivity_duration(&self) -> Result<Duration, ConfigError> {
        humantime::parse_duration(&self.inactivity).map_err(|source| ConfigError::Duration {
            key: "sessions.inactivity",
            source,
        })
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

pub fn load_config() -> Result<Config, ConfigError> {
    extract_config(
        Figment::new()
            .merge(Toml::file(SETTINGS_FILE))
            .merge(Env::prefixed(ENV_VAR_PREFIX).split("__")),
    )
}

fn extract_config(figment: Figment) -> Result<Config, ConfigError> {
    Ok(figment.extract::<Config>()?)
}

pub mod error {
    use thiserror::Error;
    use tracing::dispatcher::SetGlobalDefaultError;

    #[derive(Debug, Error)]
    pub enum ConfigError {
        #[error("failed to load configuration: {0}")]
        Figment(#[from] figment::Error),
        #[error("invalid duration for {key}: {source}")]
        Duration {
            key: &'static str,
            #[source]
            source: humantime::DurationError,
        },
    }

    #[derive(Debug, Error)]
    pub enum InitializationError {
        #[error(transparent)]
        Tracing(#[from] SetGlobalDefaultError),
        #[error(transparent)]
        Config(#[from] ConfigError),
        #[error(transparent)]
        Migration(#[from] sqlx::migrate::MigrateError),
        #[error(transparent)]
        Db(#[from] sqlx::Error),
    }
}

#[instrument(skip_all)]
pub async fn initialize_db(
    pg_config: &PostgresConfig,
    migrate: bool,
) -> Result<Pool<Postgres>, InitializationError> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&pg_config.connection_string)
        .await?;

    info!(name: "db.connected", "db pool created and connected");

    if migrate {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(name: "db.migrated", "db migrations applied");
    }

    Ok(pool)
}

pub fn init_tracing(logging: &LoggingConfig) -> Result<(), InitializationError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match logging.format {
        LogFormat::Compact => {
            let subscriber = tracing_subscriber::fmt()
                .compact()
                .with_env_filter(env_filter)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Json => {
            let subscriber = tracing_subscriber::fmt()
                .json()
                .with_env_filter(env_filter)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    Ok(())
}

pub async fn shutdown_listener(token: Option<CancellationToken>) {
    let ctrl_c = signal::ctrl_c();
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = ?e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(name: "signal.ctrlc.received", "received Ctrl+C signal, shutting down"),
        () = terminate => info!(name: "signal.sigterm.received", "received SIGTERM signal, shutting down"),
    }

    if let Some(token) = token {
        token.cancel();
    }
}
