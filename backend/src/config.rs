//! Process configuration resolved once at startup.
//!
//! [`AppConfig`] is built in `main` (from the environment, or from a TOML
//! file named by `FORECAST_CONFIG`) and handed to the repository factory and
//! the router state. Nothing reads configuration from a global afterwards.

use std::env;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::db::config::{QuerySettings, WarehouseConfig};
use crate::db::factory::RepositoryType;
use crate::db::repo_config::RepositoryConfig;
use crate::db::repository::RepositoryError;

/// Configuration loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),
    #[error("{var} is invalid: {reason}")]
    Invalid { var: String, reason: String },
    #[error("Configuration file error: {0}")]
    File(String),
}

impl ConfigError {
    pub fn invalid(var: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            var: var.into(),
            reason: reason.into(),
        }
    }
}

impl From<ConfigError> for RepositoryError {
    fn from(err: ConfigError) -> Self {
        RepositoryError::configuration(err.to_string())
    }
}

/// Read a variable, treating blank values as unset.
pub(crate) fn env_opt(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a variable, falling back to `default` when unset.
pub(crate) fn env_parse<T>(var: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env_opt(var) {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(var, format!("'{}': {}", raw, e))),
        None => Ok(default),
    }
}

/// Parse a boolean variable (`true/false`, `1/0`, `yes/no`, `on/off`).
pub(crate) fn env_bool(var: &str, default: bool) -> Result<bool, ConfigError> {
    match env_opt(var) {
        Some(raw) => parse_bool(&raw)
            .ok_or_else(|| ConfigError::invalid(var, format!("'{}' is not a boolean", raw))),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// HTTP server and application metadata settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub app_name: String,
    pub app_version: String,
    pub debug: bool,
    pub host: String,
    pub port: u16,
    /// Path prefix of the versioned API, e.g. `/api/v1` (empty for none)
    pub api_prefix: String,
    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            app_name: "Retail Plan Visualizer Backend".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            debug: true,
            host: "0.0.0.0".to_string(),
            port: 8000,
            api_prefix: "/api/v1".to_string(),
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl ServerSettings {
    /// Load server settings from environment variables.
    ///
    /// # Environment Variables
    /// - `APP_NAME`, `APP_VERSION`
    /// - `DEBUG` (default: true)
    /// - `HOST` (default: 0.0.0.0), `PORT` (default: 8000)
    /// - `API_V1_PREFIX` (default: /api/v1)
    /// - `CORS_ORIGINS`: comma separated list (default: *)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let cors_origins = env_opt("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .unwrap_or(defaults.cors_origins);

        Ok(Self {
            app_name: env_opt("APP_NAME").unwrap_or(defaults.app_name),
            app_version: env_opt("APP_VERSION").unwrap_or(defaults.app_version),
            debug: Self::debug_from_env()?,
            host: env_opt("HOST").unwrap_or(defaults.host),
            port: env_parse("PORT", defaults.port)?,
            api_prefix: normalize_prefix(
                &env::var("API_V1_PREFIX").unwrap_or(defaults.api_prefix),
            ),
            cors_origins,
        })
    }

    /// The `DEBUG` flag alone, for choosing a log level before the rest of
    /// the configuration is loaded.
    pub fn debug_from_env() -> Result<bool, ConfigError> {
        env_bool("DEBUG", Self::default().debug)
    }

    /// `Development` when debug is on, otherwise `Production`.
    pub fn environment(&self) -> &'static str {
        if self.debug {
            "Development"
        } else {
            "Production"
        }
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

/// Ensure a leading slash and no trailing slash; `/` becomes empty.
pub fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// Immutable configuration snapshot for the process lifetime.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub repository_type: RepositoryType,
    /// Present when `repository_type` is the warehouse
    pub warehouse: Option<WarehouseConfig>,
    pub query: QuerySettings,
    /// JSON file seeding the local repository
    pub local_data_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load from `FORECAST_CONFIG` if set, then from a `forecast.toml` in
    /// a standard location, otherwise from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Some(path) = env_opt("FORECAST_CONFIG") {
            return Self::from_file(path);
        }
        match RepositoryConfig::default_location() {
            Some(path) => {
                log::info!("Using repository configuration from {}", path.display());
                Self::from_file(path)
            }
            None => Self::from_env(),
        }
    }

    /// Build the configuration from environment variables.
    ///
    /// Warehouse variables are only required when the repository type is
    /// `bigquery`. See [`ServerSettings::from_env`],
    /// [`WarehouseConfig::from_env`] and [`QuerySettings::with_env_overrides`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let repository_type = RepositoryType::from_env()?;
        let warehouse = match repository_type {
            RepositoryType::BigQuery => Some(WarehouseConfig::from_env()?),
            RepositoryType::Local => None,
        };

        Ok(Self {
            server: ServerSettings::from_env()?,
            repository_type,
            warehouse,
            query: QuerySettings::default().with_env_overrides()?,
            local_data_path: env_opt("LOCAL_DATA_PATH").map(PathBuf::from),
        })
    }

    /// Build the configuration from a TOML file; server settings still come
    /// from the environment.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let file = RepositoryConfig::from_file(path)?;
        let repository_type = file.repository_type()?;
        let warehouse = match repository_type {
            RepositoryType::BigQuery => Some(file.to_warehouse_config()?),
            RepositoryType::Local => None,
        };
        file.query.validate()?;

        Ok(Self {
            server: ServerSettings::from_env()?,
            repository_type,
            warehouse,
            query: file.query.clone(),
            local_data_path: file.repository.local_data_path.clone(),
        })
    }

    /// Configuration for an in-memory repository with default settings.
    pub fn local() -> Self {
        Self {
            server: ServerSettings::default(),
            repository_type: RepositoryType::Local,
            warehouse: None,
            query: QuerySettings::default(),
            local_data_path: None,
        }
    }
}
