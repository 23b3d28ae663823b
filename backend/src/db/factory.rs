//! Repository factory for dependency injection.
//!
//! This module creates repository instances from the resolved
//! [`AppConfig`](crate::config::AppConfig).

use std::str::FromStr;
use std::sync::Arc;

use log::info;

#[cfg(feature = "bigquery-repo")]
use super::config::{QuerySettings, WarehouseConfig};
#[cfg(feature = "bigquery-repo")]
use super::repositories::BigQueryRepository;
use super::repositories::LocalRepository;
use super::repository::{ForecastRepository, RepositoryError, RepositoryResult};
use crate::config::{env_opt, AppConfig, ConfigError};

/// Repository type configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryType {
    /// Warehouse-backed implementation
    BigQuery,
    /// In-memory local repository
    Local,
}

impl FromStr for RepositoryType {
    type Err = String;

    /// Parse repository type from string ("bigquery", "bq", "local").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bigquery" | "bq" => Ok(Self::BigQuery),
            "local" | "memory" => Ok(Self::Local),
            _ => Err(format!("Unknown repository type: {}", s)),
        }
    }
}

impl RepositoryType {
    /// Get repository type from environment variable.
    ///
    /// Reads `REPOSITORY_TYPE`. When unset, defaults to BigQuery if
    /// `GOOGLE_CLOUD_PROJECT_ID` is present, otherwise Local. An
    /// unrecognised value is an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Some(val) = env_opt("REPOSITORY_TYPE") {
            return val
                .parse()
                .map_err(|e| ConfigError::invalid("REPOSITORY_TYPE", e));
        }

        if env_opt("GOOGLE_CLOUD_PROJECT_ID").is_some() {
            Ok(Self::BigQuery)
        } else {
            Ok(Self::Local)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BigQuery => "bigquery",
            Self::Local => "local",
        }
    }
}

/// Repository factory for creating repository instances.
///
/// # Example
/// ```ignore
/// use forecast_api::config::AppConfig;
/// use forecast_api::db::RepositoryFactory;
///
/// let config = AppConfig::load()?;
/// let repo = RepositoryFactory::create(&config)?;
/// ```
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Create the repository selected by `config.repository_type`.
    ///
    /// # Returns
    /// * `Ok(Arc<dyn ForecastRepository>)` - Shared repository instance
    /// * `Err(RepositoryError)` - If configuration is incomplete or the
    ///   seed file cannot be loaded
    pub fn create(config: &AppConfig) -> RepositoryResult<Arc<dyn ForecastRepository>> {
        info!("Creating {} repository", config.repository_type.as_str());
        match config.repository_type {
            RepositoryType::BigQuery => {
                #[cfg(feature = "bigquery-repo")]
                {
                    let warehouse = config.warehouse.as_ref().ok_or_else(|| {
                        RepositoryError::configuration(
                            "BigQuery repository requires warehouse configuration",
                        )
                    })?;
                    let bq = Self::create_bigquery(warehouse, &config.query)?;
                    Ok(bq as Arc<dyn ForecastRepository>)
                }
                #[cfg(not(feature = "bigquery-repo"))]
                {
                    Err(RepositoryError::configuration(
                        "BigQuery repository feature not enabled",
                    ))
                }
            }
            RepositoryType::Local => {
                let local = Self::create_local(config)?;
                Ok(local as Arc<dyn ForecastRepository>)
            }
        }
    }

    /// Create a warehouse-backed repository.
    #[cfg(feature = "bigquery-repo")]
    pub fn create_bigquery(
        warehouse: &WarehouseConfig,
        query: &QuerySettings,
    ) -> RepositoryResult<Arc<BigQueryRepository>> {
        let repo = BigQueryRepository::new(warehouse.clone(), query.clone())?;
        Ok(Arc::new(repo))
    }

    /// Create an in-memory local repository, seeded from
    /// `config.local_data_path` when set.
    pub fn create_local(config: &AppConfig) -> RepositoryResult<Arc<LocalRepository>> {
        let repo = match &config.local_data_path {
            Some(path) => LocalRepository::from_json_file(path)?,
            None => LocalRepository::new(),
        }
        .with_max_distinct_values(config.query.max_distinct_values);
        Ok(Arc::new(repo))
    }
}
