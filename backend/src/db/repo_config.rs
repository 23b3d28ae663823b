//! Repository configuration file support.
//!
//! This module reads repository configuration from a TOML file as an
//! alternative to environment variables:
//!
//! ```toml
//! [repository]
//! type = "bigquery"
//!
//! [bigquery]
//! project_id = "retail-analytics"
//! dataset_id = "forecasting"
//! table_id = "weekly_forecasts"
//! credentials_path = "/secrets/bq-key.json"
//!
//! [query]
//! max_bytes_billed = 2000000000
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::config::{CredentialMode, QuerySettings, WarehouseConfig};
use super::factory::RepositoryType;
use crate::config::ConfigError;

/// Repository configuration from file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub repository: RepositorySettings,
    #[serde(default)]
    pub bigquery: BigQuerySettings,
    #[serde(default)]
    pub query: QuerySettings,
}

/// Repository type settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySettings {
    #[serde(rename = "type")]
    pub repo_type: String,
    /// JSON seed file for the local repository
    #[serde(default)]
    pub local_data_path: Option<PathBuf>,
}

/// Warehouse connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BigQuerySettings {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub dataset_id: String,
    #[serde(default)]
    pub table_id: String,
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub api_base_url: Option<String>,
}

impl RepositoryConfig {
    /// Load repository configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(RepositoryConfig)` if successful
    /// * `Err(ConfigError)` if file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::File(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse repository configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content)
            .map_err(|e| ConfigError::File(format!("Failed to parse config file: {}", e)))
    }

    /// Locate `forecast.toml` in the standard locations.
    ///
    /// Searches in:
    /// 1. Current directory
    /// 2. `backend/` directory
    /// 3. Parent directory
    pub fn default_location() -> Option<PathBuf> {
        [
            PathBuf::from("forecast.toml"),
            PathBuf::from("backend/forecast.toml"),
            PathBuf::from("../forecast.toml"),
        ]
        .into_iter()
        .find(|path| path.exists())
    }

    /// Get the repository type from configuration.
    pub fn repository_type(&self) -> Result<RepositoryType, ConfigError> {
        RepositoryType::from_str(&self.repository.repo_type)
            .map_err(|e| ConfigError::invalid("repository.type", e))
    }

    /// Convert the `[bigquery]` table into a validated [`WarehouseConfig`].
    pub fn to_warehouse_config(&self) -> Result<WarehouseConfig, ConfigError> {
        let bq = &self.bigquery;
        for (name, value) in [
            ("bigquery.project_id", &bq.project_id),
            ("bigquery.dataset_id", &bq.dataset_id),
            ("bigquery.table_id", &bq.table_id),
        ] {
            if value.is_empty() {
                return Err(ConfigError::invalid(
                    name,
                    "required for the bigquery repository",
                ));
            }
        }

        let mut config = WarehouseConfig::new(&bq.project_id, &bq.dataset_id, &bq.table_id)?
            .with_credentials(CredentialMode::from_key_path(bq.credentials_path.clone()));
        if let Some(location) = &bq.location {
            config = config.with_location(location);
        }
        if let Some(url) = &bq.api_base_url {
            config = config.with_api_base_url(url);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_local_config() {
        let toml = r#"
[repository]
type = "local"
local_data_path = "fixtures/forecasts.json"
"#;

        let config = RepositoryConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.repository_type().unwrap(), RepositoryType::Local);
        assert_eq!(
            config.repository.local_data_path,
            Some(PathBuf::from("fixtures/forecasts.json"))
        );
        assert_eq!(config.query, QuerySettings::default());
    }

    #[test]
    fn test_parse_bigquery_config() {
        let toml = r#"
[repository]
type = "bigquery"

[bigquery]
project_id = "retail-analytics"
dataset_id = "forecasting"
table_id = "weekly_forecasts"
location = "EU"

[query]
max_bytes_billed = 2000000000
use_query_cache = false
max_distinct_values = 500
"#;

        let config = RepositoryConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.repository_type().unwrap(), RepositoryType::BigQuery);
        assert_eq!(config.query.max_bytes_billed, 2_000_000_000);
        assert!(!config.query.use_query_cache);
        assert_eq!(config.query.max_distinct_values, 500);
        assert_eq!(config.query.query_timeout_secs, 30);

        let warehouse = config.to_warehouse_config().unwrap();
        assert_eq!(
            warehouse.table_ref().to_string(),
            "`retail-analytics.forecasting.weekly_forecasts`"
        );
        assert_eq!(warehouse.location.as_deref(), Some("EU"));
        assert_eq!(warehouse.credentials, CredentialMode::ApplicationDefault);
    }

    #[test]
    fn test_bigquery_requires_table_identifiers() {
        let toml = r#"
[repository]
type = "bigquery"

[bigquery]
project_id = "p"
"#;

        let config = RepositoryConfig::from_toml_str(toml).unwrap();
        let err = config.to_warehouse_config().unwrap_err();
        assert!(err.to_string().contains("bigquery.dataset_id"));
    }

    #[test]
    fn test_unknown_repository_type() {
        let toml = r#"
[repository]
type = "oracle"
"#;
        let config = RepositoryConfig::from_toml_str(toml).unwrap();
        assert!(config.repository_type().is_err());
    }

    #[test]
    fn test_from_file_missing() {
        let err = RepositoryConfig::from_file("/no/such/forecast.toml").unwrap_err();
        assert!(matches!(err, ConfigError::File(_)));
    }
}
