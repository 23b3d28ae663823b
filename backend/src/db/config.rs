//! Warehouse configuration and environment variable handling.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use super::query::{TableRef, DEFAULT_MAX_DISTINCT_VALUES};
use crate::config::{env_bool, env_opt, env_parse, ConfigError};

/// Default REST endpoint of the warehouse.
pub const DEFAULT_API_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";
/// Upper bound for `query_timeout_secs` and `slow_query_threshold_secs`.
pub const MAX_QUERY_TIMEOUT_SECS: u64 = 6 * 60 * 60;

/// How the warehouse client obtains access tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialMode {
    /// Service-account or authorized-user JSON key file.
    KeyFile(PathBuf),
    /// Pre-issued bearer token.
    AccessToken(String),
    /// Ambient credential chain: the gcloud well-known file, then the
    /// compute metadata server.
    ApplicationDefault,
}

impl CredentialMode {
    /// Resolve the credential mode from the environment.
    ///
    /// A key file path that does not exist falls back to application default
    /// credentials.
    pub fn from_env() -> Self {
        if let Some(token) = env_opt("GOOGLE_OAUTH_ACCESS_TOKEN") {
            return CredentialMode::AccessToken(token);
        }
        Self::from_key_path(env_opt("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from))
    }

    pub fn from_key_path(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) if path.exists() => CredentialMode::KeyFile(path),
            Some(path) => {
                warn!(
                    "Credentials file {} not found, using application default credentials",
                    path.display()
                );
                CredentialMode::ApplicationDefault
            }
            None => CredentialMode::ApplicationDefault,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            CredentialMode::KeyFile(_) => "key file",
            CredentialMode::AccessToken(_) => "access token",
            CredentialMode::ApplicationDefault => "application default credentials",
        }
    }
}

/// Query execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySettings {
    /// Upper bound on bytes billed per query
    #[serde(default = "default_max_bytes_billed")]
    pub max_bytes_billed: u64,
    /// Allow the warehouse to answer from its own result cache
    #[serde(default = "default_true")]
    pub use_query_cache: bool,
    /// Cap on values returned by a distinct-values listing
    #[serde(default = "default_max_distinct_values")]
    pub max_distinct_values: i64,
    /// How long to wait for a query to complete
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    /// Queries slower than this are logged as warnings
    #[serde(default = "default_slow_query_threshold_secs")]
    pub slow_query_threshold_secs: f64,
}

fn default_max_bytes_billed() -> u64 {
    1_000_000_000
}

fn default_true() -> bool {
    true
}

fn default_max_distinct_values() -> i64 {
    DEFAULT_MAX_DISTINCT_VALUES
}

fn default_query_timeout_secs() -> u64 {
    30
}

fn default_slow_query_threshold_secs() -> f64 {
    5.0
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            max_bytes_billed: default_max_bytes_billed(),
            use_query_cache: true,
            max_distinct_values: default_max_distinct_values(),
            query_timeout_secs: default_query_timeout_secs(),
            slow_query_threshold_secs: default_slow_query_threshold_secs(),
        }
    }
}

impl QuerySettings {
    /// Apply environment overrides on top of `self`.
    ///
    /// # Environment Variables
    /// - `BQ_MAX_BYTES_BILLED`
    /// - `BQ_USE_QUERY_CACHE`
    /// - `BQ_MAX_DISTINCT_VALUES`
    /// - `BQ_QUERY_TIMEOUT_SECS`
    /// - `BQ_SLOW_QUERY_THRESHOLD_SECS`
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        let settings = Self {
            max_bytes_billed: env_parse("BQ_MAX_BYTES_BILLED", self.max_bytes_billed)?,
            use_query_cache: env_bool("BQ_USE_QUERY_CACHE", self.use_query_cache)?,
            max_distinct_values: env_parse("BQ_MAX_DISTINCT_VALUES", self.max_distinct_values)?,
            query_timeout_secs: env_parse("BQ_QUERY_TIMEOUT_SECS", self.query_timeout_secs)?,
            slow_query_threshold_secs: env_parse(
                "BQ_SLOW_QUERY_THRESHOLD_SECS",
                self.slow_query_threshold_secs,
            )?,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_distinct_values < 1 {
            return Err(ConfigError::invalid(
                "BQ_MAX_DISTINCT_VALUES",
                "must be at least 1",
            ));
        }
        if !(1..=MAX_QUERY_TIMEOUT_SECS).contains(&self.query_timeout_secs) {
            return Err(ConfigError::invalid(
                "BQ_QUERY_TIMEOUT_SECS",
                format!(
                    "must be between 1 and {}, got {}",
                    MAX_QUERY_TIMEOUT_SECS, self.query_timeout_secs
                ),
            ));
        }
        let threshold = self.slow_query_threshold_secs;
        if !threshold.is_finite() || !(0.0..=MAX_QUERY_TIMEOUT_SECS as f64).contains(&threshold) {
            return Err(ConfigError::invalid(
                "BQ_SLOW_QUERY_THRESHOLD_SECS",
                format!(
                    "must be a number between 0 and {}, got {}",
                    MAX_QUERY_TIMEOUT_SECS, threshold
                ),
            ));
        }
        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn slow_query_threshold(&self) -> Duration {
        Duration::try_from_secs_f64(self.slow_query_threshold_secs).unwrap_or(Duration::MAX)
    }
}

/// Location of the forecast table and how to authenticate against it.
#[derive(Debug, Clone, PartialEq)]
pub struct WarehouseConfig {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
    pub credentials: CredentialMode,
    /// Processing location (e.g. `EU`), if the dataset requires one
    pub location: Option<String>,
    pub api_base_url: String,
}

impl WarehouseConfig {
    /// Create a configuration with application default credentials.
    pub fn new(
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
            credentials: CredentialMode::ApplicationDefault,
            location: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_credentials(mut self, credentials: CredentialMode) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Create a new warehouse configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `GOOGLE_CLOUD_PROJECT_ID` (required)
    /// - `BIGQUERY_DATASET_ID` (required)
    /// - `BIGQUERY_TABLE_ID` (required)
    /// - `GOOGLE_APPLICATION_CREDENTIALS` (optional): key file path; when
    ///   unset or missing, application default credentials are used
    /// - `GOOGLE_OAUTH_ACCESS_TOKEN` (optional): bearer token, takes
    ///   precedence over any key file
    /// - `BIGQUERY_LOCATION` (optional)
    /// - `BIGQUERY_API_URL` (optional, default: public endpoint)
    ///
    /// # Errors
    /// Returns an error if a required variable is missing or an identifier
    /// contains characters outside its allowed set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let project_id = env_opt("GOOGLE_CLOUD_PROJECT_ID")
            .ok_or(ConfigError::Missing("GOOGLE_CLOUD_PROJECT_ID"))?;
        let dataset_id =
            env_opt("BIGQUERY_DATASET_ID").ok_or(ConfigError::Missing("BIGQUERY_DATASET_ID"))?;
        let table_id =
            env_opt("BIGQUERY_TABLE_ID").ok_or(ConfigError::Missing("BIGQUERY_TABLE_ID"))?;

        let mut config = Self::new(project_id, dataset_id, table_id)?
            .with_credentials(CredentialMode::from_env());
        if let Some(location) = env_opt("BIGQUERY_LOCATION") {
            config = config.with_location(location);
        }
        if let Some(url) = env_opt("BIGQUERY_API_URL") {
            config = config.with_api_base_url(url);
        }
        Ok(config)
    }

    /// Reject identifiers that could break out of the quoted table reference.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_identifier("GOOGLE_CLOUD_PROJECT_ID", &self.project_id, &['-', '.', ':'])?;
        check_identifier("BIGQUERY_DATASET_ID", &self.dataset_id, &[])?;
        check_identifier("BIGQUERY_TABLE_ID", &self.table_id, &['-'])?;
        Ok(())
    }

    pub fn table_ref(&self) -> TableRef {
        TableRef::new(&self.project_id, &self.dataset_id, &self.table_id)
    }

    /// Key file path, if one is configured.
    pub fn key_file(&self) -> Option<&Path> {
        match &self.credentials {
            CredentialMode::KeyFile(path) => Some(path),
            _ => None,
        }
    }
}

fn check_identifier(var: &'static str, value: &str, extra: &[char]) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::invalid(var, "must not be empty"));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || extra.contains(c)))
    {
        return Err(ConfigError::invalid(
            var,
            format!("contains unsupported character '{}'", bad),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_settings_bounds() {
        assert!(QuerySettings::default().validate().is_ok());

        let invalid = [
            QuerySettings {
                query_timeout_secs: 0,
                ..Default::default()
            },
            QuerySettings {
                query_timeout_secs: u64::MAX,
                ..Default::default()
            },
            QuerySettings {
                slow_query_threshold_secs: f64::INFINITY,
                ..Default::default()
            },
            QuerySettings {
                slow_query_threshold_secs: f64::NAN,
                ..Default::default()
            },
            QuerySettings {
                slow_query_threshold_secs: -1.0,
                ..Default::default()
            },
        ];
        for settings in invalid {
            assert!(settings.validate().is_err(), "{:?}", settings);
        }
    }

    #[test]
    fn test_slow_query_threshold_never_panics() {
        let settings = QuerySettings {
            slow_query_threshold_secs: f64::INFINITY,
            ..Default::default()
        };
        assert_eq!(settings.slow_query_threshold(), Duration::MAX);
    }

    #[test]
    fn test_new_validates_identifiers() {
        assert!(WarehouseConfig::new("my-project", "retail_ds", "forecast_v2").is_ok());
        assert!(WarehouseConfig::new("example.com:proj", "ds", "t").is_ok());
        assert!(WarehouseConfig::new("proj", "ds`; DROP", "t").is_err());
        assert!(WarehouseConfig::new("proj", "ds", "t`").is_err());
        assert!(WarehouseConfig::new("proj", "", "t").is_err());
    }

    #[test]
    fn test_table_ref_display() {
        let config = WarehouseConfig::new("p", "d", "t").unwrap();
        assert_eq!(config.table_ref().to_string(), "`p.d.t`");
    }

    #[test]
    fn test_missing_key_file_falls_back_to_adc() {
        let mode = CredentialMode::from_key_path(Some(PathBuf::from(
            "/definitely/not/here/key.json",
        )));
        assert_eq!(mode, CredentialMode::ApplicationDefault);
        assert_eq!(CredentialMode::from_key_path(None), CredentialMode::ApplicationDefault);
    }

    #[test]
    fn test_existing_key_file_is_used() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mode = CredentialMode::from_key_path(Some(file.path().to_path_buf()));
        assert_eq!(mode, CredentialMode::KeyFile(file.path().to_path_buf()));
    }

    #[test]
    fn test_api_base_url_trailing_slash_trimmed() {
        let config = WarehouseConfig::new("p", "d", "t")
            .unwrap()
            .with_api_base_url("http://localhost:9050/");
        assert_eq!(config.api_base_url, "http://localhost:9050");
    }

    #[test]
    fn test_query_settings_defaults() {
        let settings = QuerySettings::default();
        assert_eq!(settings.max_bytes_billed, 1_000_000_000);
        assert!(settings.use_query_cache);
        assert_eq!(settings.max_distinct_values, 1000);
        assert_eq!(settings.query_timeout(), Duration::from_secs(30));
        assert_eq!(settings.slow_query_threshold(), Duration::from_secs(5));
    }

    #[test]
    fn test_query_settings_validate() {
        let settings = QuerySettings {
            max_distinct_values: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
