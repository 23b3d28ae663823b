//! Tests for db::factory - repository creation from configuration.

mod support;

use std::io::Write;

use forecast_api::config::AppConfig;
use forecast_api::db::{
    CredentialMode, QuerySettings, RepositoryError, RepositoryFactory, RepositoryType,
    WarehouseConfig,
};
use forecast_api::models::FilterCriteria;

#[tokio::test]
async fn test_create_local_repository() {
    let repo = RepositoryFactory::create(&AppConfig::local()).unwrap();
    let total = repo.count_forecasts(&FilterCriteria::default()).await.unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn test_create_local_repository_from_seed_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let json = serde_json::to_string(&support::sample_records()).unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let mut config = AppConfig::local();
    config.local_data_path = Some(file.path().to_path_buf());

    let repo = RepositoryFactory::create(&config).unwrap();
    let total = repo.count_forecasts(&FilterCriteria::default()).await.unwrap();
    assert_eq!(total, support::sample_records().len() as i64);
}

#[test]
fn test_malformed_seed_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"{\"not\": \"an array\"}").unwrap();

    let mut config = AppConfig::local();
    config.local_data_path = Some(file.path().to_path_buf());

    let err = RepositoryFactory::create(&config).err().unwrap();
    assert!(matches!(err, RepositoryError::ConfigurationError { .. }));
}

#[test]
fn test_bigquery_requires_warehouse_config() {
    let mut config = AppConfig::local();
    config.repository_type = RepositoryType::BigQuery;
    let err = RepositoryFactory::create(&config).err().unwrap();
    assert!(err.to_string().contains("warehouse configuration"));
}

#[test]
fn test_create_bigquery_repository_with_static_token() {
    let warehouse = WarehouseConfig::new("retail-analytics", "forecasting", "weekly")
        .unwrap()
        .with_credentials(CredentialMode::AccessToken("ya29.test".to_string()));
    let mut config = AppConfig::local();
    config.repository_type = RepositoryType::BigQuery;
    config.warehouse = Some(warehouse.clone());

    assert!(RepositoryFactory::create(&config).is_ok());
    assert!(RepositoryFactory::create_bigquery(&warehouse, &QuerySettings::default()).is_ok());
}

#[test]
fn test_create_bigquery_with_unreadable_key_file() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let warehouse = WarehouseConfig::new("p", "d", "t")
        .unwrap()
        .with_credentials(CredentialMode::KeyFile(file.path().to_path_buf()));

    let err = RepositoryFactory::create_bigquery(&warehouse, &QuerySettings::default())
        .err()
        .unwrap();
    assert!(matches!(err, RepositoryError::ConfigurationError { .. }));
}

#[tokio::test]
async fn test_bundled_fixture_seeds_local_repository() {
    let mut config = AppConfig::local();
    config.local_data_path =
        Some(concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/forecasts.json").into());

    let repo = RepositoryFactory::create(&config).unwrap();
    let food = FilterCriteria {
        mh_segment: Some("FOOD".to_string()),
        ..Default::default()
    };
    assert_eq!(repo.count_forecasts(&FilterCriteria::default()).await.unwrap(), 6);
    assert_eq!(repo.count_forecasts(&food).await.unwrap(), 4);
}

#[test]
fn test_example_config_file_parses() {
    let file = forecast_api::db::RepositoryConfig::from_file(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/forecast.example.toml"
    ))
    .unwrap();
    assert_eq!(file.repository_type().unwrap(), RepositoryType::BigQuery);

    let warehouse = file.to_warehouse_config().unwrap();
    assert_eq!(warehouse.location.as_deref(), Some("EU"));
    assert_eq!(file.query.max_bytes_billed, 2_000_000_000);
}

#[test]
fn test_bigquery_rejects_unbounded_timeout() {
    let warehouse = WarehouseConfig::new("p", "d", "t")
        .unwrap()
        .with_credentials(CredentialMode::AccessToken("ya29.test".to_string()));
    let settings = QuerySettings {
        query_timeout_secs: u64::MAX,
        ..Default::default()
    };

    let err = RepositoryFactory::create_bigquery(&warehouse, &settings)
        .err()
        .unwrap();
    assert!(matches!(err, RepositoryError::ConfigurationError { .. }));
}
