//! Warehouse-backed [`ForecastRepository`].
//!
//! Each repository call compiles its criteria with the
//! [`ForecastQueryBuilder`], runs the statement through [`BigQueryClient`]
//! and maps the rows. Criteria that fail validation never reach the client.

pub mod auth;
pub mod client;
pub mod rows;

use async_trait::async_trait;

pub use auth::{AccessTokenProvider, CredentialsFile};
pub use client::BigQueryClient;
pub use rows::ResultSet;

use crate::db::config::{QuerySettings, WarehouseConfig};
use crate::db::query::ForecastQueryBuilder;
use crate::db::repository::{ForecastRepository, RepositoryResult};
use crate::models::{
    ColumnValue, DistinctColumn, FilterCriteria, ForecastRecord, SummaryStatistics,
};

#[derive(Debug, Clone)]
pub struct BigQueryRepository {
    client: BigQueryClient,
    builder: ForecastQueryBuilder,
}

impl BigQueryRepository {
    /// Create a repository for the configured table.
    pub fn new(config: WarehouseConfig, settings: QuerySettings) -> RepositoryResult<Self> {
        let builder = ForecastQueryBuilder::new(config.table_ref())
            .with_max_distinct_values(settings.max_distinct_values);
        let client = BigQueryClient::new(config, settings)?;
        Ok(Self { client, builder })
    }

    /// Create a repository around an existing client.
    pub fn with_client(client: BigQueryClient, max_distinct_values: i64) -> Self {
        let builder = ForecastQueryBuilder::new(client.config().table_ref())
            .with_max_distinct_values(max_distinct_values);
        Self { client, builder }
    }
}

#[async_trait]
impl ForecastRepository for BigQueryRepository {
    async fn count_forecasts(&self, criteria: &FilterCriteria) -> RepositoryResult<i64> {
        let query = self.builder.count(criteria)?;
        let set = self.client.query(&query, "count_forecasts").await?;
        rows::total_count(&set)
    }

    async fn fetch_forecasts(
        &self,
        criteria: &FilterCriteria,
    ) -> RepositoryResult<Vec<ForecastRecord>> {
        let query = self.builder.fetch(criteria)?;
        let set = self.client.query(&query, "fetch_forecasts").await?;
        rows::forecast_records(&set)
    }

    async fn summarize_forecasts(
        &self,
        criteria: &FilterCriteria,
    ) -> RepositoryResult<SummaryStatistics> {
        let query = self.builder.summary(criteria)?;
        let set = self.client.query(&query, "summarize_forecasts").await?;
        rows::summary_statistics(&set)
    }

    async fn distinct_values(
        &self,
        column: DistinctColumn,
        criteria: &FilterCriteria,
    ) -> RepositoryResult<Vec<ColumnValue>> {
        let query = self.builder.distinct(column.as_str(), criteria)?;
        let set = self.client.query(&query, "distinct_values").await?;
        rows::distinct_values(&set, column)
    }
}
