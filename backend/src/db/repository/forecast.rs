//! Forecast repository trait for read-only queries over the forecast table.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{ColumnValue, DistinctColumn, FilterCriteria, ForecastRecord, SummaryStatistics};

/// Repository trait for forecast queries.
///
/// Every operation takes the same [`FilterCriteria`]; implementations apply
/// the equality filters and date range identically across all four shapes,
/// so a count, a page and a summary for the same criteria always describe
/// the same set of rows.
///
/// Implementations must re-check criteria ranges (pagination, date order)
/// and return [`RepositoryError::ValidationError`](super::RepositoryError)
/// rather than trusting the caller.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait ForecastRepository: Send + Sync {
    /// Count rows matching the criteria (pagination is ignored).
    ///
    /// # Arguments
    /// * `criteria` - Filters to apply
    ///
    /// # Returns
    /// * `Ok(i64)` - Number of matching rows
    /// * `Err(RepositoryError)` - If the query fails
    async fn count_forecasts(&self, criteria: &FilterCriteria) -> RepositoryResult<i64>;

    /// Fetch one page of matching rows.
    ///
    /// Rows are ordered by `forecast_datetime` descending, then
    /// `forecast_week`, `site_id`, `product_id`, `forecast_run_id` and
    /// `model_used` ascending, before `offset`/`limit` are applied.
    ///
    /// # Arguments
    /// * `criteria` - Filters plus `limit`/`offset`
    ///
    /// # Returns
    /// * `Ok(Vec<ForecastRecord>)` - At most `limit` rows
    /// * `Err(RepositoryError)` - If the query or row mapping fails
    async fn fetch_forecasts(
        &self,
        criteria: &FilterCriteria,
    ) -> RepositoryResult<Vec<ForecastRecord>>;

    /// Compute summary statistics over matching rows.
    ///
    /// An empty match yields zeroed aggregates, not an error.
    async fn summarize_forecasts(
        &self,
        criteria: &FilterCriteria,
    ) -> RepositoryResult<SummaryStatistics>;

    /// List distinct non-null values of an allow-listed column among
    /// matching rows, sorted ascending.
    async fn distinct_values(
        &self,
        column: DistinctColumn,
        criteria: &FilterCriteria,
    ) -> RepositoryResult<Vec<ColumnValue>>;
}
