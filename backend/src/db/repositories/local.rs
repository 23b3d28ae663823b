//! In-memory local repository implementation.
//!
//! This module provides a local implementation of [`ForecastRepository`]
//! suitable for unit testing and local development. Records live in a `Vec`
//! behind a lock and every query is answered with the same filtering,
//! ordering and aggregation rules the warehouse applies.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use parking_lot::RwLock;

use crate::db::query::DEFAULT_MAX_DISTINCT_VALUES;
use crate::db::repository::{
    ErrorContext, ForecastRepository, RepositoryError, RepositoryResult,
};
use crate::models::{
    ColumnValue, DistinctColumn, FilterCriteria, ForecastRecord, SummaryStatistics,
};

/// In-memory local repository.
///
/// # Example
/// ```ignore
/// use forecast_api::db::repositories::LocalRepository;
///
/// let repo = LocalRepository::with_records(sample_records());
/// let total = repo.count_forecasts(&FilterCriteria::default()).await?;
/// ```
#[derive(Clone, Debug)]
pub struct LocalRepository {
    records: Arc<RwLock<Vec<ForecastRecord>>>,
    is_healthy: Arc<RwLock<bool>>,
    queries_executed: Arc<AtomicUsize>,
    max_distinct_values: i64,
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Create a repository holding `records`.
    pub fn with_records(records: Vec<ForecastRecord>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
            is_healthy: Arc::new(RwLock::new(true)),
            queries_executed: Arc::new(AtomicUsize::new(0)),
            max_distinct_values: DEFAULT_MAX_DISTINCT_VALUES,
        }
    }

    /// Load records from a JSON array file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> RepositoryResult<Self> {
        let path = path.as_ref();
        let context = || {
            ErrorContext::new("load_seed_file")
                .with_entity("forecast")
                .with_details(path.display().to_string())
        };
        let content = fs::read_to_string(path).map_err(|e| {
            RepositoryError::configuration_with_context(
                format!("Failed to read seed file: {}", e),
                context(),
            )
        })?;
        let records: Vec<ForecastRecord> = serde_json::from_str(&content).map_err(|e| {
            RepositoryError::configuration_with_context(
                format!("Failed to parse seed file: {}", e),
                context(),
            )
        })?;
        info!(
            "Loaded {} forecast records from {}",
            records.len(),
            path.display()
        );
        Ok(Self::with_records(records))
    }

    pub fn with_max_distinct_values(mut self, max: i64) -> Self {
        self.max_distinct_values = max;
        self
    }

    /// Add a record to the repository.
    pub fn insert(&self, record: ForecastRecord) {
        self.records.write().push(record);
    }

    /// Add several records to the repository.
    pub fn extend(&self, records: impl IntoIterator<Item = ForecastRecord>) {
        self.records.write().extend(records);
    }

    /// Remove all records.
    pub fn clear(&self) {
        self.records.write().clear();
    }

    /// Number of stored records, ignoring any filter.
    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) {
        *self.is_healthy.write() = healthy;
    }

    /// Number of queries that reached the data (after validation).
    pub fn queries_executed(&self) -> usize {
        self.queries_executed.load(AtomicOrdering::SeqCst)
    }

    fn begin(&self, operation: &str) -> RepositoryResult<()> {
        if !*self.is_healthy.read() {
            return Err(RepositoryError::connection_with_context(
                "Local repository is marked unhealthy",
                ErrorContext::new(operation),
            ));
        }
        self.queries_executed.fetch_add(1, AtomicOrdering::SeqCst);
        debug!("local repository: {}", operation);
        Ok(())
    }

    fn matching(&self, criteria: &FilterCriteria) -> Vec<ForecastRecord> {
        let filters = criteria.equality_filters();
        self.records
            .read()
            .iter()
            .filter(|record| {
                filters
                    .iter()
                    .all(|(dim, value)| record.dimension_value(*dim).as_ref() == Some(value))
                    && criteria.week_in_range(record.forecast_week)
            })
            .cloned()
            .collect()
    }
}

fn check_date_range(criteria: &FilterCriteria, operation: &str) -> RepositoryResult<()> {
    criteria
        .check_date_range()
        .map_err(|e| RepositoryError::validation(e).with_operation(operation))
}

/// Newest forecasts first, ties broken by week, site, product and run.
fn fetch_order(a: &ForecastRecord, b: &ForecastRecord) -> Ordering {
    b.forecast_datetime
        .cmp(&a.forecast_datetime)
        .then_with(|| a.forecast_week.cmp(&b.forecast_week))
        .then_with(|| a.site_id.cmp(&b.site_id))
        .then_with(|| a.product_id.cmp(&b.product_id))
        .then_with(|| a.forecast_run_id.cmp(&b.forecast_run_id))
        .then_with(|| a.model_used.cmp(&b.model_used))
}

/// Mean of the non-null values, 0 when there are none.
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn summarize(records: &[ForecastRecord]) -> SummaryStatistics {
    let actual: Vec<f64> = records.iter().filter_map(|r| r.actual_qty).collect();
    let predicted: Vec<f64> = records.iter().filter_map(|r| r.predicted_qty).collect();
    let distinct = |f: fn(&ForecastRecord) -> ColumnValue| {
        records.iter().map(f).collect::<HashSet<_>>().len() as i64
    };

    SummaryStatistics {
        total_records: records.len() as i64,
        unique_sites: distinct(|r| ColumnValue::Int(r.site_id)),
        unique_brands: distinct(|r| ColumnValue::Int(r.brand)),
        unique_products: distinct(|r| ColumnValue::Text(r.product_id.clone())),
        unique_forecast_runs: distinct(|r| ColumnValue::Text(r.forecast_run_id.clone())),
        avg_actual_qty: mean(&actual),
        avg_predicted_qty: mean(&predicted),
        total_actual_qty: actual.iter().sum(),
        total_predicted_qty: predicted.iter().sum(),
        min_forecast_week: records.iter().map(|r| r.forecast_week).min(),
        max_forecast_week: records.iter().map(|r| r.forecast_week).max(),
    }
}

#[async_trait]
impl ForecastRepository for LocalRepository {
    async fn count_forecasts(&self, criteria: &FilterCriteria) -> RepositoryResult<i64> {
        check_date_range(criteria, "count_forecasts")?;
        self.begin("count_forecasts")?;
        Ok(self.matching(criteria).len() as i64)
    }

    async fn fetch_forecasts(
        &self,
        criteria: &FilterCriteria,
    ) -> RepositoryResult<Vec<ForecastRecord>> {
        criteria
            .check_pagination()
            .map_err(|e| RepositoryError::validation(e).with_operation("fetch_forecasts"))?;
        check_date_range(criteria, "fetch_forecasts")?;
        self.begin("fetch_forecasts")?;

        let mut rows = self.matching(criteria);
        rows.sort_by(fetch_order);
        Ok(rows
            .into_iter()
            .skip(criteria.offset as usize)
            .take(criteria.limit as usize)
            .collect())
    }

    async fn summarize_forecasts(
        &self,
        criteria: &FilterCriteria,
    ) -> RepositoryResult<SummaryStatistics> {
        check_date_range(criteria, "summarize_forecasts")?;
        self.begin("summarize_forecasts")?;
        Ok(summarize(&self.matching(criteria)))
    }

    async fn distinct_values(
        &self,
        column: DistinctColumn,
        criteria: &FilterCriteria,
    ) -> RepositoryResult<Vec<ColumnValue>> {
        check_date_range(criteria, "distinct_values")?;
        self.begin("distinct_values")?;

        let values: BTreeSet<ColumnValue> = self
            .matching(criteria)
            .iter()
            .filter_map(|record| record.dimension_value(column.dimension()))
            .collect();
        Ok(values
            .into_iter()
            .take(self.max_distinct_values.max(0) as usize)
            .collect())
    }
}
