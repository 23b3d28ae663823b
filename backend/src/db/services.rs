//! Service layer over [`ForecastRepository`].
//!
//! These functions are what the HTTP handlers call. They combine repository
//! calls into the response shapes (a page plus its total, a distinct-value
//! listing) and work with any repository implementation.

use log::debug;

use super::repository::{ForecastRepository, RepositoryResult};
use crate::models::{
    DistinctColumn, DistinctValueSet, FilterCriteria, ForecastPage, SummaryStatistics,
};

/// Fetch one page of forecasts together with the total match count.
///
/// The count and the page run concurrently over the same criteria.
pub async fn list_forecasts(
    repo: &dyn ForecastRepository,
    criteria: &FilterCriteria,
) -> RepositoryResult<ForecastPage> {
    let (total, rows) = tokio::try_join!(
        repo.count_forecasts(criteria),
        repo.fetch_forecasts(criteria)
    )?;
    debug!(
        "Fetched {} of {} forecasts (offset {})",
        rows.len(),
        total,
        criteria.offset
    );
    Ok(ForecastPage::new(rows, total, criteria))
}

/// Summary statistics over the matching forecasts.
pub async fn summarize_forecasts(
    repo: &dyn ForecastRepository,
    criteria: &FilterCriteria,
) -> RepositoryResult<SummaryStatistics> {
    repo.summarize_forecasts(criteria).await
}

/// Distinct values of `column` among the matching forecasts.
pub async fn unique_values(
    repo: &dyn ForecastRepository,
    column: DistinctColumn,
    criteria: &FilterCriteria,
) -> RepositoryResult<DistinctValueSet> {
    let values = repo.distinct_values(column, criteria).await?;
    Ok(DistinctValueSet::new(column, values))
}

/// Probe the data source with an unfiltered count.
///
/// # Returns
/// * `Ok(i64)` - Total number of records available
/// * `Err(RepositoryError)` - If the data source cannot be queried
pub async fn health_check(repo: &dyn ForecastRepository) -> RepositoryResult<i64> {
    repo.count_forecasts(&FilterCriteria::default())
        .await
        .map_err(|e| e.with_operation("health_check"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::LocalRepository;
    use crate::db::repository::RepositoryError;
    use crate::models::{ColumnValue, ForecastRecord};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn record(site_id: i64, brand: i64) -> ForecastRecord {
        ForecastRecord {
            forecast_datetime: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            forecast_run_id: "run-7".to_string(),
            site_id,
            brand,
            mh_segment: "NONFOOD".to_string(),
            mh_family: "HOME".to_string(),
            mh_class: "KITCHEN".to_string(),
            mh_brick: "PANS".to_string(),
            product_id: format!("P{}", site_id),
            forecast_week: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            actual_qty: None,
            predicted_qty: Some(3.0),
            model_used: "lgbm".to_string(),
            qty_group: None,
            forecast_week_number: None,
            training_data_max_date: None,
            forecast_horizon: None,
        }
    }

    #[tokio::test]
    async fn test_list_forecasts_builds_page() {
        let repo = LocalRepository::with_records((1..=5).map(|i| record(i, 1)).collect());
        let criteria = FilterCriteria {
            limit: 2,
            offset: 2,
            ..Default::default()
        };
        let page = list_forecasts(&repo, &criteria).await.unwrap();
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.total_records, 5);
        assert_eq!(page.page, 2);
        assert!(page.has_next);
    }

    #[tokio::test]
    async fn test_unique_values_envelope() {
        let repo = LocalRepository::with_records(vec![record(1, 9), record(2, 3), record(3, 9)]);
        let column: DistinctColumn = "brand".parse().unwrap();
        let set = unique_values(&repo, column, &FilterCriteria::default())
            .await
            .unwrap();
        assert_eq!(set.column_name, "brand");
        assert_eq!(set.count, 2);
        assert_eq!(set.unique_values, vec![ColumnValue::Int(3), ColumnValue::Int(9)]);
    }

    #[tokio::test]
    async fn test_health_check_reports_failure() {
        let repo = LocalRepository::new();
        assert_eq!(health_check(&repo).await.unwrap(), 0);
        repo.set_healthy(false);
        let err = health_check(&repo).await.unwrap_err();
        assert!(matches!(err, RepositoryError::ConnectionError { .. }));
        assert_eq!(err.context().operation.as_deref(), Some("health_check"));
    }
}
