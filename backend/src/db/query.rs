//! Translation of [`FilterCriteria`] into parameterized warehouse SQL.
//!
//! Four query shapes share one predicate builder: a page fetch, a row count,
//! a summary aggregate and a distinct-value listing. Filter values are always
//! bound as named parameters (`@site_id`, `@start_date`, ...); the only text
//! ever interpolated is the table reference (validated at configuration
//! time) and allow-listed column names.

use std::fmt;

use chrono::NaiveDate;

use crate::models::{
    ColumnValue, DistinctColumn, FilterCriteria, UnsupportedColumn, FORECAST_COLUMNS,
};

/// Ordering applied before pagination. The trailing keys make the order
/// total for rows sharing a generation timestamp and week; a run may emit
/// one row per model for the same site, product and week.
pub const FETCH_ORDER_BY: &str = "forecast_datetime DESC, forecast_week ASC, site_id ASC, \
     product_id ASC, forecast_run_id ASC, model_used ASC";

/// Default cap on distinct values returned for one column.
pub const DEFAULT_MAX_DISTINCT_VALUES: i64 = 1000;

/// Error produced while translating criteria into a query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryBuildError {
    #[error("{0}")]
    InvalidColumn(String),
    #[error("{0}")]
    InvalidRange(String),
}

impl From<UnsupportedColumn> for QueryBuildError {
    fn from(err: UnsupportedColumn) -> Self {
        QueryBuildError::InvalidColumn(err.to_string())
    }
}

impl From<QueryBuildError> for crate::db::repository::RepositoryError {
    fn from(err: QueryBuildError) -> Self {
        match err {
            QueryBuildError::InvalidColumn(msg) => Self::invalid_column(msg),
            QueryBuildError::InvalidRange(msg) => Self::validation(msg),
        }
    }
}

/// Fully-qualified `project.dataset.table` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl TableRef {
    pub fn new(
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}.{}.{}`",
            self.project_id, self.dataset_id, self.table_id
        )
    }
}

/// Typed value of a bound query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int64(i64),
    String(String),
    Date(NaiveDate),
}

impl ParamValue {
    /// Warehouse type name for the parameter declaration.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Int64(_) => "INT64",
            ParamValue::String(_) => "STRING",
            ParamValue::Date(_) => "DATE",
        }
    }

    /// Wire representation of the value.
    pub fn to_wire(&self) -> String {
        match self {
            ParamValue::Int64(v) => v.to_string(),
            ParamValue::String(v) => v.clone(),
            ParamValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

impl From<ColumnValue> for ParamValue {
    fn from(value: ColumnValue) -> Self {
        match value {
            ColumnValue::Int(v) => ParamValue::Int64(v),
            ColumnValue::Text(v) => ParamValue::String(v),
        }
    }
}

/// Named parameter bound to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParameter {
    pub name: &'static str,
    pub value: ParamValue,
}

/// Query text plus its ordered parameter list.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<QueryParameter>,
}

impl CompiledQuery {
    /// Look up a bound parameter by name.
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }
}

/// Builds the four forecast query shapes against one table.
#[derive(Debug, Clone)]
pub struct ForecastQueryBuilder {
    table: TableRef,
    max_distinct_values: i64,
}

impl ForecastQueryBuilder {
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            max_distinct_values: DEFAULT_MAX_DISTINCT_VALUES,
        }
    }

    pub fn with_max_distinct_values(mut self, max: i64) -> Self {
        self.max_distinct_values = max.max(1);
        self
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Paginated row fetch with deterministic ordering.
    pub fn fetch(&self, criteria: &FilterCriteria) -> Result<CompiledQuery, QueryBuildError> {
        criteria
            .check_pagination()
            .map_err(QueryBuildError::InvalidRange)?;

        let mut params = Vec::new();
        let where_clause = where_clause(criteria, &mut params)?;
        params.push(QueryParameter {
            name: "limit",
            value: ParamValue::Int64(criteria.limit),
        });
        params.push(QueryParameter {
            name: "offset",
            value: ParamValue::Int64(criteria.offset),
        });

        let sql = format!(
            r#"SELECT
    {columns}
FROM {table}{where_clause}
ORDER BY {order_by}
LIMIT @limit OFFSET @offset"#,
            columns = FORECAST_COLUMNS.join(",\n    "),
            table = self.table,
            where_clause = where_clause,
            order_by = FETCH_ORDER_BY,
        );

        Ok(CompiledQuery { sql, params })
    }

    /// `COUNT(*)` over the same predicate as [`fetch`](Self::fetch).
    pub fn count(&self, criteria: &FilterCriteria) -> Result<CompiledQuery, QueryBuildError> {
        let mut params = Vec::new();
        let where_clause = where_clause(criteria, &mut params)?;
        let sql = format!(
            "SELECT COUNT(*) AS total_count\nFROM {}{}",
            self.table, where_clause
        );
        Ok(CompiledQuery { sql, params })
    }

    /// Single-row aggregate for summary statistics.
    pub fn summary(&self, criteria: &FilterCriteria) -> Result<CompiledQuery, QueryBuildError> {
        let mut params = Vec::new();
        let where_clause = where_clause(criteria, &mut params)?;
        let sql = format!(
            r#"SELECT
    COUNT(*) AS total_records,
    COUNT(DISTINCT site_id) AS unique_sites,
    COUNT(DISTINCT brand) AS unique_brands,
    COUNT(DISTINCT product_id) AS unique_products,
    COUNT(DISTINCT forecast_run_id) AS unique_forecast_runs,
    AVG(actual_qty) AS avg_actual_qty,
    AVG(predicted_qty) AS avg_predicted_qty,
    SUM(actual_qty) AS total_actual_qty,
    SUM(predicted_qty) AS total_predicted_qty,
    MIN(forecast_week) AS min_forecast_week,
    MAX(forecast_week) AS max_forecast_week
FROM {}{}"#,
            self.table, where_clause
        );
        Ok(CompiledQuery { sql, params })
    }

    /// Distinct non-null values of one column among matching rows.
    ///
    /// The column name is checked against the allow-list here even when the
    /// caller already did so, since it is the one piece of caller input that
    /// ends up in the query text.
    pub fn distinct(
        &self,
        column: &str,
        criteria: &FilterCriteria,
    ) -> Result<CompiledQuery, QueryBuildError> {
        let column: DistinctColumn = column.parse()?;
        let column = column.as_str();

        let mut params = Vec::new();
        let where_clause = where_clause(criteria, &mut params)?;
        let null_check = format!("{} IS NOT NULL", column);
        let where_clause = if where_clause.is_empty() {
            format!("\nWHERE {}", null_check)
        } else {
            format!("{} AND {}", where_clause, null_check)
        };
        params.push(QueryParameter {
            name: "max_values",
            value: ParamValue::Int64(self.max_distinct_values),
        });

        let sql = format!(
            "SELECT DISTINCT {column}\nFROM {table}{where_clause}\n\
             ORDER BY {column}\nLIMIT @max_values",
            column = column,
            table = self.table,
            where_clause = where_clause,
        );
        Ok(CompiledQuery { sql, params })
    }
}

/// Build the `WHERE` clause (with leading newline) and push its parameters.
///
/// Returns an empty string when no filter is active.
fn where_clause(
    criteria: &FilterCriteria,
    params: &mut Vec<QueryParameter>,
) -> Result<String, QueryBuildError> {
    criteria
        .check_date_range()
        .map_err(QueryBuildError::InvalidRange)?;

    let mut conditions = Vec::new();

    for (dimension, value) in criteria.equality_filters() {
        let name = dimension.as_str();
        conditions.push(format!("{} = @{}", name, name));
        params.push(QueryParameter {
            name,
            value: value.into(),
        });
    }

    match (criteria.start_date, criteria.end_date) {
        (Some(start), Some(end)) => {
            conditions.push("forecast_week BETWEEN @start_date AND @end_date".to_string());
            params.push(QueryParameter {
                name: "start_date",
                value: ParamValue::Date(start),
            });
            params.push(QueryParameter {
                name: "end_date",
                value: ParamValue::Date(end),
            });
        }
        (Some(start), None) => {
            conditions.push("forecast_week >= @start_date".to_string());
            params.push(QueryParameter {
                name: "start_date",
                value: ParamValue::Date(start),
            });
        }
        (None, Some(end)) => {
            conditions.push("forecast_week <= @end_date".to_string());
            params.push(QueryParameter {
                name: "end_date",
                value: ParamValue::Date(end),
            });
        }
        (None, None) => {}
    }

    if conditions.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!("\nWHERE {}", conditions.join(" AND ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> ForecastQueryBuilder {
        ForecastQueryBuilder::new(TableRef::new("proj", "retail", "forecasts"))
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_fetch_without_filters() {
        let query = builder().fetch(&FilterCriteria::default()).unwrap();
        assert!(query.sql.contains("FROM `proj.retail.forecasts`"));
        assert!(!query.sql.contains("WHERE"));
        assert!(query.sql.contains(&format!("ORDER BY {}", FETCH_ORDER_BY)));
        assert!(query.sql.contains("forecast_run_id ASC, model_used ASC\nLIMIT"));
        assert!(query.sql.ends_with("LIMIT @limit OFFSET @offset"));
        assert_eq!(query.params.len(), 2);
        assert_eq!(query.param("limit"), Some(&ParamValue::Int64(100)));
        assert_eq!(query.param("offset"), Some(&ParamValue::Int64(0)));
    }

    #[test]
    fn test_fetch_selects_every_record_column() {
        let query = builder().fetch(&FilterCriteria::default()).unwrap();
        for column in FORECAST_COLUMNS {
            assert!(query.sql.contains(column), "missing column {}", column);
        }
    }

    #[test]
    fn test_each_filter_adds_one_bound_predicate() {
        let criteria = FilterCriteria {
            site_id: Some(8013),
            brand: Some(12),
            mh_segment: Some("FOOD".into()),
            mh_family: Some("DAIRY".into()),
            mh_class: Some("MILK".into()),
            mh_brick: Some("UHT".into()),
            product_id: Some("P-1".into()),
            forecast_run_id: Some("run-9".into()),
            model_used: Some("prophet".into()),
            ..Default::default()
        };
        let query = builder().count(&criteria).unwrap();
        assert_eq!(query.sql.matches(" AND ").count(), 8);
        assert_eq!(query.params.len(), 9);
        assert!(query.sql.contains("site_id = @site_id"));
        assert!(query.sql.contains("model_used = @model_used"));
        assert_eq!(query.param("site_id"), Some(&ParamValue::Int64(8013)));
        assert_eq!(
            query.param("mh_brick"),
            Some(&ParamValue::String("UHT".into()))
        );
    }

    #[test]
    fn test_values_are_never_interpolated() {
        let criteria = FilterCriteria {
            mh_segment: Some("x' OR '1'='1".into()),
            ..Default::default()
        };
        let query = builder().fetch(&criteria).unwrap();
        assert!(!query.sql.contains("OR '1'='1"));
        assert!(query.sql.contains("mh_segment = @mh_segment"));
    }

    #[test]
    fn test_date_range_shapes() {
        let start_only = FilterCriteria {
            start_date: Some(date("2024-01-01")),
            ..Default::default()
        };
        let q = builder().count(&start_only).unwrap();
        assert!(q.sql.contains("forecast_week >= @start_date"));
        assert_eq!(q.param("start_date"), Some(&ParamValue::Date(date("2024-01-01"))));

        let end_only = FilterCriteria {
            end_date: Some(date("2024-01-31")),
            ..Default::default()
        };
        let q = builder().count(&end_only).unwrap();
        assert!(q.sql.contains("forecast_week <= @end_date"));
        assert!(q.param("start_date").is_none());

        let both = FilterCriteria {
            start_date: Some(date("2024-01-01")),
            end_date: Some(date("2024-01-31")),
            ..Default::default()
        };
        let q = builder().count(&both).unwrap();
        assert!(q.sql.contains("forecast_week BETWEEN @start_date AND @end_date"));
        assert_eq!(q.params.len(), 2);
    }

    #[test]
    fn test_inverted_date_range_is_rejected() {
        let criteria = FilterCriteria {
            start_date: Some(date("2024-02-01")),
            end_date: Some(date("2024-01-01")),
            ..Default::default()
        };
        assert!(matches!(
            builder().summary(&criteria),
            Err(QueryBuildError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_fetch_revalidates_pagination() {
        for (limit, offset) in [(0, 0), (1001, 0), (10, -1)] {
            let criteria = FilterCriteria {
                limit,
                offset,
                ..Default::default()
            };
            assert!(
                matches!(builder().fetch(&criteria), Err(QueryBuildError::InvalidRange(_))),
                "limit={} offset={}",
                limit,
                offset
            );
        }
    }

    #[test]
    fn test_count_and_summary_ignore_pagination() {
        let criteria = FilterCriteria {
            limit: 0,
            offset: -3,
            ..Default::default()
        };
        assert!(builder().count(&criteria).is_ok());
        assert!(builder().summary(&criteria).is_ok());
    }

    #[test]
    fn test_count_shares_fetch_predicate() {
        let criteria = FilterCriteria {
            brand: Some(3),
            end_date: Some(date("2024-03-01")),
            ..Default::default()
        };
        let fetch = builder().fetch(&criteria).unwrap();
        let count = builder().count(&criteria).unwrap();
        let predicate = "WHERE brand = @brand AND forecast_week <= @end_date";
        assert!(fetch.sql.contains(predicate));
        assert!(count.sql.contains(predicate));
        assert!(count.sql.starts_with("SELECT COUNT(*) AS total_count"));
    }

    #[test]
    fn test_summary_aggregates() {
        let query = builder().summary(&FilterCriteria::default()).unwrap();
        for alias in [
            "total_records",
            "unique_sites",
            "unique_brands",
            "unique_products",
            "unique_forecast_runs",
            "avg_actual_qty",
            "avg_predicted_qty",
            "total_actual_qty",
            "total_predicted_qty",
            "min_forecast_week",
            "max_forecast_week",
        ] {
            assert!(query.sql.contains(&format!("AS {}", alias)), "missing {}", alias);
        }
        assert!(query.params.is_empty());
    }

    #[test]
    fn test_distinct_query() {
        let query = builder()
            .with_max_distinct_values(250)
            .distinct("mh_segment", &FilterCriteria::default())
            .unwrap();
        assert_eq!(
            query.sql,
            "SELECT DISTINCT mh_segment\nFROM `proj.retail.forecasts`\n\
             WHERE mh_segment IS NOT NULL\nORDER BY mh_segment\nLIMIT @max_values"
        );
        assert_eq!(query.param("max_values"), Some(&ParamValue::Int64(250)));
    }

    #[test]
    fn test_distinct_with_filters() {
        let criteria = FilterCriteria {
            mh_segment: Some("FOOD".into()),
            ..Default::default()
        };
        let query = builder().distinct("mh_family", &criteria).unwrap();
        assert!(query
            .sql
            .contains("WHERE mh_segment = @mh_segment AND mh_family IS NOT NULL"));
    }

    #[test]
    fn test_distinct_rejects_unknown_column() {
        let err = builder()
            .distinct("not_a_real_column", &FilterCriteria::default())
            .unwrap_err();
        assert!(matches!(err, QueryBuildError::InvalidColumn(_)));

        let err = builder()
            .distinct("site_id FROM x; --", &FilterCriteria::default())
            .unwrap_err();
        assert!(matches!(err, QueryBuildError::InvalidColumn(_)));
    }

    #[test]
    fn test_param_wire_values() {
        assert_eq!(ParamValue::Int64(-4).to_wire(), "-4");
        assert_eq!(ParamValue::Date(date("2024-01-07")).to_wire(), "2024-01-07");
        assert_eq!(ParamValue::String("a".into()).type_name(), "STRING");
        assert_eq!(ParamValue::Date(date("2024-01-07")).type_name(), "DATE");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_placeholders_match_params(
                site in proptest::option::of(any::<i64>()),
                segment in proptest::option::of(".*"),
                product in proptest::option::of("[A-Z0-9-]{1,12}"),
                limit in 1i64..=1000,
                offset in 0i64..100_000,
            ) {
                let criteria = FilterCriteria {
                    site_id: site,
                    mh_segment: segment.clone(),
                    product_id: product,
                    limit,
                    offset,
                    ..Default::default()
                };
                let query = builder().fetch(&criteria).unwrap();
                for param in &query.params {
                    let placeholder = format!("@{}", param.name);
                    prop_assert!(query.sql.contains(&placeholder));
                }
                let filters = criteria.equality_filters().len();
                prop_assert_eq!(query.params.len(), filters + 2);
                prop_assert_eq!(query.sql.matches(" = @").count(), filters);
                let sql_without_segment = builder()
                    .fetch(&FilterCriteria {
                        mh_segment: segment.map(|_| "x".to_string()),
                        ..criteria.clone()
                    })
                    .unwrap()
                    .sql;
                prop_assert_eq!(&query.sql, &sql_without_segment);
            }
        }
    }
}
