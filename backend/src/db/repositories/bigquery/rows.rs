//! Wire types of the `jobs.query` response and mapping of result rows into
//! domain types.
//!
//! Cell values arrive as JSON strings regardless of column type: INT64 and
//! FLOAT64 as decimal text, TIMESTAMP as epoch seconds, DATE as
//! `YYYY-MM-DD`. Every lookup is by column name through the response schema
//! so the select order is not load-bearing.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::db::repository::{ErrorContext, RepositoryError, RepositoryResult};
use crate::models::{ColumnValue, DistinctColumn, ForecastRecord, SummaryStatistics};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(default)]
    pub job_complete: bool,
    #[serde(default)]
    pub job_reference: Option<JobReference>,
    #[serde(default)]
    pub schema: Option<TableSchema>,
    #[serde(default)]
    pub rows: Vec<TableRow>,
    #[serde(default)]
    pub page_token: Option<String>,
    #[serde(default)]
    pub total_rows: Option<String>,
    #[serde(default)]
    pub total_bytes_processed: Option<String>,
    #[serde(default)]
    pub cache_hit: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReference {
    pub project_id: String,
    pub job_id: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableSchema {
    #[serde(default)]
    pub fields: Vec<TableFieldSchema>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableFieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableRow {
    #[serde(default)]
    pub f: Vec<TableCell>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableCell {
    #[serde(default)]
    pub v: Value,
}

/// All rows of a completed query with a name index over its schema.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub fields: Vec<TableFieldSchema>,
    pub rows: Vec<TableRow>,
    index: HashMap<String, usize>,
}

impl ResultSet {
    pub fn new(schema: TableSchema, rows: Vec<TableRow>) -> Self {
        let index = schema
            .fields
            .iter()
            .enumerate()
            .map(|(i, field)| (field.name.clone(), i))
            .collect();
        Self {
            fields: schema.fields,
            rows,
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().enumerate().map(move |(position, row)| Row {
            set: self,
            row,
            position,
        })
    }

    /// The only row of an aggregate query.
    pub fn single_row(&self, operation: &str) -> RepositoryResult<Row<'_>> {
        match self.rows().next() {
            Some(row) if self.len() == 1 => Ok(row),
            _ => Err(mapping_error(
                operation,
                format!("expected exactly one row, got {}", self.len()),
            )),
        }
    }
}

/// Borrowed view of one result row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    set: &'a ResultSet,
    row: &'a TableRow,
    position: usize,
}

impl<'a> Row<'a> {
    fn cell(&self, column: &str) -> RepositoryResult<&'a Value> {
        let index = *self.set.index.get(column).ok_or_else(|| {
            self.error(column, "column missing from result schema".to_string())
        })?;
        self.row
            .f
            .get(index)
            .map(|cell| &cell.v)
            .ok_or_else(|| self.error(column, "row has fewer cells than the schema".to_string()))
    }

    fn error(&self, column: &str, message: String) -> RepositoryError {
        RepositoryError::mapping_with_context(
            format!("column '{}': {}", column, message),
            ErrorContext::new("map_row")
                .with_entity("forecast")
                .with_details(format!("row {}", self.position)),
        )
    }

    fn text(&self, column: &str) -> RepositoryResult<Option<&'a str>> {
        match self.cell(column)? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s.as_str())),
            other => Err(self.error(column, format!("expected a string cell, got {}", other))),
        }
    }

    pub fn opt_string(&self, column: &str) -> RepositoryResult<Option<String>> {
        Ok(self.text(column)?.map(str::to_string))
    }

    pub fn opt_i64(&self, column: &str) -> RepositoryResult<Option<i64>> {
        match self.cell(column)? {
            Value::Null => Ok(None),
            Value::Number(n) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| self.error(column, format!("'{}' is not an integer", n))),
            Value::String(s) => s
                .parse()
                .map(Some)
                .map_err(|_| self.error(column, format!("'{}' is not an integer", s))),
            other => Err(self.error(column, format!("'{}' is not an integer", other))),
        }
    }

    pub fn opt_f64(&self, column: &str) -> RepositoryResult<Option<f64>> {
        match self.cell(column)? {
            Value::Null => Ok(None),
            Value::Number(n) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.error(column, format!("'{}' is not a number", n))),
            Value::String(s) => s
                .parse()
                .map(Some)
                .map_err(|_| self.error(column, format!("'{}' is not a number", s))),
            other => Err(self.error(column, format!("'{}' is not a number", other))),
        }
    }

    pub fn opt_date(&self, column: &str) -> RepositoryResult<Option<NaiveDate>> {
        self.text(column)?
            .map(|s| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map_err(|_| self.error(column, format!("'{}' is not a date", s)))
            })
            .transpose()
    }

    /// Timestamps are epoch seconds with a fractional part; RFC 3339 text
    /// is accepted too.
    pub fn opt_timestamp(&self, column: &str) -> RepositoryResult<Option<DateTime<Utc>>> {
        let Some(raw) = self.text(column)? else {
            return Ok(None);
        };
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Some(ts.with_timezone(&Utc)));
        }
        let seconds: f64 = raw
            .parse()
            .map_err(|_| self.error(column, format!("'{}' is not a timestamp", raw)))?;
        let micros = (seconds * 1_000_000.0).round() as i64;
        Utc.timestamp_opt(
            micros.div_euclid(1_000_000),
            (micros.rem_euclid(1_000_000) * 1_000) as u32,
        )
        .single()
        .map(Some)
        .ok_or_else(|| self.error(column, format!("'{}' is out of range", raw)))
    }

    fn required<T>(&self, column: &str, value: Option<T>) -> RepositoryResult<T> {
        value.ok_or_else(|| self.error(column, "unexpected null".to_string()))
    }

    pub fn string(&self, column: &str) -> RepositoryResult<String> {
        let value = self.opt_string(column)?;
        self.required(column, value)
    }

    pub fn i64(&self, column: &str) -> RepositoryResult<i64> {
        let value = self.opt_i64(column)?;
        self.required(column, value)
    }

    pub fn date(&self, column: &str) -> RepositoryResult<NaiveDate> {
        let value = self.opt_date(column)?;
        self.required(column, value)
    }

    pub fn timestamp(&self, column: &str) -> RepositoryResult<DateTime<Utc>> {
        let value = self.opt_timestamp(column)?;
        self.required(column, value)
    }
}

fn mapping_error(operation: &str, message: String) -> RepositoryError {
    RepositoryError::mapping_with_context(message, ErrorContext::new(operation))
}

pub fn forecast_record(row: &Row<'_>) -> RepositoryResult<ForecastRecord> {
    Ok(ForecastRecord {
        forecast_datetime: row.timestamp("forecast_datetime")?,
        forecast_run_id: row.string("forecast_run_id")?,
        site_id: row.i64("site_id")?,
        brand: row.i64("brand")?,
        mh_segment: row.string("mh_segment")?,
        mh_family: row.string("mh_family")?,
        mh_class: row.string("mh_class")?,
        mh_brick: row.string("mh_brick")?,
        product_id: row.string("product_id")?,
        forecast_week: row.date("forecast_week")?,
        actual_qty: row.opt_f64("actual_qty")?,
        predicted_qty: row.opt_f64("predicted_qty")?,
        model_used: row.string("model_used")?,
        qty_group: row.opt_i64("qty_group")?,
        forecast_week_number: row.opt_i64("forecast_week_number")?,
        training_data_max_date: row.opt_date("training_data_max_date")?,
        forecast_horizon: row.opt_i64("forecast_horizon")?,
    })
}

pub fn forecast_records(set: &ResultSet) -> RepositoryResult<Vec<ForecastRecord>> {
    set.rows().map(|row| forecast_record(&row)).collect()
}

pub fn total_count(set: &ResultSet) -> RepositoryResult<i64> {
    set.single_row("count_forecasts")?.i64("total_count")
}

/// Aggregates of an empty match arrive as nulls and become 0.
pub fn summary_statistics(set: &ResultSet) -> RepositoryResult<SummaryStatistics> {
    let row = set.single_row("summarize_forecasts")?;
    let number = |column: &str| -> RepositoryResult<f64> {
        Ok(row.opt_f64(column)?.unwrap_or(0.0))
    };
    let count = |column: &str| -> RepositoryResult<i64> { Ok(row.opt_i64(column)?.unwrap_or(0)) };

    Ok(SummaryStatistics {
        total_records: count("total_records")?,
        unique_sites: count("unique_sites")?,
        unique_brands: count("unique_brands")?,
        unique_products: count("unique_products")?,
        unique_forecast_runs: count("unique_forecast_runs")?,
        avg_actual_qty: number("avg_actual_qty")?,
        avg_predicted_qty: number("avg_predicted_qty")?,
        total_actual_qty: number("total_actual_qty")?,
        total_predicted_qty: number("total_predicted_qty")?,
        min_forecast_week: row.opt_date("min_forecast_week")?,
        max_forecast_week: row.opt_date("max_forecast_week")?,
    })
}

pub fn distinct_values(
    set: &ResultSet,
    column: DistinctColumn,
) -> RepositoryResult<Vec<ColumnValue>> {
    let name = column.as_str();
    set.rows()
        .filter_map(|row| {
            let value = if column.dimension().is_integer() {
                row.opt_i64(name).map(|v| v.map(ColumnValue::Int))
            } else {
                row.opt_string(name).map(|v| v.map(ColumnValue::Text))
            };
            value.transpose()
        })
        .collect()
}
