//! Domain models for the forecast table.
//!
//! - [`forecast`]: the record shape and derived response types
//! - [`filter`]: per-request filter criteria

pub mod filter;
pub mod forecast;

pub use filter::{FilterCriteria, DEFAULT_LIMIT, MAX_LIMIT, MAX_OFFSET};
pub use forecast::{
    allowed_column_names, ColumnValue, DistinctColumn, DistinctValueSet, ForecastDimension,
    ForecastPage, ForecastRecord, SummaryStatistics, UnsupportedColumn, DISTINCT_VALUE_COLUMNS,
    FORECAST_COLUMNS,
};
