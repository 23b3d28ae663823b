//! Forecast record shape and the derived response types built from it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::filter::FilterCriteria;

/// Column list of the forecast table, in select order.
pub const FORECAST_COLUMNS: [&str; 17] = [
    "forecast_datetime",
    "forecast_run_id",
    "site_id",
    "brand",
    "mh_segment",
    "mh_family",
    "mh_class",
    "mh_brick",
    "product_id",
    "forecast_week",
    "actual_qty",
    "predicted_qty",
    "model_used",
    "qty_group",
    "forecast_week_number",
    "training_data_max_date",
    "forecast_horizon",
];

/// One row of demand forecast data.
///
/// Records are owned by the warehouse; this service only ever reads them.
/// Quantities are nullable because actuals are not known until the forecast
/// week has passed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    /// Timestamp when the forecast was generated
    pub forecast_datetime: DateTime<Utc>,
    /// Identifier of the forecast run that produced this row
    pub forecast_run_id: String,
    pub site_id: i64,
    pub brand: i64,
    pub mh_segment: String,
    pub mh_family: String,
    pub mh_class: String,
    pub mh_brick: String,
    pub product_id: String,
    /// Week the forecast applies to
    pub forecast_week: NaiveDate,
    pub actual_qty: Option<f64>,
    pub predicted_qty: Option<f64>,
    pub model_used: String,
    pub qty_group: Option<i64>,
    pub forecast_week_number: Option<i64>,
    pub training_data_max_date: Option<NaiveDate>,
    /// Forecast horizon in weeks
    pub forecast_horizon: Option<i64>,
}

impl ForecastRecord {
    /// Value of a filterable dimension for this record.
    pub fn dimension_value(&self, dimension: ForecastDimension) -> Option<ColumnValue> {
        match dimension {
            ForecastDimension::SiteId => Some(ColumnValue::Int(self.site_id)),
            ForecastDimension::Brand => Some(ColumnValue::Int(self.brand)),
            ForecastDimension::MhSegment => Some(ColumnValue::Text(self.mh_segment.clone())),
            ForecastDimension::MhFamily => Some(ColumnValue::Text(self.mh_family.clone())),
            ForecastDimension::MhClass => Some(ColumnValue::Text(self.mh_class.clone())),
            ForecastDimension::MhBrick => Some(ColumnValue::Text(self.mh_brick.clone())),
            ForecastDimension::ProductId => Some(ColumnValue::Text(self.product_id.clone())),
            ForecastDimension::ForecastRunId => {
                Some(ColumnValue::Text(self.forecast_run_id.clone()))
            }
            ForecastDimension::ModelUsed => Some(ColumnValue::Text(self.model_used.clone())),
            ForecastDimension::QtyGroup => self.qty_group.map(ColumnValue::Int),
        }
    }
}

/// Scalar value of a dimension column.
///
/// Integer columns serialize as JSON numbers, text columns as strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Int(i64),
    Text(String),
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Int(v) => write!(f, "{}", v),
            ColumnValue::Text(v) => f.write_str(v),
        }
    }
}

/// Dimension columns that can be filtered on or listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForecastDimension {
    SiteId,
    Brand,
    MhSegment,
    MhFamily,
    MhClass,
    MhBrick,
    ProductId,
    ForecastRunId,
    ModelUsed,
    QtyGroup,
}

impl ForecastDimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SiteId => "site_id",
            Self::Brand => "brand",
            Self::MhSegment => "mh_segment",
            Self::MhFamily => "mh_family",
            Self::MhClass => "mh_class",
            Self::MhBrick => "mh_brick",
            Self::ProductId => "product_id",
            Self::ForecastRunId => "forecast_run_id",
            Self::ModelUsed => "model_used",
            Self::QtyGroup => "qty_group",
        }
    }

    /// True for INT64 columns.
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::SiteId | Self::Brand | Self::QtyGroup)
    }
}

/// Columns accepted by the distinct-values listing.
pub const DISTINCT_VALUE_COLUMNS: [ForecastDimension; 9] = [
    ForecastDimension::SiteId,
    ForecastDimension::Brand,
    ForecastDimension::MhSegment,
    ForecastDimension::MhFamily,
    ForecastDimension::MhClass,
    ForecastDimension::MhBrick,
    ForecastDimension::ProductId,
    ForecastDimension::ModelUsed,
    ForecastDimension::QtyGroup,
];

/// Requested column is not in [`DISTINCT_VALUE_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "Column '{column}' is not supported. Allowed columns: {}",
    allowed_column_names().join(", ")
)]
pub struct UnsupportedColumn {
    pub column: String,
}

/// Names of the allow-listed distinct-value columns.
pub fn allowed_column_names() -> Vec<&'static str> {
    DISTINCT_VALUE_COLUMNS.iter().map(|c| c.as_str()).collect()
}

/// A column that passed the allow-list check.
///
/// The only way to obtain one is [`DistinctColumn::from_str`] (or
/// [`DistinctColumn::new`] with a dimension from the allow-list), so holding a
/// `DistinctColumn` means the name is safe to place in query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DistinctColumn(ForecastDimension);

impl DistinctColumn {
    pub fn new(dimension: ForecastDimension) -> Result<Self, UnsupportedColumn> {
        if DISTINCT_VALUE_COLUMNS.contains(&dimension) {
            Ok(Self(dimension))
        } else {
            Err(UnsupportedColumn {
                column: dimension.as_str().to_string(),
            })
        }
    }

    pub fn dimension(&self) -> ForecastDimension {
        self.0
    }

    pub fn as_str(&self) -> &'static str {
        self.0.as_str()
    }
}

impl FromStr for DistinctColumn {
    type Err = UnsupportedColumn;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DISTINCT_VALUE_COLUMNS
            .iter()
            .find(|c| c.as_str() == s)
            .map(|c| Self(*c))
            .ok_or_else(|| UnsupportedColumn {
                column: s.to_string(),
            })
    }
}

impl fmt::Display for DistinctColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregates over the rows matching a filter set.
///
/// Sums and averages are 0 when no row (or no non-null quantity) matches;
/// the week bounds are `None` on an empty match.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub total_records: i64,
    pub unique_sites: i64,
    pub unique_brands: i64,
    pub unique_products: i64,
    pub unique_forecast_runs: i64,
    pub avg_actual_qty: f64,
    pub avg_predicted_qty: f64,
    pub total_actual_qty: f64,
    pub total_predicted_qty: f64,
    pub min_forecast_week: Option<NaiveDate>,
    pub max_forecast_week: Option<NaiveDate>,
}

/// Distinct values observed in one allow-listed column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistinctValueSet {
    pub column_name: String,
    pub unique_values: Vec<ColumnValue>,
    pub count: usize,
}

impl DistinctValueSet {
    pub fn new(column: DistinctColumn, unique_values: Vec<ColumnValue>) -> Self {
        Self {
            column_name: column.as_str().to_string(),
            count: unique_values.len(),
            unique_values,
        }
    }
}

/// One page of forecast records plus pagination info.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPage {
    pub data: Vec<ForecastRecord>,
    pub total_records: i64,
    pub page: i64,
    pub page_size: i64,
    pub has_next: bool,
}

impl ForecastPage {
    /// Build a page from the fetched rows and the total match count.
    pub fn new(data: Vec<ForecastRecord>, total_records: i64, criteria: &FilterCriteria) -> Self {
        let limit = criteria.limit.max(1);
        Self {
            data,
            total_records,
            page: (criteria.offset / limit).saturating_add(1),
            page_size: criteria.limit,
            has_next: criteria.offset.saturating_add(criteria.limit) < total_records,
        }
    }
}
