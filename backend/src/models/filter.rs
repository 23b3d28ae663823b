//! Per-request filter criteria.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::forecast::{ColumnValue, ForecastDimension};

/// Default page size.
pub const DEFAULT_LIMIT: i64 = 100;
/// Largest accepted page size.
pub const MAX_LIMIT: i64 = 1000;
/// Largest accepted offset; keeps `offset + limit` within `i64`.
pub const MAX_OFFSET: i64 = i64::MAX - MAX_LIMIT;

/// Optional equality filters, an inclusive `forecast_week` range and
/// pagination.
///
/// Every field is optional: the default criteria match all rows, subject to
/// `limit`/`offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mh_segment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mh_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mh_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mh_brick: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast_run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip, default = "default_limit")]
    pub limit: i64,
    #[serde(skip)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            site_id: None,
            brand: None,
            mh_segment: None,
            mh_family: None,
            mh_class: None,
            mh_brick: None,
            product_id: None,
            forecast_run_id: None,
            model_used: None,
            start_date: None,
            end_date: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl FilterCriteria {
    /// Active equality filters in a fixed column order.
    pub fn equality_filters(&self) -> Vec<(ForecastDimension, ColumnValue)> {
        let text = |dim: ForecastDimension, value: &Option<String>| {
            value.as_ref().map(|v| (dim, ColumnValue::Text(v.clone())))
        };

        [
            self.site_id
                .map(|v| (ForecastDimension::SiteId, ColumnValue::Int(v))),
            self.brand.map(|v| (ForecastDimension::Brand, ColumnValue::Int(v))),
            text(ForecastDimension::MhSegment, &self.mh_segment),
            text(ForecastDimension::MhFamily, &self.mh_family),
            text(ForecastDimension::MhClass, &self.mh_class),
            text(ForecastDimension::MhBrick, &self.mh_brick),
            text(ForecastDimension::ProductId, &self.product_id),
            text(ForecastDimension::ForecastRunId, &self.forecast_run_id),
            text(ForecastDimension::ModelUsed, &self.model_used),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// True when no predicate is active.
    pub fn is_unfiltered(&self) -> bool {
        self.equality_filters().is_empty() && self.start_date.is_none() && self.end_date.is_none()
    }

    /// Check `limit` is within `[1, MAX_LIMIT]` and `offset` within
    /// `[0, MAX_OFFSET]`.
    pub fn check_pagination(&self) -> Result<(), String> {
        if !(1..=MAX_LIMIT).contains(&self.limit) {
            return Err(format!(
                "limit must be between 1 and {}, got {}",
                MAX_LIMIT, self.limit
            ));
        }
        if self.offset < 0 {
            return Err(format!(
                "offset must be greater than or equal to 0, got {}",
                self.offset
            ));
        }
        if self.offset > MAX_OFFSET {
            return Err(format!(
                "offset must be at most {}, got {}",
                MAX_OFFSET, self.offset
            ));
        }
        Ok(())
    }

    /// Reject a date range whose start lies after its end.
    pub fn check_date_range(&self) -> Result<(), String> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if start > end => Err(format!(
                "start_date ({}) must not be after end_date ({})",
                start, end
            )),
            _ => Ok(()),
        }
    }

    /// Whether a week falls inside the inclusive date range.
    pub fn week_in_range(&self, week: NaiveDate) -> bool {
        self.start_date.map_or(true, |start| week >= start)
            && self.end_date.map_or(true, |end| week <= end)
    }
}
