//! Query-string parameters and their validation into [`FilterCriteria`].
//!
//! Parameters are captured as raw strings and converted by explicit parsing
//! functions, so every rejection carries the offending field name and a
//! readable reason. Blank values count as absent.

use chrono::NaiveDate;
use serde::Deserialize;

use super::error::AppError;
use crate::models::{FilterCriteria, DEFAULT_LIMIT};

/// Raw filter and pagination parameters as they appear in the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForecastParams {
    pub site_id: Option<String>,
    pub brand: Option<String>,
    pub mh_segment: Option<String>,
    pub mh_family: Option<String>,
    pub mh_class: Option<String>,
    pub mh_brick: Option<String>,
    pub product_id: Option<String>,
    pub forecast_run_id: Option<String>,
    pub model_used: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl ForecastParams {
    /// Filters only; pagination parameters are ignored.
    pub fn to_criteria(&self) -> Result<FilterCriteria, AppError> {
        let criteria = FilterCriteria {
            site_id: parse_int("site_id", &self.site_id)?,
            brand: parse_int("brand", &self.brand)?,
            mh_segment: text(&self.mh_segment),
            mh_family: text(&self.mh_family),
            mh_class: text(&self.mh_class),
            mh_brick: text(&self.mh_brick),
            product_id: text(&self.product_id),
            forecast_run_id: text(&self.forecast_run_id),
            model_used: text(&self.model_used),
            start_date: parse_date("start_date", &self.start_date)?,
            end_date: parse_date("end_date", &self.end_date)?,
            ..Default::default()
        };
        criteria
            .check_date_range()
            .map_err(|e| AppError::validation("start_date", e))?;
        Ok(criteria)
    }

    /// Filters plus a validated `limit` (1..=1000, default 100) and
    /// `offset` (>= 0, default 0).
    pub fn to_paginated_criteria(&self) -> Result<FilterCriteria, AppError> {
        let mut criteria = self.to_criteria()?;
        criteria.limit = parse_int("limit", &self.limit)?.unwrap_or(DEFAULT_LIMIT);
        criteria.offset = parse_int("offset", &self.offset)?.unwrap_or(0);
        criteria.check_pagination().map_err(|e| {
            let field = if e.starts_with("limit") { "limit" } else { "offset" };
            AppError::validation(field, e)
        })?;
        Ok(criteria)
    }
}

fn present(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn text(raw: &Option<String>) -> Option<String> {
    present(raw).map(str::to_string)
}

fn parse_int(field: &str, raw: &Option<String>) -> Result<Option<i64>, AppError> {
    present(raw)
        .map(|s| {
            s.parse::<i64>().map_err(|_| {
                AppError::validation(field, format!("{} must be an integer, got '{}'", field, s))
            })
        })
        .transpose()
}

fn parse_date(field: &str, raw: &Option<String>) -> Result<Option<NaiveDate>, AppError> {
    present(raw)
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
                AppError::validation(
                    field,
                    format!("{} must be a date in YYYY-MM-DD format, got '{}'", field, s),
                )
            })
        })
        .transpose()
}
