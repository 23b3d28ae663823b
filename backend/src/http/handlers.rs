//! HTTP handlers for the REST API.
//!
//! Each handler validates its parameters, delegates to the service layer
//! and wraps the result. Parameter validation always happens before the
//! repository is touched.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::Uri,
    Json,
};

use super::dto::{
    DistinctValueSet, EndpointInfo, ForecastHealthResponse, ForecastPage, HealthResponse,
    RootResponse, SummaryResponse,
};
use super::error::AppError;
use super::params::ForecastParams;
use super::state::AppState;
use crate::db::repository::RepositoryError;
use crate::db::services as db_services;
use crate::models::DistinctColumn;

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

type ParamsResult = Result<Query<ForecastParams>, QueryRejection>;

// =============================================================================
// Service metadata
// =============================================================================

/// GET /
///
/// Application name, version and links to the forecast endpoints.
pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    let settings = &state.settings;
    let base = format!("{}/forecast", settings.api_prefix);

    Json(RootResponse {
        name: settings.app_name.clone(),
        description: "Retail demand forecast query API".to_string(),
        version: settings.app_version.clone(),
        environment: settings.environment().to_string(),
        debug: settings.debug,
        endpoints: vec![
            EndpointInfo::get(
                format!("{}/", base),
                "Get forecast data with filtering and pagination",
            ),
            EndpointInfo::get(
                format!("{}/summary", base),
                "Get summary statistics for forecast data",
            ),
            EndpointInfo::get(
                format!("{}/unique-values/{{column_name}}", base),
                "Get unique values for a specific column",
            ),
            EndpointInfo::get(format!("{}/health", base), "Forecast service health check"),
            EndpointInfo::get("/health", "Process health check"),
        ],
    })
}

/// GET /health
///
/// Process liveness; does not touch the data source.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        message: format!("{} is running", state.settings.app_name),
        version: state.settings.app_version.clone(),
        debug: state.settings.debug,
    })
}

// =============================================================================
// Forecast queries
// =============================================================================

/// GET {prefix}/forecast/
///
/// One page of matching forecasts with pagination info.
pub async fn list_forecasts(
    State(state): State<AppState>,
    params: ParamsResult,
) -> HandlerResult<ForecastPage> {
    let Query(params) = params?;
    let criteria = params.to_paginated_criteria()?;

    let page = db_services::list_forecasts(state.repository.as_ref(), &criteria).await?;
    Ok(Json(page))
}

/// GET {prefix}/forecast/summary
///
/// Aggregate statistics over matching forecasts; `limit`/`offset` are
/// ignored.
pub async fn forecast_summary(
    State(state): State<AppState>,
    params: ParamsResult,
) -> HandlerResult<SummaryResponse> {
    let Query(params) = params?;
    let criteria = params.to_criteria()?;

    let statistics =
        db_services::summarize_forecasts(state.repository.as_ref(), &criteria).await?;
    Ok(Json(SummaryResponse {
        statistics,
        filters: criteria,
    }))
}

/// GET {prefix}/forecast/unique-values/{column_name}
///
/// Distinct values of an allow-listed column. Unknown columns are rejected
/// before any query runs.
pub async fn unique_values(
    State(state): State<AppState>,
    Path(column_name): Path<String>,
    params: ParamsResult,
) -> HandlerResult<DistinctValueSet> {
    let column: DistinctColumn = column_name
        .parse()
        .map_err(RepositoryError::from)?;
    let Query(params) = params?;
    let criteria = params.to_criteria()?;

    let values = db_services::unique_values(state.repository.as_ref(), column, &criteria).await?;
    Ok(Json(values))
}

/// GET {prefix}/forecast/health
///
/// Runs an unfiltered count; any failure is reported as 503.
pub async fn forecast_health(
    State(state): State<AppState>,
) -> HandlerResult<ForecastHealthResponse> {
    let total = db_services::health_check(state.repository.as_ref())
        .await
        .map_err(AppError::Unavailable)?;

    Ok(Json(ForecastHealthResponse {
        status: "healthy".to_string(),
        message: "Forecast service is operational".to_string(),
        total_records_available: total,
    }))
}

/// Fallback for unknown routes.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}
