//! Data Transfer Objects for the HTTP API.
//!
//! Response payloads that are not domain types. Pages and distinct value
//! sets are served directly from [`crate::models`].

use serde::{Deserialize, Serialize};

pub use crate::models::{DistinctValueSet, ForecastPage, ForecastRecord};
use crate::models::{FilterCriteria, SummaryStatistics};

/// Summary statistics plus the filters they were computed under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResponse {
    #[serde(flatten)]
    pub statistics: SummaryStatistics,
    pub filters: FilterCriteria,
}

/// Process liveness (`GET /health`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub version: String,
    pub debug: bool,
}

/// Data source liveness (`GET /forecast/health`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastHealthResponse {
    pub status: String,
    pub message: String,
    pub total_records_available: i64,
}

/// One entry of the endpoint listing served at `/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub method: String,
    pub path: String,
    pub description: String,
}

/// Service metadata served at `/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootResponse {
    pub name: String,
    pub description: String,
    pub version: String,
    pub environment: String,
    pub debug: bool,
    pub endpoints: Vec<EndpointInfo>,
}

impl EndpointInfo {
    pub fn get(path: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            path: path.into(),
            description: description.into(),
        }
    }
}
