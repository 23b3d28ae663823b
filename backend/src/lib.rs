//! # Forecast API
//!
//! Read-only query service over a retail demand forecast table held in a
//! cloud data warehouse.
//!
//! Callers filter forecasts by site, brand, merchandise hierarchy, product,
//! forecast run, model and forecast-week range, and get back paginated rows,
//! summary statistics or distinct values of a dimension column.
//!
//! ## Architecture
//!
//! - [`config`]: process configuration resolved once at startup
//! - [`models`]: the forecast record, filter criteria and response shapes
//! - [`db`]: query translation, the repository trait and its warehouse and
//!   in-memory implementations, and the service layer
//! - [`http`]: axum router, handlers and error envelope

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod config;
pub mod db;
pub mod models;

#[cfg(feature = "http-server")]
pub mod http;
