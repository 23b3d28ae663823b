//! Repository implementations module.
//!
//! This module contains the implementations of the `ForecastRepository` trait:
//! - `bigquery`: warehouse implementation over the REST API
//! - `local`: in-memory implementation for unit testing and local development
#[cfg(feature = "bigquery-repo")]
pub mod bigquery;
pub mod local;

#[cfg(feature = "bigquery-repo")]
pub use bigquery::{BigQueryClient, BigQueryRepository};
pub use local::LocalRepository;
