//! Data access for the forecast table.
//!
//! This module provides abstractions for warehouse reads via the Repository
//! pattern, allowing the storage backend to be swapped easily.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  HTTP Layer (http/) - request parsing, envelopes        │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Service Layer (services.rs)                            │
//! │  - Page assembly (count + fetch)                        │
//! │  - Distinct value envelopes, health check               │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository Trait (repository/) - Abstract Interface    │
//! └───────────┬─────────────────────────────┬───────────────┘
//!             │                             │
//! ┌───────────▼───────────────┐ ┌───────────▼───────────────┐
//! │  BigQuery Repository      │ │  Local Repository         │
//! │  (query.rs + REST client) │ │  (in-memory)              │
//! └───────────────────────────┘ └───────────────────────────┘
//! ```
//!
//! # Recommended Usage
//! ```ignore
//! use forecast_api::config::AppConfig;
//! use forecast_api::db::{services, RepositoryFactory};
//! use forecast_api::models::FilterCriteria;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let config = AppConfig::load()?;
//!     let repo = RepositoryFactory::create(&config)?;
//!     let page = services::list_forecasts(repo.as_ref(), &FilterCriteria::default()).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod factory;
pub mod query;
pub mod repo_config;
pub mod repositories;
pub mod repository;
pub mod services;

pub use config::{CredentialMode, QuerySettings, WarehouseConfig};
pub use factory::{RepositoryFactory, RepositoryType};
pub use query::{CompiledQuery, ForecastQueryBuilder, QueryBuildError, TableRef};
pub use repo_config::RepositoryConfig;
#[cfg(feature = "bigquery-repo")]
pub use repositories::BigQueryRepository;
pub use repositories::LocalRepository;
pub use repository::{ErrorContext, ForecastRepository, RepositoryError, RepositoryResult};
