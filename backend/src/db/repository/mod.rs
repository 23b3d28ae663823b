//! Repository trait definitions for warehouse reads.
//!
//! - [`error`]: Error types for repository operations
//! - [`forecast`]: Read operations over the forecast table

pub mod error;
pub mod forecast;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};
pub use forecast::ForecastRepository;
