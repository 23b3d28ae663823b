//! Application state for the HTTP server.

use std::sync::Arc;

use crate::config::ServerSettings;
use crate::db::repository::ForecastRepository;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Repository instance for forecast queries
    pub repository: Arc<dyn ForecastRepository>,
    /// Application metadata and HTTP settings
    pub settings: Arc<ServerSettings>,
}

impl AppState {
    /// Create a new application state with the given repository.
    pub fn new(repository: Arc<dyn ForecastRepository>, settings: ServerSettings) -> Self {
        Self {
            repository,
            settings: Arc::new(settings),
        }
    }
}
