//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (CORS, compression, tracing,
//! request timing), and creates the axum router ready for serving.

use std::time::Instant;

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;
use crate::config::ServerSettings;

/// Response header carrying the handling time in seconds.
pub const PROCESS_TIME_HEADER: &str = "x-process-time";

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings);
    let prefix = state.settings.api_prefix.clone();

    let forecast = Router::new()
        .route("/forecast", get(handlers::list_forecasts))
        .route("/forecast/", get(handlers::list_forecasts))
        .route("/forecast/summary", get(handlers::forecast_summary))
        .route(
            "/forecast/unique-values/{column_name}",
            get(handlers::unique_values),
        )
        .route("/forecast/health", get(handlers::forecast_health));

    let app = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health));
    let app = if prefix.is_empty() {
        app.merge(forecast)
    } else {
        app.nest(&prefix, forecast)
    };

    app.fallback(handlers::not_found)
        .layer(middleware::from_fn(process_time))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Any origin without credentials for `*`, otherwise the listed origins
/// with credentials.
fn cors_layer(settings: &ServerSettings) -> CorsLayer {
    let expose = [HeaderName::from_static(PROCESS_TIME_HEADER)];

    if settings.allows_any_origin() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers(expose);
    }

    let origins: Vec<HeaderValue> = settings
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .expose_headers(expose)
}

async fn process_time(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let mut response = next.run(request).await;
    let elapsed = started.elapsed().as_secs_f64();
    if let Ok(value) = HeaderValue::from_str(&format!("{:.6}", elapsed)) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(PROCESS_TIME_HEADER), value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::LocalRepository;
    use crate::db::repository::ForecastRepository;
    use std::sync::Arc;

    fn state(settings: ServerSettings) -> AppState {
        let repo = Arc::new(LocalRepository::new()) as Arc<dyn ForecastRepository>;
        AppState::new(repo, settings)
    }

    #[test]
    fn test_router_creation() {
        let _router = create_router(state(ServerSettings::default()));
    }

    #[test]
    fn test_router_without_prefix() {
        let settings = ServerSettings {
            api_prefix: String::new(),
            ..Default::default()
        };
        let _router = create_router(state(settings));
    }

    #[test]
    fn test_router_with_explicit_origins() {
        let settings = ServerSettings {
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "https://planner.example.com".to_string(),
            ],
            ..Default::default()
        };
        let _router = create_router(state(settings));
    }
}
