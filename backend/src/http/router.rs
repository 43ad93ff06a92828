//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (CORS, compression, tracing),
//! and creates the axum router ready for serving.

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;
use crate::routes::{analytics, auth, predictions, reports, stations};

/// Request bodies are small JSON documents.
pub const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Build the CORS layer; an empty origin list allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let api = Router::new()
        // Accounts
        .route(auth::REGISTER, post(handlers::register))
        .route(auth::LOGIN, post(handlers::login))
        .route(auth::ME, get(handlers::me))
        // Stations
        .route(
            stations::STATIONS,
            get(handlers::list_stations).post(handlers::create_station),
        )
        .route(stations::STATION, get(handlers::get_station))
        // Crowd reports
        .route(reports::CROWD_REPORTS, post(handlers::create_report))
        .route(reports::STATION_REPORTS, get(handlers::station_reports))
        .route(reports::RECENT_REPORTS, get(handlers::recent_reports))
        // Predictions
        .route(predictions::PREDICT, post(handlers::predict))
        .route(predictions::HOURLY, get(handlers::hourly_predictions))
        .route(
            predictions::STATION_PREDICTIONS,
            get(handlers::station_predictions),
        )
        .route(predictions::TRAIN, post(handlers::train_model))
        // Analytics
        .route(analytics::STATION_ANALYTICS, get(handlers::station_analytics))
        .route(analytics::OVERVIEW, get(handlers::system_overview))
        .route(analytics::SYSTEM, get(handlers::system_overview));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .merge(api)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::repositories::LocalRepository;
    use crate::db::repository::FullRepository;
    use std::sync::Arc;

    #[test]
    fn test_router_creation() {
        let repo = Arc::new(LocalRepository::new()) as Arc<dyn FullRepository>;
        let config = AppConfig {
            cors_origins: vec!["http://localhost:3000".to_string(), "bad\norigin".to_string()],
            ..AppConfig::default()
        };
        let _router = create_router(AppState::new(repo, config));
    }
}
