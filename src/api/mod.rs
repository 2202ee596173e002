//! HTTP surface - The axum router, shared state and request plumbing.
//!
//! Handlers stay thin: they extract the caller and the request body, call
//! into [`crate::core`], and wrap the result in the JSON envelope from
//! [`response`].

pub mod error;
pub mod extract;
pub mod response;
pub mod routes;

use crate::{
    config::Settings,
    core::weather::WeatherCache,
    providers::Providers,
};
use axum::{Router, extract::DefaultBodyLimit, http::HeaderValue};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::warn;

/// Shared state available to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub settings: Arc<Settings>,
    pub providers: Providers,
    pub weather_cache: WeatherCache,
}

impl AppState {
    #[must_use]
    pub fn new(db: DatabaseConnection, settings: Settings, providers: Providers) -> Self {
        let weather_cache = WeatherCache::new(settings.weather_cache_ttl);
        Self {
            db,
            settings: Arc::new(settings),
            providers,
            weather_cache,
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return base.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|e| warn!("Ignoring invalid CORS origin {origin}: {e}"))
                .ok()
        })
        .collect();
    base.allow_origin(parsed)
}

/// Builds the complete application router.
pub fn build_router(state: AppState) -> Router {
    // Multipart bodies carry the image plus form overhead
    let body_limit = state.settings.max_upload_bytes + 64 * 1024;
    let media = ServeDir::new(&state.settings.media_dir);
    let cors = cors_layer(&state.settings.cors_origins);

    Router::new()
        .nest("/api/auth", routes::auth::router())
        .nest("/farm-management/api", routes::farm::router())
        .nest("/api/marketplace", routes::marketplace::router())
        .nest("/api/chatbot", routes::chatbot::router())
        .nest("/api/crop-doctor", routes::crop_doctor::router())
        .nest("/api/soil", routes::soil::router())
        .nest("/api/weather", routes::weather::router())
        .nest_service("/media", media)
        .fallback(routes::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
