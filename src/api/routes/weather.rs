//! `/api/weather/` - Forecast summary with farming advisories.

use crate::{
    api::{AppState, extract::Query, response::ApiResponse},
    core::weather::WeatherSummary,
    errors::Result,
};
use axum::{Router, extract::State, routing::get};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

async fn summary(
    State(state): State<AppState>,
    Query(location): Query<Location>,
) -> Result<ApiResponse<WeatherSummary>> {
    let summary = state
        .weather_cache
        .summary(state.providers.weather.as_ref(), location.lat, location.lon)
        .await?;
    Ok(ApiResponse::success(summary))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/summary/", get(summary))
}
