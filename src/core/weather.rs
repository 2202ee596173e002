//! Weather summary - Current conditions, a short forecast and farming
//! advisories derived from them.
//!
//! Provider responses are cached in-process per location. Coordinates are
//! rounded to 2 dp (roughly 1 km) before they become a cache key.

use crate::{
    errors::{Error, Result},
    providers::{ForecastDay, WeatherProvider, WeatherReport},
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

pub const HEAVY_RAIN_MM: f64 = 10.0;
pub const HEAT_C: f64 = 35.0;
pub const FROST_C: f64 = 5.0;
pub const HIGH_WIND_KMH: f64 = 25.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentWeather {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub wind_kmh: f64,
    pub weather_code: i32,
    pub condition: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherSummary {
    pub latitude: f64,
    pub longitude: f64,
    pub current: CurrentWeather,
    pub forecast: Vec<ForecastDay>,
    pub advisories: Vec<String>,
}

/// Text for a WMO weather interpretation code.
#[must_use]
pub const fn condition_text(code: i32) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 | 48 => "Fog",
        51 | 53 | 55 => "Drizzle",
        56 | 57 => "Freezing drizzle",
        61 | 63 | 65 => "Rain",
        66 | 67 => "Freezing rain",
        71 | 73 | 75 | 77 => "Snow",
        80..=82 => "Rain showers",
        85 | 86 => "Snow showers",
        95 => "Thunderstorm",
        96 | 99 => "Thunderstorm with hail",
        _ => "Unknown",
    }
}

pub fn validate_coordinates(lat: f64, lon: f64) -> Result<()> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(Error::validation("Latitude must be between -90 and 90."));
    }
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(Error::validation("Longitude must be between -180 and 180."));
    }
    Ok(())
}

/// Farming advice for the coming days. Always returns at least one line.
#[must_use]
pub fn advisories(report: &WeatherReport) -> Vec<String> {
    let mut advice = Vec::new();
    if let Some(day) = report.daily.iter().find(|d| d.precipitation_mm >= HEAVY_RAIN_MM) {
        advice.push(format!(
            "Heavy rain ({:.1} mm) expected on {}. Postpone spraying and fertilizer application.",
            day.precipitation_mm,
            day.date.format("%d %b")
        ));
    }
    if report.daily.iter().any(|d| d.temp_max_c >= HEAT_C) {
        advice.push("High temperatures ahead. Irrigate in the early morning or evening.".to_string());
    }
    if report.daily.iter().any(|d| d.temp_min_c <= FROST_C) {
        advice.push("Low night temperatures expected. Protect crops against frost.".to_string());
    }
    if report.wind_kmh >= HIGH_WIND_KMH {
        advice.push("Strong winds. Avoid spraying pesticides today.".to_string());
    }
    if advice.is_empty() {
        advice.push("Weather conditions are favourable for farm work.".to_string());
    }
    advice
}

#[must_use]
pub fn summarize(lat: f64, lon: f64, report: WeatherReport) -> WeatherSummary {
    let advisories = advisories(&report);
    WeatherSummary {
        latitude: lat,
        longitude: lon,
        current: CurrentWeather {
            temperature_c: report.temperature_c,
            humidity_pct: report.humidity_pct,
            wind_kmh: report.wind_kmh,
            weather_code: report.weather_code,
            condition: condition_text(report.weather_code),
        },
        forecast: report.daily,
        advisories,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn cache_key(lat: f64, lon: f64) -> (i64, i64) {
    ((lat * 100.0).round() as i64, (lon * 100.0).round() as i64)
}

/// Shared per-location cache of weather summaries.
#[derive(Clone)]
pub struct WeatherCache {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<(i64, i64), (Instant, WeatherSummary)>>>,
}

impl WeatherCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn fresh(&self, key: (i64, i64)) -> Option<WeatherSummary> {
        let entries = self.entries.read().await;
        entries
            .get(&key)
            .filter(|(stored, _)| stored.elapsed() < self.ttl)
            .map(|(_, summary)| summary.clone())
    }

    /// Returns the cached summary for the location, or fetches and stores a
    /// new one. Provider errors are not cached.
    pub async fn summary(&self, provider: &dyn WeatherProvider, lat: f64, lon: f64) -> Result<WeatherSummary> {
        validate_coordinates(lat, lon)?;
        let key = cache_key(lat, lon);

        if let Some(summary) = self.fresh(key).await {
            debug!("Weather cache hit for {:?}", key);
            return Ok(summary);
        }

        #[allow(clippy::cast_precision_loss)]
        let (lat, lon) = (key.0 as f64 / 100.0, key.1 as f64 / 100.0);
        let report = provider.forecast(lat, lon).await?;
        let summary = summarize(lat, lon, report);

        let mut entries = self.entries.write().await;
        entries.retain(|_, (stored, _)| stored.elapsed() < self.ttl);
        entries.insert(key, (Instant::now(), summary.clone()));
        info!("Weather cache refreshed for {:?} ({} locations cached)", key, entries.len());
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::StubWeather;
    use chrono::NaiveDate;

    fn day(d: u32, max: f64, min: f64, rain: f64) -> ForecastDay {
        ForecastDay {
            date: NaiveDate::from_ymd_opt(2025, 6, d).unwrap_or_default(),
            temp_max_c: max,
            temp_min_c: min,
            precipitation_mm: rain,
        }
    }

    fn report(wind: f64, daily: Vec<ForecastDay>) -> WeatherReport {
        WeatherReport {
            temperature_c: 28.0,
            humidity_pct: 60.0,
            wind_kmh: wind,
            weather_code: 2,
            daily,
        }
    }

    #[test]
    fn test_coordinates_are_range_checked() {
        assert!(validate_coordinates(12.97, 77.59).is_ok());
        assert!(validate_coordinates(91.0, 0.0).is_err());
        assert!(validate_coordinates(0.0, -180.5).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_favourable_when_nothing_triggers() {
        let advice = advisories(&report(10.0, vec![day(1, 30.0, 20.0, 2.0)]));
        assert_eq!(advice, vec!["Weather conditions are favourable for farm work."]);
    }

    #[test]
    fn test_every_rule_can_fire() {
        let advice = advisories(&report(
            25.0,
            vec![day(1, 36.0, 20.0, 0.0), day(2, 20.0, 4.0, 12.5)],
        ));
        assert_eq!(advice.len(), 4);
        assert!(advice[0].contains("12.5 mm"));
        assert!(advice[0].contains("02 Jun"));
        assert!(advice[1].contains("Irrigate"));
        assert!(advice[2].contains("frost"));
        assert!(advice[3].contains("Avoid spraying"));
    }

    #[test]
    fn test_condition_text() {
        assert_eq!(condition_text(0), "Clear sky");
        assert_eq!(condition_text(81), "Rain showers");
        assert_eq!(condition_text(1234), "Unknown");
    }

    #[tokio::test]
    async fn test_cache_reuses_nearby_lookups() -> Result<()> {
        let provider = StubWeather::default();
        let cache = WeatherCache::new(Duration::from_secs(600));

        let first = cache.summary(&provider, 12.971_6, 77.594_6).await?;
        let second = cache.summary(&provider, 12.972, 77.5949).await?;
        assert_eq!(first, second);
        assert_eq!(provider.calls(), 1);
        assert_eq!(first.latitude, 12.97);

        cache.summary(&provider, 13.5, 77.59).await?;
        assert_eq!(provider.calls(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() -> Result<()> {
        let provider = StubWeather::default();
        let cache = WeatherCache::new(Duration::ZERO);
        cache.summary(&provider, 10.0, 10.0).await?;
        cache.summary(&provider, 10.0, 10.0).await?;
        assert_eq!(provider.calls(), 2);

        assert!(matches!(
            cache.summary(&provider, 100.0, 10.0).await,
            Err(Error::Validation { .. })
        ));
        assert_eq!(provider.calls(), 2);
        Ok(())
    }
}
