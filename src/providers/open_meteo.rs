//! Open-Meteo forecast client.

use crate::providers::types::{ForecastDay, ProviderError, WeatherProvider, WeatherReport};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

#[derive(Clone)]
pub struct OpenMeteo {
    client: reqwest::Client,
    base_url: String,
}

impl OpenMeteo {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Current,
    daily: Daily,
}

#[derive(Debug, Deserialize)]
struct Current {
    temperature_2m: f64,
    relative_humidity_2m: f64,
    wind_speed_10m: f64,
    weather_code: i32,
}

#[derive(Debug, Deserialize)]
struct Daily {
    time: Vec<NaiveDate>,
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    precipitation_sum: Vec<Option<f64>>,
}

impl From<ForecastResponse> for WeatherReport {
    fn from(raw: ForecastResponse) -> Self {
        let daily = raw
            .daily
            .time
            .iter()
            .enumerate()
            .map(|(i, date)| ForecastDay {
                date: *date,
                temp_max_c: raw.daily.temperature_2m_max.get(i).copied().flatten().unwrap_or_default(),
                temp_min_c: raw.daily.temperature_2m_min.get(i).copied().flatten().unwrap_or_default(),
                precipitation_mm: raw.daily.precipitation_sum.get(i).copied().flatten().unwrap_or_default(),
            })
            .collect();

        Self {
            temperature_c: raw.current.temperature_2m,
            humidity_pct: raw.current.relative_humidity_2m,
            wind_kmh: raw.current.wind_speed_10m,
            weather_code: raw.current.weather_code,
            daily,
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteo {
    async fn forecast(&self, lat: f64, lon: f64) -> Result<WeatherReport, ProviderError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                (
                    "current",
                    "temperature_2m,relative_humidity_2m,wind_speed_10m,weather_code".to_string(),
                ),
                (
                    "daily",
                    "temperature_2m_max,temperature_2m_min,precipitation_sum".to_string(),
                ),
                ("timezone", "auto".to_string()),
                ("forecast_days", "7".to_string()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::Http(format!(
                "weather provider returned {}",
                status.as_u16()
            )));
        }

        let raw: ForecastResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(raw.into())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_forecast_response() {
        let body = r#"{
            "current": {"temperature_2m": 29.4, "relative_humidity_2m": 61,
                        "wind_speed_10m": 12.2, "weather_code": 2},
            "daily": {"time": ["2026-06-01", "2026-06-02"],
                      "temperature_2m_max": [33.0, null],
                      "temperature_2m_min": [21.5, 20.0],
                      "precipitation_sum": [0.0, 14.2]}
        }"#;
        let raw: ForecastResponse = serde_json::from_str(body).unwrap();
        let report = WeatherReport::from(raw);
        assert_eq!(report.weather_code, 2);
        assert_eq!(report.daily.len(), 2);
        assert!((report.daily[1].precipitation_mm - 14.2).abs() < 1e-9);
        assert!(report.daily[1].temp_max_c.abs() < 1e-9);
    }
}
