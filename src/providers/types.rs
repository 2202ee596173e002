//! Provider traits and the data they exchange.
//!
//! Business logic only talks to these traits, so the HTTP-backed
//! implementations can be swapped for stubs in tests.

use crate::entities::ChatRole;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Failure of an outbound provider call.
#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("http error: {0}")]
    Http(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("rate limited")]
    RateLimited,
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

/// One message of a chat context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    #[must_use]
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub messages: Vec<ChatTurn>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct ChatResponse {
    pub text: String,
    /// Total tokens reported by the provider
    pub tokens_used: u32,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

/// Recorded audio sent for transcription.
#[derive(Clone, Debug)]
pub struct AudioClip {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// `language` is an ISO 639-1 hint; `None` lets the model detect it.
    async fn transcribe(
        &self,
        clip: AudioClip,
        language: Option<String>,
    ) -> Result<String, ProviderError>;
}

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Returns MP3 bytes.
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>, ProviderError>;
}

/// One day of forecast.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub temp_max_c: f64,
    pub temp_min_c: f64,
    pub precipitation_mm: f64,
}

/// Weather as reported by the provider, before advisories are derived.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub wind_kmh: f64,
    /// WMO weather interpretation code
    pub weather_code: i32,
    pub daily: Vec<ForecastDay>,
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn forecast(&self, lat: f64, lon: f64) -> Result<WeatherReport, ProviderError>;
}

/// A crop photo as uploaded.
#[derive(Clone, Debug)]
pub struct CropImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Bilingual diagnosis returned by the vision model.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiseaseReport {
    pub crop: String,
    pub disease_en: String,
    pub disease_kn: String,
    pub severity: String,
    pub confidence: f64,
    pub treatment_en: String,
    pub treatment_kn: String,
    pub prevention_en: String,
    pub prevention_kn: String,
}

#[async_trait]
pub trait DiseaseAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        image: &CropImage,
        crop_hint: &str,
    ) -> Result<DiseaseReport, ProviderError>;
}
