//! Outbound providers: chat LLM, speech, weather and crop-disease vision.

pub mod groq;
pub mod open_meteo;
pub mod tts;
pub mod types;

use crate::config::Settings;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub use groq::GroqClient;
pub use open_meteo::OpenMeteo;
pub use tts::GoogleTts;
pub use types::{
    AudioClip, ChatRequest, ChatResponse, ChatTurn, CropImage, DiseaseAnalyzer, DiseaseReport,
    ForecastDay, LlmProvider, ProviderError, SpeechToText, TextToSpeech, WeatherProvider,
    WeatherReport,
};

pub(crate) fn build_http_client() -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(90))
        .user_agent(concat!("kisan-sathi/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProviderError::Http(e.to_string()))
}

/// Stand-in used when the AI key is missing. Every call fails with
/// [`ProviderError::NotConfigured`].
#[derive(Clone, Copy, Debug)]
pub struct Unconfigured;

#[async_trait]
impl LlmProvider for Unconfigured {
    async fn chat(&self, _req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        Err(ProviderError::NotConfigured("GROQ_API_KEY"))
    }
}

#[async_trait]
impl SpeechToText for Unconfigured {
    async fn transcribe(
        &self,
        _clip: AudioClip,
        _language: Option<String>,
    ) -> Result<String, ProviderError> {
        Err(ProviderError::NotConfigured("GROQ_API_KEY"))
    }
}

#[async_trait]
impl DiseaseAnalyzer for Unconfigured {
    async fn analyze(
        &self,
        _image: &CropImage,
        _crop_hint: &str,
    ) -> Result<DiseaseReport, ProviderError> {
        Err(ProviderError::NotConfigured("GROQ_API_KEY"))
    }
}

/// Every provider the server talks to.
#[derive(Clone)]
pub struct Providers {
    pub llm: Arc<dyn LlmProvider>,
    pub speech_to_text: Arc<dyn SpeechToText>,
    pub text_to_speech: Arc<dyn TextToSpeech>,
    pub weather: Arc<dyn WeatherProvider>,
    pub disease: Arc<dyn DiseaseAnalyzer>,
}

impl Providers {
    /// Builds the HTTP-backed providers from settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, ProviderError> {
        let client = build_http_client()?;
        let weather = Arc::new(OpenMeteo::new(client.clone(), settings.weather_base_url.clone()));
        let text_to_speech = Arc::new(GoogleTts::new(client.clone()));

        let providers = match &settings.groq.api_key {
            Some(key) => {
                let groq = Arc::new(GroqClient::new(client, key.clone(), &settings.groq));
                Self {
                    llm: groq.clone(),
                    speech_to_text: groq.clone(),
                    text_to_speech,
                    weather,
                    disease: groq,
                }
            }
            None => {
                warn!("GROQ_API_KEY is not set; chatbot, transcription and crop doctor are disabled");
                Self {
                    llm: Arc::new(Unconfigured),
                    speech_to_text: Arc::new(Unconfigured),
                    text_to_speech,
                    weather,
                    disease: Arc::new(Unconfigured),
                }
            }
        };
        Ok(providers)
    }
}
