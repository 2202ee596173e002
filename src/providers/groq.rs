//! Groq client: chat completions, Whisper transcription and vision diagnosis.
//!
//! All three go through the OpenAI-compatible REST surface at `base_url`.

use crate::config::settings::GroqSettings;
use crate::entities::ChatRole;
use crate::providers::types::{
    AudioClip, ChatRequest, ChatResponse, CropImage, DiseaseAnalyzer, DiseaseReport, LlmProvider,
    ProviderError, SpeechToText,
};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};

const DIAGNOSIS_PROMPT: &str = "You are a plant pathologist helping farmers in Karnataka. \
Look at the crop photo and reply with a single JSON object with these keys: \
crop, disease_en, disease_kn, severity (one of none, low, medium, high), \
confidence (number between 0 and 1), treatment_en, treatment_kn, prevention_en, prevention_kn. \
The _kn fields must be written in Kannada. If the plant looks healthy, say so in disease_en \
and disease_kn and set severity to none.";

#[derive(Clone)]
pub struct GroqClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    chat_model: String,
    vision_model: String,
    whisper_model: String,
}

impl GroqClient {
    pub fn new(client: reqwest::Client, api_key: String, settings: &GroqSettings) -> Self {
        Self {
            client,
            api_key,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            chat_model: settings.chat_model.clone(),
            vision_model: settings.vision_model.clone(),
            whisper_model: settings.whisper_model.clone(),
        }
    }

    async fn post_chat(&self, body: Value) -> Result<Value, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        read_json(resp).await
    }
}

const fn role_name(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
        ChatRole::System => "system",
    }
}

async fn read_json(resp: reqwest::Response) -> Result<Value, ProviderError> {
    match resp.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(ProviderError::Unauthorized),
        StatusCode::TOO_MANY_REQUESTS => return Err(ProviderError::RateLimited),
        _ => {}
    }

    let status = resp.status();
    let raw = resp.text().await?;
    if !status.is_success() {
        return Err(ProviderError::Http(format!("{} {}", status.as_u16(), raw)));
    }

    serde_json::from_str(&raw)
        .map_err(|e| ProviderError::InvalidResponse(format!("json parse failed: {e}, raw={raw}")))
}

/// Text of `choices[0].message.content`.
fn first_choice_text(v: &Value) -> Result<String, ProviderError> {
    v.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| ProviderError::InvalidResponse(format!("missing choices[0].message.content: {v}")))
}

/// Pulls the outermost JSON object out of a model reply that may be wrapped
/// in prose or code fences.
fn parse_report(text: &str) -> Result<DiseaseReport, ProviderError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let body = match (start, end) {
        (Some(s), Some(e)) if e > s => &text[s..=e],
        _ => {
            return Err(ProviderError::InvalidResponse(format!(
                "no JSON object in reply: {text}"
            )));
        }
    };
    let mut report: DiseaseReport = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("bad diagnosis JSON: {e}")))?;
    report.confidence = report.confidence.clamp(0.0, 1.0);
    Ok(report)
}

#[async_trait]
impl LlmProvider for GroqClient {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let messages: Vec<Value> = req
            .messages
            .iter()
            .map(|turn| json!({"role": role_name(turn.role), "content": turn.content}))
            .collect();
        let body = json!({
            "model": self.chat_model,
            "messages": messages,
            "temperature": req.temperature,
            "max_tokens": req.max_tokens,
            "top_p": 0.9,
        });

        let v = self.post_chat(body).await?;
        let text = first_choice_text(&v)?;
        let tokens_used = v
            .get("usage")
            .and_then(|u| u.get("total_tokens"))
            .and_then(Value::as_u64)
            .and_then(|t| u32::try_from(t).ok())
            .unwrap_or(0);

        Ok(ChatResponse { text, tokens_used })
    }
}

#[async_trait]
impl SpeechToText for GroqClient {
    async fn transcribe(
        &self,
        clip: AudioClip,
        language: Option<String>,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/audio/transcriptions", self.base_url);
        let part = Part::bytes(clip.bytes)
            .file_name(clip.file_name)
            .mime_str(&clip.content_type)?;
        let mut form = Form::new()
            .part("file", part)
            .text("model", self.whisper_model.clone())
            .text("response_format", "json");
        if let Some(language) = language {
            form = form.text("language", language);
        }

        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        let v = read_json(resp).await?;
        v.get("text")
            .and_then(Value::as_str)
            .map(|t| t.trim().to_string())
            .ok_or_else(|| ProviderError::InvalidResponse(format!("missing text: {v}")))
    }
}

#[async_trait]
impl DiseaseAnalyzer for GroqClient {
    async fn analyze(
        &self,
        image: &CropImage,
        crop_hint: &str,
    ) -> Result<DiseaseReport, ProviderError> {
        let data_url = format!(
            "data:{};base64,{}",
            image.content_type,
            STANDARD.encode(&image.bytes)
        );
        let prompt = if crop_hint.is_empty() {
            DIAGNOSIS_PROMPT.to_string()
        } else {
            format!("{DIAGNOSIS_PROMPT} The farmer says the crop is {crop_hint}.")
        };
        let body = json!({
            "model": self.vision_model,
            "temperature": 0.2,
            "max_tokens": 1500,
            "response_format": {"type": "json_object"},
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": prompt},
                    {"type": "image_url", "image_url": {"url": data_url}},
                ],
            }],
        });

        let v = self.post_chat(body).await?;
        parse_report(&first_choice_text(&v)?)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_first_choice_text() {
        let v = json!({"choices": [{"message": {"content": "Namaskara"}}]});
        assert_eq!(first_choice_text(&v).unwrap(), "Namaskara");
        assert!(first_choice_text(&json!({"choices": []})).is_err());
    }

    #[test]
    fn test_parse_report_strips_fences() {
        let reply = "```json\n{\"crop\": \"Tomato\", \"disease_en\": \"Early blight\", \"confidence\": 1.4}\n```";
        let report = parse_report(reply).unwrap();
        assert_eq!(report.crop, "Tomato");
        assert_eq!(report.disease_en, "Early blight");
        assert!((report.confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(report.treatment_kn, "");
    }

    #[test]
    fn test_parse_report_without_json() {
        assert!(matches!(
            parse_report("I cannot see the leaf"),
            Err(ProviderError::InvalidResponse(_))
        ));
    }
}
