//! Voice input and output for the chatbot.
//!
//! Speech is transcribed by a Whisper-compatible provider; replies are turned
//! into MP3 files under `MEDIA_DIR/chat_audio/` and served from `/media`.

use crate::{
    config::Settings,
    errors::{Error, Result},
    providers::{AudioClip, SpeechToText, TextToSpeech},
};
use serde::Serialize;
use tracing::{debug, info};

/// Sub-directory of the media root holding generated speech.
pub const AUDIO_DIR: &str = "chat_audio";
/// Language assumed when the client sends no hint.
pub const DEFAULT_LANGUAGE: &str = "kn";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transcription {
    pub text: String,
    /// Hint that was passed on, or `auto`
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedAudio {
    pub audio_url: String,
    pub filename: String,
}

/// Missing or blank means Kannada, `auto` means let the model decide.
#[must_use]
pub fn language_hint(requested: Option<&str>) -> Option<String> {
    match requested.map(str::trim).filter(|l| !l.is_empty()) {
        None => Some(DEFAULT_LANGUAGE.to_string()),
        Some(l) if l.eq_ignore_ascii_case("auto") => None,
        Some(l) => Some(l.to_ascii_lowercase()),
    }
}

pub async fn transcribe(
    stt: &dyn SpeechToText,
    clip: AudioClip,
    language: Option<&str>,
) -> Result<Transcription> {
    if clip.bytes.is_empty() {
        return Err(Error::validation("No audio file provided."));
    }
    let hint = language_hint(language);
    debug!("Transcribing {} bytes ({:?})", clip.bytes.len(), hint);

    let text = stt.transcribe(clip, hint.clone()).await?;
    Ok(Transcription {
        text: text.trim().to_string(),
        language: hint.unwrap_or_else(|| "auto".to_string()),
    })
}

/// Synthesizes `text` and stores it as a new MP3 file.
pub async fn generate_audio(
    tts: &dyn TextToSpeech,
    settings: &Settings,
    text: &str,
    language: &str,
) -> Result<GeneratedAudio> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::validation("Text is required to generate audio."));
    }
    let language = if language.trim().is_empty() {
        DEFAULT_LANGUAGE
    } else {
        language.trim()
    };

    let audio = tts.synthesize(text, language).await?;

    let dir = settings.media_dir.join(AUDIO_DIR);
    tokio::fs::create_dir_all(&dir).await?;
    let filename = format!("{}.mp3", uuid::Uuid::new_v4());
    tokio::fs::write(dir.join(&filename), &audio).await?;

    info!("Generated {} bytes of {} speech as {}", audio.len(), language, filename);
    Ok(GeneratedAudio {
        audio_url: settings.media_url(&format!("{AUDIO_DIR}/{filename}")),
        filename,
    })
}
