//! Text-to-speech through the public Google Translate voice endpoint.
//!
//! The endpoint only accepts short inputs, so text is cut into chunks on
//! whitespace and the returned MP3 frames are concatenated.

use crate::providers::types::{ProviderError, TextToSpeech};
use async_trait::async_trait;

/// Longest text sent in one request, in characters.
pub const MAX_CHUNK_CHARS: usize = 200;

const DEFAULT_TTS_URL: &str = "https://translate.google.com/translate_tts";

#[derive(Clone)]
pub struct GoogleTts {
    client: reqwest::Client,
    base_url: String,
}

impl GoogleTts {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_TTS_URL.to_string(),
        }
    }
}

/// Splits `text` into pieces of at most `max_chars` characters, breaking on
/// whitespace. A single word longer than `max_chars` is split mid-word.
#[must_use]
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { word_len } else { word_len + 1 };
        if current_len + needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl TextToSpeech for GoogleTts {
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>, ProviderError> {
        let chunks = chunk_text(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(ProviderError::InvalidResponse("nothing to speak".to_string()));
        }

        let total = chunks.len().to_string();
        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let idx = idx.to_string();
            let resp = self
                .client
                .get(&self.base_url)
                .query(&[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("tl", language),
                    ("q", chunk.as_str()),
                    ("idx", idx.as_str()),
                    ("total", total.as_str()),
                ])
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                return Err(ProviderError::Http(format!("tts returned {}", status.as_u16())));
            }
            audio.extend_from_slice(&resp.bytes().await?);
        }
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_text_respects_limit() {
        let text = "ಟೊಮೇಟೊ ಎಲೆ ".repeat(60);
        let chunks = chunk_text(&text, MAX_CHUNK_CHARS);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= MAX_CHUNK_CHARS));
        assert_eq!(chunks.join(" "), text.split_whitespace().collect::<Vec<_>>().join(" "));
    }

    #[test]
    fn test_chunk_text_short_and_empty() {
        assert_eq!(chunk_text("water the field", 200), vec!["water the field"]);
        assert!(chunk_text("   ", 200).is_empty());
    }

    #[test]
    fn test_chunk_text_splits_long_word() {
        let chunks = chunk_text("abcdefghij", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_chunk_text_exact_boundary() {
        assert_eq!(chunk_text("ab cd", 5), vec!["ab cd"]);
        assert_eq!(chunk_text("ab cde", 5), vec!["ab", "cde"]);
    }
}
