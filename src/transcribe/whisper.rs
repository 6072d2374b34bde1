//! HTTP client for OpenAI-compatible transcription endpoints

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AppError, Result};

use super::SpeechToText;

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Speech-to-text over the `/v1/audio/transcriptions` multipart API.
pub struct WhisperClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    language: String,
}

impl WhisperClient {
    pub fn new(
        endpoint: String,
        api_key: Option<String>,
        model: String,
        language: String,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint,
            api_key,
            model,
            language,
        }
    }
}

#[async_trait]
impl SpeechToText for WhisperClient {
    async fn transcribe(&self, path: &Path) -> Result<String> {
        let audio = tokio::fs::read(path).await?;

        let file_part = reqwest::multipart::Part::bytes(audio)
            .file_name("audio.webm")
            .mime_str("audio/webm")
            .map_err(|e| AppError::Transcription(format!("invalid mime type: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("language", self.language.clone());

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Transcription(format!(
                "transcription endpoint returned {status}: {body}"
            )));
        }

        let parsed: TranscriptionResponse = response.json().await?;
        Ok(parsed.text)
    }
}
