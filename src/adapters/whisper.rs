//! Whisper transcription backend.
//!
//! Streams the extracted audio from disk to an OpenAI-compatible
//! `/audio/transcriptions` endpoint and returns the text verbatim.

use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use serde::Deserialize;
use tracing::{debug, info};

use super::{api_error_detail, Transcriber};
use crate::config::OpenAiSettings;
use crate::domain::TranscriptionResult;
use crate::error::{IngestError, IngestResult};

/// Speech-to-text client
pub struct WhisperClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

/// Transcription response body
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl WhisperClient {
    pub fn new(settings: &OpenAiSettings) -> Self {
        Self::with_client(reqwest::Client::new(), settings)
    }

    pub fn with_client(client: reqwest::Client, settings: &OpenAiSettings) -> Self {
        Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            model: settings.transcription_model.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.api_base)
    }
}

#[async_trait]
impl Transcriber for WhisperClient {
    fn name(&self) -> &str {
        "whisper"
    }

    async fn transcribe(&self, audio_path: &Path) -> IngestResult<TranscriptionResult> {
        let file_name = audio_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let file = tokio::fs::File::open(audio_path).await.map_err(|e| {
            IngestError::transcription(format!(
                "Failed to open audio file {}: {}",
                audio_path.display(),
                e
            ))
        })?;
        let length = file
            .metadata()
            .await
            .map_err(|e| IngestError::transcription(format!("Failed to stat audio file: {}", e)))?
            .len();
        debug!(file = %file_name, bytes = length, model = %self.model, "Streaming audio");

        let part = Part::stream_with_length(Body::from(file), length)
            .file_name(file_name)
            .mime_str("audio/mpeg")
            .map_err(|e| IngestError::transcription(e.to_string()))?;
        let form = Form::new()
            .text("model", self.model.clone())
            .part("file", part);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| IngestError::transcription(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| IngestError::transcription(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(IngestError::transcription(api_error_detail(status, &body)));
        }

        let parsed: TranscriptionResponse = serde_json::from_str(&body)
            .map_err(|e| IngestError::transcription(format!("Malformed response: {}", e)))?;

        let result = TranscriptionResult::new(parsed.text);
        info!(words = result.word_count, "Audio transcribed");
        Ok(result)
    }
}
