//! Multimodal description backend.
//!
//! Sends one chat completion request to an OpenAI-compatible
//! `/chat/completions` endpoint: a system instruction, then a user turn with
//! the transcript followed by every frame as an image URL, in temporal order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{api_error_detail, Describer};
use crate::config::OpenAiSettings;
use crate::error::{IngestError, IngestResult};

/// Instruction used when the job does not supply its own
pub const DEFAULT_SYSTEM_PROMPT: &str = "As a video assistant, your goal is to describe a video \
with a focus on context that will be useful for bloggers, noting details that can be used as \
ideas for content: plot, key points, atmosphere, style, visual look, gestures, or anything else \
that could attract attention.\n\nAlso describe what exactly is happening in the video: the place \
depicted, the actions performed by people or objects, and their interaction.";

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for frame + transcript description
pub struct VisionClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    image_detail: String,
}

impl VisionClient {
    pub fn new(settings: &OpenAiSettings) -> Self {
        Self::with_client(reqwest::Client::new(), settings)
    }

    pub fn with_client(client: reqwest::Client, settings: &OpenAiSettings) -> Self {
        Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            model: settings.vision_model.clone(),
            max_tokens: settings.max_tokens,
            image_detail: settings.image_detail.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    pub(crate) fn build_request(
        &self,
        frame_urls: &[String],
        transcript: &str,
        system_prompt: Option<&str>,
    ) -> ChatRequest {
        let system = system_prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);

        let mut parts = Vec::with_capacity(frame_urls.len() + 1);
        parts.push(ContentPart::Text {
            text: format!("Audio transcript of the video:\n{}", transcript),
        });
        parts.extend(frame_urls.iter().map(|url| ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: url.clone(),
                detail: self.image_detail.clone(),
            },
        }));

        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system",
                    content: MessageContent::Text(system.to_string()),
                },
                Message {
                    role: "user",
                    content: MessageContent::Parts(parts),
                },
            ],
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl Describer for VisionClient {
    fn name(&self) -> &str {
        "vision"
    }

    async fn describe(
        &self,
        frame_urls: &[String],
        transcript: &str,
        system_prompt: Option<&str>,
    ) -> IngestResult<String> {
        let request = self.build_request(frame_urls, transcript, system_prompt);
        debug!(model = %self.model, frames = frame_urls.len(), "Requesting description");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| IngestError::synthesis(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| IngestError::synthesis(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(IngestError::synthesis(api_error_detail(status, &body)));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| IngestError::synthesis(format!("Malformed response: {}", e)))?;

        let description = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| IngestError::synthesis("Model returned no description"))?;

        info!(chars = description.len(), "Description generated");
        Ok(description)
    }
}
