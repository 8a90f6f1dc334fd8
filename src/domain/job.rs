//! Ingestion jobs.
//!
//! A [`JobRequest`] is what the caller sends (CLI flags or form fields). It is
//! turned into a validated [`Job`] before anything touches the filesystem.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::error::{IngestError, IngestResult};

/// Identifier used when the caller does not supply one
pub const DEFAULT_VIDEO_ID: &str = "video";

/// Frame cap when the sampling interval is derived from duration
pub const DEFAULT_ADAPTIVE_MAX_FRAMES: usize = 10;

/// Frame cap when the caller supplies an explicit interval
pub const DEFAULT_EXPLICIT_MAX_FRAMES: usize = 100;

/// Raw, unvalidated ingestion request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRequest {
    #[serde(default)]
    pub video_id: Option<String>,

    #[serde(default)]
    pub video_url: Option<String>,

    /// Explicit sampling period in seconds (adaptive when absent)
    #[serde(default, deserialize_with = "blank_as_none")]
    pub frame_interval: Option<u32>,

    #[serde(default, deserialize_with = "blank_as_none")]
    pub max_frames: Option<usize>,

    /// Minimum video length in seconds
    #[serde(default, deserialize_with = "blank_as_none")]
    pub min_duration: Option<f64>,

    /// Minimum transcript word count
    #[serde(default, deserialize_with = "blank_as_none")]
    pub min_words: Option<usize>,

    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl JobRequest {
    pub fn new(video_url: impl Into<String>) -> Self {
        Self {
            video_url: Some(video_url.into()),
            ..Default::default()
        }
    }

    pub fn with_video_id(mut self, video_id: impl Into<String>) -> Self {
        self.video_id = Some(video_id.into());
        self
    }
}

/// Numeric form fields arrive as text. A blank field means "not supplied",
/// anything else must parse.
fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|e| de::Error::custom(format!("'{}' is not a valid number: {}", value, e))),
    }
}

/// How the frame sampling interval is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    /// Derived from probed duration
    Adaptive,

    /// Fixed period in seconds
    Explicit(u32),
}

impl SamplingMode {
    pub fn explicit_interval(&self) -> Option<u32> {
        match self {
            Self::Adaptive => None,
            Self::Explicit(seconds) => Some(*seconds),
        }
    }
}

/// A validated ingestion job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub video_id: String,
    pub video_url: String,
    pub sampling: SamplingMode,
    pub max_frames: usize,
    pub min_duration_seconds: f64,
    pub min_word_count: usize,
    pub system_prompt: Option<String>,
}

impl Job {
    /// Validate a request. Performs no I/O.
    pub fn from_request(request: JobRequest) -> IngestResult<Self> {
        let video_id = request
            .video_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| DEFAULT_VIDEO_ID.to_string());
        validate_video_id(&video_id)?;

        let video_url = request
            .video_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| IngestError::validation("Video URL or video_id not provided"))?;

        let sampling = match request.frame_interval {
            None => SamplingMode::Adaptive,
            Some(0) => {
                return Err(IngestError::validation(
                    "frame_interval must be at least 1 second",
                ))
            }
            Some(seconds) => SamplingMode::Explicit(seconds),
        };

        let max_frames = match (request.max_frames, sampling) {
            (Some(0), _) => {
                return Err(IngestError::validation("max_frames must be at least 1"));
            }
            (Some(n), _) => n,
            (None, SamplingMode::Adaptive) => DEFAULT_ADAPTIVE_MAX_FRAMES,
            (None, SamplingMode::Explicit(_)) => DEFAULT_EXPLICIT_MAX_FRAMES,
        };

        let min_duration_seconds = request.min_duration.unwrap_or(0.0);
        if !min_duration_seconds.is_finite() || min_duration_seconds < 0.0 {
            return Err(IngestError::validation(format!(
                "min_duration must be a non-negative number, got {}",
                min_duration_seconds
            )));
        }

        let system_prompt = request
            .system_prompt
            .filter(|prompt| !prompt.trim().is_empty());

        Ok(Self {
            video_id,
            video_url,
            sampling,
            max_frames,
            min_duration_seconds,
            min_word_count: request.min_words.unwrap_or(0),
            system_prompt,
        })
    }
}

/// Ids become file-name components, so keep them to a safe alphabet
fn validate_video_id(video_id: &str) -> IngestResult<()> {
    if video_id.starts_with('.') {
        return Err(IngestError::validation(format!(
            "video_id '{}' must not start with '.'",
            video_id
        )));
    }

    let valid = video_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(IngestError::validation(format!(
            "video_id '{}' may only contain ASCII letters, digits, '-', '_' and '.'",
            video_id
        )));
    }

    Ok(())
}
