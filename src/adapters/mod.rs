//! Adapter interfaces for external systems.
//!
//! Each collaborator the pipeline depends on (HTTP origin, transcoder,
//! speech-to-text, multimodal model) sits behind a trait so the controller
//! can be driven by any implementation.

pub mod ffmpeg;
pub mod fetch;
pub mod vision;
pub mod whisper;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::TranscriptionResult;
use crate::error::IngestResult;

// Re-export the default adapters
pub use ffmpeg::{compute_sampling_interval, FfmpegExtractor};
pub use fetch::HttpFetcher;
pub use vision::{VisionClient, DEFAULT_SYSTEM_PROMPT};
pub use whisper::WhisperClient;

/// Downloads a remote video into the workspace
#[async_trait]
pub trait VideoFetcher: Send + Sync {
    /// Write the body at `url` to `destination`, returning bytes written
    async fn fetch(&self, url: &str, destination: &Path) -> IngestResult<u64>;
}

/// Probes and decomposes a video file
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Duration of the video in seconds
    async fn probe_duration(&self, video_path: &Path) -> IngestResult<f64>;

    /// Emit one frame per `interval` seconds into `frames_dir` and keep the
    /// earliest `max_frames`. Returns the kept frames in temporal order.
    async fn sample_frames(
        &self,
        video_path: &Path,
        video_id: &str,
        frames_dir: &Path,
        interval: u32,
        max_frames: usize,
    ) -> IngestResult<Vec<PathBuf>>;

    /// Write the compressed audio track into `audio_dir`
    async fn extract_audio(
        &self,
        video_path: &Path,
        video_id: &str,
        audio_dir: &Path,
    ) -> IngestResult<PathBuf>;
}

/// Speech-to-text backend
#[async_trait]
pub trait Transcriber: Send + Sync {
    fn name(&self) -> &str;

    async fn transcribe(&self, audio_path: &Path) -> IngestResult<TranscriptionResult>;
}

/// Multimodal description backend
#[async_trait]
pub trait Describer: Send + Sync {
    fn name(&self) -> &str;

    /// Describe a video from its frames (by URL, in temporal order) and transcript
    async fn describe(
        &self,
        frame_urls: &[String],
        transcript: &str,
        system_prompt: Option<&str>,
    ) -> IngestResult<String>;
}

/// Error envelope returned by OpenAI-compatible APIs
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Human-readable detail for a failed API response
pub(crate) fn api_error_detail(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => format!("{}: {}", status, parsed.error.message),
        Err(_) if body.trim().is_empty() => status.to_string(),
        Err(_) => format!("{}: {}", status, body.trim()),
    }
}
