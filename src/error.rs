//! Error taxonomy for the ingestion pipeline.
//!
//! Every variant is terminal for the job that raised it. The controller maps
//! errors onto [`JobOutcome::Failed`] using [`IngestError::stage`].

use std::time::Duration;

use thiserror::Error;

use crate::domain::{JobOutcome, Stage};

/// Result type for pipeline operations
pub type IngestResult<T> = Result<T, IngestError>;

/// Errors raised by pipeline stages
#[derive(Debug, Clone, Error)]
pub enum IngestError {
    /// Missing or malformed job fields, raised before any side effect
    #[error("Invalid job: {0}")]
    Validation(String),

    /// Job storage could not be prepared; the job stops before its download
    #[error("Workspace unavailable: {0}")]
    Workspace(String),

    /// Remote video unreachable or transfer interrupted
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Transcoder exited non-zero or produced unparseable output
    #[error("Extraction failed during {stage}: {message}")]
    Extraction { stage: Stage, message: String },

    /// Speech-to-text service failed
    #[error("Audio transcription failed: {0}")]
    Transcription(String),

    /// Multimodal description service failed
    #[error("Video description failed: {0}")]
    Synthesis(String),

    /// Job deadline elapsed while a stage was in flight
    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },
}

impl IngestError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn workspace(message: impl Into<String>) -> Self {
        Self::Workspace(message.into())
    }

    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch(message.into())
    }

    pub fn extraction(stage: Stage, message: impl Into<String>) -> Self {
        Self::Extraction {
            stage,
            message: message.into(),
        }
    }

    pub fn transcription(message: impl Into<String>) -> Self {
        Self::Transcription(message.into())
    }

    pub fn synthesis(message: impl Into<String>) -> Self {
        Self::Synthesis(message.into())
    }

    /// Stage this error terminates
    pub fn stage(&self) -> Stage {
        match self {
            Self::Validation(_) => Stage::Validating,
            Self::Workspace(_) | Self::Fetch(_) => Stage::Fetching,
            Self::Extraction { stage, .. } => *stage,
            Self::Transcription(_) => Stage::Transcribing,
            Self::Synthesis(_) => Stage::Synthesizing,
            Self::Timeout { stage, .. } => *stage,
        }
    }
}

impl From<IngestError> for JobOutcome {
    fn from(error: IngestError) -> Self {
        JobOutcome::failed(error.stage(), error.to_string())
    }
}
