//! Job results and the artifacts a job produces along the way.
//!
//! Exactly one [`JobOutcome`] is produced per job. Everything else in this
//! module is an intermediate value owned by the controller while the job runs.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Pipeline stage a job is in (or failed in)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Job fields are being checked, before any side effect
    Validating,

    /// Remote video is being downloaded into the workspace
    Fetching,

    /// Video duration is being probed
    Probing,

    /// Frames and audio are being extracted
    Sampling,

    /// Audio is being transcribed
    Transcribing,

    /// Quality gate is being evaluated
    Gating,

    /// Multimodal description is being generated
    Synthesizing,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validating => "Validating",
            Self::Fetching => "Fetching",
            Self::Probing => "Probing",
            Self::Sampling => "Sampling",
            Self::Transcribing => "Transcribing",
            Self::Gating => "Gating",
            Self::Synthesizing => "Synthesizing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transcript text plus its whitespace-delimited word count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub text: String,
    pub word_count: usize,
}

impl TranscriptionResult {
    /// Wrap upstream text verbatim and count its words
    pub fn new(text: String) -> Self {
        let word_count = word_count(&text);
        Self { text, word_count }
    }
}

/// Number of whitespace-separated tokens in `text` (0 for empty input)
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Description text plus the transcript it was conditioned on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionResult {
    pub description: String,
    pub transcription: String,
}

/// Per-job manifest of everything materialized on disk.
///
/// Frames are kept in temporal order; consumers never rediscover them by
/// scanning a directory.
#[derive(Debug, Clone)]
pub struct MediaArtifact {
    /// Downloaded source video
    pub video_path: PathBuf,

    /// Sampled frame images, earliest first
    pub frames: Vec<PathBuf>,

    /// Extracted audio track
    pub audio_path: PathBuf,
}

impl MediaArtifact {
    /// File names of the sampled frames, in order
    pub fn frame_names(&self) -> Vec<String> {
        self.frames
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }
}

/// The single externally visible result of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum JobOutcome {
    /// Every stage ran, including description synthesis
    ProcessedSuccessfully {
        transcription: String,
        description: String,
    },

    /// The quality gate rejected the job; synthesis was skipped
    ProcessedWithLimitation {
        reason: String,
        transcription: String,
        word_count: usize,
    },

    /// A stage failed; nothing after it ran
    Failed { stage: Stage, message: String },
}

impl JobOutcome {
    pub fn failed(stage: Stage, message: impl Into<String>) -> Self {
        Self::Failed {
            stage,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::ProcessedSuccessfully { .. })
    }

    /// Stage the job failed in, if it failed
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            Self::Failed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<DescriptionResult> for JobOutcome {
    fn from(result: DescriptionResult) -> Self {
        Self::ProcessedSuccessfully {
            transcription: result.transcription,
            description: result.description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   \n\t "), 0);
        assert_eq!(word_count("hi there"), 2);
        assert_eq!(word_count("  leading and\ttrailing\nwhitespace  "), 4);
    }

    #[test]
    fn test_transcription_keeps_text_verbatim() {
        let result = TranscriptionResult::new(" Hello,  world. ".to_string());
        assert_eq!(result.text, " Hello,  world. ");
        assert_eq!(result.word_count, 2);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = JobOutcome::failed(Stage::Fetching, "connection refused");
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["status"], "failed");
        assert_eq!(json["stage"], "Fetching");
        assert_eq!(json["message"], "connection refused");

        let limited = JobOutcome::ProcessedWithLimitation {
            reason: "too short".to_string(),
            transcription: "hi".to_string(),
            word_count: 1,
        };
        let json = serde_json::to_value(&limited).unwrap();
        assert_eq!(json["status"], "processed_with_limitation");
        assert_eq!(json["word_count"], 1);
    }

    #[test]
    fn test_frame_names_preserve_order() {
        let artifact = MediaArtifact {
            video_path: PathBuf::from("/w/uploads/a.mp4"),
            frames: vec![
                PathBuf::from("/w/frames/a_frame_0001.jpg"),
                PathBuf::from("/w/frames/a_frame_0002.jpg"),
            ],
            audio_path: PathBuf::from("/w/audio/a.mp3"),
        };

        assert_eq!(
            artifact.frame_names(),
            vec!["a_frame_0001.jpg", "a_frame_0002.jpg"]
        );
    }
}
