//! Quality gate evaluated before description synthesis.
//!
//! Short or near-silent videos are rejected here so the expensive multimodal
//! call is never made for them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result of evaluating the gate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision")]
pub enum GateDecision {
    Pass,

    RejectShortDuration { duration: f64, min_duration: f64 },

    RejectLowWordCount { word_count: usize, min_words: usize },
}

impl GateDecision {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "passed"),
            Self::RejectShortDuration {
                duration,
                min_duration,
            } => write!(
                f,
                "Video is too short: {:.1}s is below the minimum of {:.1}s",
                duration, min_duration
            ),
            Self::RejectLowWordCount {
                word_count,
                min_words,
            } => write!(
                f,
                "Transcript is too short: {} words is below the minimum of {} words",
                word_count, min_words
            ),
        }
    }
}

/// Evaluate the gate. Duration is checked first and wins when both fail.
pub fn evaluate(duration: f64, min_duration: f64, word_count: usize, min_words: usize) -> GateDecision {
    if duration < min_duration {
        return GateDecision::RejectShortDuration {
            duration,
            min_duration,
        };
    }

    if word_count < min_words {
        return GateDecision::RejectLowWordCount {
            word_count,
            min_words,
        };
    }

    GateDecision::Pass
}
