//! Domain types for vidscribe.
//!
//! This module contains the core data structures:
//! - Job: validated ingestion request
//! - Outcome: stage tags, intermediate results and the final job outcome

pub mod job;
pub mod outcome;

// Re-export commonly used types
pub use job::{Job, JobRequest, SamplingMode, DEFAULT_VIDEO_ID};
pub use outcome::{
    word_count, DescriptionResult, JobOutcome, MediaArtifact, Stage, TranscriptionResult,
};
