//! vidscribe - video ingestion and description pipeline
//!
//! Downloads a remote video, samples still frames at an interval adapted to
//! its duration, extracts and transcribes the audio, and asks a multimodal
//! model for a description useful in content-creation workflows.
//!
//! # Architecture
//!
//! One job runs as a strictly sequential pipeline:
//! Fetching → Probing → Sampling → Transcribing → Gating → Synthesizing.
//! - Every failure becomes a structured `JobOutcome::Failed`
//! - A quality gate skips synthesis for short or near-silent videos
//! - The job workspace is always released, whatever the outcome
//!
//! # Modules
//!
//! - `adapters`: External systems (HTTP fetch, FFmpeg, Whisper, vision model)
//! - `core`: Pipeline logic (Workspace, Gate, Controller)
//! - `domain`: Data structures (Job, JobOutcome, MediaArtifact)
//! - `server`: HTTP upload and frame endpoints
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Describe one video
//! vidscribe ingest https://cdn.example.com/clip.mp4 --video-id clip1
//!
//! # Serve POST /upload and GET /frames/<name>
//! vidscribe serve --address 0.0.0.0:5001
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod server;

// Re-export main types at crate root for convenience
pub use config::ResolvedConfig;
pub use crate::core::{IngestionController, Workspace};
pub use domain::{Job, JobOutcome, JobRequest, Stage};
pub use error::{IngestError, IngestResult};
