//! Core pipeline logic.
//!
//! This module contains:
//! - Workspace: job-scoped storage with guaranteed release
//! - Gate: pre-synthesis quality checks
//! - Controller: the per-job state machine

pub mod controller;
pub mod gate;
pub mod workspace;

// Re-export commonly used types
pub use controller::IngestionController;
pub use gate::{evaluate, GateDecision};
pub use workspace::{ReleaseReport, Workspace, WorkspaceHandle};
