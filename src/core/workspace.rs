//! Transient job workspace.
//!
//! Three storage areas (incoming video, sampled frames, extracted audio) live
//! under one root. A job acquires a [`WorkspaceHandle`] and releases it exactly
//! once; release empties all three areas, including files that do not belong
//! to the job. If a handle is dropped without an explicit release (the job
//! future was cancelled), `Drop` performs the release instead.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{IngestError, IngestResult};

/// Directory names of the three managed areas under the workspace root
pub const UPLOADS_DIR: &str = "uploads";
pub const FRAMES_DIR: &str = "frames";
pub const AUDIO_DIR: &str = "audio";

/// The three managed storage areas
#[derive(Debug, Clone)]
pub struct Workspace {
    uploads_dir: PathBuf,
    frames_dir: PathBuf,
    audio_dir: PathBuf,
}

impl Workspace {
    /// Workspace with the standard area names under `root`
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            uploads_dir: root.join(UPLOADS_DIR),
            frames_dir: root.join(FRAMES_DIR),
            audio_dir: root.join(AUDIO_DIR),
        }
    }

    pub fn frames_dir(&self) -> &Path {
        &self.frames_dir
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    /// All managed areas, in creation order
    pub fn areas(&self) -> [&Path; 3] {
        [&self.uploads_dir, &self.frames_dir, &self.audio_dir]
    }

    /// Allocate (or reuse) the three areas for a job
    pub async fn acquire(&self, video_id: &str) -> IngestResult<WorkspaceHandle> {
        for area in self.areas() {
            tokio::fs::create_dir_all(area).await.map_err(|e| {
                IngestError::workspace(format!("cannot create {}: {}", area.display(), e))
            })?;
        }

        debug!(video_id, "Workspace acquired");

        Ok(WorkspaceHandle {
            workspace: self.clone(),
            video_id: video_id.to_string(),
            released: false,
        })
    }
}

/// Summary of a release pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseReport {
    /// Entries removed across all areas
    pub removed: usize,

    /// Entries that could not be removed (logged, never fatal)
    pub warnings: usize,
}

/// A job's claim on the workspace
#[derive(Debug)]
pub struct WorkspaceHandle {
    workspace: Workspace,
    video_id: String,
    released: bool,
}

impl WorkspaceHandle {
    /// Where the downloaded source video is stored
    pub fn video_path(&self) -> PathBuf {
        self.workspace
            .uploads_dir
            .join(format!("{}.mp4", self.video_id))
    }

    pub fn frames_dir(&self) -> &Path {
        &self.workspace.frames_dir
    }

    pub fn audio_dir(&self) -> &Path {
        &self.workspace.audio_dir
    }

    /// Empty every managed area. Consumes the handle, so it runs once.
    ///
    /// Deletion runs on the blocking pool. Once spawned it completes even if
    /// the caller is cancelled, so `Drop` has nothing left to do.
    pub async fn release(mut self) -> ReleaseReport {
        self.released = true;
        let workspace = self.workspace.clone();
        let report = match tokio::task::spawn_blocking(move || clear_areas(&workspace)).await {
            Ok(report) => report,
            Err(e) => {
                warn!(video_id = %self.video_id, error = %e, "Workspace release task failed");
                ReleaseReport {
                    removed: 0,
                    warnings: 1,
                }
            }
        };
        debug!(
            video_id = %self.video_id,
            removed = report.removed,
            warnings = report.warnings,
            "Workspace released"
        );
        report
    }
}

impl Drop for WorkspaceHandle {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            warn!(video_id = %self.video_id, "Workspace dropped before release, cleaning up");
            clear_areas(&self.workspace);
        }
    }
}

fn clear_areas(workspace: &Workspace) -> ReleaseReport {
    let mut report = ReleaseReport::default();
    for area in workspace.areas() {
        clear_area(area, &mut report);
    }
    report
}

/// Remove every file and subdirectory inside `dir`, keeping `dir` itself
fn clear_area(dir: &Path, report: &mut ReleaseReport) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "Failed to list workspace area");
            report.warnings += 1;
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Failed to read workspace entry");
                report.warnings += 1;
                continue;
            }
        };

        let path = entry.path();
        match remove_entry(&path) {
            Ok(()) => report.removed += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to delete workspace entry");
                report.warnings += 1;
            }
        }
    }
}

fn remove_entry(path: &Path) -> io::Result<()> {
    // symlink_metadata so a link to a directory is unlinked, not followed
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// True when every managed area is missing or empty
pub fn is_empty(workspace: &Workspace) -> bool {
    workspace.areas().iter().all(|area| match fs::read_dir(area) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    })
}
