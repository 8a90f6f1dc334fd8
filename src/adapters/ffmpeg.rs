//! FFmpeg media extractor.
//!
//! Shells out to `ffprobe` for the duration and to `ffmpeg` for frame
//! sampling and audio extraction. Success is decided by exit code only.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::MediaExtractor;
use crate::config::MediaSettings;
use crate::domain::Stage;
use crate::error::{IngestError, IngestResult};

/// Pick the frame sampling period in seconds.
///
/// An explicit interval always wins. Otherwise: up to 30s of video samples
/// every 5s, up to 60s every 10s, anything longer every 20s.
pub fn compute_sampling_interval(duration: f64, explicit_interval: Option<u32>) -> u32 {
    if let Some(interval) = explicit_interval {
        return interval;
    }

    if duration <= 30.0 {
        5
    } else if duration <= 60.0 {
        10
    } else {
        20
    }
}

/// Transcoder-backed extractor
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    ffmpeg_path: String,
    ffprobe_path: String,
    /// JPEG quality passed as `-q:v` (2 best, 31 worst)
    jpeg_quality: u8,
    /// Audio bitrate passed as `-b:a`
    audio_bitrate: String,
}

impl Default for FfmpegExtractor {
    fn default() -> Self {
        Self::new(&MediaSettings::default())
    }
}

impl FfmpegExtractor {
    pub fn new(settings: &MediaSettings) -> Self {
        Self {
            ffmpeg_path: settings.ffmpeg_path.clone(),
            ffprobe_path: settings.ffprobe_path.clone(),
            jpeg_quality: settings.jpeg_quality,
            audio_bitrate: settings.audio_bitrate.clone(),
        }
    }

    /// Override the binaries (tests, non-PATH installs)
    pub fn with_binaries(mut self, ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        self.ffmpeg_path = ffmpeg.into();
        self.ffprobe_path = ffprobe.into();
        self
    }

    /// Run a transcoder process to completion, returning its stdout
    async fn run(&self, program: &str, args: &[String], stage: Stage) -> IngestResult<Vec<u8>> {
        debug!(program, args = %args.join(" "), "Running transcoder");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| IngestError::extraction(stage, format!("Failed to run {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            return Err(IngestError::extraction(
                stage,
                format!(
                    "{} failed with exit code {}: {}",
                    program,
                    exit_code,
                    stderr_tail(&stderr, 5)
                ),
            ));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl MediaExtractor for FfmpegExtractor {
    async fn probe_duration(&self, video_path: &Path) -> IngestResult<f64> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            video_path.display().to_string(),
        ];

        let stdout = self.run(&self.ffprobe_path, &args, Stage::Probing).await?;
        parse_duration(&String::from_utf8_lossy(&stdout))
    }

    async fn sample_frames(
        &self,
        video_path: &Path,
        video_id: &str,
        frames_dir: &Path,
        interval: u32,
        max_frames: usize,
    ) -> IngestResult<Vec<PathBuf>> {
        let pattern = frames_dir.join(format!("{}%04d.jpg", frame_prefix(video_id)));
        let args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            video_path.display().to_string(),
            "-vf".to_string(),
            format!("fps=1/{}", interval),
            "-q:v".to_string(),
            self.jpeg_quality.to_string(),
            pattern.display().to_string(),
        ];

        self.run(&self.ffmpeg_path, &args, Stage::Sampling).await?;

        let frames = retain_earliest_frames(frames_dir, video_id, max_frames)
            .await
            .map_err(|e| {
                IngestError::extraction(
                    Stage::Sampling,
                    format!("Failed to list frames in {}: {}", frames_dir.display(), e),
                )
            })?;

        info!(count = frames.len(), interval, "Frames sampled");
        Ok(frames)
    }

    async fn extract_audio(
        &self,
        video_path: &Path,
        video_id: &str,
        audio_dir: &Path,
    ) -> IngestResult<PathBuf> {
        let audio_path = audio_dir.join(format!("{}.mp3", video_id));
        let args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            video_path.display().to_string(),
            "-vn".to_string(),
            "-c:a".to_string(),
            "libmp3lame".to_string(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
            audio_path.display().to_string(),
        ];

        self.run(&self.ffmpeg_path, &args, Stage::Sampling)
            .await
            .map_err(|e| match e {
                IngestError::Extraction { stage, message } => {
                    IngestError::extraction(stage, format!("audio extraction: {}", message))
                }
                other => other,
            })?;

        Ok(audio_path)
    }
}

/// File-name prefix shared by every frame of one job
pub fn frame_prefix(video_id: &str) -> String {
    format!("{}_frame_", video_id)
}

/// Parse `ffprobe` duration output ("12.345000\n")
pub fn parse_duration(output: &str) -> IngestResult<f64> {
    let trimmed = output.trim();
    match trimmed.parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => Ok(seconds),
        _ => Err(IngestError::extraction(
            Stage::Probing,
            format!("Unparseable duration '{}'", trimmed),
        )),
    }
}

/// Frame index encoded in a file name, if it belongs to this job
fn frame_index(file_name: &str, prefix: &str) -> Option<u32> {
    file_name
        .strip_prefix(prefix)?
        .strip_suffix(".jpg")?
        .parse()
        .ok()
}

/// Collect this job's frames in index order and delete all but the earliest
/// `max_frames`. Returns the kept paths.
pub async fn retain_earliest_frames(
    frames_dir: &Path,
    video_id: &str,
    max_frames: usize,
) -> io::Result<Vec<PathBuf>> {
    let prefix = frame_prefix(video_id);
    let mut indexed = Vec::new();

    let mut entries = tokio::fs::read_dir(frames_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if let Some(name) = entry.file_name().to_str() {
            if let Some(index) = frame_index(name, &prefix) {
                indexed.push((index, entry.path()));
            }
        }
    }

    indexed.sort_by_key(|(index, _)| *index);

    if indexed.len() > max_frames {
        for (_, path) in indexed.drain(max_frames..) {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                // Left for workspace release; it is not part of the manifest
                warn!(path = %path.display(), error = %e, "Failed to delete excess frame");
            }
        }
    }

    Ok(indexed.into_iter().map(|(_, path)| path).collect())
}

/// Last `lines` non-empty lines of a process's stderr
fn stderr_tail(stderr: &str, lines: usize) -> String {
    let kept: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = kept.len().saturating_sub(lines);
    kept[start..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_adaptive_interval_steps() {
        assert_eq!(compute_sampling_interval(0.0, None), 5);
        assert_eq!(compute_sampling_interval(20.0, None), 5);
        assert_eq!(compute_sampling_interval(30.0, None), 5);
        assert_eq!(compute_sampling_interval(30.01, None), 10);
        assert_eq!(compute_sampling_interval(60.0, None), 10);
        assert_eq!(compute_sampling_interval(60.5, None), 20);
        assert_eq!(compute_sampling_interval(3600.0, None), 20);
    }

    #[test]
    fn test_explicit_interval_ignores_duration() {
        for duration in [1.0, 45.0, 90.0, 10_000.0] {
            assert_eq!(compute_sampling_interval(duration, Some(2)), 2);
        }
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("12.345000\n").unwrap(), 12.345);
        assert_eq!(parse_duration("90").unwrap(), 90.0);

        for bad in ["N/A", "", "-3", "inf", "twelve"] {
            let err = parse_duration(bad).unwrap_err();
            assert_eq!(err.stage(), Stage::Probing, "{:?}", bad);
        }
    }

    #[test]
    fn test_frame_index() {
        assert_eq!(frame_index("clip1_frame_0003.jpg", "clip1_frame_"), Some(3));
        assert_eq!(frame_index("clip1_frame_12345.jpg", "clip1_frame_"), Some(12345));
        assert_eq!(frame_index("clip1_frame_0003.png", "clip1_frame_"), None);
        assert_eq!(frame_index("clip2_frame_0003.jpg", "clip1_frame_"), None);
        assert_eq!(frame_index("clip1_frame_x.jpg", "clip1_frame_"), None);
    }

    #[tokio::test]
    async fn test_retain_keeps_earliest_frames() {
        let temp = TempDir::new().unwrap();
        for i in 1..=12 {
            std::fs::write(temp.path().join(format!("clip1_frame_{:04}.jpg", i)), b"jpg").unwrap();
        }
        // Another job's frame must be left alone
        std::fs::write(temp.path().join("clip2_frame_0001.jpg"), b"jpg").unwrap();

        let kept = retain_earliest_frames(temp.path(), "clip1", 10).await.unwrap();

        let names: Vec<String> = kept
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        let expected: Vec<String> = (1..=10).map(|i| format!("clip1_frame_{:04}.jpg", i)).collect();
        assert_eq!(names, expected);

        assert!(!temp.path().join("clip1_frame_0011.jpg").exists());
        assert!(!temp.path().join("clip1_frame_0012.jpg").exists());
        assert!(temp.path().join("clip2_frame_0001.jpg").exists());
    }

    #[tokio::test]
    async fn test_retain_orders_past_padding_width() {
        let temp = TempDir::new().unwrap();
        for i in [9999u32, 10000, 10001] {
            std::fs::write(temp.path().join(format!("v_frame_{:04}.jpg", i)), b"jpg").unwrap();
        }

        let kept = retain_earliest_frames(temp.path(), "v", 2).await.unwrap();

        assert_eq!(kept.len(), 2);
        assert!(kept[0].ends_with("v_frame_9999.jpg"));
        assert!(kept[1].ends_with("v_frame_10000.jpg"));
    }

    #[tokio::test]
    async fn test_retain_under_cap_keeps_everything() {
        let temp = TempDir::new().unwrap();
        for i in 1..=3 {
            std::fs::write(temp.path().join(format!("clip1_frame_{:04}.jpg", i)), b"jpg").unwrap();
        }

        let kept = retain_earliest_frames(temp.path(), "clip1", 10).await.unwrap();
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_stderr_tail() {
        let stderr = "line1\n\nline2\nline3\n";
        assert_eq!(stderr_tail(stderr, 2), "line2 | line3");
        assert_eq!(stderr_tail("", 5), "");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_extraction_error() {
        let temp = TempDir::new().unwrap();
        let extractor = FfmpegExtractor::default().with_binaries("false", "false");
        let video = temp.path().join("clip1.mp4");

        let err = extractor.probe_duration(&video).await.unwrap_err();
        assert_eq!(err.stage(), Stage::Probing);

        let err = extractor
            .sample_frames(&video, "clip1", temp.path(), 5, 10)
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Sampling);
        assert!(err.to_string().contains("exit code 1"));

        let err = extractor
            .extract_audio(&video, "clip1", temp.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("audio extraction"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_extraction_error() {
        let temp = TempDir::new().unwrap();
        let extractor = FfmpegExtractor::default()
            .with_binaries("/nonexistent/ffmpeg", "/nonexistent/ffprobe");

        let err = extractor
            .probe_duration(&temp.path().join("clip1.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Extraction { stage: Stage::Probing, .. }));
    }
}
