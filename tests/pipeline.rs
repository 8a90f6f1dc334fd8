//! Pipeline Integration Tests
//!
//! Drives the ingestion controller end to end with in-process collaborators,
//! injecting a failure at every stage and checking that the workspace is
//! always left empty.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use vidscribe::adapters::ffmpeg::retain_earliest_frames;
use vidscribe::adapters::{Describer, HttpFetcher, MediaExtractor, Transcriber, VideoFetcher};
use vidscribe::core::workspace::is_empty;
use vidscribe::domain::TranscriptionResult;
use vidscribe::{IngestError, IngestResult, IngestionController, JobOutcome, JobRequest, Stage, Workspace};

const BASE_URL: &str = "https://media.example.com";

#[derive(Debug, Clone, Copy, PartialEq)]
enum FailAt {
    Nothing,
    Fetch,
    Probe,
    Sample,
    Audio,
    Transcribe,
    Describe,
}

struct FakeFetcher {
    fail: bool,
}

#[async_trait]
impl VideoFetcher for FakeFetcher {
    async fn fetch(&self, _url: &str, destination: &Path) -> IngestResult<u64> {
        // Partial download lands on disk before the transfer breaks
        tokio::fs::write(destination, b"partial video").await.unwrap();
        if self.fail {
            return Err(IngestError::fetch("connection reset by peer"));
        }
        Ok(13)
    }
}

struct FakeExtractor {
    duration: f64,
    frames_emitted: u32,
    fail: FailAt,
    intervals: Arc<Mutex<Vec<u32>>>,
}

#[async_trait]
impl MediaExtractor for FakeExtractor {
    async fn probe_duration(&self, _video_path: &Path) -> IngestResult<f64> {
        if self.fail == FailAt::Probe {
            return Err(IngestError::extraction(Stage::Probing, "ffprobe failed with exit code 1"));
        }
        Ok(self.duration)
    }

    async fn sample_frames(
        &self,
        _video_path: &Path,
        video_id: &str,
        frames_dir: &Path,
        interval: u32,
        max_frames: usize,
    ) -> IngestResult<Vec<PathBuf>> {
        self.intervals.lock().unwrap().push(interval);

        // Written newest first so ordering cannot come from creation order
        for i in (1..=self.frames_emitted).rev() {
            let path = frames_dir.join(format!("{}_frame_{:04}.jpg", video_id, i));
            tokio::fs::write(path, b"jpg").await.unwrap();
        }

        if self.fail == FailAt::Sample {
            return Err(IngestError::extraction(Stage::Sampling, "ffmpeg failed with exit code 1"));
        }

        retain_earliest_frames(frames_dir, video_id, max_frames)
            .await
            .map_err(|e| IngestError::extraction(Stage::Sampling, e.to_string()))
    }

    async fn extract_audio(
        &self,
        _video_path: &Path,
        video_id: &str,
        audio_dir: &Path,
    ) -> IngestResult<PathBuf> {
        let path = audio_dir.join(format!("{}.mp3", video_id));
        tokio::fs::write(&path, b"mp3").await.unwrap();
        if self.fail == FailAt::Audio {
            return Err(IngestError::extraction(
                Stage::Sampling,
                "audio extraction: ffmpeg failed with exit code 1",
            ));
        }
        Ok(path)
    }
}

struct FakeTranscriber {
    text: String,
    fail: bool,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    fn name(&self) -> &str {
        "fake"
    }

    async fn transcribe(&self, audio_path: &Path) -> IngestResult<TranscriptionResult> {
        assert!(audio_path.exists(), "audio must exist when transcribing");
        if self.fail {
            return Err(IngestError::transcription("401 Unauthorized: Incorrect API key"));
        }
        Ok(TranscriptionResult::new(self.text.clone()))
    }
}

#[derive(Debug, Clone)]
struct DescribeCall {
    frame_urls: Vec<String>,
    transcript: String,
    system_prompt: Option<String>,
}

struct FakeDescriber {
    fail: bool,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<DescribeCall>>>,
}

#[async_trait]
impl Describer for FakeDescriber {
    fn name(&self) -> &str {
        "fake"
    }

    async fn describe(
        &self,
        frame_urls: &[String],
        transcript: &str,
        system_prompt: Option<&str>,
    ) -> IngestResult<String> {
        self.calls.lock().unwrap().push(DescribeCall {
            frame_urls: frame_urls.to_vec(),
            transcript: transcript.to_string(),
            system_prompt: system_prompt.map(str::to_string),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(IngestError::synthesis("429 Too Many Requests: Rate limit reached"));
        }
        Ok("A person waves at the camera in a sunny park.".to_string())
    }
}

struct Scenario {
    duration: f64,
    frames_emitted: u32,
    transcript: String,
    fail: FailAt,
    describe_delay: Option<Duration>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            duration: 90.0,
            frames_emitted: 5,
            transcript: words(40),
            fail: FailAt::Nothing,
            describe_delay: None,
        }
    }
}

struct Harness {
    _temp: TempDir,
    workspace: Workspace,
    controller: IngestionController,
    intervals: Arc<Mutex<Vec<u32>>>,
    calls: Arc<Mutex<Vec<DescribeCall>>>,
}

impl Harness {
    fn new(scenario: Scenario) -> Self {
        Self::build(scenario, None)
    }

    fn with_fetcher(scenario: Scenario, fetcher: Box<dyn VideoFetcher>) -> Self {
        Self::build(scenario, Some(fetcher))
    }

    fn build(scenario: Scenario, fetcher: Option<Box<dyn VideoFetcher>>) -> Self {
        let temp = TempDir::new().unwrap();
        let workspace = Workspace::new(temp.path());
        let intervals = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(Mutex::new(Vec::new()));

        let fetcher = fetcher.unwrap_or_else(|| {
            Box::new(FakeFetcher {
                fail: scenario.fail == FailAt::Fetch,
            })
        });

        let controller = IngestionController::new(
            workspace.clone(),
            BASE_URL,
            fetcher,
            Box::new(FakeExtractor {
                duration: scenario.duration,
                frames_emitted: scenario.frames_emitted,
                fail: scenario.fail,
                intervals: Arc::clone(&intervals),
            }),
            Box::new(FakeTranscriber {
                text: scenario.transcript,
                fail: scenario.fail == FailAt::Transcribe,
            }),
            Box::new(FakeDescriber {
                fail: scenario.fail == FailAt::Describe,
                delay: scenario.describe_delay,
                calls: Arc::clone(&calls),
            }),
        );

        Self {
            _temp: temp,
            workspace,
            controller,
            intervals,
            calls,
        }
    }

    fn intervals(&self) -> Vec<u32> {
        self.intervals.lock().unwrap().clone()
    }

    fn calls(&self) -> Vec<DescribeCall> {
        self.calls.lock().unwrap().clone()
    }
}

fn words(n: usize) -> String {
    (0..n).map(|i| format!("word{}", i)).collect::<Vec<_>>().join(" ")
}

fn request(video_id: &str) -> JobRequest {
    JobRequest::new("https://cdn.example.com/video.mp4").with_video_id(video_id)
}

#[tokio::test]
async fn test_short_transcript_is_limited_without_synthesis() {
    let harness = Harness::new(Scenario {
        duration: 20.0,
        transcript: "hi there".to_string(),
        ..Default::default()
    });

    let outcome = harness
        .controller
        .run(JobRequest {
            min_words: Some(5),
            ..request("clip1")
        })
        .await;

    match outcome {
        JobOutcome::ProcessedWithLimitation {
            reason,
            transcription,
            word_count,
        } => {
            assert!(reason.contains("2 words"), "{}", reason);
            assert_eq!(transcription, "hi there");
            assert_eq!(word_count, 2);
        }
        other => panic!("expected limitation, got {:?}", other),
    }

    assert_eq!(harness.intervals(), vec![5]);
    assert!(harness.calls().is_empty());
    assert!(is_empty(&harness.workspace));
}

#[tokio::test]
async fn test_long_video_is_described_with_ordered_frames() {
    let transcript = words(40);
    let harness = Harness::new(Scenario {
        duration: 90.0,
        frames_emitted: 12,
        transcript: transcript.clone(),
        ..Default::default()
    });

    let outcome = harness
        .controller
        .run(JobRequest {
            min_duration: Some(5.0),
            min_words: Some(5),
            ..request("clip2")
        })
        .await;

    assert_eq!(
        outcome,
        JobOutcome::ProcessedSuccessfully {
            transcription: transcript.clone(),
            description: "A person waves at the camera in a sunny park.".to_string(),
        }
    );
    assert_eq!(harness.intervals(), vec![20]);

    let calls = harness.calls();
    assert_eq!(calls.len(), 1);
    let expected: Vec<String> = (1..=10)
        .map(|i| format!("{}/frames/clip2_frame_{:04}.jpg", BASE_URL, i))
        .collect();
    assert_eq!(calls[0].frame_urls, expected);
    assert_eq!(calls[0].transcript, transcript);
    assert!(calls[0].system_prompt.is_none());

    assert!(is_empty(&harness.workspace));
}

#[tokio::test]
async fn test_malformed_url_fails_fetching_with_empty_workspace() {
    let harness = Harness::with_fetcher(Scenario::default(), Box::new(HttpFetcher::new()));

    let outcome = harness
        .controller
        .run(JobRequest::new("ht!tp://not a url").with_video_id("clip3"))
        .await;

    assert_eq!(outcome.failed_stage(), Some(Stage::Fetching));
    assert!(harness.intervals().is_empty());
    assert!(is_empty(&harness.workspace));
}

#[tokio::test]
async fn test_failure_at_each_stage_releases_workspace() {
    let cases = [
        (FailAt::Fetch, Stage::Fetching),
        (FailAt::Probe, Stage::Probing),
        (FailAt::Sample, Stage::Sampling),
        (FailAt::Audio, Stage::Sampling),
        (FailAt::Transcribe, Stage::Transcribing),
        (FailAt::Describe, Stage::Synthesizing),
    ];

    for (fail, stage) in cases {
        let harness = Harness::new(Scenario {
            fail,
            ..Default::default()
        });

        let outcome = harness.controller.run(request("clip4")).await;

        match &outcome {
            JobOutcome::Failed {
                stage: failed,
                message,
            } => {
                assert_eq!(*failed, stage, "{:?}", fail);
                assert!(!message.is_empty());
            }
            other => panic!("{:?}: expected failure, got {:?}", fail, other),
        }
        assert!(is_empty(&harness.workspace), "{:?} left files behind", fail);

        let synthesized = !harness.calls().is_empty();
        assert_eq!(synthesized, fail == FailAt::Describe, "{:?}", fail);
    }
}

#[tokio::test]
async fn test_duration_rejection_wins_over_word_count() {
    let harness = Harness::new(Scenario {
        duration: 2.0,
        transcript: String::new(),
        ..Default::default()
    });

    let outcome = harness
        .controller
        .run(JobRequest {
            min_duration: Some(5.0),
            min_words: Some(5),
            ..request("clip5")
        })
        .await;

    match outcome {
        JobOutcome::ProcessedWithLimitation {
            reason, word_count, ..
        } => {
            assert!(reason.contains("Video is too short"), "{}", reason);
            assert_eq!(word_count, 0);
        }
        other => panic!("expected limitation, got {:?}", other),
    }
    assert!(harness.calls().is_empty());
    assert!(is_empty(&harness.workspace));
}

#[tokio::test]
async fn test_explicit_interval_and_prompt_are_passed_through() {
    let harness = Harness::new(Scenario {
        duration: 90.0,
        frames_emitted: 12,
        ..Default::default()
    });

    let outcome = harness
        .controller
        .run(JobRequest {
            frame_interval: Some(2),
            system_prompt: Some("List every object you can see.".to_string()),
            ..request("clip6")
        })
        .await;

    assert!(outcome.is_success());
    assert_eq!(harness.intervals(), vec![2]);

    let calls = harness.calls();
    // Explicit mode caps at 100, so nothing is trimmed
    assert_eq!(calls[0].frame_urls.len(), 12);
    assert_eq!(
        calls[0].system_prompt.as_deref(),
        Some("List every object you can see.")
    );
}

#[tokio::test]
async fn test_invalid_request_has_no_side_effects() {
    let harness = Harness::new(Scenario::default());

    let outcome = harness.controller.run(JobRequest::default()).await;

    assert_eq!(outcome.failed_stage(), Some(Stage::Validating));
    for area in harness.workspace.areas() {
        assert!(!area.exists(), "{} should not be created", area.display());
    }
}

#[tokio::test]
async fn test_cancelled_job_still_releases_workspace() {
    let harness = Harness::new(Scenario {
        describe_delay: Some(Duration::from_secs(30)),
        ..Default::default()
    });

    let result = tokio::time::timeout(
        Duration::from_millis(200),
        harness.controller.run(request("clip7")),
    )
    .await;

    assert!(result.is_err(), "job should have been cancelled");
    assert_eq!(harness.calls().len(), 1);
    assert!(is_empty(&harness.workspace));
}

#[tokio::test]
async fn test_job_deadline_reports_stage_in_flight() {
    let harness = Harness::new(Scenario {
        describe_delay: Some(Duration::from_secs(30)),
        ..Default::default()
    });
    let controller = harness
        .controller
        .with_job_timeout(Some(Duration::from_millis(100)));

    let outcome = controller.run(request("clip8")).await;

    match outcome {
        JobOutcome::Failed { stage, message } => {
            assert_eq!(stage, Stage::Synthesizing);
            assert!(message.contains("timed out"), "{}", message);
        }
        other => panic!("expected timeout failure, got {:?}", other),
    }
    assert!(is_empty(&harness.workspace));
}

#[tokio::test]
async fn test_release_clears_files_from_other_jobs() {
    let harness = Harness::new(Scenario::default());
    let stale = harness.workspace.frames_dir().join("stale_frame_0001.jpg");
    std::fs::create_dir_all(harness.workspace.frames_dir()).unwrap();
    std::fs::write(&stale, b"jpg").unwrap();

    let outcome = harness.controller.run(request("clip9")).await;

    assert!(outcome.is_success());
    // Stale frames are not part of this job's manifest
    assert!(harness.calls()[0]
        .frame_urls
        .iter()
        .all(|url| url.contains("clip9_frame_")));
    assert!(!stale.exists());
}
