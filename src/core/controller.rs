//! Ingestion controller.
//!
//! Runs one job through Fetching → Probing → Sampling → Transcribing →
//! Gating → Synthesizing, strictly in sequence. Any stage error ends the job
//! with a `Failed` outcome; a gate rejection ends it with a limitation. The
//! workspace is released exactly once before the outcome is returned.

use std::time::Duration;

use tracing::{debug, error, field, info, instrument, warn, Span};
use uuid::Uuid;

use crate::adapters::{
    compute_sampling_interval, Describer, FfmpegExtractor, HttpFetcher, MediaExtractor,
    Transcriber, VideoFetcher, VisionClient, WhisperClient,
};
use crate::config::ResolvedConfig;
use crate::domain::{DescriptionResult, Job, JobOutcome, JobRequest, MediaArtifact, Stage};
use crate::error::{IngestError, IngestResult};

use super::gate;
use super::workspace::{Workspace, WorkspaceHandle};

/// Orchestrates one ingestion job at a time
pub struct IngestionController {
    workspace: Workspace,
    /// Public base URL frames are served under (no trailing slash)
    base_url: String,
    job_timeout: Option<Duration>,
    fetcher: Box<dyn VideoFetcher>,
    extractor: Box<dyn MediaExtractor>,
    transcriber: Box<dyn Transcriber>,
    describer: Box<dyn Describer>,
}

impl IngestionController {
    pub fn new(
        workspace: Workspace,
        base_url: impl Into<String>,
        fetcher: Box<dyn VideoFetcher>,
        extractor: Box<dyn MediaExtractor>,
        transcriber: Box<dyn Transcriber>,
        describer: Box<dyn Describer>,
    ) -> Self {
        Self {
            workspace,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            job_timeout: None,
            fetcher,
            extractor,
            transcriber,
            describer,
        }
    }

    /// Controller wired to the HTTP, FFmpeg and OpenAI-compatible adapters
    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self::new(
            Workspace::new(&config.workspace_root),
            config.base_url.clone(),
            Box::new(HttpFetcher::new()),
            Box::new(FfmpegExtractor::new(&config.media)),
            Box::new(WhisperClient::new(&config.openai)),
            Box::new(VisionClient::new(&config.openai)),
        )
        .with_job_timeout(config.job_timeout)
    }

    /// Bound the whole job; on expiry the in-flight stage is abandoned
    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout;
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Externally reachable URL for a frame file
    pub fn frame_url(&self, file_name: &str) -> String {
        format!("{}/frames/{}", self.base_url, file_name)
    }

    /// Run one job to completion. Never panics on stage failure and always
    /// returns exactly one outcome.
    #[instrument(skip_all, fields(job_id = %Uuid::new_v4(), video_id = field::Empty))]
    pub async fn run(&self, request: JobRequest) -> JobOutcome {
        let job = match Job::from_request(request) {
            Ok(job) => job,
            Err(e) => {
                warn!(error = %e, "Job rejected");
                return e.into();
            }
        };
        Span::current().record("video_id", job.video_id.as_str());
        info!(url = %job.video_url, "Job accepted");

        let handle = match self.workspace.acquire(&job.video_id).await {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "Workspace unavailable");
                return e.into();
            }
        };

        let mut stage = Stage::Fetching;
        let result = match self.job_timeout {
            Some(limit) => {
                let timed = tokio::time::timeout(limit, self.process(&job, &handle, &mut stage)).await;
                match timed {
                    Ok(result) => result,
                    Err(_) => Err(IngestError::Timeout { stage, after: limit }),
                }
            }
            None => self.process(&job, &handle, &mut stage).await,
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(stage = %e.stage(), error = %e, "Job failed");
                e.into()
            }
        };

        let report = handle.release().await;
        if report.warnings > 0 {
            warn!(warnings = report.warnings, "Workspace released with warnings");
        }

        outcome
    }

    /// The stage sequence. `stage` always names the stage in flight.
    async fn process(
        &self,
        job: &Job,
        handle: &WorkspaceHandle,
        stage: &mut Stage,
    ) -> IngestResult<JobOutcome> {
        enter(stage, Stage::Fetching);
        let video_path = handle.video_path();
        self.fetcher.fetch(&job.video_url, &video_path).await?;

        enter(stage, Stage::Probing);
        let duration = self.extractor.probe_duration(&video_path).await?;
        let interval = compute_sampling_interval(duration, job.sampling.explicit_interval());
        info!(duration, interval, "Sampling interval chosen");

        enter(stage, Stage::Sampling);
        let frames = self
            .extractor
            .sample_frames(
                &video_path,
                &job.video_id,
                handle.frames_dir(),
                interval,
                job.max_frames,
            )
            .await?;
        let audio_path = self
            .extractor
            .extract_audio(&video_path, &job.video_id, handle.audio_dir())
            .await?;
        let artifact = MediaArtifact {
            video_path,
            frames,
            audio_path,
        };

        enter(stage, Stage::Transcribing);
        debug!(backend = self.transcriber.name(), "Transcribing audio");
        let transcription = self.transcriber.transcribe(&artifact.audio_path).await?;

        enter(stage, Stage::Gating);
        let decision = gate::evaluate(
            duration,
            job.min_duration_seconds,
            transcription.word_count,
            job.min_word_count,
        );
        if !decision.is_pass() {
            info!(%decision, "Quality gate rejected job, skipping description");
            return Ok(JobOutcome::ProcessedWithLimitation {
                reason: decision.to_string(),
                word_count: transcription.word_count,
                transcription: transcription.text,
            });
        }

        enter(stage, Stage::Synthesizing);
        debug!(backend = self.describer.name(), frames = artifact.frames.len(), "Describing video");
        let frame_urls: Vec<String> = artifact
            .frame_names()
            .iter()
            .map(|name| self.frame_url(name))
            .collect();
        let description = self
            .describer
            .describe(&frame_urls, &transcription.text, job.system_prompt.as_deref())
            .await?;

        info!("Job processed successfully");
        Ok(DescriptionResult {
            description,
            transcription: transcription.text,
        }
        .into())
    }
}

fn enter(stage: &mut Stage, next: Stage) {
    *stage = next;
    info!(stage = %next, "Entering stage");
}
