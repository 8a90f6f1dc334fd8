//! Command-line interface for vidscribe.
//!
//! Provides commands for ingesting a single video, serving the HTTP API,
//! and inspecting the resolved configuration.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{mask_secret, ResolvedConfig};
use crate::core::IngestionController;
use crate::domain::{JobOutcome, JobRequest};
use crate::server;

/// vidscribe - describe remote videos from sampled frames and transcripts
#[derive(Parser, Debug)]
#[command(name = "vidscribe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest one video and print the outcome as JSON
    Ingest {
        /// Remote video URL
        url: String,

        /// Identifier used to namespace workspace files
        #[arg(long)]
        video_id: Option<String>,

        /// Explicit frame interval in seconds (adaptive if omitted)
        #[arg(long)]
        frame_interval: Option<u32>,

        /// Maximum number of frames to keep
        #[arg(long)]
        max_frames: Option<usize>,

        /// Minimum video duration in seconds
        #[arg(long)]
        min_duration: Option<f64>,

        /// Minimum transcript word count
        #[arg(long)]
        min_words: Option<usize>,

        /// Override the description instruction
        #[arg(long)]
        system_prompt: Option<String>,
    },

    /// Start the HTTP server
    Serve {
        /// Address to bind to (overrides VIDSCRIBE_BIND and the config file)
        #[arg(short, long)]
        address: Option<String>,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = ResolvedConfig::load().context("Failed to load configuration")?;

        match self.command {
            Commands::Ingest {
                url,
                video_id,
                frame_interval,
                max_frames,
                min_duration,
                min_words,
                system_prompt,
            } => {
                let request = JobRequest {
                    video_id,
                    video_url: Some(url),
                    frame_interval,
                    max_frames,
                    min_duration,
                    min_words,
                    system_prompt,
                };
                ingest(&config, request).await
            }
            Commands::Serve { address } => {
                let mut config = config;
                if let Some(address) = address {
                    config.bind = address;
                }
                server::serve(&config).await
            }
            Commands::Config => {
                show_config(&config);
                Ok(())
            }
        }
    }
}

/// Run one job and print its outcome
async fn ingest(config: &ResolvedConfig, request: JobRequest) -> Result<()> {
    config.validate()?;

    let controller = IngestionController::from_config(config);
    let outcome = controller.run(request).await;

    let json = serde_json::to_string_pretty(&outcome).context("Failed to serialize outcome")?;
    println!("{}", json);

    if let JobOutcome::Failed { stage, message } = outcome {
        anyhow::bail!("Job failed during {}: {}", stage, message);
    }

    Ok(())
}

fn show_config(config: &ResolvedConfig) {
    println!("vidscribe configuration");
    println!();
    println!(
        "Config file: {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Service:");
    println!(
        "  Base URL:  {}",
        if config.base_url.is_empty() {
            "<unset>"
        } else {
            config.base_url.as_str()
        }
    );
    println!("  Bind:      {}", config.bind);
    println!(
        "  Timeout:   {}",
        config
            .job_timeout
            .map(|t| format!("{}s", t.as_secs()))
            .unwrap_or_else(|| "none".to_string())
    );
    println!();
    println!("Workspace:   {}", config.workspace_root.display());
    println!();
    println!("OpenAI:");
    println!("  API key:       {}", mask_secret(&config.openai.api_key));
    println!("  API base:      {}", config.openai.api_base);
    println!("  Transcription: {}", config.openai.transcription_model);
    println!("  Vision:        {}", config.openai.vision_model);
    println!("  Max tokens:    {}", config.openai.max_tokens);
    println!("  Image detail:  {}", config.openai.image_detail);
    println!();
    println!("Media:");
    println!("  ffmpeg:        {}", config.media.ffmpeg_path);
    println!("  ffprobe:       {}", config.media.ffprobe_path);
    println!("  JPEG quality:  {}", config.media.jpeg_quality);
    println!("  Audio bitrate: {}", config.media.audio_bitrate);
}
