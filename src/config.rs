//! Configuration for vidscribe.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (BASE_URL, OPENAI_API_KEY, VIDSCRIBE_WORKSPACE, ...)
//! 2. Config file (.vidscribe/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .vidscribe/config.yaml
//! - Paths in config file are relative to the project root (parent of .vidscribe/)
//!
//! Configuration is resolved once at start-up and handed to each component
//! constructor. Components never read the environment themselves.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub bind: Option<String>,
    #[serde(default)]
    pub job_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub openai: Option<OpenAiConfig>,
    #[serde(default)]
    pub media: Option<MediaConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiConfig {
    pub api_base: Option<String>,
    pub transcription_model: Option<String>,
    pub vision_model: Option<String>,
    pub max_tokens: Option<u32>,
    pub image_detail: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaConfig {
    pub ffmpeg_path: Option<String>,
    pub ffprobe_path: Option<String>,
    pub jpeg_quality: Option<u8>,
    pub audio_bitrate: Option<String>,
}

/// Settings for the OpenAI-compatible transcription and vision endpoints
#[derive(Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub api_base: String,
    pub transcription_model: String,
    pub vision_model: String,
    pub max_tokens: u32,
    /// Image rendering fidelity requested for frames ("low", "high", "auto")
    pub image_detail: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: "https://api.openai.com/v1".to_string(),
            transcription_model: "whisper-1".to_string(),
            vision_model: "gpt-4o-mini".to_string(),
            max_tokens: 2048,
            image_detail: "low".to_string(),
        }
    }
}

// Keeps the key out of logs and `config` output
impl fmt::Debug for OpenAiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiSettings")
            .field("api_key", &mask_secret(&self.api_key))
            .field("api_base", &self.api_base)
            .field("transcription_model", &self.transcription_model)
            .field("vision_model", &self.vision_model)
            .field("max_tokens", &self.max_tokens)
            .field("image_detail", &self.image_detail)
            .finish()
    }
}

/// Transcoder settings
#[derive(Debug, Clone)]
pub struct MediaSettings {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub jpeg_quality: u8,
    pub audio_bitrate: String,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            jpeg_quality: 9,
            audio_bitrate: "64k".to_string(),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Public base URL under which `/frames/<name>` is reachable (no trailing slash)
    pub base_url: String,
    /// Root holding the uploads/, frames/ and audio/ areas
    pub workspace_root: PathBuf,
    /// HTTP bind address for `serve`
    pub bind: String,
    /// Per-job deadline, if any
    pub job_timeout: Option<Duration>,
    pub openai: OpenAiSettings,
    pub media: MediaSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            workspace_root: PathBuf::from("."),
            bind: "0.0.0.0:5001".to_string(),
            job_timeout: None,
            openai: OpenAiSettings::default(),
            media: MediaSettings::default(),
            config_file: None,
        }
    }
}

impl ResolvedConfig {
    /// Load configuration from all sources
    pub fn load() -> Result<Self> {
        let config_file = find_config_file();
        let file = match config_file {
            Some(ref path) => load_config_file(path)?,
            None => ConfigFile::default(),
        };

        // Project root is the parent of .vidscribe/
        let base_dir = config_file
            .as_deref()
            .and_then(Path::parent)
            .and_then(Path::parent)
            .map(Path::to_path_buf);

        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Ok(Self::resolve(file, base_dir.as_deref(), config_file, env))
    }

    /// Merge file values, environment lookups and defaults
    fn resolve(
        file: ConfigFile,
        base_dir: Option<&Path>,
        config_file: Option<PathBuf>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let defaults = Self::default();
        let openai_file = file.openai.unwrap_or_default();
        let media_file = file.media.unwrap_or_default();

        let base_url = env("BASE_URL")
            .or(file.base_url)
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .unwrap_or_default();

        let workspace_root = if let Some(root) = env("VIDSCRIBE_WORKSPACE") {
            PathBuf::from(root)
        } else if let Some(ref root) = file.workspace {
            resolve_path(base_dir.unwrap_or(Path::new(".")), root)
        } else {
            defaults.workspace_root
        };

        let openai = OpenAiSettings {
            api_key: env("OPENAI_API_KEY").unwrap_or_default(),
            api_base: env("OPENAI_API_BASE")
                .or(openai_file.api_base)
                .map(|b| b.trim_end_matches('/').to_string())
                .unwrap_or(defaults.openai.api_base),
            transcription_model: openai_file
                .transcription_model
                .unwrap_or(defaults.openai.transcription_model),
            vision_model: openai_file.vision_model.unwrap_or(defaults.openai.vision_model),
            max_tokens: openai_file.max_tokens.unwrap_or(defaults.openai.max_tokens),
            image_detail: openai_file.image_detail.unwrap_or(defaults.openai.image_detail),
        };

        let media = MediaSettings {
            ffmpeg_path: env("FFMPEG_PATH")
                .or(media_file.ffmpeg_path)
                .unwrap_or(defaults.media.ffmpeg_path),
            ffprobe_path: env("FFPROBE_PATH")
                .or(media_file.ffprobe_path)
                .unwrap_or(defaults.media.ffprobe_path),
            jpeg_quality: media_file.jpeg_quality.unwrap_or(defaults.media.jpeg_quality),
            audio_bitrate: media_file.audio_bitrate.unwrap_or(defaults.media.audio_bitrate),
        };

        Self {
            base_url,
            workspace_root,
            bind: env("VIDSCRIBE_BIND").or(file.bind).unwrap_or(defaults.bind),
            job_timeout: file.job_timeout_seconds.map(Duration::from_secs),
            openai,
            media,
            config_file,
        }
    }

    /// Check the values ingestion cannot run without
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            anyhow::bail!("BASE_URL is not set; frames must be reachable by URL");
        }
        if self.openai.api_key.is_empty() {
            anyhow::bail!("OPENAI_API_KEY is not set");
        }
        Ok(())
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".vidscribe").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Show only the last four characters of a secret
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return "<unset>".to_string();
    }
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}
