use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{MutecutError, Result};

fn default_fonts_dir() -> PathBuf {
    PathBuf::from("fonts")
}

fn default_max_concurrent() -> usize {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub media: MediaConfig,
    pub jobs: JobsConfig,
    pub download: DownloadConfig,
    pub silence: SilenceConfig,
    pub captions: CaptionsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub ffmpeg_path: String,
    /// Path to ffprobe binary
    pub ffprobe_path: String,
    /// Directory with caption fonts handed to the subtitles filter
    #[serde(default = "default_fonts_dir")]
    pub fonts_dir: PathBuf,
    /// Encoding used when re-joining kept segments
    /// - preset: encoding speed (ultrafast, fast, medium, slow, veryslow)
    /// - crf: quality (0-51, lower = better quality, 23 is default)
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Scratch directory for `{id}_input`, `{id}_subs` and `{id}_output` files
    pub scratch_dir: PathBuf,
    /// Seconds a finished job is kept before eviction
    pub retention_secs: u64,
    /// Table size above which the oldest finished jobs are evicted
    pub max_jobs: usize,
    /// Number of engine pipelines allowed to run at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SilenceConfig {
    /// Noise floor handed to silencedetect, e.g. `-30dB`
    pub noise_level: String,
    /// Shortest pause (seconds) that counts as silence
    pub min_duration: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionsConfig {
    pub words_per_line: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            media: MediaConfig {
                ffmpeg_path: "ffmpeg".to_string(),
                ffprobe_path: "ffprobe".to_string(),
                fonts_dir: default_fonts_dir(),
                video_codec: "libx264".to_string(),
                preset: "medium".to_string(),
                crf: 23,
                audio_codec: "aac".to_string(),
                audio_bitrate: "192k".to_string(),
            },
            jobs: JobsConfig {
                scratch_dir: std::env::temp_dir().join("mutecut"),
                retention_secs: 900,
                max_jobs: 50,
                max_concurrent: default_max_concurrent(),
            },
            download: DownloadConfig {
                timeout_secs: 300,
                user_agent: concat!("mutecut/", env!("CARGO_PKG_VERSION")).to_string(),
            },
            silence: SilenceConfig {
                noise_level: "-30dB".to_string(),
                min_duration: 0.5,
            },
            captions: CaptionsConfig { words_per_line: 5 },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MutecutError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| MutecutError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| MutecutError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| MutecutError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.jobs.max_jobs == 0 {
            return Err(MutecutError::Config("jobs.max_jobs must be positive".to_string()));
        }
        if self.jobs.max_concurrent == 0 {
            return Err(MutecutError::Config(
                "jobs.max_concurrent must be positive".to_string(),
            ));
        }
        if self.download.timeout_secs == 0 {
            return Err(MutecutError::Config(
                "download.timeout_secs must be positive".to_string(),
            ));
        }
        if self.captions.words_per_line == 0 {
            return Err(MutecutError::Config(
                "captions.words_per_line must be positive".to_string(),
            ));
        }
        if !(self.silence.min_duration > 0.0) {
            return Err(MutecutError::Config(
                "silence.min_duration must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl JobsConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}
