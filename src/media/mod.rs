// Gateway to the external transcoder (ffmpeg) and prober (ffprobe)
//
// - commands: command builders, bounded diagnostic capture
// - gateway: ffmpeg-backed MediaEngine implementation and output parsing

pub mod commands;
pub mod gateway;

use async_trait::async_trait;
use std::path::Path;

pub use commands::*;
pub use gateway::*;

use crate::error::Result;
use crate::style::CaptionStyleSheet;
use crate::timeline::{FilterGraph, SilenceInterval};

/// Operations the job pipelines need from the media engine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Media duration in seconds
    async fn probe_duration(&self, path: &Path) -> Result<f64>;

    /// Silent windows, in stream order
    async fn detect_silence(
        &self,
        path: &Path,
        noise_level: &str,
        min_duration: f64,
    ) -> Result<Vec<SilenceInterval>>;

    /// Encode the segments kept by `graph` into `output_path`
    async fn remove_silence(
        &self,
        input_path: &Path,
        output_path: &Path,
        graph: &FilterGraph,
    ) -> Result<()>;

    /// Burn the SRT file into the video stream
    async fn burn_captions(
        &self,
        input_path: &Path,
        subtitle_path: &Path,
        output_path: &Path,
        style: &CaptionStyleSheet,
    ) -> Result<()>;

    /// Check if the engine binaries are available
    async fn check_availability(&self) -> Result<()>;
}
