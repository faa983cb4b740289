use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use tokio::process::Command;
use tracing::{debug, info};

use super::{EncodingOptions, MediaCommandBuilder, MediaEngine};
use crate::config::MediaConfig;
use crate::error::{MutecutError, Result};
use crate::style::CaptionStyleSheet;
use crate::timeline::{FilterGraph, SilenceInterval};

static SILENCE_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"silence_start: (-?[\d.]+)").unwrap());
static SILENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"silence_end: (-?[\d.]+)").unwrap());

/// Collects `silence_start` / `silence_end` markers from silencedetect output.
#[derive(Debug, Default)]
pub struct SilenceMarkers {
    starts: Vec<f64>,
    ends: Vec<f64>,
}

impl SilenceMarkers {
    pub fn scan_line(&mut self, line: &str) {
        for caps in SILENCE_START.captures_iter(line) {
            if let Ok(v) = caps[1].parse::<f64>() {
                self.starts.push(v);
            }
        }
        for caps in SILENCE_END.captures_iter(line) {
            if let Ok(v) = caps[1].parse::<f64>() {
                self.ends.push(v);
            }
        }
    }

    /// Pair markers positionally. A trailing start without an end is dropped.
    /// Starts slightly before zero (encoder priming) are clamped to zero.
    pub fn into_intervals(self) -> Vec<SilenceInterval> {
        self.starts
            .into_iter()
            .zip(self.ends)
            .map(|(start, end)| SilenceInterval::new(start.max(0.0), end))
            .collect()
    }
}

/// Parse silence intervals out of a complete diagnostic dump.
pub fn parse_silence_output(output: &str) -> Vec<SilenceInterval> {
    let mut markers = SilenceMarkers::default();
    for line in output.lines() {
        markers.scan_line(line);
    }
    markers.into_intervals()
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<serde_json::Value>,
}

/// Extract `format.duration` from ffprobe's JSON output.
pub fn parse_probe_duration(stdout: &str) -> Result<f64> {
    let output: ProbeOutput = serde_json::from_str(stdout)
        .map_err(|e| MutecutError::Probe(format!("invalid prober output: {}", e)))?;

    let value = output
        .format
        .and_then(|f| f.duration)
        .ok_or_else(|| MutecutError::Probe("duration field missing".to_string()))?;

    let duration = match &value {
        serde_json::Value::String(s) => s.parse::<f64>().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    };

    duration
        .filter(|d| d.is_finite())
        .ok_or_else(|| MutecutError::Probe(format!("duration is not numeric: {}", value)))
}

/// ffmpeg/ffprobe-backed [`MediaEngine`]
pub struct FfmpegEngine {
    ffprobe_path: String,
    fonts_dir: PathBuf,
    encoding: EncodingOptions,
    command_builder: MediaCommandBuilder,
}

impl FfmpegEngine {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            ffprobe_path: config.ffprobe_path.clone(),
            fonts_dir: config.fonts_dir.clone(),
            encoding: EncodingOptions {
                video_codec: config.video_codec.clone(),
                preset: config.preset.clone(),
                crf: config.crf,
                audio_codec: config.audio_codec.clone(),
                audio_bitrate: config.audio_bitrate.clone(),
            },
            command_builder: MediaCommandBuilder::new(&config.ffmpeg_path),
        }
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        debug!("Probing duration of {}", path.display());

        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "error", "-show_entries", "format=duration", "-of", "json"])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| MutecutError::Probe(format!("Failed to execute prober: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MutecutError::Probe(format!("prober failed: {}", stderr.trim())));
        }

        let duration = parse_probe_duration(&String::from_utf8_lossy(&output.stdout))?;
        info!("Video duration: {:.2}s", duration);
        Ok(duration)
    }

    async fn detect_silence(
        &self,
        path: &Path,
        noise_level: &str,
        min_duration: f64,
    ) -> Result<Vec<SilenceInterval>> {
        info!(
            "Detecting silence (threshold: {}, min duration: {}s)",
            noise_level, min_duration
        );

        let command = self
            .command_builder
            .detect_silence(path, noise_level, min_duration);

        // Markers are scanned while streaming; the retained tail is too short to hold them all.
        let mut markers = SilenceMarkers::default();
        let output = command.invoke_with(|line| markers.scan_line(line)).await?;
        output.into_result(&command.description)?;

        let silences = markers.into_intervals();
        info!("Found {} silent periods", silences.len());
        Ok(silences)
    }

    async fn remove_silence(
        &self,
        input_path: &Path,
        output_path: &Path,
        graph: &FilterGraph,
    ) -> Result<()> {
        info!(
            "Removing silence from {} -> {} ({} segments)",
            input_path.display(),
            output_path.display(),
            graph.segment_count()
        );

        self.command_builder
            .remove_silence(input_path, output_path, graph, &self.encoding)
            .execute()
            .await?;

        info!("Silence removal completed successfully");
        Ok(())
    }

    async fn burn_captions(
        &self,
        input_path: &Path,
        subtitle_path: &Path,
        output_path: &Path,
        style: &CaptionStyleSheet,
    ) -> Result<()> {
        info!("Burning captions using font: {}", style.font_name);

        self.command_builder
            .burn_captions(input_path, subtitle_path, output_path, &self.fonts_dir, style)
            .execute()
            .await?;

        info!("Captions burned successfully");
        Ok(())
    }

    async fn check_availability(&self) -> Result<()> {
        self.command_builder.version_check().execute().await?;

        let probe = Command::new(&self.ffprobe_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| MutecutError::Probe(format!("Prober not found: {}", e)))?;
        if !probe.status.success() {
            return Err(MutecutError::Probe("Prober version check failed".to_string()));
        }

        info!("Media engine is available");
        Ok(())
    }
}
