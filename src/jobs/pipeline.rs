use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

use super::{JobMetrics, JobState, JobStore};
use crate::error::{MutecutError, Result};
use crate::fetch::Fetcher;
use crate::media::MediaEngine;
use crate::request::{CaptionJobSpec, SilenceRemovalSpec};
use crate::subtitle::{apply_thin_space, generate_cues, normalize_whitespace, write_srt};
use crate::timeline::{plan_keep_segments, total_silence, FilterGraph};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Per-job file layout inside the scratch directory.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn input(&self, job_id: &str) -> PathBuf {
        self.root.join(format!("{}_input.mp4", job_id))
    }

    pub fn subtitles(&self, job_id: &str) -> PathBuf {
        self.root.join(format!("{}_subs.srt", job_id))
    }

    pub fn output(&self, job_id: &str) -> PathBuf {
        self.root.join(format!("{}_output.mp4", job_id))
    }
}

/// Runs the work behind a single job and reports progress into the store.
pub struct Pipeline {
    engine: Arc<dyn MediaEngine>,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<JobStore>,
    scratch: ScratchDir,
}

impl Pipeline {
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<JobStore>,
        scratch: ScratchDir,
    ) -> Self {
        Self {
            engine,
            fetcher,
            store,
            scratch,
        }
    }

    pub fn engine(&self) -> &dyn MediaEngine {
        self.engine.as_ref()
    }

    pub fn fetcher(&self) -> &dyn Fetcher {
        self.fetcher.as_ref()
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    /// Download, detect silence, cut it out. The downloaded input is always
    /// removed; the output is removed unless the job completes.
    pub async fn remove_silence(&self, job_id: &str, spec: &SilenceRemovalSpec) -> Result<JobState> {
        let input_path = self.scratch.input(job_id);
        let output_path = self.scratch.output(job_id);

        self.store.set_progress(job_id, "Downloading video...");
        info!("[Job {}] Downloading video from {}", job_id, spec.video_url);
        let result = match self.fetcher.fetch(&spec.video_url, &input_path).await {
            Ok(_) => {
                self.cut_silence(job_id, &input_path, &output_path, spec)
                    .await
            }
            Err(e) => Err(e),
        };

        remove_scratch_file(&input_path).await;
        if !matches!(result, Ok(JobState::Completed { .. })) {
            remove_scratch_file(&output_path).await;
        }
        result
    }

    async fn cut_silence(
        &self,
        job_id: &str,
        input_path: &Path,
        output_path: &Path,
        spec: &SilenceRemovalSpec,
    ) -> Result<JobState> {
        self.store.set_progress(job_id, "Detecting silence...");
        let silences = self
            .engine
            .detect_silence(input_path, &spec.noise_level, spec.min_duration)
            .await?;

        if silences.is_empty() {
            info!("[Job {}] No silence detected", job_id);
            return Ok(JobState::NoSilence {
                message: "No silence found".to_string(),
            });
        }

        self.store.set_progress(job_id, "Analyzing video...");
        let duration = self.engine.probe_duration(input_path).await?;
        let segments = plan_keep_segments(&silences, duration);
        if segments.is_empty() {
            return Err(MutecutError::NoSegmentsToKeep);
        }

        self.store.set_progress(job_id, "Removing silence...");
        let graph = FilterGraph::build(&segments);
        self.engine
            .remove_silence(input_path, output_path, &graph)
            .await?;

        let input_size_mb = file_size_mb(input_path).await?;
        let output_size_mb = file_size_mb(output_path).await?;
        let time_saved_seconds = total_silence(&silences);
        info!(
            "[Job {}] Removed {} silent periods, saved {:.2}s ({:.2}MB -> {:.2}MB)",
            job_id,
            silences.len(),
            time_saved_seconds,
            input_size_mb,
            output_size_mb
        );

        Ok(JobState::completed(
            output_path.to_path_buf(),
            JobMetrics::SilenceRemoval {
                silence_removed: silences.len(),
                time_saved_seconds,
                input_size_mb,
                output_size_mb,
            },
        ))
    }

    /// Download, render subtitles, burn them in. Input and subtitle files are
    /// always removed; the output is removed unless the job completes.
    pub async fn burn_captions(&self, job_id: &str, spec: &CaptionJobSpec) -> Result<JobState> {
        let input_path = self.scratch.input(job_id);
        let srt_path = self.scratch.subtitles(job_id);
        let output_path = self.scratch.output(job_id);

        self.store.set_progress(job_id, "Downloading video...");
        info!(
            "[Job {}] Burning {} words onto {}",
            job_id,
            spec.words.len(),
            spec.video_url
        );
        let result = match self.fetcher.fetch(&spec.video_url, &input_path).await {
            Ok(_) => {
                self.caption(job_id, &input_path, &srt_path, &output_path, spec)
                    .await
            }
            Err(e) => Err(e),
        };

        remove_scratch_file(&input_path).await;
        remove_scratch_file(&srt_path).await;
        if result.is_err() {
            remove_scratch_file(&output_path).await;
        }
        result
    }

    async fn caption(
        &self,
        job_id: &str,
        input_path: &Path,
        srt_path: &Path,
        output_path: &Path,
        spec: &CaptionJobSpec,
    ) -> Result<JobState> {
        self.store.set_progress(job_id, "Creating SRT file...");
        let mut words = spec.words.clone();
        normalize_whitespace(&mut words);
        let mut cues = generate_cues(&words, &spec.cue_options)?;
        apply_thin_space(&mut cues);
        write_srt(&cues, srt_path).await?;

        self.store.set_progress(job_id, "Burning captions...");
        self.engine
            .burn_captions(input_path, srt_path, output_path, &spec.style)
            .await?;

        let output_size_mb = file_size_mb(output_path).await?;
        info!("[Job {}] Captions burned ({:.2}MB)", job_id, output_size_mb);

        Ok(JobState::completed(
            output_path.to_path_buf(),
            JobMetrics::CaptionBurn { output_size_mb },
        ))
    }
}

async fn file_size_mb(path: &Path) -> Result<f64> {
    let metadata = fs::metadata(path).await?;
    Ok(metadata.len() as f64 / BYTES_PER_MB)
}

pub(crate) async fn remove_scratch_file(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}
