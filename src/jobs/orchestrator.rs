use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use super::pipeline::{remove_scratch_file, Pipeline};
use super::{JobSnapshot, JobState, JobStore, JobType, ScratchDir};
use crate::config::{Config, JobsConfig};
use crate::error::{MutecutError, Result};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::media::{FfmpegEngine, MediaEngine};
use crate::request::{CaptionJobSpec, SilenceRemovalSpec, SrtSpec};
use crate::timeline::{total_silence, SilenceInterval};

/// Size of each chunk written by [`OutputDownload::copy_to`].
pub const DOWNLOAD_CHUNK_BYTES: usize = 256 * 1024;

/// Entry point for submitting and tracking jobs.
///
/// Each submitted job runs on its own tokio task. At most
/// `jobs.max_concurrent` jobs touch the media engine at a time; the rest wait
/// in `pending`.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<JobStore>,
    pipeline: Arc<Pipeline>,
    limiter: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn new(
        config: &JobsConfig,
        engine: Arc<dyn MediaEngine>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config.scratch_dir)?;

        let store = Arc::new(JobStore::new(config.retention(), config.max_jobs));
        let pipeline = Pipeline::new(
            engine,
            fetcher,
            Arc::clone(&store),
            ScratchDir::new(&config.scratch_dir),
        );

        Ok(Self {
            store,
            pipeline: Arc::new(pipeline),
            limiter: Arc::new(Semaphore::new(config.max_concurrent)),
        })
    }

    /// Build an orchestrator backed by ffmpeg and an HTTP fetcher.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.jobs,
            Arc::new(FfmpegEngine::new(&config.media)),
            Arc::new(HttpFetcher::new(&config.download)?),
        )
    }

    /// Queue a silence-removal job and return its id. Must be called from
    /// within a tokio runtime.
    pub fn submit_silence_removal(&self, spec: SilenceRemovalSpec) -> String {
        self.spawn_job(JobType::SilenceRemoval, move |pipeline, id| async move {
            pipeline.remove_silence(&id, &spec).await
        })
    }

    /// Queue a caption-burn job and return its id. Must be called from within
    /// a tokio runtime.
    pub fn submit_caption_burn(&self, spec: CaptionJobSpec) -> String {
        self.spawn_job(JobType::CaptionBurn, move |pipeline, id| async move {
            pipeline.burn_captions(&id, &spec).await
        })
    }

    fn spawn_job<F, Fut>(&self, job_type: JobType, work: F) -> String
    where
        F: FnOnce(Arc<Pipeline>, String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<JobState>> + Send + 'static,
    {
        self.store.sweep(Instant::now());
        let job_id = self.store.create(job_type);
        info!("[Job {}] Submitted {} job", job_id, job_type);

        let store = Arc::clone(&self.store);
        let pipeline = Arc::clone(&self.pipeline);
        let limiter = Arc::clone(&self.limiter);
        let id = job_id.clone();

        tokio::spawn(async move {
            let state = match limiter.acquire_owned().await {
                Ok(permit) => {
                    let worker_id = id.clone();
                    // A panic inside the worker surfaces as a JoinError here
                    let worker = tokio::spawn(async move {
                        let _permit = permit;
                        work(pipeline, worker_id).await
                    });
                    match worker.await {
                        Ok(Ok(state)) => state,
                        Ok(Err(e)) => {
                            error!("[Job {}] Failed: {}", id, e);
                            JobState::failed(e.to_string())
                        }
                        Err(e) => {
                            error!("[Job {}] Worker stopped: {}", id, e);
                            JobState::failed(format!("Job worker stopped unexpectedly: {}", e))
                        }
                    }
                }
                Err(_) => JobState::failed("Job scheduler is shut down"),
            };

            info!("[Job {}] Finished with status {}", id, state.status());
            store.finish(&id, state);
        });

        job_id
    }

    /// Current view of a job.
    pub fn status(&self, job_id: &str) -> Result<JobSnapshot> {
        self.store.sweep(Instant::now());
        self.store
            .snapshot(job_id)
            .ok_or_else(|| MutecutError::JobNotFound(job_id.to_string()))
    }

    /// Claim the output of a completed job. The output can be claimed once.
    pub async fn download(&self, job_id: &str, job_type: JobType) -> Result<OutputDownload> {
        let path = self.store.take_output(job_id, job_type)?;

        let size = match fs::metadata(&path).await {
            Ok(metadata) => metadata.len(),
            Err(_) => return Err(MutecutError::OutputNotFound(job_id.to_string())),
        };

        info!("[Job {}] Serving {} ({} bytes)", job_id, path.display(), size);
        Ok(OutputDownload {
            path,
            size,
            filename: job_type.download_filename(),
            delivered: false,
        })
    }

    /// Download a video and report its silence without producing output.
    pub async fn probe_silence(&self, spec: &SilenceRemovalSpec) -> Result<SilenceReport> {
        let _permit = self.limiter.acquire().await.ok();

        let temp_path = tempfile::Builder::new()
            .prefix("probe_")
            .suffix(".mp4")
            .tempfile_in(self.pipeline.scratch().path())?
            .into_temp_path();

        self.pipeline.fetcher().fetch(&spec.video_url, &temp_path).await?;
        let engine = self.pipeline.engine();
        let silences = engine
            .detect_silence(&temp_path, &spec.noise_level, spec.min_duration)
            .await?;
        let duration = engine.probe_duration(&temp_path).await?;

        Ok(SilenceReport::new(duration, &silences))
    }

    /// Render SRT text for a word list. No video is involved.
    pub fn create_srt(&self, spec: &SrtSpec) -> Result<String> {
        spec.render()
    }

    /// Fail early when the media engine binaries are missing.
    pub async fn check_engine(&self) -> Result<()> {
        self.pipeline.engine().check_availability().await
    }
}

/// One-shot handle on a finished job's output file. The file is deleted once
/// it has been copied out, or when the handle is dropped unused.
#[derive(Debug)]
pub struct OutputDownload {
    path: PathBuf,
    size: u64,
    filename: &'static str,
    delivered: bool,
}

impl OutputDownload {
    pub const CONTENT_TYPE: &'static str = "video/mp4";

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn filename(&self) -> &'static str {
        self.filename
    }

    /// Stream the file into `writer` and delete it afterwards, whether or not
    /// the copy succeeded.
    pub async fn copy_to<W>(mut self, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let result = self.stream(writer).await;
        remove_scratch_file(&self.path).await;
        self.delivered = true;
        result
    }

    async fn stream<W>(&self, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut file = fs::File::open(&self.path).await?;
        let mut buffer = vec![0u8; DOWNLOAD_CHUNK_BYTES];
        let mut copied: u64 = 0;

        loop {
            let read = file.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            writer.write_all(&buffer[..read]).await?;
            copied += read as u64;
        }

        writer.flush().await?;
        Ok(copied)
    }
}

impl Drop for OutputDownload {
    fn drop(&mut self) {
        if self.delivered {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => info!("Discarded unclaimed output {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove output {}: {}", self.path.display(), e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SilencePeriod {
    pub start: f64,
    pub end: f64,
    pub duration: f64,
}

/// Result of the probe-only silence analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SilenceReport {
    pub video_duration: f64,
    pub silence_periods: usize,
    pub total_silence_duration: f64,
    pub silence_percentage: f64,
    pub silences: Vec<SilencePeriod>,
}

impl SilenceReport {
    pub fn new(video_duration: f64, silences: &[SilenceInterval]) -> Self {
        let total = total_silence(silences);
        Self {
            video_duration,
            silence_periods: silences.len(),
            total_silence_duration: total,
            silence_percentage: if video_duration > 0.0 {
                total / video_duration * 100.0
            } else {
                0.0
            },
            silences: silences
                .iter()
                .map(|s| SilencePeriod {
                    start: s.start,
                    end: s.end,
                    duration: s.duration(),
                })
                .collect(),
        }
    }
}
