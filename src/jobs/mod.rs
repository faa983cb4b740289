//! Asynchronous job tracking.
//!
//! - store: the shared job table, state transitions and eviction
//! - pipeline: the per-job work (download, analyse, transcode)
//! - orchestrator: submission, status, download and probe-only operations

pub mod orchestrator;
pub mod pipeline;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

pub use orchestrator::{Orchestrator, OutputDownload, SilenceReport};
pub use pipeline::ScratchDir;
pub use store::JobStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    NoSilence,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::NoSilence | JobStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::NoSilence => "no_silence",
            JobStatus::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    #[serde(rename = "remove-silence")]
    SilenceRemoval,
    #[serde(rename = "burn-captions")]
    CaptionBurn,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::SilenceRemoval => "remove-silence",
            JobType::CaptionBurn => "burn-captions",
        }
    }

    /// Suggested filename for the delivered output
    pub fn download_filename(self) -> &'static str {
        match self {
            JobType::SilenceRemoval => "cleaned_video.mp4",
            JobType::CaptionBurn => "captioned_video.mp4",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JobMetrics {
    SilenceRemoval {
        silence_removed: usize,
        time_saved_seconds: f64,
        input_size_mb: f64,
        output_size_mb: f64,
    },
    CaptionBurn {
        output_size_mb: f64,
    },
}

/// Where a job is in its lifecycle. Terminal variants carry exactly the data
/// that outcome produces.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Pending,
    Processing,
    Completed {
        /// Taken by the first download; `None` afterwards
        output_path: Option<PathBuf>,
        metrics: JobMetrics,
    },
    NoSilence {
        message: String,
    },
    Error {
        error: String,
    },
}

impl JobState {
    pub fn completed(output_path: PathBuf, metrics: JobMetrics) -> Self {
        JobState::Completed {
            output_path: Some(output_path),
            metrics,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        JobState::Error {
            error: error.into(),
        }
    }

    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Pending => JobStatus::Pending,
            JobState::Processing => JobStatus::Processing,
            JobState::Completed { .. } => JobStatus::Completed,
            JobState::NoSilence { .. } => JobStatus::NoSilence,
            JobState::Error { .. } => JobStatus::Error,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: String,
    pub job_type: JobType,
    pub state: JobState,
    pub progress: String,
    pub created_at: Instant,
    pub completed_at: Option<Instant>,
    pub created_at_utc: DateTime<Utc>,
    pub completed_at_utc: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn new(id: String, job_type: JobType) -> Self {
        Self {
            id,
            job_type,
            state: JobState::Pending,
            progress: "Queued".to_string(),
            created_at: Instant::now(),
            completed_at: None,
            created_at_utc: Utc::now(),
            completed_at_utc: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    /// Instant eviction ages this record from.
    pub fn finished_or_created(&self) -> Instant {
        self.completed_at.unwrap_or(self.created_at)
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let mut snapshot = JobSnapshot {
            job_id: self.id.clone(),
            job_type: self.job_type,
            status: self.status(),
            created_at: self.created_at_utc,
            progress: self.progress.clone(),
            completed_at: self.completed_at_utc,
            metrics: None,
            download_url: None,
            message: None,
            error: None,
        };

        match &self.state {
            JobState::Completed { metrics, .. } => {
                snapshot.metrics = Some(metrics.clone());
                snapshot.download_url =
                    Some(format!("/{}/download/{}", self.job_type, self.id));
            }
            JobState::NoSilence { message } => snapshot.message = Some(message.clone()),
            JobState::Error { error } => snapshot.error = Some(error.clone()),
            JobState::Pending | JobState::Processing => {}
        }

        snapshot
    }
}

/// Read-only, serialisable view of a job handed to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub job_type: JobType,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub progress: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub metrics: Option<JobMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
