use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{JobRecord, JobSnapshot, JobState, JobType};
use crate::error::{MutecutError, Result};

/// Shared table of submitted jobs.
///
/// The lock is only ever held for in-memory bookkeeping. Output files of
/// evicted jobs are deleted after it is released.
pub struct JobStore {
    jobs: Mutex<HashMap<String, JobRecord>>,
    retention: Duration,
    max_jobs: usize,
}

impl JobStore {
    pub fn new(retention: Duration, max_jobs: usize) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            retention,
            max_jobs,
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, JobRecord>> {
        // A panicking holder cannot leave a record half-written
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// Register a new pending job and return its id.
    pub fn create(&self, job_type: JobType) -> String {
        let id = Uuid::new_v4().to_string();
        self.table()
            .insert(id.clone(), JobRecord::new(id.clone(), job_type));
        debug!("Created {} job {}", job_type, id);
        id
    }

    /// Move a job to `processing` with the given progress label. Ignored once
    /// the job is terminal.
    pub fn set_progress(&self, id: &str, progress: &str) {
        if let Some(record) = self.table().get_mut(id) {
            if record.status().is_terminal() {
                return;
            }
            record.state = JobState::Processing;
            record.progress = progress.to_string();
        }
    }

    /// Record the terminal outcome of a job. The first outcome wins.
    pub fn finish(&self, id: &str, state: JobState) {
        let mut jobs = self.table();
        let Some(record) = jobs.get_mut(id) else {
            warn!("Finished job {} is no longer tracked", id);
            return;
        };
        if record.status().is_terminal() {
            warn!("Job {} already finished as {}", id, record.status());
            drop(jobs);
            // The late outcome's file has no record to be claimed through
            if let JobState::Completed {
                output_path: Some(path),
                ..
            } = &state
            {
                remove_output(path);
            }
            return;
        }

        record.progress = match &state {
            JobState::Completed { .. } => "Complete".to_string(),
            JobState::NoSilence { .. } => "No silence detected".to_string(),
            JobState::Error { .. } => "Failed".to_string(),
            JobState::Pending | JobState::Processing => record.progress.clone(),
        };
        record.state = state;
        if record.status().is_terminal() {
            record.completed_at = Some(Instant::now());
            record.completed_at_utc = Some(Utc::now());
        }
    }

    pub fn snapshot(&self, id: &str) -> Option<JobSnapshot> {
        self.table().get(id).map(JobRecord::snapshot)
    }

    /// Hand the output file of a completed job to the caller. The record keeps
    /// its `completed` status but no longer owns the file, so a second call
    /// reports [`MutecutError::OutputNotFound`].
    pub fn take_output(&self, id: &str, expected: JobType) -> Result<PathBuf> {
        let mut jobs = self.table();
        let record = jobs
            .get_mut(id)
            .ok_or_else(|| MutecutError::JobNotFound(id.to_string()))?;

        if record.job_type != expected {
            return Err(MutecutError::WrongJobType {
                expected,
                actual: record.job_type,
            });
        }

        match &mut record.state {
            JobState::Completed { output_path, .. } => output_path
                .take()
                .ok_or_else(|| MutecutError::OutputNotFound(id.to_string())),
            other => Err(MutecutError::JobNotCompleted(other.status())),
        }
    }

    /// Evict finished jobs as of `now`.
    ///
    /// Finished jobs older than the retention period go first. If the table
    /// is still over `max_jobs`, the oldest finished jobs go next. Pending and
    /// processing jobs are never evicted. Returns the number of evicted jobs.
    pub fn sweep(&self, now: Instant) -> usize {
        let evicted = {
            let mut jobs = self.table();

            let mut expired: Vec<String> = jobs
                .values()
                .filter(|job| job.status().is_terminal())
                .filter(|job| now.saturating_duration_since(job.finished_or_created()) > self.retention)
                .map(|job| job.id.clone())
                .collect();

            let remaining = jobs.len() - expired.len();
            if remaining > self.max_jobs {
                let mut finished: Vec<(Instant, String)> = jobs
                    .values()
                    .filter(|job| job.status().is_terminal() && !expired.contains(&job.id))
                    .map(|job| (job.finished_or_created(), job.id.clone()))
                    .collect();
                finished.sort();
                expired.extend(
                    finished
                        .into_iter()
                        .take(remaining - self.max_jobs)
                        .map(|(_, id)| id),
                );
            }

            expired
                .iter()
                .filter_map(|id| jobs.remove(id))
                .collect::<Vec<_>>()
        };

        for record in &evicted {
            if let JobState::Completed {
                output_path: Some(path),
                ..
            } = &record.state
            {
                remove_output(path);
            }
        }

        if !evicted.is_empty() {
            info!("Evicted {} finished jobs", evicted.len());
        }
        evicted.len()
    }
}

fn remove_output(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove output {}: {}", path.display(), e),
    }
}
