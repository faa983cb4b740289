use thiserror::Error;

use crate::jobs::{JobStatus, JobType};

#[derive(Error, Debug)]
pub enum MutecutError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Validation(String),

    #[error("words must be a list of objects: {0}")]
    InvalidWords(String),

    #[error("words list is empty")]
    EmptyWords,

    #[error(
        "Video URL returned 404. The URL may be expired or invalid. If you're trying to use a \
         processed video from this service, download it first and upload it to a storage service."
    )]
    DownloadNotFound { url: String },

    #[error("Failed to download video: {0}")]
    DownloadFailed(String),

    #[error("{message}")]
    Engine {
        message: String,
        exit_code: Option<i32>,
        diagnostics: String,
    },

    #[error("Failed to read media duration: {0}")]
    Probe(String),

    #[error("No segments to keep: the whole video is silent")]
    NoSegmentsToKeep,

    #[error("Job not found. Job may have expired or never existed: {0}")]
    JobNotFound(String),

    #[error("Job is of type {actual}, not {expected}. Use /{actual}/download/ instead.")]
    WrongJobType { expected: JobType, actual: JobType },

    #[error("Job is not completed. Current status: {0}")]
    JobNotCompleted(JobStatus),

    #[error("Output file not found. It may have been cleaned up: {0}")]
    OutputNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MutecutError {
    /// Conditions an outer routing layer reports as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::JobNotFound(_) | Self::OutputNotFound(_))
    }

    /// Conditions caused by the caller rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::InvalidWords(_)
                | Self::EmptyWords
                | Self::WrongJobType { .. }
                | Self::JobNotCompleted(_)
        ) || self.is_not_found()
    }
}

pub type Result<T> = std::result::Result<T, MutecutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(MutecutError::JobNotFound("abc".into()).is_not_found());
        assert!(MutecutError::OutputNotFound("abc".into()).is_client_error());
        assert!(MutecutError::JobNotCompleted(JobStatus::Processing).is_client_error());
        assert!(!MutecutError::JobNotCompleted(JobStatus::Processing).is_not_found());
        assert!(!MutecutError::NoSegmentsToKeep.is_client_error());
    }

    #[test]
    fn test_wrong_job_type_message_names_actual_route() {
        let err = MutecutError::WrongJobType {
            expected: JobType::SilenceRemoval,
            actual: JobType::CaptionBurn,
        };
        assert_eq!(
            err.to_string(),
            "Job is of type burn-captions, not remove-silence. Use /burn-captions/download/ instead."
        );
    }
}
