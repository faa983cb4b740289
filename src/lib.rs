//! Mutecut - silence removal and caption burning for remote videos
//!
//! Videos are fetched over HTTP, processed by ffmpeg in background jobs and
//! handed back once through a one-shot download.

pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod jobs;
pub mod media;
pub mod request;
pub mod style;
pub mod subtitle;
pub mod timeline;
