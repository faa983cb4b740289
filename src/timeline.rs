//! Silence windows to keep segments, and keep segments to an ffmpeg filter graph.
//!
//! The planner never re-sorts or merges its input: silence intervals are
//! expected in ascending, non-overlapping order as ffmpeg's `silencedetect`
//! reports them.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// A detected silent window, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SilenceInterval {
    pub start: f64,
    pub end: f64,
}

impl SilenceInterval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A span of the source timeline that survives silence removal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeepSegment {
    pub start: f64,
    pub end: f64,
}

impl KeepSegment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Sum of all silence durations.
pub fn total_silence(silences: &[SilenceInterval]) -> f64 {
    silences.iter().map(SilenceInterval::duration).sum()
}

/// Complement of `silences` within `[0, total_duration]`.
///
/// An empty result means the whole timeline is silent. Callers must handle
/// the "no silence detected" case before planning.
pub fn plan_keep_segments(silences: &[SilenceInterval], total_duration: f64) -> Vec<KeepSegment> {
    let mut segments = Vec::with_capacity(silences.len() + 1);
    let mut cursor = 0.0;

    for silence in silences {
        if silence.start > cursor {
            segments.push(KeepSegment {
                start: cursor,
                end: silence.start,
            });
        }
        cursor = silence.end;
    }

    if cursor < total_duration {
        segments.push(KeepSegment {
            start: cursor,
            end: total_duration,
        });
    }

    if segments.is_empty() {
        info!("No segments to keep out of {:.2}s", total_duration);
    } else {
        info!("Keeping {} segments", segments.len());
        for (i, seg) in segments.iter().enumerate() {
            debug!(
                "Segment {}: {:.2}s - {:.2}s (duration: {:.2}s)",
                i + 1,
                seg.start,
                seg.end,
                seg.duration()
            );
        }
    }

    segments
}

/// `-filter_complex` description that trims every kept segment out of input 0
/// and concatenates them into `[outv]` / `[outa]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraph {
    description: String,
    segment_count: usize,
}

impl FilterGraph {
    pub const VIDEO_OUT: &'static str = "[outv]";
    pub const AUDIO_OUT: &'static str = "[outa]";

    /// Build the graph. Segment `i`'s video trim is always paired with segment
    /// `i`'s audio trim in the concat input list.
    pub fn build(segments: &[KeepSegment]) -> Self {
        let mut parts = Vec::with_capacity(segments.len() * 2 + 1);

        for (i, seg) in segments.iter().enumerate() {
            parts.push(format!(
                "[0:v]trim=start={}:end={},setpts=PTS-STARTPTS[v{}]",
                seg.start, seg.end, i
            ));
            parts.push(format!(
                "[0:a]atrim=start={}:end={},asetpts=PTS-STARTPTS[a{}]",
                seg.start, seg.end, i
            ));
        }

        let inputs: String = (0..segments.len())
            .map(|i| format!("[v{}][a{}]", i, i))
            .collect();
        parts.push(format!(
            "{}concat=n={}:v=1:a=1{}{}",
            inputs,
            segments.len(),
            Self::VIDEO_OUT,
            Self::AUDIO_OUT
        ));

        Self {
            description: parts.join("; "),
            segment_count: segments.len(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.description
    }

    pub fn segment_count(&self) -> usize {
        self.segment_count
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}
