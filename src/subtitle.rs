use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tokio::fs;
use tracing::info;

use crate::error::{MutecutError, Result};

/// Narrow space substituted into caption text so wide-advance fonts don't
/// spread words apart.
pub const THIN_SPACE: char = '\u{2009}';

/// A single transcribed word with its timing, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTimestamp {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl WordTimestamp {
    /// Parse an untrusted word list. Every entry must be an object carrying
    /// `start`, `end` and `text`; timings may be numbers or numeric strings.
    /// Order is preserved as given.
    pub fn parse_list(value: &Value) -> Result<Vec<WordTimestamp>> {
        let items = value.as_array().ok_or_else(|| {
            MutecutError::InvalidWords(format!("expected a list, got {}", json_kind(value)))
        })?;

        if items.is_empty() {
            return Err(MutecutError::EmptyWords);
        }

        items
            .iter()
            .enumerate()
            .map(|(i, item)| Self::parse_one(i, item))
            .collect()
    }

    fn parse_one(index: usize, item: &Value) -> Result<WordTimestamp> {
        let obj = item.as_object().ok_or_else(|| {
            MutecutError::InvalidWords(format!(
                "word {} must be an object, got {}",
                index,
                json_kind(item)
            ))
        })?;

        let missing = || {
            MutecutError::Validation(format!("Word missing required fields. Got: {}", item))
        };

        let start = obj.get("start").and_then(as_seconds).ok_or_else(missing)?;
        let end = obj.get("end").and_then(as_seconds).ok_or_else(missing)?;
        let text = match obj.get("text") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(missing()),
        };

        Ok(WordTimestamp { start, end, text })
    }
}

fn as_seconds(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Collapse runs of whitespace inside each word to a single space.
pub fn normalize_whitespace(words: &mut [WordTimestamp]) {
    for word in words.iter_mut() {
        word.text = word.text.split_whitespace().collect::<Vec<_>>().join(" ");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptionStyle {
    /// Fixed-size groups of consecutive words per cue
    #[default]
    Grouped,
    /// One cue per word
    WordByWord,
}

impl std::str::FromStr for CaptionStyle {
    type Err = MutecutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "grouped" => Ok(CaptionStyle::Grouped),
            "word-by-word" => Ok(CaptionStyle::WordByWord),
            other => Err(MutecutError::Validation(format!(
                "Invalid caption_style '{}'. Valid styles: grouped, word-by-word",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CueOptions {
    pub style: CaptionStyle,
    pub words_per_line: usize,
    pub all_caps: bool,
}

impl Default for CueOptions {
    fn default() -> Self {
        Self {
            style: CaptionStyle::Grouped,
            words_per_line: 5,
            all_caps: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtitleCue {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Build numbered cues from a word list.
pub fn generate_cues(words: &[WordTimestamp], options: &CueOptions) -> Result<Vec<SubtitleCue>> {
    if words.is_empty() {
        return Err(MutecutError::EmptyWords);
    }

    let chunk_size = match options.style {
        CaptionStyle::WordByWord => 1,
        CaptionStyle::Grouped if options.words_per_line == 0 => {
            return Err(MutecutError::Validation(
                "words_per_line must be at least 1".to_string(),
            ));
        }
        CaptionStyle::Grouped => options.words_per_line,
    };

    let cues = words
        .chunks(chunk_size)
        .enumerate()
        .map(|(i, chunk)| {
            let text = chunk
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            SubtitleCue {
                index: i + 1,
                // chunks() never yields an empty slice
                start: chunk[0].start,
                end: chunk[chunk.len() - 1].end,
                text: if options.all_caps { text.to_uppercase() } else { text },
            }
        })
        .collect();

    Ok(cues)
}

/// Replace spaces in cue text with [`THIN_SPACE`]. Index and timing lines are
/// untouched since they are rendered separately.
pub fn apply_thin_space(cues: &mut [SubtitleCue]) {
    for cue in cues.iter_mut() {
        cue.text = cue.text.replace(' ', &THIN_SPACE.to_string());
    }
}

/// Render cues as SRT text.
pub fn render_srt(cues: &[SubtitleCue]) -> String {
    let mut srt_content = String::new();

    for cue in cues {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            cue.index,
            format_srt_time(cue.start),
            format_srt_time(cue.end),
            cue.text
        ));
    }

    srt_content
}

/// Write cues to an SRT file.
pub async fn write_srt<P: AsRef<Path>>(cues: &[SubtitleCue], output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    fs::write(output_path, render_srt(cues)).await?;
    info!("Created SRT file: {} ({} subtitles)", output_path.display(), cues.len());
    Ok(())
}

/// Format seconds as `HH:MM:SS,mmm`. Every component is truncated, never
/// rounded, so 1.4995 renders as `00:00:01,499`.
pub fn format_srt_time(seconds: f64) -> String {
    // The epsilon absorbs binary representation error (1.001 * 1000 = 1000.999...)
    let total_milliseconds = (seconds.max(0.0) * 1000.0 + 1e-6).floor() as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn words(n: usize) -> Vec<WordTimestamp> {
        (0..n)
            .map(|i| WordTimestamp {
                start: i as f64,
                end: i as f64 + 0.5,
                text: format!("w{}", i),
            })
            .collect()
    }

    #[test]
    fn test_format_srt_time() {
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
        assert_eq!(format_srt_time(1.4995), "00:00:01,499");
        assert_eq!(format_srt_time(65.123), "00:01:05,123");
        assert_eq!(format_srt_time(3661.2), "01:01:01,200");
        assert_eq!(format_srt_time(1.001), "00:00:01,001");
    }

    #[test]
    fn test_grouped_last_cue_takes_remainder() {
        let options = CueOptions {
            words_per_line: 2,
            ..CueOptions::default()
        };
        let cues = generate_cues(&words(5), &options).unwrap();

        assert_eq!(cues.len(), 3);
        assert_eq!(cues[0].text, "w0 w1");
        assert_eq!((cues[0].start, cues[0].end), (0.0, 1.5));
        assert_eq!(cues[2].text, "w4");
        assert_eq!((cues[2].start, cues[2].end), (4.0, 4.5));
        assert_eq!(cues.iter().map(|c| c.index).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_word_by_word_with_caps() {
        let options = CueOptions {
            style: CaptionStyle::WordByWord,
            words_per_line: 5,
            all_caps: true,
        };
        let cues = generate_cues(&words(3), &options).unwrap();
        assert_eq!(cues.len(), 3);
        assert_eq!(cues[1].text, "W1");
        assert_eq!(cues[1].index, 2);
    }

    #[test]
    fn test_empty_words_rejected() {
        assert!(matches!(
            generate_cues(&[], &CueOptions::default()),
            Err(MutecutError::EmptyWords)
        ));
    }

    #[test]
    fn test_render_with_thin_space() {
        let mut cues = generate_cues(&words(2), &CueOptions::default()).unwrap();
        apply_thin_space(&mut cues);
        assert_eq!(
            render_srt(&cues),
            "1\n00:00:00,000 --> 00:00:01,500\nw0\u{2009}w1\n\n"
        );
    }

    #[test]
    fn test_parse_list_accepts_numeric_strings() {
        let parsed = WordTimestamp::parse_list(&json!([
            {"start": "0.25", "end": 0.75, "text": "hello"}
        ]))
        .unwrap();
        assert_eq!(parsed[0].start, 0.25);
        assert_eq!(parsed[0].text, "hello");
    }

    #[test]
    fn test_parse_list_rejects_bad_shapes() {
        assert!(matches!(
            WordTimestamp::parse_list(&json!({"start": 0})),
            Err(MutecutError::InvalidWords(_))
        ));
        assert!(matches!(
            WordTimestamp::parse_list(&json!(["hello"])),
            Err(MutecutError::InvalidWords(_))
        ));
        assert!(matches!(
            WordTimestamp::parse_list(&json!([])),
            Err(MutecutError::EmptyWords)
        ));
        assert!(matches!(
            WordTimestamp::parse_list(&json!([{"start": 0, "text": "x"}])),
            Err(MutecutError::Validation(_))
        ));
    }

    #[test]
    fn test_normalize_whitespace() {
        let mut list = vec![WordTimestamp {
            start: 0.0,
            end: 1.0,
            text: "  big \n  gap\t".to_string(),
        }];
        normalize_whitespace(&mut list);
        assert_eq!(list[0].text, "big gap");
    }
}
