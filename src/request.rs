//! Caller-facing request schemas.
//!
//! Requests arrive loosely typed (numbers as strings, word lists as embedded
//! JSON, flags as "yes"). Each request validates into a typed spec before any
//! job exists, so workers never see malformed input.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;

use crate::config::{CaptionsConfig, SilenceConfig};
use crate::error::{MutecutError, Result};
use crate::style::{CaptionStyleOverrides, CaptionStyleSheet, StylePreset};
use crate::subtitle::{
    generate_cues, normalize_whitespace, render_srt, CaptionStyle, CueOptions, WordTimestamp,
};

static NOISE_LEVEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(\.\d+)?(dB)?$").unwrap());

/// Routes of the service itself. A video URL containing one of these is a
/// processed result that has not been re-hosted.
const SERVICE_ROUTES: [&str; 6] = [
    "/remove-silence/download/",
    "/burn-captions/download/",
    "/remove-silence/status/",
    "/burn-captions/status/",
    "/remove-silence",
    "/burn-captions",
];

/// Check that `video_url` is present and is not one of the service's own routes.
pub fn validate_video_url(video_url: Option<&str>) -> Result<String> {
    let url = video_url
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| MutecutError::Validation("video_url is required".to_string()))?;

    if let Some(route) = SERVICE_ROUTES.iter().find(|route| url.contains(*route)) {
        return Err(MutecutError::Validation(format!(
            "video_url cannot point to API endpoints. Please provide a direct video URL, not '{}'. \
             If you need to use a processed video, download it first and upload it to a storage service.",
            route
        )));
    }

    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(MutecutError::Validation(format!(
            "video_url must be an http(s) URL, got '{}'",
            url
        )));
    }

    Ok(url.to_string())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SilenceRemovalRequest {
    pub video_url: Option<String>,
    pub noise_level: Option<String>,
    pub min_duration: Option<Value>,
}

/// Validated silence-removal (or silence report) input.
#[derive(Debug, Clone, PartialEq)]
pub struct SilenceRemovalSpec {
    pub video_url: String,
    pub noise_level: String,
    pub min_duration: f64,
}

impl SilenceRemovalRequest {
    pub fn validate(self, defaults: &SilenceConfig) -> Result<SilenceRemovalSpec> {
        let video_url = validate_video_url(self.video_url.as_deref())?;

        let noise_level = self
            .noise_level
            .map(|n| n.trim().to_string())
            .unwrap_or_else(|| defaults.noise_level.clone());
        if !NOISE_LEVEL.is_match(&noise_level) {
            return Err(MutecutError::Validation(format!(
                "noise_level must look like '-30dB', got '{}'",
                noise_level
            )));
        }

        let min_duration = match self.min_duration {
            None | Some(Value::Null) => defaults.min_duration,
            Some(value) => loose_f64(&value).ok_or_else(|| {
                MutecutError::Validation(format!("min_duration must be a number, got {}", value))
            })?,
        };
        if !(min_duration.is_finite() && min_duration > 0.0) {
            return Err(MutecutError::Validation(format!(
                "min_duration must be positive, got {}",
                min_duration
            )));
        }

        Ok(SilenceRemovalSpec {
            video_url,
            noise_level,
            min_duration,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptionBurnRequest {
    pub video_url: Option<String>,
    pub words: Option<Value>,
    pub words_per_line: Option<Value>,
    pub caption_style: Option<String>,
    pub all_caps: Option<Value>,
    pub style_preset: Option<String>,
    pub style: Option<Value>,
}

/// Validated caption-burn input.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionJobSpec {
    pub video_url: String,
    pub words: Vec<WordTimestamp>,
    pub cue_options: CueOptions,
    pub style: CaptionStyleSheet,
}

impl CaptionBurnRequest {
    pub fn validate(self, defaults: &CaptionsConfig) -> Result<CaptionJobSpec> {
        let words_given = self.words.as_ref().is_some_and(|w| !is_blank(w));
        if self.video_url.as_deref().is_none_or(|u| u.trim().is_empty()) || !words_given {
            return Err(MutecutError::Validation(
                "video_url and words required".to_string(),
            ));
        }

        let video_url = validate_video_url(self.video_url.as_deref())?;
        let words = parse_words(self.words)?;
        let cue_options = cue_options(
            self.words_per_line,
            self.caption_style.as_deref(),
            self.all_caps,
            defaults,
        )?;

        let preset = self
            .style_preset
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::parse::<StylePreset>)
            .transpose()?;
        let overrides = parse_style(self.style)?;
        if let Some(font_name) = &overrides.font_name {
            check_font_name(font_name)?;
        }

        Ok(CaptionJobSpec {
            video_url,
            words,
            cue_options,
            style: CaptionStyleSheet::resolve(preset, overrides),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SrtRequest {
    pub words: Option<Value>,
    pub words_per_line: Option<Value>,
    pub caption_style: Option<String>,
    pub all_caps: Option<Value>,
}

/// Validated input for rendering SRT text without a video.
#[derive(Debug, Clone, PartialEq)]
pub struct SrtSpec {
    pub words: Vec<WordTimestamp>,
    pub cue_options: CueOptions,
}

impl SrtRequest {
    pub fn validate(self, defaults: &CaptionsConfig) -> Result<SrtSpec> {
        if self.words.as_ref().is_none_or(is_blank) {
            return Err(MutecutError::Validation("words required".to_string()));
        }

        Ok(SrtSpec {
            words: parse_words(self.words)?,
            cue_options: cue_options(
                self.words_per_line,
                self.caption_style.as_deref(),
                self.all_caps,
                defaults,
            )?,
        })
    }
}

impl SrtSpec {
    /// Render the SRT document for this word list.
    pub fn render(&self) -> Result<String> {
        let mut words = self.words.clone();
        normalize_whitespace(&mut words);
        let cues = generate_cues(&words, &self.cue_options)?;
        Ok(render_srt(&cues))
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

/// Accept a word list as an array or as a JSON-encoded string.
fn parse_words(words: Option<Value>) -> Result<Vec<WordTimestamp>> {
    match words {
        Some(Value::String(encoded)) => {
            let decoded: Value = serde_json::from_str(&encoded).map_err(|e| {
                MutecutError::Validation(format!("words is not valid JSON: {}", e))
            })?;
            WordTimestamp::parse_list(&decoded)
        }
        Some(value @ Value::Array(_)) => WordTimestamp::parse_list(&value),
        Some(_) => Err(MutecutError::Validation(
            "words must be array or JSON string".to_string(),
        )),
        None => Err(MutecutError::EmptyWords),
    }
}

fn cue_options(
    words_per_line: Option<Value>,
    caption_style: Option<&str>,
    all_caps: Option<Value>,
    defaults: &CaptionsConfig,
) -> Result<CueOptions> {
    let words_per_line = match words_per_line {
        None | Some(Value::Null) => defaults.words_per_line,
        Some(value) => loose_f64(&value)
            .filter(|n| n.fract() == 0.0 && *n >= 1.0)
            .map(|n| n as usize)
            .ok_or_else(|| {
                MutecutError::Validation(format!(
                    "words_per_line must be a positive integer, got {}",
                    value
                ))
            })?,
    };

    let style = match caption_style.map(str::trim) {
        None | Some("") => CaptionStyle::default(),
        Some(s) => s.parse()?,
    };

    Ok(CueOptions {
        style,
        words_per_line,
        all_caps: all_caps.as_ref().is_some_and(truthy),
    })
}

fn parse_style(style: Option<Value>) -> Result<CaptionStyleOverrides> {
    let value = match style {
        None | Some(Value::Null) => return Ok(CaptionStyleOverrides::default()),
        // An undecodable style string falls back to no overrides
        Some(Value::String(encoded)) => match serde_json::from_str::<Value>(&encoded) {
            Ok(value @ Value::Object(_)) => value,
            _ => return Ok(CaptionStyleOverrides::default()),
        },
        Some(value) => value,
    };

    serde_json::from_value(value)
        .map_err(|e| MutecutError::Validation(format!("Invalid style: {}", e)))
}

/// Characters with meaning inside an ffmpeg filter graph or a quoted
/// `force_style` value.
const FILTER_METACHARACTERS: [char; 7] = ['\'', ':', ',', '\\', '[', ']', ';'];

fn check_font_name(font_name: &str) -> Result<()> {
    if font_name.contains(FILTER_METACHARACTERS) {
        return Err(MutecutError::Validation(format!(
            "font_name must not contain any of {}",
            FILTER_METACHARACTERS.iter().collect::<String>()
        )));
    }
    Ok(())
}

fn loose_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;

    fn caption_request(body: Value) -> CaptionBurnRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_rejects_service_routes() {
        let err = validate_video_url(Some("https://host/remove-silence/download/abc")).unwrap_err();
        assert!(err.to_string().contains("'/remove-silence/download/'"));
        assert!(err.is_client_error());

        assert!(validate_video_url(None).is_err());
        assert!(validate_video_url(Some("  ")).is_err());
        assert!(validate_video_url(Some("ftp://host/video.mp4")).is_err());
        assert_eq!(
            validate_video_url(Some("https://cdn.example.com/v.mp4")).unwrap(),
            "https://cdn.example.com/v.mp4"
        );
    }

    #[test]
    fn test_silence_request_defaults_and_loose_numbers() {
        let defaults = Config::default().silence;

        let spec: SilenceRemovalSpec = serde_json::from_value::<SilenceRemovalRequest>(json!({
            "video_url": "https://cdn.example.com/v.mp4"
        }))
        .unwrap()
        .validate(&defaults)
        .unwrap();
        assert_eq!(spec.noise_level, "-30dB");
        assert_eq!(spec.min_duration, 0.5);

        let spec = serde_json::from_value::<SilenceRemovalRequest>(json!({
            "video_url": "https://cdn.example.com/v.mp4",
            "noise_level": "-40dB",
            "min_duration": "1.25"
        }))
        .unwrap()
        .validate(&defaults)
        .unwrap();
        assert_eq!(spec.noise_level, "-40dB");
        assert_eq!(spec.min_duration, 1.25);
    }

    #[test]
    fn test_silence_request_rejects_filter_injection() {
        let request = SilenceRemovalRequest {
            video_url: Some("https://cdn.example.com/v.mp4".into()),
            noise_level: Some("-30dB,volume=10".into()),
            min_duration: None,
        };
        assert!(matches!(
            request.validate(&Config::default().silence),
            Err(MutecutError::Validation(_))
        ));
    }

    #[test]
    fn test_caption_request_accepts_encoded_words_and_string_flags() {
        let spec = caption_request(json!({
            "video_url": "https://cdn.example.com/v.mp4",
            "words": "[{\"start\": 0, \"end\": \"0.5\", \"text\": \"hi\"}]",
            "words_per_line": "3",
            "caption_style": "word-by-word",
            "all_caps": "Yes",
            "style_preset": "tiktok",
            "style": {"font_size": 30}
        }))
        .validate(&Config::default().captions)
        .unwrap();

        assert_eq!(spec.words.len(), 1);
        assert_eq!(spec.words[0].end, 0.5);
        assert_eq!(spec.cue_options.words_per_line, 3);
        assert_eq!(spec.cue_options.style, CaptionStyle::WordByWord);
        assert!(spec.cue_options.all_caps);
        assert_eq!(spec.style.font_name, "Montserrat Black");
        assert_eq!(spec.style.font_size, 30);
    }

    #[test]
    fn test_caption_request_requires_url_and_words() {
        let err = caption_request(json!({"video_url": "https://cdn.example.com/v.mp4", "words": []}))
            .validate(&Config::default().captions)
            .unwrap_err();
        assert_eq!(err.to_string(), "video_url and words required");
    }

    #[test]
    fn test_caption_request_rejects_bad_words() {
        let defaults = Config::default().captions;

        let err = caption_request(json!({
            "video_url": "https://cdn.example.com/v.mp4",
            "words": [{"start": 0, "text": "hi"}]
        }))
        .validate(&defaults)
        .unwrap_err();
        assert!(err.to_string().starts_with("Word missing required fields"));

        let err = caption_request(json!({
            "video_url": "https://cdn.example.com/v.mp4",
            "words": 42
        }))
        .validate(&defaults)
        .unwrap_err();
        assert_eq!(err.to_string(), "words must be array or JSON string");
    }

    #[test]
    fn test_caption_request_rejects_font_name_breaking_out_of_style() {
        let defaults = Config::default().captions;
        let injected = "X',drawtext=textfile=/etc/passwd:x=0:y=0,subtitles=a.srt:force_style='";

        let as_object = json!({ "font_name": injected });
        let as_string = json!(as_object.to_string());

        for style in [as_object, as_string] {
            let err = caption_request(json!({
                "video_url": "https://cdn.example.com/v.mp4",
                "words": [{"start": 0, "end": 0.5, "text": "hi"}],
                "style": style
            }))
            .validate(&defaults)
            .unwrap_err();
            assert!(matches!(err, MutecutError::Validation(_)));
            assert!(err.to_string().starts_with("font_name must not contain"));
        }

        let spec = caption_request(json!({
            "video_url": "https://cdn.example.com/v.mp4",
            "words": [{"start": 0, "end": 0.5, "text": "hi"}],
            "style": {"font_name": "Noto Sans-Bold"}
        }))
        .validate(&defaults)
        .unwrap();
        assert!(spec.style.force_style().starts_with("FontName=Noto Sans-Bold,"));
    }

    #[test]
    fn test_unparseable_style_string_means_no_overrides() {
        assert_eq!(
            parse_style(Some(json!("{not json"))).unwrap(),
            CaptionStyleOverrides::default()
        );
    }

    #[test]
    fn test_srt_spec_renders_grouped_cues() {
        let spec = serde_json::from_value::<SrtRequest>(json!({
            "words": [
                {"start": 0.0, "end": 0.4, "text": "one"},
                {"start": 0.4, "end": 0.9, "text": "two"},
                {"start": 1.0, "end": 1.5, "text": "three"}
            ],
            "words_per_line": 2
        }))
        .unwrap()
        .validate(&Config::default().captions)
        .unwrap();

        assert_eq!(
            spec.render().unwrap(),
            "1\n00:00:00,000 --> 00:00:00,900\none two\n\n2\n00:00:01,000 --> 00:00:01,500\nthree\n\n"
        );
    }
}
