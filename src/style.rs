//! Caption styling: named presets, caller overrides, and the ASS
//! `force_style` string handed to ffmpeg's subtitles filter.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{MutecutError, Result};

const DEFAULT_FONT: &str = "DejaVu Sans";
const DEFAULT_OUTLINE_WIDTH: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StylePreset {
    Default,
    Tiktok,
    Youtube,
    Minimal,
    Hormozi,
}

impl FromStr for StylePreset {
    type Err = MutecutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "default" => Ok(StylePreset::Default),
            "tiktok" => Ok(StylePreset::Tiktok),
            "youtube" => Ok(StylePreset::Youtube),
            "minimal" => Ok(StylePreset::Minimal),
            "hormozi" => Ok(StylePreset::Hormozi),
            other => Err(MutecutError::Validation(format!(
                "Unknown style_preset '{}'. Valid presets: default, tiktok, youtube, minimal, hormozi",
                other
            ))),
        }
    }
}

/// Outline given either as on/off or as a width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outline {
    Enabled(bool),
    Width(f64),
}

/// Caller-supplied style keys. Every key is optional and overrides the preset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionStyleOverrides {
    pub font_name: Option<String>,
    pub font_size: Option<f64>,
    pub color: Option<String>,
    pub outline: Option<Outline>,
    pub outline_width: Option<f64>,
    pub margin_horizontal: Option<f64>,
    pub margin_vertical: Option<f64>,
    pub margin_v: Option<f64>,
    pub spacing: Option<f64>,
    pub shadow: Option<f64>,
    pub bold: Option<bool>,
}

impl CaptionStyleOverrides {
    /// Fields set in `self` win over `base`.
    pub fn over(self, base: CaptionStyleOverrides) -> CaptionStyleOverrides {
        CaptionStyleOverrides {
            font_name: self.font_name.or(base.font_name),
            font_size: self.font_size.or(base.font_size),
            color: self.color.or(base.color),
            outline: self.outline.or(base.outline),
            outline_width: self.outline_width.or(base.outline_width),
            margin_horizontal: self.margin_horizontal.or(base.margin_horizontal),
            margin_vertical: self.margin_vertical.or(base.margin_vertical),
            margin_v: self.margin_v.or(base.margin_v),
            spacing: self.spacing.or(base.spacing),
            shadow: self.shadow.or(base.shadow),
            bold: self.bold.or(base.bold),
        }
    }
}

impl StylePreset {
    pub fn overrides(self) -> CaptionStyleOverrides {
        let base = CaptionStyleOverrides {
            color: Some("white".to_string()),
            outline: Some(Outline::Enabled(true)),
            spacing: Some(0.0),
            ..CaptionStyleOverrides::default()
        };
        match self {
            StylePreset::Default => CaptionStyleOverrides {
                font_size: Some(24.0),
                font_name: Some(DEFAULT_FONT.to_string()),
                margin_v: Some(70.0),
                ..base
            },
            StylePreset::Tiktok => CaptionStyleOverrides {
                font_size: Some(48.0),
                font_name: Some("Montserrat Black".to_string()),
                spacing: Some(-1.5),
                margin_v: Some(85.0),
                ..base
            },
            StylePreset::Youtube => CaptionStyleOverrides {
                font_size: Some(32.0),
                font_name: Some(DEFAULT_FONT.to_string()),
                margin_v: Some(50.0),
                ..base
            },
            StylePreset::Minimal => CaptionStyleOverrides {
                font_size: Some(20.0),
                font_name: Some("DejaVu Sans Mono".to_string()),
                outline: Some(Outline::Enabled(false)),
                margin_v: Some(50.0),
                ..base
            },
            StylePreset::Hormozi => CaptionStyleOverrides {
                font_size: Some(24.0),
                font_name: Some("Montserrat Black".to_string()),
                bold: Some(true),
                outline: Some(Outline::Width(3.0)),
                shadow: Some(2.0),
                spacing: Some(-1.0),
                margin_v: Some(80.0),
                ..base
            },
        }
    }
}

/// Fully resolved style.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptionStyleSheet {
    pub font_name: String,
    pub font_size: i64,
    pub primary_colour: &'static str,
    pub margin_h: i64,
    pub margin_v: i64,
    pub spacing: f64,
    pub shadow: i64,
    /// `None` draws no outline
    pub outline_width: Option<f64>,
}

impl CaptionStyleSheet {
    pub fn resolve(preset: Option<StylePreset>, overrides: CaptionStyleOverrides) -> Self {
        let style = match preset {
            Some(preset) => overrides.over(preset.overrides()),
            None => overrides,
        };

        let outline_width = match style.outline.unwrap_or(Outline::Enabled(true)) {
            Outline::Enabled(false) => None,
            Outline::Enabled(true) => Some(style.outline_width.unwrap_or(DEFAULT_OUTLINE_WIDTH)),
            Outline::Width(w) if w == 0.0 => None,
            Outline::Width(w) => Some(w),
        };

        Self {
            font_name: style.font_name.unwrap_or_else(|| DEFAULT_FONT.to_string()),
            font_size: style.font_size.unwrap_or(24.0) as i64,
            primary_colour: colour_code(style.color.as_deref().unwrap_or("white")),
            margin_h: style.margin_horizontal.unwrap_or(40.0) as i64,
            margin_v: style.margin_vertical.or(style.margin_v).unwrap_or(70.0) as i64,
            spacing: style.spacing.unwrap_or(-1.0),
            shadow: style.shadow.unwrap_or(0.0) as i64,
            outline_width,
        }
    }

    /// ASS `force_style` value.
    pub fn force_style(&self) -> String {
        let mut style = format!(
            "FontName={},FontSize={},PrimaryColour={},MarginV={},MarginL={},MarginR={},Alignment=2,Spacing={},Shadow={}",
            self.font_name,
            self.font_size,
            self.primary_colour,
            self.margin_v,
            self.margin_h,
            self.margin_h,
            self.spacing,
            self.shadow
        );

        match self.outline_width {
            Some(width) => style.push_str(&format!(
                ",OutlineColour=&H00000000,BorderStyle=1,Outline={}",
                width
            )),
            None => style.push_str(",BorderStyle=1,Outline=0"),
        }

        style
    }
}

/// ASS colour code (`&HAABBGGRR`) for a colour name; unknown names fall back to white.
fn colour_code(name: &str) -> &'static str {
    match name.to_lowercase().as_str() {
        "black" => "&H00000000",
        "yellow" => "&H0000FFFF",
        "red" => "&H000000FF",
        "green" => "&H0000FF00",
        "blue" => "&H00FF0000",
        _ => "&H00FFFFFF",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_preset() {
        let sheet = CaptionStyleSheet::resolve(None, CaptionStyleOverrides::default());
        assert_eq!(
            sheet.force_style(),
            "FontName=DejaVu Sans,FontSize=24,PrimaryColour=&H00FFFFFF,MarginV=70,MarginL=40,MarginR=40,\
             Alignment=2,Spacing=-1,Shadow=0,OutlineColour=&H00000000,BorderStyle=1,Outline=2"
        );
    }

    #[test]
    fn test_overrides_win_over_preset() {
        let overrides: CaptionStyleOverrides =
            serde_json::from_str(r#"{"font_size": 60, "color": "Yellow", "margin_vertical": 20}"#)
                .unwrap();
        let sheet = CaptionStyleSheet::resolve(Some(StylePreset::Tiktok), overrides);

        assert_eq!(sheet.font_name, "Montserrat Black");
        assert_eq!(sheet.font_size, 60);
        assert_eq!(sheet.primary_colour, "&H0000FFFF");
        assert_eq!(sheet.margin_v, 20);
        assert_eq!(sheet.spacing, -1.5);
    }

    #[test]
    fn test_outline_variants() {
        let minimal = CaptionStyleSheet::resolve(
            Some(StylePreset::Minimal),
            CaptionStyleOverrides::default(),
        );
        assert!(minimal.force_style().ends_with(",BorderStyle=1,Outline=0"));

        let hormozi = CaptionStyleSheet::resolve(
            Some(StylePreset::Hormozi),
            CaptionStyleOverrides::default(),
        );
        assert!(hormozi.force_style().ends_with(",Outline=3"));
        assert_eq!(hormozi.shadow, 2);
    }

    #[test]
    fn test_unknown_preset_rejected() {
        assert!("neon".parse::<StylePreset>().is_err());
        assert_eq!("youtube".parse::<StylePreset>().unwrap(), StylePreset::Youtube);
    }
}
