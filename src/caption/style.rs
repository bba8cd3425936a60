use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    #[default]
    Center,
    Right,
}

impl Align {
    pub fn as_str(self) -> &'static str {
        match self {
            Align::Left => "left",
            Align::Center => "center",
            Align::Right => "right",
        }
    }

    pub(crate) fn text_anchor(self) -> &'static str {
        match self {
            Align::Left => "start",
            Align::Center => "middle",
            Align::Right => "end",
        }
    }
}

impl FromStr for Align {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" | "start" => Ok(Align::Left),
            "center" | "centre" | "middle" => Ok(Align::Center),
            "right" | "end" => Ok(Align::Right),
            other => Err(anyhow!(
                "invalid alignment '{}' (expected left, center or right)",
                other
            )),
        }
    }
}

/// Caller-supplied style. Every field is optional; see [`resolve_style`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleOptions {
    pub font_scale: Option<f32>,
    pub stroke_width: Option<f32>,
    pub fill_color: Option<String>,
    pub stroke_color: Option<String>,
    pub align: Option<Align>,
    pub shadow: Option<bool>,
}

impl StyleOptions {
    /// Fields set on `self` win; unset fields are taken from `base`.
    pub fn merged_over(&self, base: &StyleOptions) -> StyleOptions {
        StyleOptions {
            font_scale: self.font_scale.or(base.font_scale),
            stroke_width: self.stroke_width.or(base.stroke_width),
            fill_color: self.fill_color.clone().or_else(|| base.fill_color.clone()),
            stroke_color: self
                .stroke_color
                .clone()
                .or_else(|| base.stroke_color.clone()),
            align: self.align.or(base.align),
            shadow: self.shadow.or(base.shadow),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Style {
    pub font_scale: f32,
    pub stroke_width: f32,
    pub fill_color: String,
    pub stroke_color: String,
    pub align: Align,
    pub shadow: bool,
}

/// Which set of defaults applies. `Story` differs only in scale and shadow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleProfile {
    Standard,
    Story,
}

impl StyleProfile {
    fn defaults(self) -> Style {
        let standard = Style {
            font_scale: 1.0,
            stroke_width: 3.0,
            fill_color: "white".to_string(),
            stroke_color: "black".to_string(),
            align: Align::Center,
            shadow: false,
        };
        match self {
            StyleProfile::Standard => standard,
            StyleProfile::Story => Style {
                font_scale: 1.2,
                shadow: true,
                ..standard
            },
        }
    }
}

/// Fills every unset field from the profile defaults. Values are not clamped.
pub fn resolve_style(options: &StyleOptions, profile: StyleProfile) -> Style {
    let defaults = profile.defaults();
    Style {
        font_scale: options.font_scale.unwrap_or(defaults.font_scale),
        stroke_width: options.stroke_width.unwrap_or(defaults.stroke_width),
        fill_color: non_blank(options.fill_color.as_deref()).unwrap_or(defaults.fill_color),
        stroke_color: non_blank(options.stroke_color.as_deref())
            .unwrap_or(defaults.stroke_color),
        align: options.align.unwrap_or(defaults.align),
        shadow: options.shadow.unwrap_or(defaults.shadow),
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
}
