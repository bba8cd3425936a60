use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::style::Align;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionSlot {
    Top,
    Bottom,
}

impl CaptionSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            CaptionSlot::Top => "top",
            CaptionSlot::Bottom => "bottom",
        }
    }
}

/// Pixel anchor of a caption block: `x` is the alignment point, `y` the top
/// edge of the first line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub x: f32,
    pub y: f32,
    pub max_width: f32,
}

/// User-dragged position as fractions (0..1) of the loaded image size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionOverride {
    pub x_pct: Option<f32>,
    pub y_pct: Option<f32>,
    pub max_width_pct: Option<f32>,
}

/// Parses `x,y[,max_width]`; an empty component leaves that field unset.
impl FromStr for PositionOverride {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let parts: Vec<&str> = value.split(',').map(str::trim).collect();
        if parts.is_empty() || parts.len() > 3 {
            return Err(anyhow!(
                "invalid position '{}' (expected x,y[,max_width] fractions)",
                value
            ));
        }
        let field = |idx: usize| -> Result<Option<f32>> {
            match parts.get(idx) {
                Some(raw) if !raw.is_empty() => raw
                    .parse::<f32>()
                    .map(Some)
                    .with_context(|| format!("invalid position component '{}'", raw)),
                _ => Ok(None),
            }
        };
        Ok(PositionOverride {
            x_pct: field(0)?,
            y_pct: field(1)?,
            max_width_pct: field(2)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionPositions {
    pub top: Option<PositionOverride>,
    pub bottom: Option<PositionOverride>,
}

impl CaptionPositions {
    pub fn get(&self, slot: CaptionSlot) -> Option<&PositionOverride> {
        match slot {
            CaptionSlot::Top => self.top.as_ref(),
            CaptionSlot::Bottom => self.bottom.as_ref(),
        }
    }
}

pub const DEFAULT_OVERRIDE_MAX_WIDTH_PCT: f32 = 0.8;
const FREEFORM_TOP_Y_PCT: f32 = 0.05;
const FREEFORM_BOTTOM_Y_PCT: f32 = 0.85;
const FREEFORM_MAX_WIDTH_PCT: f32 = 0.9;

/// Resolves one caption slot. An override wins, then the template anchor
/// (used unscaled), then the freeform defaults. Slots resolve independently.
pub fn resolve_anchor(
    slot: CaptionSlot,
    position: Option<&PositionOverride>,
    template: Option<Anchor>,
    width: u32,
    height: u32,
    align: Align,
) -> Anchor {
    let fallback = template.unwrap_or_else(|| freeform_anchor(slot, width, height, align));
    let Some(position) = position else {
        return fallback;
    };
    let (w, h) = (width as f32, height as f32);
    Anchor {
        x: position.x_pct.map(|pct| pct * w).unwrap_or(fallback.x),
        y: position.y_pct.map(|pct| pct * h).unwrap_or(fallback.y),
        max_width: position
            .max_width_pct
            .unwrap_or(DEFAULT_OVERRIDE_MAX_WIDTH_PCT)
            * w,
    }
}

/// Anchors for an uploaded image with no template and no override.
pub fn freeform_anchor(slot: CaptionSlot, width: u32, height: u32, align: Align) -> Anchor {
    let (w, h) = (width as f32, height as f32);
    let y_pct = match slot {
        CaptionSlot::Top => FREEFORM_TOP_Y_PCT,
        CaptionSlot::Bottom => FREEFORM_BOTTOM_Y_PCT,
    };
    let max_width = w * FREEFORM_MAX_WIDTH_PCT;
    Anchor {
        x: centered_block_x(w, max_width, align),
        y: h * y_pct,
        max_width,
    }
}

/// Alignment point for a block of `max_width` centered on a canvas of `width`.
pub(crate) fn centered_block_x(width: f32, max_width: f32, align: Align) -> f32 {
    match align {
        Align::Left => (width - max_width) / 2.0,
        Align::Center => width / 2.0,
        Align::Right => (width + max_width) / 2.0,
    }
}
