use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

use super::layout::TextMeasurer;

/// Caption face stack: a bold impact-style display face, then the generic fallback.
pub const CAPTION_FONT_STACK: &[&str] = &["Impact", "Arial Black", "sans-serif"];

const FALLBACK_ASCENT_RATIO: f32 = 0.8;

#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
    ascender: i16,
    family: Option<String>,
    face_index: u32,
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn ascent_ratio(&self) -> f32 {
        let ratio = self.ascender as f32 / self.units_per_em.max(1) as f32;
        if ratio > 0.0 && ratio <= 1.5 {
            ratio
        } else {
            FALLBACK_ASCENT_RATIO
        }
    }
}

impl std::fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMetrics")
            .field("family", &self.family)
            .field("units_per_em", &self.units_per_em)
            .field("face_index", &self.face_index)
            .finish()
    }
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_metrics_from_data(&data, None)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

/// The caption font shared by every render of a compositor: the font database
/// handed to the rasterizer, the family list written into the document and the
/// face used for measuring line widths.
#[derive(Clone)]
pub struct CaptionFont {
    metrics: Option<FontMetrics>,
    families: Vec<String>,
    fontdb: Arc<fontdb::Database>,
}

impl CaptionFont {
    /// Loads system fonts (plus `font_path`, when given) and picks the first
    /// face of the stack that is installed. Missing faces are not an error:
    /// widths are then estimated per character.
    pub fn resolve(font_path: Option<&Path>, font_family: Option<&str>) -> Result<Self> {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();

        let mut families: Vec<String> = CAPTION_FONT_STACK
            .iter()
            .map(|name| name.to_string())
            .collect();
        if let Some(family) = font_family.map(str::trim).filter(|name| !name.is_empty()) {
            families.retain(|name| !name.eq_ignore_ascii_case(family));
            families.insert(0, family.to_string());
        }

        let metrics = if let Some(path) = font_path {
            let metrics = load_font_metrics(path)?;
            db.load_font_data(metrics.data().to_vec());
            if let Some(family) = metrics.family() {
                families.retain(|name| !name.eq_ignore_ascii_case(family));
                families.insert(0, family.to_string());
            }
            Some(metrics)
        } else {
            families
                .iter()
                .find_map(|family| load_font_metrics_from_family(&db, family).ok())
        };

        match metrics.as_ref() {
            Some(metrics) => debug!(
                "caption font: {}",
                metrics.family().unwrap_or("(unnamed face)")
            ),
            None => warn!("no caption font found; estimating text widths"),
        }

        Ok(Self {
            metrics,
            families,
            fontdb: Arc::new(db),
        })
    }

    /// A font with no faces at all. Measurement uses per-character estimates and
    /// the rasterizer draws no glyphs.
    pub fn estimated() -> Self {
        Self {
            metrics: None,
            families: CAPTION_FONT_STACK
                .iter()
                .map(|name| name.to_string())
                .collect(),
            fontdb: Arc::new(fontdb::Database::new()),
        }
    }

    pub fn metrics(&self) -> Option<&FontMetrics> {
        self.metrics.as_ref()
    }

    pub fn families(&self) -> &[String] {
        &self.families
    }

    /// The family list as a CSS `font-family` value.
    pub fn family_list(&self) -> String {
        self.families
            .iter()
            .map(|name| {
                if is_generic_family(name) {
                    name.clone()
                } else if name.contains(' ') {
                    format!("'{}'", name)
                } else {
                    name.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub(crate) fn fontdb(&self) -> Arc<fontdb::Database> {
        self.fontdb.clone()
    }

    /// Distance from the top of a line box to its baseline.
    pub fn ascent(&self, font_size: f32) -> f32 {
        let ratio = self
            .metrics
            .as_ref()
            .map(FontMetrics::ascent_ratio)
            .unwrap_or(FALLBACK_ASCENT_RATIO);
        font_size * ratio
    }

    pub fn measurer(&self, font_size: f32) -> FontMeasurer<'_> {
        FontMeasurer {
            font: self.metrics.as_ref(),
            font_size,
        }
    }
}

pub struct FontMeasurer<'a> {
    font: Option<&'a FontMetrics>,
    font_size: f32,
}

impl TextMeasurer for FontMeasurer<'_> {
    fn measure(&self, text: &str) -> f32 {
        measure_text_width_px(text, self.font_size, self.font)
    }
}

pub(crate) fn measure_text_width_px(text: &str, font_size: f32, font: Option<&FontMetrics>) -> f32 {
    if let Some(font) = font {
        if let Ok(face) = Face::parse(&font.data, font.face_index) {
            let mut advance = 0u32;
            for ch in text.chars() {
                if ch == '\n' {
                    continue;
                }
                if ch == ' ' {
                    advance = advance.saturating_add(font.space_advance as u32);
                    continue;
                }
                if let Some(glyph) = face.glyph_index(ch) {
                    let glyph_advance = face.glyph_hor_advance(glyph).unwrap_or(font.space_advance);
                    advance = advance.saturating_add(glyph_advance as u32);
                } else {
                    advance = advance.saturating_add(font.space_advance as u32);
                }
            }
            let units = font.units_per_em.max(1) as f32;
            return advance as f32 * (font_size / units);
        }
    }
    estimate_text_width_units(text) * font_size
}

// Uppercase display faces run wide; these ratios err on the side of wrapping early.
fn estimate_char_units_for_width(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_uppercase() || ch.is_ascii_digit() {
        0.6
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF
    ) {
        1.0
    } else {
        0.9
    }
}

fn estimate_text_width_units(text: &str) -> f32 {
    text.chars().map(estimate_char_units_for_width).sum()
}

fn is_generic_family(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "serif" | "sans-serif" | "monospace" | "cursive" | "fantasy"
    )
}

fn load_font_metrics_from_data(data: &[u8], preferred_family: Option<&str>) -> Result<FontMetrics> {
    let mut fallback = None;
    let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
    for index in 0..count {
        if let Ok(face) = Face::parse(data, index) {
            let family = extract_family_name(&face);
            let units_per_em = face.units_per_em().max(1);
            let space_advance = face
                .glyph_index(' ')
                .and_then(|id| face.glyph_hor_advance(id))
                .unwrap_or(units_per_em / 2);
            let metrics = FontMetrics {
                data: Arc::new(data.to_vec()),
                units_per_em,
                space_advance,
                ascender: face.ascender(),
                family: family.clone(),
                face_index: index,
            };
            if let (Some(preferred), Some(found)) = (preferred_family, &family) {
                if found.eq_ignore_ascii_case(preferred) {
                    return Ok(metrics);
                }
            }
            if fallback.is_none() {
                fallback = Some(metrics);
            }
        }
    }
    fallback.ok_or_else(|| anyhow!("failed to parse font data"))
}

fn load_font_metrics_from_family(db: &fontdb::Database, family: &str) -> Result<FontMetrics> {
    let families = if family.eq_ignore_ascii_case("sans-serif") {
        vec![fontdb::Family::SansSerif]
    } else {
        vec![fontdb::Family::Name(family)]
    };
    let query = fontdb::Query {
        families: &families,
        weight: fontdb::Weight::BOLD,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    let (data, face_index) = db
        .with_face_data(id, |data, index| (data.to_vec(), index))
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    let mut metrics = load_font_metrics_from_data(&data, None)?;
    if let Ok(face) = Face::parse(&data, face_index) {
        metrics.face_index = face_index;
        metrics.ascender = face.ascender();
        metrics.units_per_em = face.units_per_em().max(1);
        metrics.family = extract_family_name(&face).or(metrics.family);
    }
    Ok(metrics)
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimated_width_scales_with_font_size() {
        let small = measure_text_width_px("HELLO", 10.0, None);
        let large = measure_text_width_px("HELLO", 20.0, None);
        assert!(small > 0.0);
        assert!((large - small * 2.0).abs() < 1e-3);
    }

    #[test]
    fn estimated_width_is_additive_over_words() {
        let a = measure_text_width_px("HELLO", 30.0, None);
        let b = measure_text_width_px("WORLD", 30.0, None);
        let space = measure_text_width_px(" ", 30.0, None);
        let joined = measure_text_width_px("HELLO WORLD", 30.0, None);
        assert!((joined - (a + space + b)).abs() < 1e-3);
    }

    #[test]
    fn family_list_quotes_names_with_spaces() {
        let font = CaptionFont::estimated();
        assert_eq!(font.family_list(), "Impact, 'Arial Black', sans-serif");
    }

    #[test]
    fn estimated_font_uses_fallback_ascent() {
        let font = CaptionFont::estimated();
        assert!(font.metrics().is_none());
        assert!((font.ascent(50.0) - 40.0).abs() < 1e-3);
    }

    #[test]
    fn missing_font_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = CaptionFont::resolve(Some(&dir.path().join("nope.ttf")), None)
            .err()
            .expect("missing font must fail");
        assert!(err.to_string().contains("failed to read font"));
    }
}
