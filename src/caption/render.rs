use std::sync::Arc;

use resvg::render;
use tiny_skia::Pixmap;
use tracing::debug;
use usvg::{Options, Tree, fontdb};

use super::font::CaptionFont;
use super::layout::{line_height, normalize_caption, wrap_text};
use super::position::{Anchor, CaptionSlot};
use super::style::Style;
use crate::error::{RenderError, RenderResult};
use crate::surface::Surface;

const SHADOW_FILTER_ID: &str = "caption-shadow";
const SHADOW_COLOR: &str = "black";
const SHADOW_OPACITY: f32 = 0.8;
const SHADOW_BLUR: f32 = 4.0;
const SHADOW_OFFSET: (f32, f32) = (2.0, 2.0);

/// Where the source image lands on the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePlacement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ImagePlacement {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x: f32,
    /// Top edge of the line box.
    pub y: f32,
    pub baseline: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptionBlock {
    pub slot: CaptionSlot,
    pub font_size: f32,
    pub style: Style,
    pub lines: Vec<PlacedLine>,
}

/// Paint plan for one composite: canvas, source placement and caption blocks in
/// paint order. A slot with empty text has no block and therefore no paint.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionScene {
    pub width: u32,
    pub height: u32,
    pub backdrop: Option<String>,
    pub image: ImagePlacement,
    pub blocks: Vec<CaptionBlock>,
}

impl CaptionScene {
    pub fn new(width: u32, height: u32, image: ImagePlacement) -> Self {
        Self {
            width,
            height,
            backdrop: None,
            image,
            blocks: Vec::new(),
        }
    }

    pub fn with_backdrop(mut self, color: impl Into<String>) -> Self {
        self.backdrop = Some(color.into());
        self
    }

    /// Wraps `text` against the anchor width and appends it as a block.
    /// Returns false (and paints nothing) when the text is blank.
    pub fn push_caption(
        &mut self,
        slot: CaptionSlot,
        text: &str,
        anchor: Anchor,
        style: &Style,
        font_size: f32,
        font: &CaptionFont,
    ) -> bool {
        let normalized = normalize_caption(text);
        if normalized.is_empty() {
            return false;
        }
        let measurer = font.measurer(font_size);
        let wrapped = wrap_text(&normalized, anchor.max_width, &measurer);
        let step = line_height(font_size);
        let ascent = font.ascent(font_size);
        let lines = wrapped
            .into_iter()
            .enumerate()
            .map(|(idx, text)| {
                let y = anchor.y + idx as f32 * step;
                PlacedLine {
                    text,
                    x: anchor.x,
                    y,
                    baseline: y + ascent,
                }
            })
            .collect::<Vec<_>>();
        debug!(
            "caption {}: {} line(s) at {}px",
            slot.as_str(),
            lines.len(),
            font_size
        );
        self.blocks.push(CaptionBlock {
            slot,
            font_size,
            style: style.clone(),
            lines,
        });
        true
    }

    pub fn block(&self, slot: CaptionSlot) -> Option<&CaptionBlock> {
        self.blocks.iter().find(|block| block.slot == slot)
    }

    /// Serializes the scene as an SVG document embedding the source image.
    pub fn to_svg(&self, image_data_uri: &str, font_family: &str) -> String {
        let mut svg = String::new();
        svg.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height
        ));
        if self.blocks.iter().any(|block| block.style.shadow) {
            svg.push_str(&format!(
                r#"<defs><filter id="{id}" x="-20%" y="-20%" width="140%" height="140%"><feDropShadow dx="{dx}" dy="{dy}" stdDeviation="{std}" flood-color="{color}" flood-opacity="{opacity}"/></filter></defs>"#,
                id = SHADOW_FILTER_ID,
                dx = SHADOW_OFFSET.0,
                dy = SHADOW_OFFSET.1,
                std = SHADOW_BLUR / 2.0,
                color = SHADOW_COLOR,
                opacity = SHADOW_OPACITY
            ));
        }
        if let Some(color) = self.backdrop.as_deref() {
            svg.push_str(&format!(
                r#"<rect x="0" y="0" width="{w}" height="{h}" fill="{fill}"/>"#,
                w = self.width,
                h = self.height,
                fill = escape_xml(color)
            ));
        }
        svg.push_str(&format!(
            r#"<image href="{uri}" xlink:href="{uri}" x="{x}" y="{y}" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
            uri = image_data_uri,
            x = self.image.x,
            y = self.image.y,
            w = self.image.width,
            h = self.image.height
        ));

        let family = escape_xml(font_family);
        for block in &self.blocks {
            svg.push_str(&format!(
                r#"<g class="caption-{slot}" font-family="{family}" font-size="{size}" font-weight="bold" text-anchor="{anchor}">"#,
                slot = block.slot.as_str(),
                family = family,
                size = block.font_size,
                anchor = block.style.align.text_anchor()
            ));
            for line in &block.lines {
                push_line(&mut svg, line, &block.style);
            }
            svg.push_str("</g>");
        }

        svg.push_str("</svg>");
        svg
    }
}

// Stroke first, then fill over it. The shadow group opens and closes around a
// single line.
fn push_line(svg: &mut String, line: &PlacedLine, style: &Style) {
    let text = escape_xml(&line.text);
    if style.shadow {
        svg.push_str(&format!(r#"<g filter="url(#{})">"#, SHADOW_FILTER_ID));
    }
    if style.stroke_width > 0.0 {
        svg.push_str(&format!(
            r#"<text x="{x}" y="{y}" fill="none" stroke="{stroke}" stroke-width="{width}" stroke-linejoin="round">{text}</text>"#,
            x = line.x,
            y = line.baseline,
            stroke = escape_xml(&style.stroke_color),
            width = style.stroke_width,
            text = text
        ));
    }
    svg.push_str(&format!(
        r#"<text x="{x}" y="{y}" fill="{fill}">{text}</text>"#,
        x = line.x,
        y = line.baseline,
        fill = escape_xml(&style.fill_color),
        text = text
    ));
    if style.shadow {
        svg.push_str("</g>");
    }
}

/// Rasterizes an SVG document onto a freshly allocated pixmap.
pub fn rasterize_svg(svg: &str, fontdb: Arc<fontdb::Database>) -> RenderResult<Surface> {
    let options = Options {
        fontdb,
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options)
        .map_err(|err| RenderError::surface(format!("failed to build caption document: {}", err)))?;
    let size = tree.size().to_int_size();
    let mut pixmap = Pixmap::new(size.width(), size.height()).ok_or_else(|| {
        RenderError::surface(format!(
            "cannot allocate a {}x{} surface",
            size.width(),
            size.height()
        ))
    })?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    Surface::from_pixmap(&pixmap)
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::style::{StyleOptions, StyleProfile, resolve_style};

    fn standard() -> Style {
        resolve_style(&StyleOptions::default(), StyleProfile::Standard)
    }

    fn drake_top() -> Anchor {
        Anchor {
            x: 350.0,
            y: 100.0,
            max_width: 300.0,
        }
    }

    #[test]
    fn first_line_starts_at_anchor_and_lines_step_by_line_height() {
        let font = CaptionFont::estimated();
        let mut scene = CaptionScene::new(700, 700, ImagePlacement::full(700, 700));
        assert!(scene.push_caption(
            CaptionSlot::Top,
            "hello world this is a test",
            drake_top(),
            &standard(),
            40.0,
            &font,
        ));
        let block = scene.block(CaptionSlot::Top).expect("top block");
        assert!(block.lines.len() >= 2);
        assert_eq!(block.lines[0].y, 100.0);
        assert_eq!(block.lines[0].x, 350.0);
        assert!((block.lines[1].y - 148.0).abs() < 1e-3);
        for line in &block.lines {
            assert_eq!(line.text, line.text.to_uppercase());
            assert!((line.baseline - line.y - 32.0).abs() < 1e-3);
        }
    }

    #[test]
    fn blank_caption_adds_no_block() {
        let font = CaptionFont::estimated();
        let mut scene = CaptionScene::new(100, 100, ImagePlacement::full(100, 100));
        assert!(!scene.push_caption(CaptionSlot::Top, "", drake_top(), &standard(), 20.0, &font));
        assert!(!scene.push_caption(CaptionSlot::Top, "   ", drake_top(), &standard(), 20.0, &font));
        assert!(scene.blocks.is_empty());
        let svg = scene.to_svg("data:image/png;base64,AAAA", "Impact");
        assert!(!svg.contains("<text"));
        assert!(!svg.contains("<filter"));
    }

    #[test]
    fn shadow_is_scoped_to_its_own_lines() {
        let font = CaptionFont::estimated();
        let mut scene = CaptionScene::new(600, 600, ImagePlacement::full(600, 600));
        let shadowed = Style {
            shadow: true,
            ..standard()
        };
        let plain = Style {
            shadow: false,
            ..standard()
        };
        let top = Anchor {
            x: 300.0,
            y: 30.0,
            max_width: 540.0,
        };
        let bottom = Anchor {
            x: 300.0,
            y: 500.0,
            max_width: 540.0,
        };
        scene.push_caption(CaptionSlot::Top, "top text", top, &shadowed, 40.0, &font);
        scene.push_caption(CaptionSlot::Bottom, "bottom text", bottom, &plain, 40.0, &font);

        let svg = scene.to_svg("data:image/png;base64,AAAA", "Impact");
        let (before, after) = svg
            .split_once(r#"class="caption-bottom""#)
            .expect("bottom block present");
        assert!(before.contains(r#"filter="url(#caption-shadow)""#));
        assert!(!after.contains("filter="));
        assert_eq!(
            before.matches("<g filter=").count(),
            scene.block(CaptionSlot::Top).unwrap().lines.len()
        );
    }

    #[test]
    fn each_line_is_stroked_before_it_is_filled() {
        let font = CaptionFont::estimated();
        let mut scene = CaptionScene::new(400, 400, ImagePlacement::full(400, 400));
        scene.push_caption(CaptionSlot::Top, "stroke me", drake_top(), &standard(), 30.0, &font);
        let svg = scene.to_svg("data:image/png;base64,AAAA", "Impact");
        let stroke = svg.find(r#"fill="none" stroke="black""#).expect("stroke pass");
        let fill = svg.find(r#"fill="white""#).expect("fill pass");
        assert!(stroke < fill);
        assert!(svg.contains(r#"stroke-width="3""#));
    }

    #[test]
    fn zero_stroke_width_skips_the_stroke_pass() {
        let font = CaptionFont::estimated();
        let mut scene = CaptionScene::new(400, 400, ImagePlacement::full(400, 400));
        let style = Style {
            stroke_width: 0.0,
            ..standard()
        };
        scene.push_caption(CaptionSlot::Top, "flat", drake_top(), &style, 30.0, &font);
        let svg = scene.to_svg("data:image/png;base64,AAAA", "Impact");
        assert!(!svg.contains("stroke="));
        assert!(svg.contains(r#"fill="white""#));
    }

    #[test]
    fn caption_text_is_escaped() {
        let font = CaptionFont::estimated();
        let mut scene = CaptionScene::new(400, 400, ImagePlacement::full(400, 400));
        scene.push_caption(CaptionSlot::Top, "<b> & \"q\"", drake_top(), &standard(), 30.0, &font);
        let svg = scene.to_svg("data:image/png;base64,AAAA", "Impact, 'Arial Black'");
        assert!(svg.contains("&lt;B&gt; &amp; &quot;Q&quot;"));
        assert!(svg.contains("Impact, &apos;Arial Black&apos;"));
    }

    #[test]
    fn alignment_maps_to_text_anchor() {
        let font = CaptionFont::estimated();
        let mut scene = CaptionScene::new(400, 400, ImagePlacement::full(400, 400));
        let style = Style {
            align: crate::caption::Align::Right,
            ..standard()
        };
        scene.push_caption(CaptionSlot::Top, "right", drake_top(), &style, 30.0, &font);
        let svg = scene.to_svg("data:image/png;base64,AAAA", "Impact");
        assert!(svg.contains(r#"text-anchor="end""#));
    }

    #[test]
    fn rasterizing_a_zero_sized_document_fails() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="0" height="0"></svg>"#;
        let err = rasterize_svg(svg, Arc::new(fontdb::Database::new()))
            .err()
            .expect("zero size must fail");
        assert!(matches!(err, RenderError::SurfaceUnavailable(_)));
    }

    #[test]
    fn rasterizes_backdrop_onto_a_fresh_surface() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="8" height="4" viewBox="0 0 8 4"><rect x="0" y="0" width="8" height="4" fill="black"/></svg>"#;
        let surface = rasterize_svg(svg, Arc::new(fontdb::Database::new())).expect("raster");
        assert_eq!(surface.dimensions(), (8, 4));
        assert_eq!(surface.pixel(3, 2).unwrap().0, [0, 0, 0, 255]);
    }
}
