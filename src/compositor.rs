use anyhow::Result;
use tracing::{debug, info};

use crate::caption::{
    CaptionFont, CaptionPositions, CaptionScene, CaptionSlot, ImagePlacement, StyleOptions,
    StyleProfile, caption_font_size, rasterize_svg, resolve_anchor, resolve_style,
};
use crate::error::RenderResult;
use crate::export::{DEFAULT_QUALITY, to_blob};
use crate::settings::FontSettings;
use crate::source::{ImageSource, LoadedImage, PNG_MIME, load_source};
use crate::story::{STORY_BACKDROP, STORY_HEIGHT, STORY_WIDTH, contain_fit, story_anchor};
use crate::surface::Surface;
use crate::templates::Template;

/// Caption renderer. Owns the resolved caption font and the HTTP client used
/// for remote sources; construct once and share across renders.
#[derive(Clone)]
pub struct Compositor {
    font: CaptionFont,
    client: reqwest::Client,
}

impl Compositor {
    pub fn new(font: CaptionFont) -> Self {
        Self::with_client(font, reqwest::Client::new())
    }

    pub fn with_client(font: CaptionFont, client: reqwest::Client) -> Self {
        Self { font, client }
    }

    pub fn from_settings(font: &FontSettings) -> Result<Self> {
        let font = CaptionFont::resolve(font.path.as_deref(), font.family.as_deref())?;
        Ok(Self::new(font))
    }

    pub fn font(&self) -> &CaptionFont {
        &self.font
    }

    /// Loads the template image and draws the captions at the template's
    /// anchors, unless `positions` overrides a slot.
    pub async fn render_captioned_template(
        &self,
        template: &Template,
        top: &str,
        bottom: &str,
        style: &StyleOptions,
        positions: &CaptionPositions,
    ) -> RenderResult<Surface> {
        info!("render template: {}", template.id);
        let loaded = load_source(ImageSource::from_location(&template.image_url), &self.client).await?;
        self.compose(&loaded, Some(template), top, bottom, style, positions)
    }

    pub async fn render_captioned_source(
        &self,
        source: ImageSource,
        top: &str,
        bottom: &str,
        style: &StyleOptions,
        positions: &CaptionPositions,
    ) -> RenderResult<Surface> {
        let loaded = load_source(source, &self.client).await?;
        self.compose(&loaded, None, top, bottom, style, positions)
    }

    /// Renders the 1080x1920 story variant and encodes it as PNG.
    pub async fn render_story(
        &self,
        source: ImageSource,
        top: &str,
        bottom: &str,
        style: &StyleOptions,
    ) -> RenderResult<Vec<u8>> {
        let surface = self.render_story_surface(source, top, bottom, style).await?;
        to_blob(&surface, PNG_MIME, DEFAULT_QUALITY)
    }

    pub async fn render_story_surface(
        &self,
        source: ImageSource,
        top: &str,
        bottom: &str,
        style: &StyleOptions,
    ) -> RenderResult<Surface> {
        let loaded = load_source(source, &self.client).await?;
        self.compose_story(&loaded, top, bottom, style)
    }

    /// Paints captions over an already loaded source at its natural size.
    pub fn compose(
        &self,
        loaded: &LoadedImage,
        template: Option<&Template>,
        top: &str,
        bottom: &str,
        options: &StyleOptions,
        positions: &CaptionPositions,
    ) -> RenderResult<Surface> {
        let (width, height) = (loaded.width(), loaded.height());
        let style = resolve_style(options, StyleProfile::Standard);
        let font_size = caption_font_size(width, style.font_scale);
        let mut scene = CaptionScene::new(width, height, ImagePlacement::full(width, height));

        for (slot, text) in [(CaptionSlot::Top, top), (CaptionSlot::Bottom, bottom)] {
            let template_anchor = template.map(|template| match slot {
                CaptionSlot::Top => template.top,
                CaptionSlot::Bottom => template.bottom,
            });
            let anchor = resolve_anchor(
                slot,
                positions.get(slot),
                template_anchor,
                width,
                height,
                style.align,
            );
            scene.push_caption(slot, text, anchor, &style, font_size, &self.font);
        }

        self.paint(&scene, loaded)
    }

    pub fn compose_story(
        &self,
        loaded: &LoadedImage,
        top: &str,
        bottom: &str,
        options: &StyleOptions,
    ) -> RenderResult<Surface> {
        let style = resolve_style(options, StyleProfile::Story);
        let font_size = caption_font_size(STORY_WIDTH, style.font_scale);
        let fit = contain_fit(loaded.width(), loaded.height(), STORY_WIDTH, STORY_HEIGHT);
        let mut scene =
            CaptionScene::new(STORY_WIDTH, STORY_HEIGHT, fit.into()).with_backdrop(STORY_BACKDROP);

        for (slot, text) in [(CaptionSlot::Top, top), (CaptionSlot::Bottom, bottom)] {
            let anchor = story_anchor(slot, style.align);
            scene.push_caption(slot, text, anchor, &style, font_size, &self.font);
        }

        self.paint(&scene, loaded)
    }

    fn paint(&self, scene: &CaptionScene, loaded: &LoadedImage) -> RenderResult<Surface> {
        let data_uri = loaded.embed_data_uri()?;
        let svg = scene.to_svg(&data_uri, &self.font.family_list());
        debug!(
            "paint {}x{} with {} caption block(s)",
            scene.width,
            scene.height,
            scene.blocks.len()
        );
        rasterize_svg(&svg, self.font.fontdb())
    }
}
