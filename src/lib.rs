use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use tracing::info;

pub mod caption;
mod compositor;
pub mod error;
pub mod export;
pub mod gallery;
pub mod logging;
pub mod server;
pub mod settings;
pub mod source;
pub mod story;
mod surface;
pub mod templates;
mod test_util;

pub use caption::{Align, CaptionPositions, PositionOverride, StyleOptions};
pub use compositor::Compositor;
pub use error::{RenderError, RenderResult};
pub use gallery::{LocalGallery, MemePage, MemeStore, NewMeme, StoredMeme};
pub use source::ImageSource;
pub use surface::Surface;
pub use templates::{Template, TemplateCatalog};

const DEFAULT_OUTPUT_STEM: &str = "meme";

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub template: Option<String>,
    /// Local path, `file://`, `http(s)://` or `data:` URI.
    pub image: Option<String>,
    pub top: String,
    pub bottom: String,
    pub style: StyleOptions,
    pub positions: CaptionPositions,
    pub story: bool,
    pub output: Option<PathBuf>,
    pub format: Option<String>,
    pub quality: Option<f32>,
    pub data_uri: bool,
    pub save: bool,
    pub settings_path: Option<String>,
    pub show_templates: bool,
    pub show_gallery: Option<usize>,
}

pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let catalog = TemplateCatalog::builtin().with_extra(settings.templates.clone());

    if config.show_templates {
        return Ok(format_templates(&catalog));
    }
    if let Some(page) = config.show_gallery {
        let gallery = LocalGallery::from_settings(&settings.gallery);
        return Ok(format_gallery_page(&gallery.page(page)?));
    }

    let compositor = Compositor::from_settings(&settings.font)?;
    let style = config.style.merged_over(&settings.style);

    let (source, template) = match (config.image.as_deref(), config.template.as_deref()) {
        (Some(_), Some(_)) => return Err(anyhow!("--image and --template cannot be used together")),
        (Some(image), None) => (ImageSource::from_location(image), None),
        (None, Some(id)) => {
            let template = catalog
                .find(id)
                .ok_or_else(|| anyhow!("unknown template: {} (see --show-templates)", id))?;
            (ImageSource::from_location(&template.image_url), Some(template))
        }
        (None, None) => {
            let template = catalog
                .random()
                .ok_or_else(|| anyhow!("no templates available"))?;
            info!("no template given; picked {}", template.id);
            (ImageSource::from_location(&template.image_url), Some(template))
        }
    };

    let surface = match (config.story, template) {
        (true, _) => {
            compositor
                .render_story_surface(source, &config.top, &config.bottom, &style)
                .await?
        }
        (false, Some(template)) => {
            compositor
                .render_captioned_template(
                    template,
                    &config.top,
                    &config.bottom,
                    &style,
                    &config.positions,
                )
                .await?
        }
        (false, None) => {
            compositor
                .render_captioned_source(
                    source,
                    &config.top,
                    &config.bottom,
                    &style,
                    &config.positions,
                )
                .await?
        }
    };

    let mut lines = Vec::new();
    if config.data_uri {
        lines.push(export::to_data_uri(&surface)?);
    } else {
        let mime = resolve_output_mime(
            config.format.as_deref(),
            config.output.as_deref(),
            &settings.export.mime,
        );
        let extension = export::extension_from_mime(&mime)
            .ok_or_else(|| anyhow!("unsupported output format: {}", mime))?;
        let output = config
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.{}", DEFAULT_OUTPUT_STEM, extension)));
        let quality = config.quality.unwrap_or(settings.export.quality);
        let bytes = export::to_blob(&surface, &mime, quality)?;
        std::fs::write(&output, &bytes)
            .with_context(|| format!("failed to write output: {}", output.display()))?;
        lines.push(format!(
            "wrote {} ({}x{}, {})",
            output.display(),
            surface.width(),
            surface.height(),
            mime
        ));
    }

    // Only a fully exported render reaches the gallery.
    if config.save {
        let gallery = LocalGallery::from_settings(&settings.gallery);
        let png = export::to_blob(&surface, source::PNG_MIME, settings.export.quality)?;
        let stored = gallery.save(NewMeme {
            png,
            top_text: config.top.clone(),
            bottom_text: config.bottom.clone(),
            template_id: template.map(|template| template.id.clone()),
        })?;
        lines.push(format!("saved: {} ({})", stored.id, stored.path));
    }
    Ok(lines.join("\n"))
}

/// `--format` wins, then the output file extension, then the configured mime.
fn resolve_output_mime(format: Option<&str>, output: Option<&Path>, fallback: &str) -> String {
    if let Some(format) = format.map(str::trim).filter(|value| !value.is_empty()) {
        return export::normalize_mime(format);
    }
    output
        .and_then(|path| path.extension())
        .and_then(|ext| ext.to_str())
        .and_then(export::mime_from_extension)
        .unwrap_or_else(|| export::normalize_mime(fallback))
}

pub fn format_templates(catalog: &TemplateCatalog) -> String {
    catalog
        .list()
        .iter()
        .map(|template| format!("{}\t{}", template.id, template.name))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_gallery_page(page: &MemePage) -> String {
    if page.items.is_empty() {
        return format!("page {}: no memes", page.page);
    }
    let mut lines = page
        .items
        .iter()
        .map(|meme| {
            format!(
                "{}\t{}\t{} / {}\treactions={}\t{}",
                meme.created_at,
                meme.id,
                meme.top_text,
                meme.bottom_text,
                meme.reactions_count,
                meme.path
            )
        })
        .collect::<Vec<_>>();
    if page.has_more {
        lines.push(format!("more: --show-gallery {}", page.page + 1));
    }
    lines.join("\n")
}
