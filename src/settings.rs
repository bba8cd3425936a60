use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::caption::{Align, StyleOptions};
use crate::export::{DEFAULT_QUALITY, normalize_mime};
use crate::source::PNG_MIME;
use crate::templates::Template;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
const HOME_DIR_NAME: &str = ".memegen-rust";
pub const DEFAULT_PAGE_SIZE: usize = 6;
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:8787";

#[derive(Debug, Clone, Default)]
pub struct FontSettings {
    pub family: Option<String>,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub mime: String,
    pub quality: f32,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            mime: PNG_MIME.to_string(),
            quality: DEFAULT_QUALITY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GallerySettings {
    pub dir: PathBuf,
    pub page_size: usize,
}

impl Default for GallerySettings {
    fn default() -> Self {
        let dir = home_dir()
            .map(|home| home.join("gallery"))
            .unwrap_or_else(|| PathBuf::from("gallery"));
        Self {
            dir,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Defaults merged under explicit caller options.
    pub style: StyleOptions,
    pub font: FontSettings,
    pub export: ExportSettings,
    pub gallery: GallerySettings,
    pub server_addr: String,
    pub templates: Vec<Template>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            style: StyleOptions::default(),
            font: FontSettings::default(),
            export: ExportSettings::default(),
            gallery: GallerySettings::default(),
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
            templates: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    style: Option<StyleSection>,
    font: Option<FontSection>,
    export: Option<ExportSection>,
    gallery: Option<GallerySection>,
    server: Option<ServerSection>,
    templates: Option<Vec<Template>>,
}

#[derive(Debug, Default, Deserialize)]
struct StyleSection {
    font_scale: Option<f32>,
    stroke_width: Option<f32>,
    fill_color: Option<String>,
    stroke_color: Option<String>,
    align: Option<Align>,
    shadow: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct FontSection {
    family: Option<String>,
    path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ExportSection {
    mime: Option<String>,
    quality: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct GallerySection {
    dir: Option<String>,
    page_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    addr: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let embedded: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).context("failed to parse embedded settings")?;
    settings.merge(embedded);

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(style) = incoming.style {
            if let Some(scale) = style.font_scale.filter(|scale| *scale > 0.0) {
                self.style.font_scale = Some(scale);
            }
            if let Some(width) = style.stroke_width.filter(|width| *width >= 0.0) {
                self.style.stroke_width = Some(width);
            }
            if let Some(color) = non_blank(style.fill_color) {
                self.style.fill_color = Some(color);
            }
            if let Some(color) = non_blank(style.stroke_color) {
                self.style.stroke_color = Some(color);
            }
            if let Some(align) = style.align {
                self.style.align = Some(align);
            }
            if let Some(shadow) = style.shadow {
                self.style.shadow = Some(shadow);
            }
        }
        if let Some(font) = incoming.font {
            if let Some(family) = non_blank(font.family) {
                self.font.family = Some(family);
            }
            if let Some(path) = non_blank(font.path) {
                self.font.path = Some(expand_home(&path));
            }
        }
        if let Some(export) = incoming.export {
            if let Some(mime) = non_blank(export.mime) {
                self.export.mime = normalize_mime(&mime);
            }
            if let Some(quality) = export.quality.filter(|q| *q > 0.0 && *q <= 1.0) {
                self.export.quality = quality;
            }
        }
        if let Some(gallery) = incoming.gallery {
            if let Some(dir) = non_blank(gallery.dir) {
                self.gallery.dir = expand_home(&dir);
            }
            if let Some(size) = gallery.page_size.filter(|size| *size > 0) {
                self.gallery.page_size = size;
            }
        }
        if let Some(server) = incoming.server {
            if let Some(addr) = non_blank(server.addr) {
                self.server_addr = addr;
            }
        }
        if let Some(templates) = incoming.templates {
            for template in templates {
                if template.id.trim().is_empty() || template.image_url.trim().is_empty() {
                    continue;
                }
                if let Some(existing) = self.templates.iter_mut().find(|t| t.id == template.id) {
                    *existing = template;
                } else {
                    self.templates.push(template);
                }
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn expand_home(value: &str) -> PathBuf {
    let trimmed = value.trim();
    if let Some(rest) = trimmed.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return Path::new(&home).join(rest);
        }
    }
    PathBuf::from(trimmed)
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

pub fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(HOME_DIR_NAME))
        }
    })
}
