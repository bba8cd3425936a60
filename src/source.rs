use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{DynamicImage, GenericImageView};
use std::io::Cursor;
use std::path::PathBuf;
use tracing::info;

use crate::error::{RenderError, RenderResult};

pub const PNG_MIME: &str = "image/png";
pub const OCTET_STREAM_MIME: &str = "application/octet-stream";

/// Where a background image comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Path(PathBuf),
    /// `http(s)://` or `data:` URL.
    Url(String),
    Bytes {
        bytes: Vec<u8>,
        name: Option<String>,
    },
}

impl ImageSource {
    /// Classifies a template `image_url` or a CLI `--image` value.
    pub fn from_location(location: &str) -> Self {
        let trimmed = location.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("data:")
        {
            ImageSource::Url(trimmed.to_string())
        } else if let Some(path) = trimmed.strip_prefix("file://") {
            ImageSource::Path(PathBuf::from(path))
        } else {
            ImageSource::Path(PathBuf::from(trimmed))
        }
    }

    pub fn label(&self) -> String {
        match self {
            ImageSource::Path(path) => path.display().to_string(),
            ImageSource::Url(url) if url.starts_with("data:") => "data uri".to_string(),
            ImageSource::Url(url) => url.clone(),
            ImageSource::Bytes { name, .. } => name.clone().unwrap_or_else(|| "upload".to_string()),
        }
    }
}

/// A decoded source image. Holds the original encoded bytes for embedding; they
/// are released when this value is dropped.
pub struct LoadedImage {
    bytes: Vec<u8>,
    mime: String,
    image: DynamicImage,
    label: String,
}

impl LoadedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Data URI for the caption document. Formats the rasterizer can't read
    /// are re-encoded as PNG.
    pub fn embed_data_uri(&self) -> RenderResult<String> {
        if matches!(self.mime.as_str(), "image/png" | "image/jpeg" | "image/gif") {
            return Ok(format!("data:{};base64,{}", self.mime, BASE64.encode(&self.bytes)));
        }
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .map_err(|err| RenderError::encoding(PNG_MIME, err))?;
        Ok(format!("data:{};base64,{}", PNG_MIME, BASE64.encode(&bytes)))
    }
}

impl std::fmt::Debug for LoadedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedImage")
            .field("label", &self.label)
            .field("mime", &self.mime)
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// Reads or fetches the source once and decodes it. Any failure is an
/// `ImageLoad` error; nothing is retried.
pub async fn load_source(source: ImageSource, client: &reqwest::Client) -> RenderResult<LoadedImage> {
    let label = source.label();
    let bytes = match source {
        ImageSource::Path(path) => tokio::fs::read(&path)
            .await
            .map_err(|err| RenderError::image_load(&label, err))?,
        ImageSource::Url(url) if url.starts_with("data:") => decode_data_uri(&url)
            .ok_or_else(|| RenderError::image_load(&label, "malformed data uri"))?,
        ImageSource::Url(url) => fetch_bytes(client, &url).await?,
        ImageSource::Bytes { bytes, .. } => bytes,
    };
    decode_image(label, bytes)
}

pub fn decode_image(label: String, bytes: Vec<u8>) -> RenderResult<LoadedImage> {
    if bytes.is_empty() {
        return Err(RenderError::image_load(label, "source is empty"));
    }
    let image =
        image::load_from_memory(&bytes).map_err(|err| RenderError::image_load(&label, err))?;
    let mime = sniff_mime(&bytes);
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(RenderError::image_load(label, "image has no pixels"));
    }
    info!("source: {} ({}, {}x{})", label, mime, width, height);
    Ok(LoadedImage {
        bytes,
        mime,
        image,
        label,
    })
}

pub fn sniff_mime(bytes: &[u8]) -> String {
    infer::get(bytes)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| OCTET_STREAM_MIME.to_string())
}

async fn fetch_bytes(client: &reqwest::Client, url: &str) -> RenderResult<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| RenderError::image_load(url, err))?;
    let status = response.status();
    if !status.is_success() {
        return Err(RenderError::image_load(url, format!("HTTP {}", status)));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|err| RenderError::image_load(url, err))?;
    Ok(bytes.to_vec())
}

fn decode_data_uri(uri: &str) -> Option<Vec<u8>> {
    let rest = uri.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    if !meta.ends_with(";base64") {
        return None;
    }
    BASE64.decode(payload.trim()).ok()
}
