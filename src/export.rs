use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

use crate::error::{RenderError, RenderResult};
use crate::source::PNG_MIME;
use crate::surface::Surface;

pub const JPEG_MIME: &str = "image/jpeg";
pub const DEFAULT_QUALITY: f32 = 0.92;

/// Inline `data:image/png;base64,...` preview.
pub fn to_data_uri(surface: &Surface) -> RenderResult<String> {
    let bytes = to_blob(surface, PNG_MIME, DEFAULT_QUALITY)?;
    Ok(format!("data:{};base64,{}", PNG_MIME, BASE64.encode(bytes)))
}

/// Encodes the surface for upload or download. `quality` (0..1) applies to
/// JPEG only.
pub fn to_blob(surface: &Surface, mime: &str, quality: f32) -> RenderResult<Vec<u8>> {
    let mime = normalize_mime(mime);
    let format = image_format_from_mime(&mime)
        .ok_or_else(|| RenderError::encoding(&mime, "unsupported output image mime"))?;
    let mut bytes = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(surface.as_image().clone()).to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut bytes, jpeg_quality(quality));
            rgb.write_with_encoder(encoder)
                .map_err(|err| RenderError::encoding(&mime, err))?;
        }
        _ => {
            surface
                .as_image()
                .write_to(&mut Cursor::new(&mut bytes), format)
                .map_err(|err| RenderError::encoding(&mime, err))?;
        }
    }
    Ok(bytes)
}

pub fn image_format_from_mime(mime: &str) -> Option<ImageFormat> {
    match mime {
        "image/png" => Some(ImageFormat::Png),
        "image/jpeg" => Some(ImageFormat::Jpeg),
        "image/jpg" => Some(ImageFormat::Jpeg),
        "image/gif" => Some(ImageFormat::Gif),
        "image/webp" => Some(ImageFormat::WebP),
        "image/bmp" => Some(ImageFormat::Bmp),
        "image/tiff" => Some(ImageFormat::Tiff),
        _ => None,
    }
}

pub fn extension_from_mime(mime: &str) -> Option<&'static str> {
    match normalize_mime(mime).as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/bmp" => Some("bmp"),
        "image/tiff" => Some("tiff"),
        _ => None,
    }
}

/// Output mime for a file extension, if it is an encodable image format.
pub fn mime_from_extension(extension: &str) -> Option<String> {
    let mime = normalize_mime(extension);
    image_format_from_mime(&mime).map(|_| mime)
}

/// Accepts a bare format name (`png`, `jpg`) as well as a full mime type.
pub fn normalize_mime(value: &str) -> String {
    let lower = value.trim().to_ascii_lowercase();
    match lower.as_str() {
        "png" => "image/png".to_string(),
        "jpg" | "jpeg" => JPEG_MIME.to_string(),
        "gif" => "image/gif".to_string(),
        "webp" => "image/webp".to_string(),
        "bmp" => "image/bmp".to_string(),
        "tif" | "tiff" => "image/tiff".to_string(),
        _ => lower,
    }
}

fn jpeg_quality(quality: f32) -> u8 {
    if !quality.is_finite() {
        return (DEFAULT_QUALITY * 100.0) as u8;
    }
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}
