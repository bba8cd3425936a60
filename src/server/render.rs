use axum::http::StatusCode;
use base64::Engine;
use std::sync::Arc;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::info;

use crate::error::RenderError;
use crate::export::{normalize_mime, to_blob, to_data_uri};
use crate::gallery::{MemeStore, NewMeme};
use crate::source::{ImageSource, PNG_MIME};
use crate::surface::Surface;
use crate::templates::Template;

use super::models::{RenderRequest, RenderResponse};
use super::state::ServerState;

const DATA_URI_FORMAT: &str = "data_uri";

#[derive(Debug)]
pub(crate) struct ServerError {
    pub(crate) status: StatusCode,
    pub(crate) message: String,
}

impl ServerError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<RenderError> for ServerError {
    fn from(err: RenderError) -> Self {
        if err.is_image_load() {
            ServerError::bad_request(err.to_string())
        } else {
            ServerError::internal(err.to_string())
        }
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::internal(err.to_string())
    }
}

enum RequestSource<'a> {
    Template(&'a Template),
    Source(ImageSource),
}

pub(crate) async fn render_request(
    state: &ServerState,
    request: RenderRequest,
) -> Result<RenderResponse, ServerError> {
    let source = resolve_request_source(state, &request)?;
    let style = request.style.merged_over(&state.settings.style);
    let compositor = &state.compositor;

    let template_id = match &source {
        RequestSource::Template(template) => Some(template.id.clone()),
        RequestSource::Source(_) => None,
    };
    let surface: Surface = match (source, request.story) {
        (RequestSource::Template(template), false) => {
            compositor
                .render_captioned_template(
                    template,
                    &request.top_text,
                    &request.bottom_text,
                    &style,
                    &request.positions,
                )
                .await?
        }
        (RequestSource::Template(template), true) => {
            compositor
                .render_story_surface(
                    ImageSource::from_location(&template.image_url),
                    &request.top_text,
                    &request.bottom_text,
                    &style,
                )
                .await?
        }
        (RequestSource::Source(image), false) => {
            compositor
                .render_captioned_source(
                    image,
                    &request.top_text,
                    &request.bottom_text,
                    &style,
                    &request.positions,
                )
                .await?
        }
        (RequestSource::Source(image), true) => {
            compositor
                .render_story_surface(image, &request.top_text, &request.bottom_text, &style)
                .await?
        }
    };
    info!(
        "rendered {}x{} (story: {})",
        surface.width(),
        surface.height(),
        request.story
    );

    let format = request
        .format
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(state.settings.export.mime.as_str());
    let mut response = if format.eq_ignore_ascii_case(DATA_URI_FORMAT) {
        RenderResponse {
            mime: PNG_MIME.to_string(),
            data_base64: None,
            data_uri: Some(to_data_uri(&surface)?),
            stored: None,
        }
    } else {
        let mime = normalize_mime(format);
        let quality = request.quality.unwrap_or(state.settings.export.quality);
        let bytes = to_blob(&surface, &mime, quality)?;
        RenderResponse {
            mime,
            data_base64: Some(BASE64.encode(bytes)),
            data_uri: None,
            stored: None,
        }
    };

    // Only a fully encoded render reaches the gallery.
    if request.save {
        let meme = NewMeme {
            png: to_blob(&surface, PNG_MIME, state.settings.export.quality)?,
            top_text: request.top_text,
            bottom_text: request.bottom_text,
            template_id,
        };
        let stored = with_gallery(&state.gallery, move |gallery| gallery.save(meme)).await?;
        response.stored = Some(stored);
    }
    Ok(response)
}

/// Runs a gallery call on the blocking pool; the store does file I/O.
pub(crate) async fn with_gallery<T, F>(
    gallery: &Arc<dyn MemeStore>,
    func: F,
) -> Result<T, ServerError>
where
    F: FnOnce(&dyn MemeStore) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let gallery = Arc::clone(gallery);
    tokio::task::spawn_blocking(move || func(gallery.as_ref()))
        .await
        .map_err(|err| ServerError::internal(format!("gallery task failed: {}", err)))?
        .map_err(ServerError::from)
}

fn resolve_request_source<'a>(
    state: &'a ServerState,
    request: &RenderRequest,
) -> Result<RequestSource<'a>, ServerError> {
    let image_url = non_blank(request.image_url.as_deref());
    let image_base64 = non_blank(request.image_base64.as_deref());
    if image_url.is_some() && image_base64.is_some() {
        return Err(ServerError::bad_request(
            "image_url and image_base64 cannot be provided together",
        ));
    }
    if let Some(url) = image_url {
        // Requests may not name server-side files.
        return match ImageSource::from_location(url) {
            source @ ImageSource::Url(_) => Ok(RequestSource::Source(source)),
            _ => Err(ServerError::bad_request(
                "image_url must be an http(s):// or data: URL",
            )),
        };
    }
    if let Some(encoded) = image_base64 {
        if encoded.starts_with("data:") {
            return Ok(RequestSource::Source(ImageSource::Url(encoded.to_string())));
        }
        let bytes = BASE64
            .decode(encoded)
            .map_err(|err| ServerError::bad_request(format!("invalid image_base64: {}", err)))?;
        return Ok(RequestSource::Source(ImageSource::Bytes { bytes, name: None }));
    }
    match non_blank(request.template_id.as_deref()) {
        Some(id) => state
            .catalog
            .find(id)
            .map(RequestSource::Template)
            .ok_or_else(|| ServerError::not_found(format!("unknown template: {}", id))),
        None => Err(ServerError::bad_request(
            "one of template_id, image_url or image_base64 is required",
        )),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::{Anchor, CaptionFont};
    use crate::compositor::Compositor;
    use crate::gallery::LocalGallery;
    use crate::settings::Settings;
    use crate::templates::TemplateCatalog;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::path::Path;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([90, 90, 90, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("encode png");
        bytes
    }

    fn state(dir: &Path) -> ServerState {
        let template_path = dir.join("local.png");
        std::fs::write(&template_path, png_bytes(60, 40)).expect("write template");
        let local = Template {
            id: "local".to_string(),
            name: "Local".to_string(),
            image_url: template_path.display().to_string(),
            top: Anchor {
                x: 30.0,
                y: 2.0,
                max_width: 50.0,
            },
            bottom: Anchor {
                x: 30.0,
                y: 30.0,
                max_width: 50.0,
            },
        };
        ServerState {
            settings: Settings::default(),
            catalog: TemplateCatalog::builtin().with_extra(vec![local]),
            compositor: Compositor::new(CaptionFont::estimated()),
            gallery: Arc::new(LocalGallery::new(dir.join("gallery"), 6)),
        }
    }

    fn request() -> RenderRequest {
        RenderRequest {
            top_text: "top".to_string(),
            bottom_text: "bottom".to_string(),
            ..RenderRequest::default()
        }
    }

    #[tokio::test]
    async fn renders_template_as_base64_png() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(dir.path());
        let response = render_request(
            &state,
            RenderRequest {
                template_id: Some("local".to_string()),
                ..request()
            },
        )
        .await
        .expect("render");
        assert_eq!(response.mime, "image/png");
        let bytes = BASE64
            .decode(response.data_base64.expect("payload"))
            .expect("base64");
        let decoded = image::load_from_memory(&bytes).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (60, 40));
        assert!(response.stored.is_none());
    }

    #[tokio::test]
    async fn uploaded_base64_renders_as_data_uri_and_saves() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(dir.path());
        let response = render_request(
            &state,
            RenderRequest {
                image_base64: Some(BASE64.encode(png_bytes(20, 20))),
                format: Some("data_uri".to_string()),
                save: true,
                ..request()
            },
        )
        .await
        .expect("render");
        assert!(
            response
                .data_uri
                .as_deref()
                .unwrap_or_default()
                .starts_with("data:image/png;base64,")
        );
        let stored = response.stored.expect("stored");
        assert!(stored.path.ends_with("-upload.png"));
        assert_eq!(state.gallery.page(0).expect("page").items.len(), 1);
    }

    #[tokio::test]
    async fn story_requests_are_full_size_jpeg() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(dir.path());
        let response = render_request(
            &state,
            RenderRequest {
                template_id: Some("local".to_string()),
                story: true,
                format: Some("jpeg".to_string()),
                ..request()
            },
        )
        .await
        .expect("render");
        assert_eq!(response.mime, "image/jpeg");
        let bytes = BASE64
            .decode(response.data_base64.expect("payload"))
            .expect("base64");
        let decoded = image::load_from_memory(&bytes).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (1080, 1920));
    }

    #[tokio::test]
    async fn unknown_template_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(dir.path());
        let err = render_request(
            &state,
            RenderRequest {
                template_id: Some("nope".to_string()),
                ..request()
            },
        )
        .await
        .expect_err("must fail");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_or_conflicting_sources_are_bad_requests() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(dir.path());
        let err = render_request(&state, request()).await.expect_err("must fail");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = render_request(
            &state,
            RenderRequest {
                image_url: Some("https://example.com/a.png".to_string()),
                image_base64: Some("AAAA".to_string()),
                ..request()
            },
        )
        .await
        .expect_err("must fail");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn undecodable_upload_is_a_bad_request() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(dir.path());
        let err = render_request(
            &state,
            RenderRequest {
                image_base64: Some(BASE64.encode(b"not an image")),
                ..request()
            },
        )
        .await
        .expect_err("must fail");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.starts_with("image load error"));
    }

    #[tokio::test]
    async fn image_url_rejects_server_side_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(dir.path());
        let local = dir.path().join("local.png").display().to_string();
        for image_url in [local.clone(), format!("file://{}", local)] {
            let err = render_request(
                &state,
                RenderRequest {
                    image_url: Some(image_url),
                    ..request()
                },
            )
            .await
            .expect_err("must fail");
            assert_eq!(err.status, StatusCode::BAD_REQUEST);
            assert!(!err.message.contains(&local));
        }
    }

    #[tokio::test]
    async fn image_url_accepts_data_uris() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(dir.path());
        let response = render_request(
            &state,
            RenderRequest {
                image_url: Some(format!(
                    "data:image/png;base64,{}",
                    BASE64.encode(png_bytes(24, 16))
                )),
                ..request()
            },
        )
        .await
        .expect("render");
        let bytes = BASE64
            .decode(response.data_base64.expect("payload"))
            .expect("base64");
        let decoded = image::load_from_memory(&bytes).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (24, 16));
    }

    #[tokio::test]
    async fn failed_encoding_leaves_the_gallery_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(dir.path());
        let err = render_request(
            &state,
            RenderRequest {
                template_id: Some("local".to_string()),
                format: Some("image/avif".to_string()),
                save: true,
                ..request()
            },
        )
        .await
        .expect_err("must fail");
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(state.gallery.page(0).expect("page").items.is_empty());
    }

    #[tokio::test]
    async fn unsupported_format_is_an_internal_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(dir.path());
        let err = render_request(
            &state,
            RenderRequest {
                template_id: Some("local".to_string()),
                format: Some("image/avif".to_string()),
                ..request()
            },
        )
        .await
        .expect_err("must fail");
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
