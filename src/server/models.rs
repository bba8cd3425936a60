use serde::{Deserialize, Serialize};

use crate::caption::{CaptionPositions, StyleOptions};
use crate::gallery::StoredMeme;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct RenderRequest {
    pub(crate) template_id: Option<String>,
    pub(crate) image_url: Option<String>,
    /// Raw base64 or a full `data:` URI.
    pub(crate) image_base64: Option<String>,
    pub(crate) top_text: String,
    pub(crate) bottom_text: String,
    pub(crate) style: StyleOptions,
    pub(crate) positions: CaptionPositions,
    pub(crate) story: bool,
    /// `png`, `jpeg`, any image mime, or `data_uri`.
    pub(crate) format: Option<String>,
    pub(crate) quality: Option<f32>,
    pub(crate) save: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct RenderResponse {
    pub(crate) mime: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) data_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) data_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) stored: Option<StoredMeme>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct GalleryQuery {
    pub(crate) page: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReactRequest {
    pub(crate) delta: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}
