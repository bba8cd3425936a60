pub type RenderResult<T> = Result<T, RenderError>;

/// Failures of a single render or export call. None of them is retried.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("image load error ({origin}): {message}")]
    ImageLoad { origin: String, message: String },

    #[error("surface unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error("encoding error ({mime}): {message}")]
    Encoding { mime: String, message: String },
}

impl RenderError {
    pub fn image_load(origin: impl Into<String>, message: impl ToString) -> Self {
        Self::ImageLoad {
            origin: origin.into(),
            message: message.to_string(),
        }
    }

    pub fn surface(message: impl ToString) -> Self {
        Self::SurfaceUnavailable(message.to_string())
    }

    pub fn encoding(mime: impl Into<String>, message: impl ToString) -> Self {
        Self::Encoding {
            mime: mime.into(),
            message: message.to_string(),
        }
    }

    pub fn is_image_load(&self) -> bool {
        matches!(self, Self::ImageLoad { .. })
    }
}
