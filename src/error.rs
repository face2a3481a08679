//! Error kinds raised along the compositing pipeline.
//!
//! Most of these never escape the [`trigger`](crate::trigger) loop: decode failures become
//! skipped layers with a warning, symbol failures become a visible frame state.

use std::fmt;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// The optional image layers of a composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Background,
    Logo,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Background => write!(f, "background image"),
            Layer::Logo => write!(f, "logo"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A background or logo file could not be read or decoded.
    #[error("Could not load {layer}: {reason}")]
    ImageDecode { layer: Layer, reason: String },
    /// The QR bitmap generator failed to initialise or render.
    #[error("QR code generator unavailable: {0}")]
    SymbolSourceUnavailable(String),
    /// The symbol encoder rejected the payload, usually because it is too long
    /// for the selected error-correction level.
    #[error("Content cannot be encoded: {0}")]
    InvalidPayload(String),
    /// Export requested while no valid frame exists.
    #[error("Nothing to export yet")]
    ExportUnavailable,
    #[error("Invalid color {0:?}, expected #rrggbb")]
    InvalidColor(String),
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Invalid settings document: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// Builds an [`Error::ImageDecode`] for `layer` from any displayable cause.
    pub fn decode(layer: Layer, reason: impl fmt::Display) -> Self {
        Error::ImageDecode {
            layer,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_message_names_layer() {
        let err = Error::decode(Layer::Logo, "truncated PNG");
        assert_eq!(err.to_string(), "Could not load logo: truncated PNG");
    }

    #[test]
    fn test_export_unavailable_message() {
        assert_eq!(Error::ExportUnavailable.to_string(), "Nothing to export yet");
    }
}
