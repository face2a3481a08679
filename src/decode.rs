//! Image decode boundary.
//!
//! Background and logo images arrive as opaque references ([`ImageSource`]) and are decoded
//! off the async runtime with [`decode_layer`]. Each decode is independent; callers gate on
//! each result separately instead of assuming an order.

use crate::error::{Error, Layer, Result};
use base64::Engine as _;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// A reference to an image supplied by the user.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    /// A file on disk, read at decode time.
    Path(PathBuf),
    /// A `data:` URI such as `data:image/png;base64,...`.
    DataUri(String),
    /// Raw encoded bytes already in memory.
    #[serde(skip)]
    Bytes(Arc<[u8]>),
}

impl ImageSource {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        ImageSource::Bytes(Arc::from(bytes.into()))
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        ImageSource::Path(path.into())
    }

    /// Returns the encoded image bytes behind this reference.
    pub fn load_bytes(&self) -> Result<Cow<'_, [u8]>> {
        match self {
            ImageSource::Path(path) => Ok(Cow::Owned(std::fs::read(path)?)),
            ImageSource::DataUri(uri) => parse_data_uri(uri).map(Cow::Owned),
            ImageSource::Bytes(bytes) => Ok(Cow::Borrowed(bytes.as_ref())),
        }
    }
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            ImageSource::DataUri(uri) => write!(f, "DataUri({} chars)", uri.len()),
            ImageSource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
        }
    }
}

fn parse_data_uri(uri: &str) -> Result<Vec<u8>> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| Error::InvalidDataUri("missing data: prefix".to_string()))?;
    let (meta, data) = rest
        .split_once(',')
        .ok_or_else(|| Error::InvalidDataUri("missing ',' separator".to_string()))?;
    if meta.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| Error::InvalidDataUri(e.to_string()))
    } else {
        Ok(data.as_bytes().to_vec())
    }
}

/// A decoded, drawable image with its natural pixel dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    image: Arc<RgbaImage>,
}

impl DecodedImage {
    pub fn new(image: RgbaImage) -> Self {
        DecodedImage {
            image: Arc::new(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.image
    }
}

/// Turns an [`ImageSource`] into pixels.
///
/// Implementations run on a blocking thread and may take as long as they need.
pub trait ImageDecoder: Send + Sync + 'static {
    fn decode(&self, source: &ImageSource) -> Result<DecodedImage>;
}

/// Decodes any format the `image` crate recognises.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDecoder;

impl ImageDecoder for DefaultDecoder {
    fn decode(&self, source: &ImageSource) -> Result<DecodedImage> {
        let bytes = source.load_bytes()?;
        let image = image::load_from_memory(&bytes)?.to_rgba8();
        Ok(DecodedImage::new(image))
    }
}

/// Decodes `source` for `layer` on a blocking thread.
///
/// Every failure, including a panicking decoder, comes back as [`Error::ImageDecode`] naming
/// the layer.
pub async fn decode_layer(
    decoder: Arc<dyn ImageDecoder>,
    layer: Layer,
    source: ImageSource,
) -> Result<DecodedImage> {
    let joined = tokio::task::spawn_blocking(move || decoder.decode(&source)).await;
    match joined {
        Ok(Ok(image)) => {
            debug!("Decoded {layer} ({}x{})", image.width(), image.height());
            Ok(image)
        }
        Ok(Err(err)) => {
            warn!("Failed to decode {layer}: {err}");
            Err(Error::decode(layer, err))
        }
        Err(join_err) => {
            warn!("Decoder task for {layer} did not finish: {join_err}");
            Err(Error::decode(layer, join_err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_bytes() {
        let source = ImageSource::from_bytes(png_bytes(3, 2));
        let decoded = DefaultDecoder.decode(&source).unwrap();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.pixels().get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_decode_base64_data_uri() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes(4, 4));
        let source = ImageSource::DataUri(format!("data:image/png;base64,{encoded}"));
        assert_eq!(DefaultDecoder.decode(&source).unwrap().dimensions(), (4, 4));
    }

    #[test]
    fn test_decode_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        std::fs::write(&path, png_bytes(5, 7)).unwrap();
        let decoded = DefaultDecoder.decode(&ImageSource::from_path(&path)).unwrap();
        assert_eq!(decoded.dimensions(), (5, 7));
    }

    #[test]
    fn test_malformed_data_uri() {
        let err = ImageSource::DataUri("image/png;base64,AAAA".to_string())
            .load_bytes()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDataUri(_)));
    }

    #[test]
    fn test_debug_does_not_dump_bytes() {
        let source = ImageSource::from_bytes(vec![0u8; 2048]);
        assert_eq!(format!("{source:?}"), "Bytes(2048 bytes)");
    }

    #[tokio::test]
    async fn test_decode_layer_reports_layer_on_corrupt_input() {
        let source = ImageSource::from_bytes(b"definitely not a png".to_vec());
        let err = decode_layer(Arc::new(DefaultDecoder), Layer::Background, source)
            .await
            .unwrap_err();
        match err {
            Error::ImageDecode { layer, .. } => assert_eq!(layer, Layer::Background),
            other => panic!("unexpected error: {other}"),
        }
    }
}
