//! QR symbol source.
//!
//! The symbol encoder itself is the `qrcode` crate; this module only wraps it behind the
//! [`SymbolSource`] boundary and rasterises its modules into a square RGBA bitmap the
//! compositor can draw.

use crate::error::{Error, Result};
use crate::settings::{BackgroundMode, Color, ErrorLevel, Settings};
use image::{ImageBuffer, Rgba, RgbaImage};
use qrcode::types::QrError;
use qrcode::{EcLevel, QrCode};
use tracing::debug;

/// Light modules drawn around the symbol on every side.
pub const QUIET_ZONE: u32 = 4;

/// Everything that determines the pixels of a symbol bitmap.
///
/// Two equal requests always yield identical bitmaps, so the trigger compares requests to
/// decide whether a bitmap is current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRequest {
    pub payload: String,
    pub level: ErrorLevel,
    /// Side of the bitmap in pixels.
    pub size: u32,
    pub foreground: Color,
    /// Light module color, `None` for transparent.
    pub background: Option<Color>,
}

impl SymbolRequest {
    /// Derives the symbol request for the current settings.
    ///
    /// Light modules are transparent outside solid mode so a background image shows through.
    pub fn from_settings(settings: &Settings) -> Self {
        let background = match settings.style.background_mode {
            BackgroundMode::Solid => Some(settings.style.background_color),
            BackgroundMode::Image => None,
        };
        SymbolRequest {
            payload: settings.payload(),
            level: settings.style.error_level,
            size: settings.effective_size(),
            foreground: settings.style.foreground,
            background,
        }
    }
}

impl From<ErrorLevel> for EcLevel {
    fn from(level: ErrorLevel) -> Self {
        match level {
            ErrorLevel::L => EcLevel::L,
            ErrorLevel::M => EcLevel::M,
            ErrorLevel::Q => EcLevel::Q,
            ErrorLevel::H => EcLevel::H,
        }
    }
}

/// Produces a ready-to-draw bitmap for a payload.
pub trait SymbolSource: Send + Sync + 'static {
    /// Renders `request` into a `size` x `size` bitmap.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPayload`] when the payload does not fit the error-correction level,
    /// [`Error::SymbolSourceUnavailable`] when the generator itself cannot produce a symbol.
    fn render(&self, request: &SymbolRequest) -> Result<RgbaImage>;
}

/// [`SymbolSource`] backed by the `qrcode` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct QrSymbolSource;

impl SymbolSource for QrSymbolSource {
    fn render(&self, request: &SymbolRequest) -> Result<RgbaImage> {
        let code = QrCode::with_error_correction_level(request.payload.as_bytes(), request.level.into())
            .map_err(|err| match err {
                QrError::DataTooLong => Error::InvalidPayload(format!(
                    "{} bytes is too long for error correction level {:?}",
                    request.payload.len(),
                    request.level
                )),
                other => Error::SymbolSourceUnavailable(other.to_string()),
            })?;
        let modules = code.width() as u32;
        debug!("Encoded {} byte payload into {modules}x{modules} modules", request.payload.len());

        let colors = code.to_colors();
        let is_dark = |x: u32, y: u32| colors[(y * modules + x) as usize] == qrcode::Color::Dark;
        Ok(rasterize(modules, is_dark, request))
    }
}

/// Paints a `modules` x `modules` grid plus quiet zone into a `request.size` square,
/// sampling the nearest module for each pixel.
fn rasterize(modules: u32, is_dark: impl Fn(u32, u32) -> bool, request: &SymbolRequest) -> RgbaImage {
    let size = request.size.max(1);
    let total = modules + 2 * QUIET_ZONE;
    let dark = request.foreground.to_rgba(255);
    let light = request
        .background
        .map_or(Rgba([0, 0, 0, 0]), |color| color.to_rgba(255));

    let mut img: RgbaImage = ImageBuffer::new(size, size);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let cell_x = u64::from(x) * u64::from(total) / u64::from(size);
        let cell_y = u64::from(y) * u64::from(total) / u64::from(size);
        let module_x = cell_x as i64 - i64::from(QUIET_ZONE);
        let module_y = cell_y as i64 - i64::from(QUIET_ZONE);
        let inside = (0..i64::from(modules)).contains(&module_x) && (0..i64::from(modules)).contains(&module_y);
        *pixel = if inside && is_dark(module_x as u32, module_y as u32) {
            dark
        } else {
            light
        };
    }
    img
}

// Tests
#[cfg(test)]
mod tests {
    use super::*;

    fn request(payload: &str, size: u32, background: Option<Color>) -> SymbolRequest {
        SymbolRequest {
            payload: payload.to_string(),
            level: ErrorLevel::M,
            size,
            foreground: Color::rgb(200, 0, 0),
            background,
        }
    }

    #[test]
    fn test_bitmap_is_requested_size() {
        let img = QrSymbolSource.render(&request("Hello", 256, Some(Color::WHITE))).unwrap();
        assert_eq!(img.dimensions(), (256, 256));
    }

    #[test]
    fn test_quiet_zone_and_finder_pattern() {
        // "Hello" at level M fits version 1: 21 modules + 8 quiet = 29 cells, 10 px each.
        let img = QrSymbolSource.render(&request("Hello", 290, Some(Color::WHITE))).unwrap();
        assert_eq!(img.get_pixel(5, 5), &Rgba([255, 255, 255, 255]));
        assert_eq!(img.get_pixel(45, 45), &Rgba([200, 0, 0, 255]));
        assert_eq!(img.get_pixel(284, 284), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_light_modules_transparent_without_background() {
        let img = QrSymbolSource.render(&request("Hello", 290, None)).unwrap();
        assert_eq!(img.get_pixel(0, 0)[3], 0);
        assert_eq!(img.get_pixel(45, 45)[3], 255);
    }

    #[test]
    fn test_oversized_payload_is_invalid() {
        let mut req = request(&"x".repeat(3000), 256, None);
        req.level = ErrorLevel::H;
        assert!(matches!(QrSymbolSource.render(&req), Err(Error::InvalidPayload(_))));
    }

    #[test]
    fn test_request_follows_settings() {
        let mut settings = Settings::default();
        let req = SymbolRequest::from_settings(&settings);
        assert_eq!(req.payload, "https://example.com");
        assert_eq!(req.background, Some(Color::WHITE));
        assert_eq!(req.size, 256);

        settings.style.background_mode = BackgroundMode::Image;
        settings.viewport = crate::settings::Viewport::narrow();
        settings.style.set_size(512);
        let req = SymbolRequest::from_settings(&settings);
        assert_eq!(req.background, None);
        assert_eq!(req.size, 280);
    }
}
