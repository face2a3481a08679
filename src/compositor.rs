//! The compositor: background, QR symbol and logo merged into one square raster.
//!
//! [`compose`] is synchronous and pure. It takes an owned [`Settings`] snapshot and the layers
//! that have finished decoding; missing layers are skipped. Draw order is fixed:
//!
//! 1. solid background color over the whole canvas
//! 2. background image (image mode only), cover-fit, at the configured opacity
//! 3. the symbol bitmap, full opacity, stretched to the canvas
//! 4. a disc of background color under the logo
//! 5. the logo, centered

use crate::decode::DecodedImage;
use crate::settings::{BackgroundMode, Color, LogoSizeMode, LogoSpec, Settings};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use tracing::debug;

/// Auto-fit logos never exceed this fraction of the output size.
pub const AUTO_LOGO_RATIO: f64 = 0.22;
/// Extra radius, in output pixels, of the disc drawn beneath the logo.
pub const LOGO_DISC_PADDING: f64 = 4.0;

/// Layers available for a composite.
#[derive(Debug, Clone, Copy)]
pub struct Layers<'a> {
    /// The rendered symbol bitmap.
    pub symbol: &'a RgbaImage,
    /// Decoded background image, if one loaded.
    pub background: Option<&'a DecodedImage>,
    /// Decoded logo, if one loaded.
    pub logo: Option<&'a DecodedImage>,
}

/// Where the logo lands on the canvas, in output pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogoBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl LogoBox {
    /// Centers a `width` x `height` box on a `canvas` x `canvas` square.
    pub fn centered(canvas: u32, width: f64, height: f64) -> Self {
        let canvas = f64::from(canvas);
        LogoBox {
            x: (canvas - width) / 2.0,
            y: (canvas - height) / 2.0,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Radius of the backing disc: half the larger side plus [`LOGO_DISC_PADDING`].
    pub fn disc_radius(&self) -> f64 {
        self.width.max(self.height) / 2.0 + LOGO_DISC_PADDING
    }
}

/// Computes the drawn logo size for a logo with natural dimensions `natural`.
///
/// # Arguments
///
/// * `logo` - Sizing mode and manual percentage.
/// * `effective_size` - Side of the output canvas.
/// * `natural` - The logo's own pixel dimensions.
///
/// # Returns
///
/// `(width, height)` in output pixels. Auto mode keeps the aspect ratio within 22% of the
/// canvas; manual mode is always square.
///
/// # Example
///
/// ```rust
/// use qirust_studio::compositor::logo_dimensions;
/// use qirust_studio::settings::LogoSpec;
///
/// let (w, h) = logo_dimensions(&LogoSpec::default(), 256, (200, 100));
/// assert!((w - 56.32).abs() < 1e-9);
/// assert!((h - 28.16).abs() < 1e-9);
/// ```
pub fn logo_dimensions(logo: &LogoSpec, effective_size: u32, natural: (u32, u32)) -> (f64, f64) {
    let size = f64::from(effective_size);
    match logo.mode {
        LogoSizeMode::Auto => {
            let max_logo_size = size * AUTO_LOGO_RATIO;
            let aspect_ratio = f64::from(natural.0) / f64::from(natural.1);
            if aspect_ratio >= 1.0 {
                (max_logo_size, max_logo_size / aspect_ratio)
            } else {
                (max_logo_size * aspect_ratio, max_logo_size)
            }
        }
        LogoSizeMode::Manual => {
            let side = size * f64::from(logo.percentage) / 100.0;
            (side, side)
        }
    }
}

/// Part of an `image` picture that stays visible when it is scaled to cover a `canvas` square.
///
/// Returns `(x, y, width, height)` in source pixels. Aspect ratio is preserved and the
/// overflowing axis is centered, so only this region ever needs resizing.
pub fn cover_crop(image: (u32, u32), canvas: u32) -> (u32, u32, u32, u32) {
    let target = f64::from(canvas);
    let (w, h) = (f64::from(image.0), f64::from(image.1));
    let scale = (target / w).max(target / h);
    let crop_w = (target / scale).round().clamp(1.0, w);
    let crop_h = (target / scale).round().clamp(1.0, h);
    let x = ((w - crop_w) / 2.0).round();
    let y = ((h - crop_h) / 2.0).round();
    (x as u32, y as u32, crop_w as u32, crop_h as u32)
}

/// An owned composited raster. Replaced wholesale on every recompute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeResult {
    image: RgbaImage,
}

impl CompositeResult {
    /// Side of the square output in pixels.
    pub fn size(&self) -> u32 {
        self.image.width()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

/// Merges the available layers according to `settings`.
///
/// Layers that failed to load are passed as `None` and simply not drawn, so this never fails.
pub fn compose(settings: &Settings, layers: &Layers<'_>) -> CompositeResult {
    let size = settings.effective_size().max(1);
    let background_color = settings.style.background_color;
    let mut canvas = RgbaImage::from_pixel(size, size, background_color.to_rgba(255));

    if settings.style.background_mode == BackgroundMode::Image {
        if let Some(background) = layers.background.filter(|img| has_pixels(img)) {
            let (x, y, w, h) = cover_crop(background.dimensions(), size);
            let visible = imageops::crop_imm(background.pixels(), x, y, w, h).to_image();
            let scaled = imageops::resize(&visible, size, size, FilterType::Triangle);
            blend_over(&mut canvas, &scaled, 0, 0, settings.style.background_alpha());
        }
    }

    let symbol = if layers.symbol.dimensions() == (size, size) {
        None
    } else {
        Some(imageops::resize(layers.symbol, size, size, FilterType::Nearest))
    };
    blend_over(&mut canvas, symbol.as_ref().unwrap_or(layers.symbol), 0, 0, 1.0);

    if let Some(logo) = layers.logo.filter(|img| has_pixels(img)) {
        let (width, height) = logo_dimensions(&settings.logo, size, logo.dimensions());
        let logo_box = LogoBox::centered(size, width, height);
        debug!("Placing {:.2}x{:.2} logo at ({:.2}, {:.2})", width, height, logo_box.x, logo_box.y);

        let (cx, cy) = logo_box.center();
        fill_disc(&mut canvas, cx, cy, logo_box.disc_radius(), background_color);

        let w = width.round().max(1.0) as u32;
        let h = height.round().max(1.0) as u32;
        let scaled = imageops::resize(logo.pixels(), w, h, FilterType::Triangle);
        blend_over(
            &mut canvas,
            &scaled,
            logo_box.x.round() as i64,
            logo_box.y.round() as i64,
            1.0,
        );
    }

    CompositeResult { image: canvas }
}

fn has_pixels(image: &DecodedImage) -> bool {
    image.width() > 0 && image.height() > 0
}

/// Source-over blend of `layer` onto `canvas` at (`left`, `top`), clipped to the canvas.
fn blend_over(canvas: &mut RgbaImage, layer: &RgbaImage, left: i64, top: i64, opacity: f32) {
    let (cw, ch) = (i64::from(canvas.width()), i64::from(canvas.height()));
    for (lx, ly, src) in layer.enumerate_pixels() {
        let x = left + i64::from(lx);
        let y = top + i64::from(ly);
        if x < 0 || y < 0 || x >= cw || y >= ch {
            continue;
        }
        let dst = canvas.get_pixel_mut(x as u32, y as u32);
        *dst = blend_pixel(*dst, *src, opacity);
    }
}

fn blend_pixel(dst: Rgba<u8>, src: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let src_alpha = f32::from(src[3]) / 255.0 * opacity.clamp(0.0, 1.0);
    if src_alpha <= 0.0 {
        return dst;
    }
    let dst_alpha = f32::from(dst[3]) / 255.0;
    let out_alpha = src_alpha + dst_alpha * (1.0 - src_alpha);
    let channel = |i: usize| {
        let s = f32::from(src[i]) * src_alpha;
        let d = f32::from(dst[i]) * dst_alpha * (1.0 - src_alpha);
        ((s + d) / out_alpha).round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_alpha * 255.0).round() as u8,
    ])
}

/// Fills every pixel whose center lies within `radius` of (`cx`, `cy`).
fn fill_disc(canvas: &mut RgbaImage, cx: f64, cy: f64, radius: f64, color: Color) {
    let fill = color.to_rgba(255);
    let max_x = f64::from(canvas.width()) - 1.0;
    let max_y = f64::from(canvas.height()) - 1.0;
    let x0 = (cx - radius).floor().clamp(0.0, max_x) as u32;
    let x1 = (cx + radius).ceil().clamp(0.0, max_x) as u32;
    let y0 = (cy - radius).floor().clamp(0.0, max_y) as u32;
    let y1 = (cy + radius).ceil().clamp(0.0, max_y) as u32;
    let r2 = radius * radius;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = f64::from(x) + 0.5 - cx;
            let dy = f64::from(y) + 0.5 - cy;
            if dx * dx + dy * dy <= r2 {
                canvas.put_pixel(x, y, fill);
            }
        }
    }
}
