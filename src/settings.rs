//! Session settings.
//!
//! Everything the user can change lives in one owned [`Settings`] value. The UI layer mutates
//! it directly; the [`trigger`](crate::trigger) takes snapshots of it for each composite.

use crate::decode::ImageSource;
use crate::error::{Error, Result};
use crate::payload::ContentSpec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Smallest selectable output size in pixels.
pub const MIN_SIZE: u32 = 128;
/// Largest selectable output size in pixels.
pub const MAX_SIZE: u32 = 512;
pub const SIZE_STEP: u32 = 32;
pub const DEFAULT_SIZE: u32 = 256;

pub const MIN_OPACITY: u8 = 10;
pub const MAX_OPACITY: u8 = 100;
pub const OPACITY_STEP: u8 = 5;

pub const MIN_LOGO_PERCENT: u32 = 10;
pub const MAX_LOGO_PERCENT: u32 = 30;
pub const LOGO_PERCENT_STEP: u32 = 2;
pub const DEFAULT_LOGO_PERCENT: u32 = 20;

/// Viewports narrower than this many pixels cap the rendered size.
pub const NARROW_BREAKPOINT: u32 = 640;
/// Rendered size cap on narrow viewports.
pub const NARROW_SIZE_CAP: u32 = 280;

/// An opaque RGB color, written as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b }
    }

    pub fn to_rgba(self, alpha: u8) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, alpha])
    }
}

impl FromStr for Color {
    type Err = Error;

    /// Parses `#rrggbb` or the short `#rgb` form. The leading `#` is optional.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidColor(s.to_string());
        let hex = s.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());
        match hex.len() {
            6 => Ok(Color::rgb(channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
            3 => {
                let short = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
                Ok(Color::rgb(short(0)?, short(1)?, short(2)?))
            }
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// QR error-correction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrorLevel {
    /// Low, about 7% recoverable.
    L,
    /// Medium, about 15% recoverable.
    #[default]
    M,
    /// Quartile, about 25% recoverable.
    Q,
    /// High, about 30% recoverable. Recommended with a logo or background image.
    H,
}

impl FromStr for ErrorLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "L" => Ok(ErrorLevel::L),
            "M" => Ok(ErrorLevel::M),
            "Q" => Ok(ErrorLevel::Q),
            "H" => Ok(ErrorLevel::H),
            other => Err(format!("unknown error-correction level {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundMode {
    #[default]
    Solid,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogoSizeMode {
    /// Fit the logo's own aspect ratio inside 22% of the output.
    #[default]
    Auto,
    /// Square box sized by [`LogoSpec::percentage`].
    Manual,
}

/// Colors, background and symbol options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleSpec {
    pub foreground: Color,
    pub background_mode: BackgroundMode,
    pub background_color: Color,
    pub background_image: Option<ImageSource>,
    /// Background image opacity in percent. Ignored in solid mode.
    pub background_opacity: u8,
    /// Requested square output size in pixels.
    pub size: u32,
    pub error_level: ErrorLevel,
}

impl Default for StyleSpec {
    fn default() -> Self {
        StyleSpec {
            foreground: Color::BLACK,
            background_mode: BackgroundMode::Solid,
            background_color: Color::WHITE,
            background_image: None,
            background_opacity: MAX_OPACITY,
            size: DEFAULT_SIZE,
            error_level: ErrorLevel::M,
        }
    }
}

impl StyleSpec {
    /// Sets the output size, clamped to 128..=512 and snapped to 32 px steps.
    pub fn set_size(&mut self, size: u32) {
        self.size = quantize(size, MIN_SIZE, MAX_SIZE, SIZE_STEP);
    }

    /// Sets the background opacity, clamped to 10..=100 and snapped to 5% steps.
    pub fn set_background_opacity(&mut self, percent: u8) {
        self.background_opacity = quantize(
            u32::from(percent),
            u32::from(MIN_OPACITY),
            u32::from(MAX_OPACITY),
            u32::from(OPACITY_STEP),
        ) as u8;
    }

    /// Returns the image layer's opacity as a fraction in `0.0..=1.0`.
    pub fn background_alpha(&self) -> f32 {
        f32::from(self.background_opacity.min(MAX_OPACITY)) / 100.0
    }

    /// The background image, if image mode is selected and one is set.
    pub fn active_background_image(&self) -> Option<&ImageSource> {
        match self.background_mode {
            BackgroundMode::Image => self.background_image.as_ref(),
            BackgroundMode::Solid => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogoSpec {
    pub image: Option<ImageSource>,
    pub mode: LogoSizeMode,
    /// Side of the manual logo box as a percentage of the output size.
    pub percentage: u32,
}

impl Default for LogoSpec {
    fn default() -> Self {
        LogoSpec {
            image: None,
            mode: LogoSizeMode::Auto,
            percentage: DEFAULT_LOGO_PERCENT,
        }
    }
}

impl LogoSpec {
    /// Sets the manual size, clamped to 10..=30 and snapped to 2% steps.
    pub fn set_percentage(&mut self, percentage: u32) {
        self.percentage = quantize(
            percentage,
            MIN_LOGO_PERCENT,
            MAX_LOGO_PERCENT,
            LOGO_PERCENT_STEP,
        );
    }
}

/// Display context the preview is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    /// Viewport width in pixels, `None` when unknown (treated as wide).
    pub width: Option<u32>,
}

impl Viewport {
    pub fn narrow() -> Self {
        Viewport {
            width: Some(NARROW_BREAKPOINT - 1),
        }
    }

    pub fn is_narrow(&self) -> bool {
        self.width.is_some_and(|w| w < NARROW_BREAKPOINT)
    }

    /// Clamps a requested size to what this viewport renders. The request itself is not
    /// changed.
    pub fn effective_size(&self, size: u32) -> u32 {
        if self.is_narrow() {
            size.min(NARROW_SIZE_CAP)
        } else {
            size
        }
    }
}

/// The full, explicitly owned session state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub content: ContentSpec,
    pub style: StyleSpec,
    pub logo: LogoSpec,
    pub viewport: Viewport,
}

impl Settings {
    /// Loads settings from a JSON document. Missing fields take their defaults and
    /// out-of-range values are snapped as by the setters.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut settings: Settings = serde_json::from_str(json)?;
        settings.normalize();
        Ok(settings)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Clamps size, opacity and logo percentage to their slider ranges and steps.
    pub fn normalize(&mut self) {
        self.style.set_size(self.style.size);
        self.style.set_background_opacity(self.style.background_opacity);
        self.logo.set_percentage(self.logo.percentage);
    }

    /// The size actually rendered after the viewport cap.
    pub fn effective_size(&self) -> u32 {
        self.viewport.effective_size(self.style.size)
    }

    pub fn payload(&self) -> String {
        self.content.payload()
    }

    /// Stores a background image and switches to image mode.
    pub fn set_background_image(&mut self, source: ImageSource) {
        self.style.background_image = Some(source);
        self.style.background_mode = BackgroundMode::Image;
    }

    /// Drops the background image and returns to a solid background.
    pub fn remove_background_image(&mut self) {
        self.style.background_image = None;
        self.style.background_mode = BackgroundMode::Solid;
    }

    pub fn set_logo(&mut self, source: ImageSource) {
        self.logo.image = Some(source);
    }

    /// Drops the logo and resets its sizing options.
    pub fn remove_logo(&mut self) {
        self.logo = LogoSpec::default();
    }
}

/// Clamps `value` to `min..=max` and snaps it to the nearest multiple of `step` above `min`.
pub fn quantize(value: u32, min: u32, max: u32, step: u32) -> u32 {
    let clamped = value.clamp(min, max);
    if step == 0 {
        return clamped;
    }
    let steps = (clamped - min + step / 2) / step;
    (min + steps * step).min(max)
}
