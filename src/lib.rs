//! # qirust-studio
//!
//! A Rust library for composing styled QR codes: a payload built from structured content, a
//! solid or image background, the QR symbol, and an optional centered logo, merged into one
//! square raster and exported as PNG.
//!
//! ## Features
//!
//! - Encode URLs, free text, `mailto:`, `tel:` and `WIFI:` payloads.
//! - Four error correction levels: L, M, Q, H.
//! - Background images with cover-fit scaling and adjustable opacity.
//! - Logos sized automatically by aspect ratio or manually by percentage, on a backing disc.
//! - Debounced, token-gated recomposition so the preview always shows the latest settings.
//! - Safe Rust implementation with no unsafe code.
//!
//! ## Example
//!
//! Compose a frame synchronously from an already rendered symbol:
//!
//! ```rust
//! use qirust_studio::compositor::{compose, Layers};
//! use qirust_studio::settings::Settings;
//! use qirust_studio::symbol::{QrSymbolSource, SymbolRequest, SymbolSource};
//!
//! let mut settings = Settings::default();
//! settings.content.url = "https://example.org".to_string();
//!
//! let symbol = QrSymbolSource.render(&SymbolRequest::from_settings(&settings)).unwrap();
//! let result = compose(&settings, &Layers { symbol: &symbol, background: None, logo: None });
//! assert_eq!(result.size(), 256);
//! ```
//!
//! Keep a live preview in sync with edits:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use qirust_studio::decode::DefaultDecoder;
//! use qirust_studio::settings::{Color, Settings};
//! use qirust_studio::symbol::QrSymbolSource;
//! use qirust_studio::trigger::{Trigger, TriggerConfig};
//!
//! # async fn run() -> qirust_studio::error::Result<()> {
//! let trigger = Trigger::spawn(
//!     Settings::default(),
//!     Arc::new(QrSymbolSource),
//!     Arc::new(DefaultDecoder),
//!     TriggerConfig::default(),
//! );
//! trigger.update(|s| s.style.foreground = Color::rgb(255, 165, 0));
//! let frame = trigger.settled().await?;
//! let png = trigger.export_png()?;
//! # let _ = (frame, png);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`payload`]: Content types and payload strings.
//! - [`settings`]: The owned session settings.
//! - [`symbol`]: QR bitmap generation.
//! - [`decode`]: Background and logo image decoding.
//! - [`compositor`]: Layer merging.
//! - [`trigger`]: Debounced recomposition.
//! - [`export`]: PNG output.

#![forbid(unsafe_code)]

pub mod compositor;
pub mod decode;
pub mod error;
pub mod export;
pub mod payload;
pub mod settings;
pub mod symbol;
pub mod trigger;

pub use compositor::{compose, CompositeResult, Layers};
pub use error::{Error, Result};
pub use settings::Settings;
pub use trigger::{Frame, FrameState, Trigger, TriggerConfig};
