use crate::compositor::CompositeResult;
use crate::error::Result;

use image::ImageFormat;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::info;

/// Directory used when none is given.
pub const DEFAULT_DIRECTORY: &str = "generated";

/// Returns a timestamp-based file stem, `qrcode-<unix millis>`.
pub fn default_filename() -> String {
    format!("qrcode-{}", chrono::Utc::now().timestamp_millis())
}

/// Encodes a composite as PNG bytes.
///
/// # Errors
///
/// Returns [`Error::Image`](crate::error::Error::Image) if encoding fails.
pub fn encode_png(result: &CompositeResult) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    result.image().write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// Saves a composite as a PNG file.
///
/// # Arguments
///
/// * `result` - The composite to save.
/// * `directory_path` - Optional. The directory path where the image will be saved. If not provided, the default directory is "generated".
/// * `filename` - Optional. The name of the image file, with or without the `.png` extension. If not provided, a timestamp-based filename will be used.
///
/// # Returns
///
/// The path the image was written to.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the image cannot be written.
pub fn save_png(
    result: &CompositeResult,
    directory_path: Option<&Path>,
    filename: Option<&str>,
) -> Result<PathBuf> {
    let directory_path = directory_path.unwrap_or(Path::new(DEFAULT_DIRECTORY));
    let filename = match filename {
        Some(name) if name.ends_with(".png") => name.to_string(),
        Some(name) => format!("{}.png", name),
        None => format!("{}.png", default_filename()),
    };

    // Check if the directory exists, create it if it doesn't
    if !directory_path.exists() {
        fs::create_dir_all(directory_path)?;
    }

    let file_path = directory_path.join(filename);
    fs::write(&file_path, encode_png(result)?)?;
    info!("Saved {}x{} QR code to {}", result.size(), result.size(), file_path.display());
    Ok(file_path)
}
