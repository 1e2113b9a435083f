pub mod gray;
pub mod traits;

use image::{ImageReader, RgbImage};
use std::path::Path;

/// Decode an image file into an RGB raster.
pub fn load_frame(path: &Path) -> Result<RgbImage, FilterError> {
    let image = ImageReader::open(path)
        .map_err(|e| FilterError::Open(path.display().to_string(), e))?
        .with_guessed_format()
        .map_err(|e| FilterError::Open(path.display().to_string(), e))?
        .decode()
        .map_err(|e| FilterError::Decode(path.display().to_string(), e))?;
    Ok(image.to_rgb8())
}

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("failed to open image {0}: {1}")]
    Open(String, std::io::Error),
    #[error("failed to decode image {0}: {1}")]
    Decode(String, image::ImageError),
}
