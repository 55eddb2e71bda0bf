//! Nearest-neighbor mosaic (pixelation) transform.

use crate::config::MosaicFactor;
use crate::error::{PixelateError, Result};
use image::{imageops, RgbaImage};

/// Pixelate `source` by decimating it to the factor's coarse grid and
/// resampling it back to full size.
///
/// Both resampling steps use nearest-neighbor sampling so block edges stay
/// hard; the output is a pure function of `(source, factor)`.
pub fn mosaic(source: &RgbaImage, factor: MosaicFactor) -> Result<RgbaImage> {
    let (width, height) = source.dimensions();
    if width == 0 || height == 0 {
        return Err(PixelateError::InvalidDimensions { width, height });
    }

    let _span = tracing::debug_span!("mosaic").entered();

    let (coarse_width, coarse_height) = factor.coarse_dimensions(width, height);
    tracing::debug!(
        "Mosaic {}x{} through {}x{} grid",
        width,
        height,
        coarse_width,
        coarse_height
    );

    // Scratch surface: the source drawn at full size.
    let scratch = source.clone();

    let coarse = imageops::resize(
        &scratch,
        coarse_width,
        coarse_height,
        imageops::FilterType::Nearest,
    );

    Ok(imageops::resize(
        &coarse,
        width,
        height,
        imageops::FilterType::Nearest,
    ))
}

/// [`mosaic`] over a raw RGBA byte buffer.
pub fn mosaic_raw(
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    factor: MosaicFactor,
) -> Result<RgbaImage> {
    let source = pixel_buffer(pixels, width, height)?;
    mosaic(&source, factor)
}

/// Wrap raw RGBA bytes as a pixel buffer, checking the length.
pub fn pixel_buffer(pixels: Vec<u8>, width: u32, height: u32) -> Result<RgbaImage> {
    if width == 0 || height == 0 {
        return Err(PixelateError::InvalidDimensions { width, height });
    }
    let expected = width as usize * height as usize * 4;
    let actual = pixels.len();
    RgbaImage::from_raw(width, height, pixels).ok_or(PixelateError::BufferSizeMismatch {
        width,
        height,
        expected,
        actual,
    })
}
