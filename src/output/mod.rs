mod directory;
mod resource;

pub use directory::DirectorySink;
pub use resource::ResourceRegistry;

use crate::error::Result;
use anyhow::Context;
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;

/// Trait for output destinations
pub trait OutputSink {
    /// Write the final pixels of one image
    fn write_image(&mut self, name: &str, image: &RgbaImage) -> anyhow::Result<()>;

    /// Number of images written so far
    fn written(&self) -> usize;
}

/// Encode pixels as a PNG, the displayable form of a transformed image.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let _span = tracing::debug_span!("encode").entered();
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}

/// Decode an encoded image into RGBA pixels.
pub fn decode_rgba(bytes: &[u8]) -> anyhow::Result<RgbaImage> {
    let decoded = image::load_from_memory(bytes).context("Failed to decode image")?;
    Ok(decoded.to_rgba8())
}
