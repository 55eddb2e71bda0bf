//! Mask-guided compositing of a mosaic over its original image.
//!
//! The composite is built in three passes over a scratch layer:
//! 1. copy the mask in as per-pixel coverage,
//! 2. intersect the coverage with the mosaic,
//! 3. layer the original beneath whatever the mosaic leaves uncovered.
//!
//! Only the mask's alpha decides how much of each source shows through.

use crate::error::{PixelateError, Result};
use crate::segmentation::RegionMask;
use image::{Rgba, RgbaImage};

/// Pixelate only where `mask` is set.
///
/// With no mask the mosaic is returned unchanged. Neither input is
/// modified.
pub fn composite_masked(
    original: &RgbaImage,
    mosaic: &RgbaImage,
    mask: Option<&RegionMask>,
) -> Result<RgbaImage> {
    let expected = original.dimensions();
    check_dimensions("mosaic", expected, mosaic.dimensions())?;

    let Some(mask) = mask else {
        return Ok(mosaic.clone());
    };
    check_dimensions("mask", expected, mask.dimensions())?;

    let _span = tracing::debug_span!("composite").entered();

    let mut layer = CoverageLayer::copy_mask(mask);
    layer.intersect(mosaic);
    Ok(layer.over(original))
}

fn check_dimensions(what: &'static str, expected: (u32, u32), actual: (u32, u32)) -> Result<()> {
    if expected != actual {
        return Err(PixelateError::DimensionMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Scratch surface holding a color and a coverage value per pixel.
struct CoverageLayer {
    width: u32,
    height: u32,
    color: Vec<Rgba<u8>>,
    coverage: Vec<u8>,
}

impl CoverageLayer {
    fn copy_mask(mask: &RegionMask) -> Self {
        let (width, height) = mask.dimensions();
        Self {
            width,
            height,
            color: vec![Rgba([0, 0, 0, 0]); width as usize * height as usize],
            coverage: mask.alpha().as_raw().clone(),
        }
    }

    /// Take colors from `source` wherever the layer has coverage.
    fn intersect(&mut self, source: &RgbaImage) {
        for ((color, coverage), pixel) in self
            .color
            .iter_mut()
            .zip(&self.coverage)
            .zip(source.pixels())
        {
            if *coverage > 0 {
                *color = *pixel;
            }
        }
    }

    /// Put `below` underneath the layer and flatten.
    fn over(self, below: &RgbaImage) -> RgbaImage {
        let mut out = below.clone();
        for ((pixel, color), coverage) in out.pixels_mut().zip(&self.color).zip(&self.coverage) {
            *pixel = blend(*color, *pixel, *coverage);
        }
        debug_assert_eq!(out.dimensions(), (self.width, self.height));
        out
    }
}

fn blend(top: Rgba<u8>, below: Rgba<u8>, coverage: u8) -> Rgba<u8> {
    match coverage {
        0 => below,
        255 => top,
        a => {
            let a = u32::from(a);
            let mut out = below;
            for (channel, (t, b)) in out.0.iter_mut().zip(top.0.iter().zip(below.0.iter())) {
                *channel = ((u32::from(*t) * a + u32::from(*b) * (255 - a) + 127) / 255) as u8;
            }
            out
        }
    }
}
