use crate::error::{PixelateError, Result};
use image::{GrayImage, Luma, Rgba, RgbaImage};

/// Foreground probability: 0.0 = background, 1.0 = foreground.
/// Dimensions match the input image, flattened in row-major order.
pub type Matte = Vec<f32>;

/// Trait for segmentation models
/// Any backend producing a person matte (RVM, MODNet, BodyPix ports, ...) fits.
pub trait SegmentationModel {
    /// Segment a still image and return its alpha matte
    ///
    /// # Arguments
    /// * `image` - Input RGBA image
    ///
    /// # Returns
    /// * Matte with values 0.0-1.0 at the image's dimensions
    fn segment(&mut self, image: &RgbaImage) -> anyhow::Result<Matte>;

    /// Reset internal state between unrelated images
    fn reset_state(&mut self) {}

    /// Get the model's preferred input dimensions
    ///
    /// Returns (width, height)
    fn input_size(&self) -> (u32, u32);
}

impl<M: SegmentationModel + ?Sized> SegmentationModel for Box<M> {
    fn segment(&mut self, image: &RgbaImage) -> anyhow::Result<Matte> {
        (**self).segment(image)
    }

    fn reset_state(&mut self) {
        (**self).reset_state()
    }

    fn input_size(&self) -> (u32, u32) {
        (**self).input_size()
    }
}

/// Image-shaped alpha mask: 255 marks the body region, 0 the background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionMask {
    alpha: GrayImage,
}

impl RegionMask {
    pub fn from_alpha(alpha: GrayImage) -> Self {
        Self { alpha }
    }

    /// Mask with every pixel set to `alpha`.
    pub fn filled(width: u32, height: u32, alpha: u8) -> Self {
        Self::from_alpha(GrayImage::from_pixel(width, height, Luma([alpha])))
    }

    /// Threshold a matte into a binary mask.
    pub fn from_matte(matte: &[f32], width: u32, height: u32, threshold: f32) -> Result<Self> {
        let expected = width as usize * height as usize;
        if matte.len() != expected {
            return Err(PixelateError::SegmentationFailure(format!(
                "matte has {} values, expected {} for {}x{}",
                matte.len(),
                expected,
                width,
                height
            )));
        }

        let alpha = GrayImage::from_fn(width, height, |x, y| {
            let value = matte[y as usize * width as usize + x as usize];
            Luma([if value >= threshold { 255 } else { 0 }])
        });
        Ok(Self::from_alpha(alpha))
    }

    /// Rebuild a mask from the RGBA bitmap carried on the wire.
    /// Only the alpha channel is significant.
    pub fn from_bitmap(bitmap: &RgbaImage) -> Self {
        let (width, height) = bitmap.dimensions();
        Self::from_alpha(GrayImage::from_fn(width, height, |x, y| {
            Luma([bitmap.get_pixel(x, y)[3]])
        }))
    }

    /// Encode as an RGBA bitmap: black, with the mask in the alpha channel.
    pub fn to_bitmap(&self) -> RgbaImage {
        let (width, height) = self.dimensions();
        RgbaImage::from_fn(width, height, |x, y| Rgba([0, 0, 0, self.alpha_at(x, y)]))
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.alpha.dimensions()
    }

    pub fn alpha_at(&self, x: u32, y: u32) -> u8 {
        self.alpha.get_pixel(x, y)[0]
    }

    pub fn alpha(&self) -> &GrayImage {
        &self.alpha
    }

    /// Number of foreground (non-zero alpha) pixels.
    pub fn coverage(&self) -> usize {
        self.alpha.pixels().filter(|p| p[0] > 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matte_threshold_is_inclusive() {
        let matte = vec![0.0, 0.69, 0.7, 1.0];
        let mask = RegionMask::from_matte(&matte, 2, 2, 0.7).unwrap();
        assert_eq!(mask.alpha_at(0, 0), 0);
        assert_eq!(mask.alpha_at(1, 0), 0);
        assert_eq!(mask.alpha_at(0, 1), 255);
        assert_eq!(mask.alpha_at(1, 1), 255);
        assert_eq!(mask.coverage(), 2);
    }

    #[test]
    fn matte_is_read_row_major() {
        let mut matte = vec![0.0; 6];
        matte[5] = 1.0;
        let mask = RegionMask::from_matte(&matte, 3, 2, 0.5).unwrap();
        assert_eq!(mask.alpha_at(2, 1), 255);
        assert_eq!(mask.coverage(), 1);
    }

    #[test]
    fn matte_of_wrong_size_fails() {
        assert!(RegionMask::from_matte(&[1.0; 3], 2, 2, 0.5).is_err());
    }

    #[test]
    fn bitmap_carries_alpha_only() {
        let mask = RegionMask::from_matte(&[1.0, 0.0], 2, 1, 0.5).unwrap();
        let bitmap = mask.to_bitmap();
        assert_eq!(bitmap.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(RegionMask::from_bitmap(&bitmap), mask);
    }
}
