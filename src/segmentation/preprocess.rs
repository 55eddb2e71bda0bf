use anyhow::{ensure, Result};
use image::{imageops, GrayImage, Luma, RgbaImage};
use ndarray::Array4;

/// Converts RGBA images to model input tensors and model mattes back to
/// image resolution.
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
        }
    }

    /// Build a normalized NCHW tensor from an RGBA image
    ///
    /// Steps:
    /// 1. Resize to target dimensions (alpha is dropped)
    /// 2. Scale channels to [0, 1]
    /// 3. Lay out as NCHW
    ///
    /// Returns: Array4<f32> with shape [1, 3, height, width]
    pub fn preprocess(&self, image: &RgbaImage) -> Result<Array4<f32>> {
        let _span = tracing::debug_span!("preprocess").entered();

        let (width, height) = image.dimensions();
        ensure!(width > 0 && height > 0, "cannot preprocess a {}x{} image", width, height);

        let resized = if (width, height) != (self.target_width, self.target_height) {
            imageops::resize(
                image,
                self.target_width,
                self.target_height,
                imageops::FilterType::Triangle,
            )
        } else {
            image.clone()
        };

        let mut tensor = Array4::<f32>::zeros((
            1,
            3,
            self.target_height as usize,
            self.target_width as usize,
        ));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for channel in 0..3 {
                tensor[[0, channel, y as usize, x as usize]] = f32::from(pixel[channel]) / 255.0;
            }
        }

        Ok(tensor)
    }

    /// Resize a model matte back to the source image dimensions
    ///
    /// # Arguments
    /// * `matte` - Flattened matte at model resolution
    /// * `matte_width`, `matte_height` - Model output dimensions
    /// * `target_width`, `target_height` - Source image dimensions
    pub fn postprocess_matte(
        matte: &[f32],
        matte_width: u32,
        matte_height: u32,
        target_width: u32,
        target_height: u32,
    ) -> Result<Vec<f32>> {
        let _span = tracing::debug_span!("postprocess").entered();

        ensure!(
            matte.len() == matte_width as usize * matte_height as usize,
            "matte has {} values, expected {}x{}",
            matte.len(),
            matte_width,
            matte_height
        );

        if matte_width == target_width && matte_height == target_height {
            return Ok(matte.to_vec());
        }

        let gray = GrayImage::from_fn(matte_width, matte_height, |x, y| {
            let value = matte[y as usize * matte_width as usize + x as usize];
            Luma([(value * 255.0).round().clamp(0.0, 255.0) as u8])
        });

        let resized = imageops::resize(
            &gray,
            target_width,
            target_height,
            imageops::FilterType::Triangle,
        );

        Ok(resized.pixels().map(|p| f32::from(p[0]) / 255.0).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn tensor_is_nchw_and_normalized() {
        let image = RgbaImage::from_pixel(4, 2, Rgba([255, 0, 51, 10]));
        let tensor = Preprocessor::new(4, 2).preprocess(&image).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 2, 4]);
        assert_eq!(tensor[[0, 0, 1, 3]], 1.0);
        assert_eq!(tensor[[0, 1, 0, 0]], 0.0);
        assert!((tensor[[0, 2, 0, 0]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn tensor_uses_model_resolution() {
        let image = RgbaImage::from_pixel(30, 10, Rgba([1, 2, 3, 255]));
        let tensor = Preprocessor::new(16, 8).preprocess(&image).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 8, 16]);
    }

    #[test]
    fn matte_is_resized_to_target() {
        let matte = vec![1.0; 16];
        let out = Preprocessor::postprocess_matte(&matte, 4, 4, 10, 6).unwrap();
        assert_eq!(out.len(), 60);
        assert!(out.iter().all(|v| (*v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn wide_matte_keeps_its_columns() {
        // Left column foreground, right column background
        let matte = vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0];
        let out = Preprocessor::postprocess_matte(&matte, 2, 3, 2, 6).unwrap();
        assert_eq!(out.len(), 12);
        for row in out.chunks(2) {
            assert!(row[0] > 0.99 && row[1] < 0.01, "row {row:?}");
        }
    }

    #[test]
    fn matte_size_is_checked() {
        assert!(Preprocessor::postprocess_matte(&[0.0; 3], 2, 2, 2, 2).is_err());
    }
}
