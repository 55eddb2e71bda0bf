use super::types::{RegionMask, SegmentationModel};
use crate::error::{PixelateError, Result};
use image::RgbaImage;
use siphasher::sip128::{Hasher128, SipHasher13};
use std::collections::HashMap;
use std::hash::Hasher;

/// Identity of a pixel buffer: its dimensions plus a digest of its bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaskKey {
    width: u32,
    height: u32,
    digest: u128,
}

impl MaskKey {
    pub fn of(image: &RgbaImage) -> Self {
        let mut hasher = SipHasher13::new();
        hasher.write(image.as_raw());
        Self {
            width: image.width(),
            height: image.height(),
            digest: hasher.finish128().as_u128(),
        }
    }
}

/// Segmentation results memoized by pixel-buffer identity.
#[derive(Debug, Default)]
pub struct MaskCache {
    masks: HashMap<MaskKey, RegionMask>,
}

impl MaskCache {
    pub fn get(&self, key: &MaskKey) -> Option<&RegionMask> {
        self.masks.get(key)
    }

    pub fn insert(&mut self, key: MaskKey, mask: RegionMask) {
        self.masks.insert(key, mask);
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }
}

/// The segmentation boundary seen by the pipeline: image in, region mask
/// out, each distinct image computed once.
pub struct MaskGateway<M> {
    model: M,
    cache: MaskCache,
    threshold: f32,
}

impl<M: SegmentationModel> MaskGateway<M> {
    pub fn new(model: M, threshold: f32) -> Self {
        Self {
            model,
            cache: MaskCache::default(),
            threshold,
        }
    }

    /// Region mask for `image`, from the cache when this identity was
    /// segmented before. Failures are not cached.
    pub fn segment(&mut self, image: &RgbaImage) -> Result<RegionMask> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(PixelateError::InvalidDimensions { width, height });
        }

        let key = MaskKey::of(image);
        if let Some(mask) = self.cache.get(&key) {
            tracing::debug!("Mask cache hit for {}x{} image", width, height);
            return Ok(mask.clone());
        }

        let _span = tracing::debug_span!("segment").entered();
        self.model.reset_state();
        let matte = self
            .model
            .segment(image)
            .map_err(|e| PixelateError::SegmentationFailure(format!("{e:#}")))?;
        let mask = RegionMask::from_matte(&matte, width, height, self.threshold)?;

        tracing::debug!(
            "Segmented {}x{} image, {} foreground pixels",
            width,
            height,
            mask.coverage()
        );
        self.cache.insert(key, mask.clone());
        Ok(mask)
    }

    pub fn cache(&self) -> &MaskCache {
        &self.cache
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::Matte;
    use anyhow::bail;
    use image::Rgba;

    /// Marks the left half of every image as foreground.
    struct LeftHalf {
        calls: usize,
        fail: bool,
    }

    impl SegmentationModel for LeftHalf {
        fn segment(&mut self, image: &RgbaImage) -> anyhow::Result<Matte> {
            self.calls += 1;
            if self.fail {
                bail!("model exploded");
            }
            let (width, height) = image.dimensions();
            Ok((0..width * height)
                .map(|i| if i % width < width / 2 { 1.0 } else { 0.0 })
                .collect())
        }

        fn input_size(&self) -> (u32, u32) {
            (8, 8)
        }
    }

    fn image(value: u8) -> RgbaImage {
        RgbaImage::from_pixel(8, 4, Rgba([value, value, value, 255]))
    }

    #[test]
    fn same_identity_is_segmented_once() {
        let mut gateway = MaskGateway::new(LeftHalf { calls: 0, fail: false }, 0.5);
        let first = gateway.segment(&image(1)).unwrap();
        let second = gateway.segment(&image(1)).unwrap();
        assert_eq!(first, second);
        assert_eq!(gateway.model().calls, 1);
        assert_eq!(first.coverage(), 16);
    }

    #[test]
    fn different_content_is_a_different_identity() {
        let mut gateway = MaskGateway::new(LeftHalf { calls: 0, fail: false }, 0.5);
        gateway.segment(&image(1)).unwrap();
        gateway.segment(&image(2)).unwrap();
        assert_eq!(gateway.model().calls, 2);
        assert_eq!(gateway.cache().len(), 2);
    }

    #[test]
    fn failures_are_reported_and_not_cached() {
        let mut gateway = MaskGateway::new(LeftHalf { calls: 0, fail: true }, 0.5);
        assert!(matches!(
            gateway.segment(&image(1)),
            Err(PixelateError::SegmentationFailure(_))
        ));
        assert!(gateway.segment(&image(1)).is_err());
        assert_eq!(gateway.model().calls, 2);
        assert!(gateway.cache().is_empty());
    }
}
