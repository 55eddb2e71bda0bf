use crate::error::{PixelateError, Result};
use std::time::Duration;

/// Mosaic scale in per-mille of the source dimensions.
///
/// The coarse grid of a `w x h` image is `round(w * f / 1000)` by
/// `round(h * f / 1000)` cells, never smaller than 1x1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MosaicFactor(u32);

impl MosaicFactor {
    pub const DEFAULT: MosaicFactor = MosaicFactor(60);

    pub fn new(per_mille: u32) -> Result<Self> {
        if !(1..=1000).contains(&per_mille) {
            return Err(PixelateError::InvalidFactor(per_mille));
        }
        Ok(Self(per_mille))
    }

    pub fn per_mille(self) -> u32 {
        self.0
    }

    /// Coarse grid dimensions for a `width x height` image.
    pub fn coarse_dimensions(self, width: u32, height: u32) -> (u32, u32) {
        (scale_round(width, self.0), scale_round(height, self.0))
    }
}

impl Default for MosaicFactor {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// Half rounds up, matching Math.round on non-negative input.
fn scale_round(length: u32, per_mille: u32) -> u32 {
    let scaled = (u64::from(length) * u64::from(per_mille) + 500) / 1000;
    (scaled as u32).max(1)
}

/// How discovered images are transformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TransformMode {
    /// Pixelate the whole image on the calling thread.
    #[default]
    Whole,
    /// Pixelate only the segmented body region; masks come from the
    /// background segmentation context.
    Masked,
}

/// Static configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub factor: MosaicFactor,
    pub mode: TransformMode,
    /// Matte values at or above this become foreground in the region mask.
    pub segmentation_threshold: f32,
    /// Quiet period after the last rescan trigger before a rescan runs.
    pub rescan_debounce: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            factor: MosaicFactor::DEFAULT,
            mode: TransformMode::Whole,
            segmentation_threshold: 0.7,
            rescan_debounce: Duration::from_millis(1000),
        }
    }
}
