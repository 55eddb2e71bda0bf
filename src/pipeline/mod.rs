//! Discovers images in a host document and swaps them for pixelated copies.
//!
//! Each image moves `Untouched -> Ongoing -> Done`. It is marked `Ongoing`
//! the moment a scan selects it, so overlapping scans never process it
//! twice, and only becomes `Done` once its new source has loaded and the
//! temporary resource has been revoked.

mod debounce;
mod host;

pub use debounce::ScanDebouncer;
pub use host::{ImageHost, ImageId, ProcessingState, ResourceHandle};

use crate::compositor::composite_masked;
use crate::config::{PipelineConfig, TransformMode};
use crate::error::PixelateError;
use crate::mosaic::mosaic;
use crate::output::encode_png;
use crate::segmentation::RegionMask;
use crate::worker::{Launcher, MaskCoordinator, MaskDelivery, SendOutcome};
use anyhow::{Context, Result};
use image::RgbaImage;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::{Duration, Instant};

pub struct Orchestrator {
    config: PipelineConfig,
    masks: Option<MaskCoordinator>,
    awaiting_load: HashSet<ImageId>,
    committing: HashMap<ImageId, ResourceHandle>,
    rescan: ScanDebouncer,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig) -> Self {
        let rescan = ScanDebouncer::new(config.rescan_debounce);
        Self {
            config,
            masks: None,
            awaiting_load: HashSet::new(),
            committing: HashMap::new(),
            rescan,
        }
    }

    /// Use `launcher` to start the background segmentation context on
    /// first need. Only consulted in [`TransformMode::Masked`].
    pub fn with_segmentation(mut self, launcher: Launcher) -> Self {
        if self.config.mode == TransformMode::Masked {
            self.masks = Some(MaskCoordinator::new(launcher));
        } else {
            tracing::debug!("Whole-image mode, segmentation launcher unused");
        }
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Select every untouched candidate. Loaded images are processed now,
    /// the rest when their load completes. Returns how many were selected.
    pub fn scan<H: ImageHost>(&mut self, host: &mut H) -> usize {
        let mut selected = 0;
        for image in host.candidates() {
            if host.state(image) != ProcessingState::Untouched {
                continue;
            }
            host.set_state(image, ProcessingState::Ongoing);
            selected += 1;

            if host.is_loaded(image) {
                self.process(host, image);
            } else {
                tracing::debug!("Image {} not loaded yet, deferring", image);
                self.awaiting_load.insert(image);
            }
        }

        if selected > 0 {
            tracing::info!("Scan selected {} image(s)", selected);
        }
        selected
    }

    /// Load-completed signal for `image`.
    pub fn image_loaded<H: ImageHost>(&mut self, host: &mut H, image: ImageId) {
        if let Some(resource) = self.committing.remove(&image) {
            host.set_state(image, ProcessingState::Done);
            host.revoke_resource(&resource);
            tracing::info!("Image {} pixelated", image);
        } else if self.awaiting_load.remove(&image) {
            self.process(host, image);
        }
    }

    /// Apply mask results that have come back. With `wait`, blocks up to
    /// that long for the first one. Returns how many were applied.
    pub fn pump<H: ImageHost>(&mut self, host: &mut H, wait: Option<Duration>) -> usize {
        let deliveries = match self.masks.as_mut() {
            Some(masks) => masks.poll(wait),
            None => return 0,
        };
        let count = deliveries.len();
        for delivery in deliveries {
            self.deliver(host, delivery);
        }
        count
    }

    /// Drop all pending work for an image removed from the document.
    pub fn forget<H: ImageHost>(&mut self, host: &mut H, image: ImageId) {
        self.awaiting_load.remove(&image);
        if let Some(masks) = self.masks.as_mut() {
            masks.abandon(image);
        }
        if let Some(resource) = self.committing.remove(&image) {
            host.revoke_resource(&resource);
        }
    }

    /// Note a rescan trigger (scroll, mutation). Bursts are coalesced.
    pub fn request_rescan(&mut self, now: Instant) {
        self.rescan.trigger(now);
    }

    /// Run the coalesced rescan once its burst has settled.
    pub fn tick<H: ImageHost>(&mut self, host: &mut H, now: Instant) -> bool {
        if self.rescan.fire(now) {
            self.scan(host);
            return true;
        }
        false
    }

    /// Nothing awaiting a load, a mask delivery, or a commit.
    pub fn is_idle(&self) -> bool {
        self.awaiting_load.is_empty()
            && self.committing.is_empty()
            && !self.masks.as_ref().is_some_and(MaskCoordinator::has_undelivered)
    }

    pub fn shutdown(&mut self) {
        if let Some(masks) = self.masks.as_mut() {
            masks.shutdown();
        }
    }

    fn process<H: ImageHost>(&mut self, host: &mut H, image: ImageId) {
        let Some(pixels) = host.read_pixels(image) else {
            self.skip(host, image, "pixels unavailable");
            return;
        };
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            self.skip(host, image, PixelateError::InvalidDimensions { width, height });
            return;
        }

        let outcome = match (self.config.mode, self.masks.as_mut()) {
            (TransformMode::Masked, Some(masks)) => masks.send(image, pixels),
            _ => SendOutcome::Unavailable(pixels),
        };

        match outcome {
            SendOutcome::Sent(_) | SendOutcome::Duplicate => {}
            SendOutcome::Unavailable(pixels) => self.pixelate(host, image, &pixels, None),
        }
    }

    fn deliver<H: ImageHost>(&mut self, host: &mut H, delivery: MaskDelivery) {
        let image = delivery.image;
        if !host.contains(image) || host.state(image) != ProcessingState::Ongoing {
            tracing::debug!("Discarding mask for image {} no longer awaiting it", image);
            return;
        }

        let Some(original) = host.read_pixels(image) else {
            self.skip(host, image, "pixels unavailable");
            return;
        };

        match delivery.mask {
            Ok(mask) => self.pixelate(host, image, &original, Some(&mask)),
            Err(e) => {
                tracing::warn!("No mask for image {} ({}), pixelating whole image", image, e);
                self.pixelate(host, image, &original, None);
            }
        }
    }

    fn pixelate<H: ImageHost>(
        &mut self,
        host: &mut H,
        image: ImageId,
        original: &RgbaImage,
        mask: Option<&RegionMask>,
    ) {
        let result = mosaic(original, self.config.factor)
            .and_then(|pixelated| composite_masked(original, &pixelated, mask));

        match result {
            Ok(pixels) => {
                if let Err(e) = self.commit(host, image, &pixels) {
                    self.skip(host, image, format!("{e:#}"));
                }
            }
            Err(e) => self.skip(host, image, e),
        }
    }

    fn commit<H: ImageHost>(
        &mut self,
        host: &mut H,
        image: ImageId,
        pixels: &RgbaImage,
    ) -> Result<()> {
        let encoded = encode_png(pixels)?;
        let resource = host.create_resource(encoded)?;
        if let Err(e) = host.assign_source(image, &resource) {
            host.revoke_resource(&resource);
            return Err(e).with_context(|| format!("Failed to assign source of image {}", image));
        }

        tracing::debug!("Image {} now loading {}", image, resource);
        self.committing.insert(image, resource);
        Ok(())
    }

    fn skip<H: ImageHost>(&mut self, host: &mut H, image: ImageId, reason: impl fmt::Display) {
        tracing::warn!("Leaving image {} unchanged: {}", image, reason);
        host.set_state(image, ProcessingState::Skipped);
    }
}
