//! Request/response messaging with the background segmentation context.
//!
//! [`MaskCoordinator`] lives on the main thread. It starts the background
//! context on first use, moves pixel buffers into [`MaskRequest`]s tagged
//! with a fresh [`RequestId`], and routes each [`MaskResponse`] back to the
//! image that asked for it. Responses may arrive in any order; the request
//! id is the only correlation key.

mod protocol;
mod thread;

pub use protocol::{BackgroundContext, MaskRequest, MaskResponse, RequestId, WorkerEvent};
pub use thread::{ModelFactory, ThreadContext};

use crate::error::{PixelateError, Result};
use crate::pipeline::ImageId;
use crate::segmentation::RegionMask;
use image::RgbaImage;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Creates the background context. Called at most once.
pub type Launcher = Box<dyn FnOnce() -> anyhow::Result<Box<dyn BackgroundContext>>>;

/// Launcher for a [`ThreadContext`] running the given model.
pub fn thread_launcher(factory: ModelFactory, threshold: f32) -> Launcher {
    Box::new(move || {
        let context: Box<dyn BackgroundContext> =
            Box::new(ThreadContext::spawn(factory, threshold)?);
        Ok(context)
    })
}

/// In-flight requests, indexed both ways.
#[derive(Debug, Default)]
pub struct PendingRequests {
    by_request: HashMap<RequestId, ImageId>,
    by_image: HashMap<ImageId, RequestId>,
}

impl PendingRequests {
    /// Record `id` for `image` unless the image already has a request out.
    pub fn insert(&mut self, id: RequestId, image: ImageId) -> bool {
        if self.by_image.contains_key(&image) {
            return false;
        }
        self.by_image.insert(image, id);
        self.by_request.insert(id, image);
        true
    }

    pub fn resolve(&mut self, id: RequestId) -> Option<ImageId> {
        let image = self.by_request.remove(&id)?;
        self.by_image.remove(&image);
        Some(image)
    }

    pub fn abandon(&mut self, image: ImageId) -> Option<RequestId> {
        let id = self.by_image.remove(&image)?;
        self.by_request.remove(&id);
        Some(id)
    }

    pub fn contains(&self, image: ImageId) -> bool {
        self.by_image.contains_key(&image)
    }

    pub fn len(&self) -> usize {
        self.by_request.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_request.is_empty()
    }

    fn drain(&mut self) -> Vec<ImageId> {
        self.by_request.clear();
        let mut images: Vec<ImageId> = self.by_image.drain().map(|(image, _)| image).collect();
        images.sort();
        images
    }
}

/// What happened to a [`MaskCoordinator::send`].
#[derive(Debug)]
pub enum SendOutcome {
    Sent(RequestId),
    /// The image already has a request in flight; nothing was sent.
    Duplicate,
    /// No background context; the pixels are handed back for a local
    /// fallback.
    Unavailable(RgbaImage),
}

/// A mask (or failure) routed to the image that requested it.
#[derive(Debug)]
pub struct MaskDelivery {
    pub image: ImageId,
    pub mask: Result<RegionMask>,
}

enum ContextSlot {
    Unstarted(Launcher),
    Running(Box<dyn BackgroundContext>),
    Unavailable(String),
}

pub struct MaskCoordinator {
    slot: ContextSlot,
    pending: PendingRequests,
    failed: VecDeque<MaskDelivery>,
    next_id: u64,
}

impl MaskCoordinator {
    pub fn new(launcher: Launcher) -> Self {
        Self {
            slot: ContextSlot::Unstarted(launcher),
            pending: PendingRequests::default(),
            failed: VecDeque::new(),
            next_id: 0,
        }
    }

    /// Ask for the region mask of `image`, moving its pixels to the
    /// background context.
    pub fn send(&mut self, image: ImageId, pixels: RgbaImage) -> SendOutcome {
        if self.pending.contains(image) {
            tracing::debug!("Image {}: {}", image, PixelateError::DuplicateRequest);
            return SendOutcome::Duplicate;
        }

        if !self.ensure_started() {
            return SendOutcome::Unavailable(pixels);
        }

        self.next_id += 1;
        let id = RequestId::from_raw(self.next_id);
        let (width, height) = pixels.dimensions();
        let request = MaskRequest {
            id,
            pixels: pixels.into_raw(),
            width,
            height,
        };

        let posted = match &mut self.slot {
            ContextSlot::Running(context) => context.post(request),
            _ => Err(request),
        };
        match posted {
            Ok(()) => {
                self.pending.insert(id, image);
                tracing::debug!("Sent mask request {} for image {}", id, image);
                SendOutcome::Sent(id)
            }
            Err(returned) => {
                self.mark_unavailable("background context stopped accepting requests".into());
                let pixels = RgbaImage::from_raw(returned.width, returned.height, returned.pixels)
                    .unwrap_or_else(|| RgbaImage::new(0, 0));
                SendOutcome::Unavailable(pixels)
            }
        }
    }

    /// Collect routed masks. With `wait`, blocks up to that long for the
    /// first event when requests are outstanding and nothing is queued.
    pub fn poll(&mut self, wait: Option<Duration>) -> Vec<MaskDelivery> {
        let mut deliveries: Vec<MaskDelivery> = self.failed.drain(..).collect();

        if let Some(timeout) = wait {
            if deliveries.is_empty() && !self.pending.is_empty() {
                let event = match &mut self.slot {
                    ContextSlot::Running(context) => context.next_timeout(timeout),
                    _ => None,
                };
                if let Some(event) = event {
                    self.handle(event, &mut deliveries);
                }
            }
        }

        loop {
            let event = match &mut self.slot {
                ContextSlot::Running(context) => context.try_next(),
                _ => None,
            };
            match event {
                Some(event) => self.handle(event, &mut deliveries),
                None => break,
            }
        }

        deliveries.extend(self.failed.drain(..));
        deliveries
    }

    /// Route one response. Responses for unknown ids are dropped.
    pub fn receive(&mut self, response: MaskResponse) -> Option<MaskDelivery> {
        let Some(image) = self.pending.resolve(response.id) else {
            tracing::debug!("{}", PixelateError::StaleResponse(response.id.to_string()));
            return None;
        };

        let mask = response
            .mask
            .map(|bitmap| RegionMask::from_bitmap(&bitmap))
            .map_err(PixelateError::SegmentationFailure);
        Some(MaskDelivery { image, mask })
    }

    /// Forget the request of an image that left the document. Its
    /// response, if it ever comes, is discarded.
    pub fn abandon(&mut self, image: ImageId) -> Option<RequestId> {
        let id = self.pending.abandon(image)?;
        tracing::debug!("Abandoned mask request {} for image {}", id, image);
        Some(id)
    }

    pub fn is_pending(&self, image: ImageId) -> bool {
        self.pending.contains(image)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Requests still in flight, or failures not yet handed out by `poll`.
    pub fn has_undelivered(&self) -> bool {
        !self.pending.is_empty() || !self.failed.is_empty()
    }

    /// Whether no background context could be (or can any longer be) used.
    pub fn is_unavailable(&self) -> bool {
        matches!(self.slot, ContextSlot::Unavailable(_))
    }

    pub fn shutdown(&mut self) {
        if let ContextSlot::Running(context) = &mut self.slot {
            context.shutdown();
        }
        self.mark_unavailable("shut down".into());
    }

    fn ensure_started(&mut self) -> bool {
        if matches!(self.slot, ContextSlot::Unstarted(_)) {
            let slot = std::mem::replace(&mut self.slot, ContextSlot::Unavailable(String::new()));
            if let ContextSlot::Unstarted(launcher) = slot {
                match launcher() {
                    Ok(context) => self.slot = ContextSlot::Running(context),
                    Err(e) => {
                        tracing::warn!(
                            "Could not start background segmentation, masks disabled: {:#}",
                            e
                        );
                        self.slot = ContextSlot::Unavailable(format!("{e:#}"));
                    }
                }
            }
        }
        matches!(self.slot, ContextSlot::Running(_))
    }

    fn handle(&mut self, event: WorkerEvent, deliveries: &mut Vec<MaskDelivery>) {
        match event {
            WorkerEvent::Ready => tracing::info!("Background segmentation ready"),
            WorkerEvent::Failed(reason) => {
                tracing::warn!("Background segmentation unavailable: {}", reason);
                self.mark_unavailable(reason);
            }
            WorkerEvent::Response(response) => deliveries.extend(self.receive(response)),
        }
    }

    // Every outstanding request is failed back so no image waits forever.
    fn mark_unavailable(&mut self, reason: String) {
        for image in self.pending.drain() {
            self.failed.push_back(MaskDelivery {
                image,
                mask: Err(PixelateError::WorkerUnavailable(reason.clone())),
            });
        }
        self.slot = ContextSlot::Unavailable(reason);
    }
}

impl Drop for MaskCoordinator {
    fn drop(&mut self) {
        if let ContextSlot::Running(context) = &mut self.slot {
            context.shutdown();
        }
    }
}
