use anyhow::Result;
use image::RgbaImage;
use std::fmt;

/// Identity of an image element in the host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub u64);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-image annotation kept on the host element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingState {
    #[default]
    Untouched,
    Ongoing,
    Done,
    /// The transform could not run; the original source stays.
    Skipped,
}

/// A temporary displayable resource (an object URL in a browser).
/// Must be revoked once the image has loaded it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceHandle(String);

impl ResourceHandle {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The document whose images get pixelated.
///
/// Which elements are candidates is up to the host. Load completion is
/// signalled back by calling
/// [`Orchestrator::image_loaded`](super::Orchestrator::image_loaded).
pub trait ImageHost {
    /// Images matching the host's inclusion rules, in document order.
    fn candidates(&self) -> Vec<ImageId>;

    fn state(&self, image: ImageId) -> ProcessingState;

    fn set_state(&mut self, image: ImageId, state: ProcessingState);

    /// Whether the element is still part of the document.
    fn contains(&self, image: ImageId) -> bool;

    /// Whether the element's current source has finished loading.
    fn is_loaded(&self, image: ImageId) -> bool;

    /// Decoded pixels of the current source, at natural size.
    fn read_pixels(&self, image: ImageId) -> Option<RgbaImage>;

    /// Register encoded image bytes as a displayable resource.
    fn create_resource(&mut self, encoded: Vec<u8>) -> Result<ResourceHandle>;

    /// Point the element at `resource`. Loading happens asynchronously.
    fn assign_source(&mut self, image: ImageId, resource: &ResourceHandle) -> Result<()>;

    fn revoke_resource(&mut self, resource: &ResourceHandle);
}
