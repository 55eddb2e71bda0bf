//! Typed envelopes exchanged with the background segmentation context.

use image::RgbaImage;
use std::fmt;
use std::time::Duration;

/// Correlation token for one outstanding mask request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_{:09x}", self.0)
    }
}

/// Main thread → background: segment these pixels.
///
/// The RGBA bytes are moved into the message; the sender keeps no copy.
#[derive(Debug)]
pub struct MaskRequest {
    pub id: RequestId,
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Background → main thread: the mask for request `id`, as an RGBA bitmap
/// whose alpha channel is the region mask.
#[derive(Debug)]
pub struct MaskResponse {
    pub id: RequestId,
    pub mask: Result<RgbaImage, String>,
}

#[derive(Debug)]
pub enum WorkerEvent {
    /// The context finished starting up and accepts requests.
    Ready,
    /// The context cannot serve requests any more (startup failed or it
    /// stopped). Requests already posted will not be answered.
    Failed(String),
    Response(MaskResponse),
}

/// An isolated execution context hosting the segmentation gateway.
pub trait BackgroundContext {
    /// Hand a request to the context. Gives the request back if the
    /// context is gone.
    fn post(&mut self, request: MaskRequest) -> Result<(), MaskRequest>;

    /// Next event if one is ready.
    fn try_next(&mut self) -> Option<WorkerEvent>;

    /// Wait up to `timeout` for the next event.
    fn next_timeout(&mut self, timeout: Duration) -> Option<WorkerEvent>;

    /// Stop accepting requests and release the context.
    fn shutdown(&mut self) {}
}
