use super::protocol::{BackgroundContext, MaskRequest, MaskResponse, WorkerEvent};
use crate::mosaic::pixel_buffer;
use crate::segmentation::{MaskGateway, SegmentationModel};
use anyhow::{Context, Result};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Builds the segmentation model inside the background thread.
pub type ModelFactory = Box<dyn FnOnce() -> Result<Box<dyn SegmentationModel>> + Send>;

/// A dedicated OS thread owning the model and its mask cache.
pub struct ThreadContext {
    requests: Option<Sender<MaskRequest>>,
    events: Receiver<WorkerEvent>,
    handle: Option<JoinHandle<()>>,
    stopped: bool,
}

impl ThreadContext {
    /// Spawn the segmentation thread. The model is loaded on that thread;
    /// the outcome arrives as the first event.
    pub fn spawn(factory: ModelFactory, threshold: f32) -> Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<MaskRequest>();
        let (event_tx, event_rx) = mpsc::channel::<WorkerEvent>();

        let handle = thread::Builder::new()
            .name("segmentation".into())
            .spawn(move || serve(factory, threshold, request_rx, event_tx))
            .context("Failed to spawn segmentation thread")?;

        tracing::info!("Segmentation thread started");

        Ok(Self {
            requests: Some(request_tx),
            events: event_rx,
            handle: Some(handle),
            stopped: false,
        })
    }

    fn stopped_event(&mut self) -> Option<WorkerEvent> {
        if self.stopped {
            return None;
        }
        self.stopped = true;
        Some(WorkerEvent::Failed("segmentation thread exited".into()))
    }
}

impl BackgroundContext for ThreadContext {
    fn post(&mut self, request: MaskRequest) -> std::result::Result<(), MaskRequest> {
        match &self.requests {
            Some(tx) => tx.send(request).map_err(|e| e.0),
            None => Err(request),
        }
    }

    fn try_next(&mut self) -> Option<WorkerEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => self.stopped_event(),
        }
    }

    fn next_timeout(&mut self, timeout: Duration) -> Option<WorkerEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => self.stopped_event(),
        }
    }

    fn shutdown(&mut self) {
        // Closing the request channel ends the serve loop.
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Segmentation thread panicked");
            } else {
                tracing::info!("Segmentation thread stopped");
            }
        }
    }
}

impl Drop for ThreadContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn serve(
    factory: ModelFactory,
    threshold: f32,
    requests: Receiver<MaskRequest>,
    events: Sender<WorkerEvent>,
) {
    let model = match factory() {
        Ok(model) => model,
        Err(e) => {
            tracing::warn!("Segmentation model failed to load: {:#}", e);
            let _ = events.send(WorkerEvent::Failed(format!("{e:#}")));
            return;
        }
    };
    if events.send(WorkerEvent::Ready).is_err() {
        return;
    }

    let mut gateway = MaskGateway::new(model, threshold);

    for request in requests {
        let id = request.id;
        tracing::debug!("Segmenting request {} ({}x{})", id, request.width, request.height);

        let mask = pixel_buffer(request.pixels, request.width, request.height)
            .and_then(|image| gateway.segment(&image))
            .map(|mask| mask.to_bitmap())
            .map_err(|e| e.to_string());

        if events.send(WorkerEvent::Response(MaskResponse { id, mask })).is_err() {
            break;
        }
    }
}
