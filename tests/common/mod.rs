#![allow(dead_code)]

use image::{Rgba, RgbaImage};
use mosaica::output::{decode_rgba, ResourceRegistry};
use mosaica::pipeline::ResourceHandle;
use mosaica::worker::{BackgroundContext, Launcher, MaskRequest, WorkerEvent};
use mosaica::{ImageHost, ImageId, Orchestrator, ProcessingState};
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

struct Element {
    pixels: RgbaImage,
    state: ProcessingState,
    loaded: bool,
    pending_source: Option<ResourceHandle>,
    present: bool,
    swaps: usize,
}

/// Document held in memory. Loads complete when `finish_loads` runs.
#[derive(Default)]
pub struct MemoryHost {
    elements: BTreeMap<ImageId, Element>,
    pub resources: ResourceRegistry,
    next: u64,
}

impl MemoryHost {
    pub fn add(&mut self, pixels: RgbaImage, loaded: bool) -> ImageId {
        self.next += 1;
        let id = ImageId(self.next);
        self.elements.insert(
            id,
            Element {
                pixels,
                state: ProcessingState::Untouched,
                loaded,
                pending_source: None,
                present: true,
                swaps: 0,
            },
        );
        id
    }

    pub fn remove(&mut self, image: ImageId) {
        if let Some(element) = self.elements.get_mut(&image) {
            element.present = false;
        }
    }

    pub fn finish_loads(&mut self) -> Vec<ImageId> {
        let mut loaded = Vec::new();
        for (id, element) in self.elements.iter_mut() {
            if element.loaded {
                continue;
            }
            if let Some(handle) = element.pending_source.take() {
                let bytes = self.resources.get(&handle).expect("resource revoked before load");
                element.pixels = decode_rgba(bytes).unwrap();
                element.swaps += 1;
            }
            element.loaded = true;
            if element.present {
                loaded.push(*id);
            }
        }
        loaded
    }

    pub fn pixels(&self, image: ImageId) -> &RgbaImage {
        &self.elements[&image].pixels
    }

    pub fn swaps(&self, image: ImageId) -> usize {
        self.elements[&image].swaps
    }

    pub fn state_of(&self, image: ImageId) -> ProcessingState {
        self.elements[&image].state
    }
}

impl ImageHost for MemoryHost {
    fn candidates(&self) -> Vec<ImageId> {
        self.elements
            .iter()
            .filter(|(_, e)| e.present)
            .map(|(id, _)| *id)
            .collect()
    }

    fn state(&self, image: ImageId) -> ProcessingState {
        self.elements[&image].state
    }

    fn set_state(&mut self, image: ImageId, state: ProcessingState) {
        self.elements.get_mut(&image).unwrap().state = state;
    }

    fn contains(&self, image: ImageId) -> bool {
        self.elements.get(&image).is_some_and(|e| e.present)
    }

    fn is_loaded(&self, image: ImageId) -> bool {
        self.elements[&image].loaded
    }

    fn read_pixels(&self, image: ImageId) -> Option<RgbaImage> {
        let element = self.elements.get(&image)?;
        (element.present && element.loaded).then(|| element.pixels.clone())
    }

    fn create_resource(&mut self, encoded: Vec<u8>) -> anyhow::Result<ResourceHandle> {
        Ok(self.resources.create(encoded))
    }

    fn assign_source(&mut self, image: ImageId, resource: &ResourceHandle) -> anyhow::Result<()> {
        let element = self.elements.get_mut(&image).unwrap();
        element.pending_source = Some(resource.clone());
        element.loaded = false;
        Ok(())
    }

    fn revoke_resource(&mut self, resource: &ResourceHandle) {
        self.resources.revoke(resource);
    }
}

/// Run load events until the host has nothing left loading.
pub fn settle(host: &mut MemoryHost, orchestrator: &mut Orchestrator) {
    loop {
        let loaded = host.finish_loads();
        if loaded.is_empty() {
            break;
        }
        for image in loaded {
            orchestrator.image_loaded(host, image);
        }
    }
}

#[derive(Default)]
pub struct Script {
    pub posted: Vec<MaskRequest>,
    pub events: VecDeque<WorkerEvent>,
    pub launches: usize,
}

/// Background context whose responses are queued by the test.
pub struct ScriptedContext(Rc<RefCell<Script>>);

impl BackgroundContext for ScriptedContext {
    fn post(&mut self, request: MaskRequest) -> Result<(), MaskRequest> {
        self.0.borrow_mut().posted.push(request);
        Ok(())
    }

    fn try_next(&mut self) -> Option<WorkerEvent> {
        self.0.borrow_mut().events.pop_front()
    }

    fn next_timeout(&mut self, _timeout: Duration) -> Option<WorkerEvent> {
        self.try_next()
    }
}

pub fn scripted_launcher() -> (Launcher, Rc<RefCell<Script>>) {
    let script = Rc::new(RefCell::new(Script::default()));
    let handle = Rc::clone(&script);
    let launcher: Launcher = Box::new(move || {
        handle.borrow_mut().launches += 1;
        let context: Box<dyn BackgroundContext> = Box::new(ScriptedContext(handle));
        Ok(context)
    });
    (launcher, script)
}

pub fn gradient(width: u32, height: u32, seed: u8) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x * 3) as u8 ^ seed,
            (y * 5) as u8,
            ((x + y) as u8).wrapping_mul(seed | 1),
            255,
        ])
    })
}
