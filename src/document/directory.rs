use super::is_image_file;
use crate::output::{decode_rgba, OutputSink, ResourceRegistry};
use crate::pipeline::{ImageHost, ImageId, ProcessingState, ResourceHandle};
use anyhow::{bail, Context, Result};
use image::RgbaImage;
use std::fs;
use std::path::{Path, PathBuf};

enum Source {
    File(PathBuf),
    Resource(ResourceHandle),
}

struct Element {
    name: String,
    state: ProcessingState,
    /// Source assigned but not decoded yet.
    loading: Option<Source>,
    /// Decoded current source; `None` if it failed to decode.
    pixels: Option<RgbaImage>,
    present: bool,
}

/// A directory of image files treated as a document: every file is an
/// image element whose "network load" is decoding the file.
pub struct DirectoryDocument {
    root: PathBuf,
    elements: Vec<Element>,
    resources: ResourceRegistry,
}

impl DirectoryDocument {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            bail!("{} is not a directory", root.display());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&root)
            .with_context(|| format!("Failed to read {}", root.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image_file(path))
            .collect();
        paths.sort();

        let elements = paths
            .into_iter()
            .map(|path| Element {
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                state: ProcessingState::Untouched,
                loading: Some(Source::File(path)),
                pixels: None,
                present: true,
            })
            .collect::<Vec<_>>();

        tracing::info!("Found {} image(s) in {}", elements.len(), root.display());

        Ok(Self {
            root,
            elements,
            resources: ResourceRegistry::default(),
        })
    }

    /// Finish every outstanding load. Returns the images whose load
    /// completed, to be passed on to the orchestrator.
    pub fn settle(&mut self) -> Vec<ImageId> {
        let mut loaded = Vec::new();
        for (index, element) in self.elements.iter_mut().enumerate() {
            let Some(source) = element.loading.take() else {
                continue;
            };

            let decoded = match &source {
                Source::File(path) => image::open(path)
                    .map(|img| img.to_rgba8())
                    .with_context(|| format!("Failed to decode {}", path.display())),
                Source::Resource(handle) => match self.resources.get(handle) {
                    Some(bytes) => decode_rgba(bytes),
                    None => Err(anyhow::anyhow!("resource {} was revoked before loading", handle)),
                },
            };

            match decoded {
                Ok(pixels) => element.pixels = Some(pixels),
                Err(e) => {
                    tracing::warn!("Image {} failed to load: {:#}", element.name, e);
                    element.pixels = None;
                }
            }
            if element.present {
                loaded.push(ImageId(index as u64));
            }
        }
        loaded
    }

    pub fn has_pending_loads(&self) -> bool {
        self.elements.iter().any(|e| e.present && e.loading.is_some())
    }

    /// Detach an element from the document.
    pub fn remove(&mut self, image: ImageId) {
        if let Some(element) = self.element_mut(image) {
            element.present = false;
        }
    }

    pub fn name(&self, image: ImageId) -> Option<&str> {
        self.element(image).map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn live_resources(&self) -> usize {
        self.resources.live()
    }

    /// Write every pixelated image to `sink`. Returns how many were written.
    pub fn persist<S: OutputSink>(&self, sink: &mut S) -> Result<usize> {
        let mut count = 0;
        for element in self.elements.iter().filter(|e| e.present) {
            if element.state != ProcessingState::Done {
                continue;
            }
            if let Some(pixels) = &element.pixels {
                sink.write_image(&element.name, pixels)?;
                count += 1;
            }
        }
        tracing::info!("Persisted {} image(s) from {}", count, self.root.display());
        Ok(count)
    }

    fn element(&self, image: ImageId) -> Option<&Element> {
        self.elements.get(image.0 as usize).filter(|e| e.present)
    }

    fn element_mut(&mut self, image: ImageId) -> Option<&mut Element> {
        self.elements.get_mut(image.0 as usize).filter(|e| e.present)
    }
}

impl ImageHost for DirectoryDocument {
    fn candidates(&self) -> Vec<ImageId> {
        (0..self.elements.len() as u64)
            .map(ImageId)
            .filter(|id| self.contains(*id))
            .collect()
    }

    fn state(&self, image: ImageId) -> ProcessingState {
        self.element(image).map(|e| e.state).unwrap_or_default()
    }

    fn set_state(&mut self, image: ImageId, state: ProcessingState) {
        if let Some(element) = self.element_mut(image) {
            element.state = state;
        }
    }

    fn contains(&self, image: ImageId) -> bool {
        self.element(image).is_some()
    }

    fn is_loaded(&self, image: ImageId) -> bool {
        self.element(image).is_some_and(|e| e.loading.is_none())
    }

    fn read_pixels(&self, image: ImageId) -> Option<RgbaImage> {
        self.element(image)
            .filter(|e| e.loading.is_none())
            .and_then(|e| e.pixels.clone())
    }

    fn create_resource(&mut self, encoded: Vec<u8>) -> Result<ResourceHandle> {
        Ok(self.resources.create(encoded))
    }

    fn assign_source(&mut self, image: ImageId, resource: &ResourceHandle) -> Result<()> {
        let Some(element) = self.element_mut(image) else {
            bail!("image {} is not in the document", image);
        };
        element.loading = Some(Source::Resource(resource.clone()));
        Ok(())
    }

    fn revoke_resource(&mut self, resource: &ResourceHandle) {
        self.resources.revoke(resource);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) {
        RgbaImage::from_pixel(width, height, Rgba([200, 100, 50, 255]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn lists_image_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "b.png", 4, 4);
        write_png(dir.path(), "a.png", 4, 4);
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let document = DirectoryDocument::open(dir.path()).unwrap();
        assert_eq!(document.len(), 2);
        assert_eq!(document.name(ImageId(0)), Some("a.png"));
        assert_eq!(document.name(ImageId(1)), Some("b.png"));
    }

    #[test]
    fn images_load_on_settle() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 5, 3);

        let mut document = DirectoryDocument::open(dir.path()).unwrap();
        assert!(!document.is_loaded(ImageId(0)));
        assert!(document.read_pixels(ImageId(0)).is_none());

        assert_eq!(document.settle(), vec![ImageId(0)]);
        assert!(document.is_loaded(ImageId(0)));
        assert_eq!(document.read_pixels(ImageId(0)).unwrap().dimensions(), (5, 3));
        assert!(!document.has_pending_loads());
    }

    #[test]
    fn undecodable_file_loads_without_pixels() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.png"), b"nope").unwrap();

        let mut document = DirectoryDocument::open(dir.path()).unwrap();
        assert_eq!(document.settle(), vec![ImageId(0)]);
        assert!(document.is_loaded(ImageId(0)));
        assert!(document.read_pixels(ImageId(0)).is_none());
    }

    #[test]
    fn removed_elements_disappear() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 2, 2);
        write_png(dir.path(), "b.png", 2, 2);

        let mut document = DirectoryDocument::open(dir.path()).unwrap();
        document.remove(ImageId(0));
        assert_eq!(document.candidates(), vec![ImageId(1)]);
        assert!(!document.contains(ImageId(0)));
        assert_eq!(document.settle(), vec![ImageId(1)]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DirectoryDocument::open(dir.path().join("nowhere")).is_err());
    }
}
