use super::OutputSink;
use anyhow::{Context, Result};
use image::{ImageFormat, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};

/// Writes each image as `<name>.png` into a directory.
pub struct DirectorySink {
    root: PathBuf,
    written: usize,
}

impl DirectorySink {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tracing::info!("Writing pixelated images to {}", root.display());

        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create output directory {}", root.display()))?;

        Ok(Self { root, written: 0 })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        let stem = Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        self.root.join(format!("{stem}.png"))
    }
}

impl OutputSink for DirectorySink {
    fn write_image(&mut self, name: &str, image: &RgbaImage) -> Result<()> {
        let path = self.path_for(name);
        image
            .save_with_format(&path, ImageFormat::Png)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::debug!("Wrote {}", path.display());
        self.written += 1;
        Ok(())
    }

    fn written(&self) -> usize {
        self.written
    }
}
