use image::{Rgba, RgbaImage};
use mosaica::document::DirectoryDocument;
use mosaica::mosaic::mosaic;
use mosaica::output::{DirectorySink, OutputSink};
use mosaica::{ImageHost, ImageId, MosaicFactor, Orchestrator, PipelineConfig, ProcessingState};
use std::fs;

fn checker(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        if (x / 3 + y / 3) % 2 == 0 {
            Rgba([240, 240, 240, 255])
        } else {
            Rgba([x as u8, y as u8, 90, 255])
        }
    })
}

fn run(document: &mut DirectoryDocument, orchestrator: &mut Orchestrator) {
    orchestrator.scan(document);
    for _ in 0..10 {
        for image in document.settle() {
            orchestrator.image_loaded(document, image);
        }
        if orchestrator.is_idle() && !document.has_pending_loads() {
            return;
        }
    }
    panic!("pipeline did not settle");
}

#[test]
fn directory_is_pixelated_into_output() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let photo = checker(120, 80);
    photo.save(input.path().join("photo.png")).unwrap();
    fs::write(input.path().join("broken.png"), b"definitely not a png").unwrap();
    fs::write(input.path().join("README"), b"ignored").unwrap();

    let mut document = DirectoryDocument::open(input.path()).unwrap();
    assert_eq!(document.len(), 2);

    let mut orchestrator = Orchestrator::new(PipelineConfig::default());
    run(&mut document, &mut orchestrator);

    // broken.png sorts first
    assert_eq!(document.state(ImageId(0)), ProcessingState::Skipped);
    assert_eq!(document.state(ImageId(1)), ProcessingState::Done);
    assert_eq!(document.live_resources(), 0);

    let mut sink = DirectorySink::new(output.path()).unwrap();
    assert_eq!(document.persist(&mut sink).unwrap(), 1);
    assert_eq!(sink.written(), 1);

    let written = image::open(output.path().join("photo.png")).unwrap().to_rgba8();
    assert_eq!(written, mosaic(&photo, MosaicFactor::DEFAULT).unwrap());
    assert!(!output.path().join("broken.png").exists());
}

#[test]
fn removed_file_is_not_persisted() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    checker(30, 30).save(input.path().join("a.png")).unwrap();
    checker(30, 30).save(input.path().join("b.png")).unwrap();

    let mut document = DirectoryDocument::open(input.path()).unwrap();
    let mut orchestrator = Orchestrator::new(PipelineConfig::default());
    document.remove(ImageId(0));
    orchestrator.forget(&mut document, ImageId(0));
    run(&mut document, &mut orchestrator);

    let mut sink = DirectorySink::new(output.path()).unwrap();
    assert_eq!(document.persist(&mut sink).unwrap(), 1);
    assert!(output.path().join("b.png").exists());
    assert!(!output.path().join("a.png").exists());
}
