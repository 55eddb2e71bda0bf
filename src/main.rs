use anyhow::{Context, Result};
use clap::Parser;
use mosaica::document::DirectoryDocument;
use mosaica::output::{DirectorySink, OutputSink};
use mosaica::segmentation::{self, SegmentationModel};
use mosaica::worker::{thread_launcher, ModelFactory};
use mosaica::{
    ImageHost, MosaicFactor, Orchestrator, PipelineConfig, ProcessingState, TransformMode,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory of images to pixelate
    #[arg(short, long)]
    input: PathBuf,

    /// Directory the pixelated images are written to
    #[arg(short, long)]
    output: PathBuf,

    /// Pixelate whole images, or only the segmented body region
    #[arg(long, value_enum, default_value_t = TransformMode::Whole)]
    mode: TransformMode,

    /// Mosaic scale in per-mille of the image size (60 = 6%)
    #[arg(long, default_value_t = 60)]
    factor: u32,

    /// Path to segmentation model (ONNX file), used in masked mode
    /// Without it, masked mode falls back to whole-image pixelation
    #[arg(long)]
    model: Option<String>,

    /// Matte values at or above this count as body region
    #[arg(long, default_value_t = 0.7)]
    threshold: f32,

    /// How long to wait for each segmentation result before re-checking loads (ms)
    #[arg(long, default_value_t = 50)]
    poll_ms: u64,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("Mosaica starting");
    tracing::info!("Mode: {:?}", args.mode);
    tracing::info!("Factor: {}/1000", args.factor);

    let config = PipelineConfig {
        factor: MosaicFactor::new(args.factor).context("Invalid --factor")?,
        mode: args.mode,
        segmentation_threshold: args.threshold,
        ..PipelineConfig::default()
    };

    let mut document = DirectoryDocument::open(&args.input)
        .with_context(|| format!("Failed to open input directory {}", args.input.display()))?;
    let mut sink = DirectorySink::new(&args.output).context("Failed to initialize output")?;

    let mut orchestrator = Orchestrator::new(config.clone());
    if config.mode == TransformMode::Masked {
        match args.model.clone() {
            Some(model_path) => {
                tracing::info!("Segmentation model: {}", model_path);
                let factory: ModelFactory = Box::new(move || -> Result<Box<dyn SegmentationModel>> {
                    segmentation::create_default_model(&model_path)
                        .context("Failed to load segmentation model")
                });
                let launcher = thread_launcher(factory, config.segmentation_threshold);
                orchestrator = orchestrator.with_segmentation(launcher);
            }
            None => tracing::warn!("Masked mode without --model, pixelating whole images"),
        }
    }

    run_pipeline(&mut document, &mut orchestrator, Duration::from_millis(args.poll_ms))?;
    orchestrator.shutdown();

    let written = document.persist(&mut sink)?;
    tracing::info!("Wrote {} image(s) to {}", sink.written(), args.output.display());
    if written < document.len() {
        tracing::warn!("{} image(s) left unchanged", document.len() - written);
    }

    Ok(())
}

fn run_pipeline(
    document: &mut DirectoryDocument,
    orchestrator: &mut Orchestrator,
    poll: Duration,
) -> Result<()> {
    let start = Instant::now();
    let mut rounds = 0u64;

    tracing::info!("Starting pipeline over {} image(s)", document.len());
    orchestrator.scan(document);

    loop {
        for image in document.settle() {
            orchestrator.image_loaded(document, image);
        }

        orchestrator.pump(document, Some(poll));
        rounds += 1;

        if orchestrator.is_idle() && !document.has_pending_loads() {
            break;
        }

        if rounds % 100 == 0 {
            tracing::info!(
                "Still working after {:.1}s ({} image(s) done)",
                start.elapsed().as_secs_f64(),
                count_state(document, ProcessingState::Done)
            );
        }
    }

    tracing::info!(
        "Pipeline finished in {:.1}ms: {} done, {} skipped",
        start.elapsed().as_secs_f64() * 1000.0,
        count_state(document, ProcessingState::Done),
        count_state(document, ProcessingState::Skipped)
    );

    Ok(())
}

fn count_state(document: &DirectoryDocument, state: ProcessingState) -> usize {
    document
        .candidates()
        .into_iter()
        .filter(|image| document.state(*image) == state)
        .count()
}
