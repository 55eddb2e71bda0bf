//! Pixelate images in a document, optionally only where a segmentation
//! model finds a person.
//!
//! The pieces, leaf first:
//! - [`mosaic`]: nearest-neighbor mosaic over an RGBA buffer
//! - [`compositor`]: mosaic inside a region mask, original outside
//! - [`segmentation`]: model trait, ONNX backend, memoizing gateway
//! - [`worker`]: background segmentation thread and request correlation
//! - [`pipeline`]: per-image state machine and source swapping

pub mod compositor;
pub mod config;
pub mod document;
pub mod error;
pub mod mosaic;
pub mod output;
pub mod pipeline;
pub mod segmentation;
pub mod worker;

pub use config::{MosaicFactor, PipelineConfig, TransformMode};
pub use error::PixelateError;
pub use pipeline::{ImageHost, ImageId, Orchestrator, ProcessingState};
