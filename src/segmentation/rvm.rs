use super::preprocess::Preprocessor;
use super::types::{Matte, SegmentationModel};
use anyhow::{ensure, Context, Result};
use image::RgbaImage;
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

/// RobustVideoMatting segmentation model
///
/// RVM is recurrent; for unrelated still images every call starts from a
/// zeroed state, so results do not depend on what was segmented before.
pub struct RobustVideoMatting {
    session: Session,
    preprocessor: Preprocessor,
    width: u32,
    height: u32,

    // Resolution of the recurrent state relative to the input
    downsample_ratio: f32,
}

impl RobustVideoMatting {
    /// Load an RVM model from an ONNX file
    ///
    /// # Default Configuration
    /// - Input size: 512x512
    /// - Downsample ratio: 0.25
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let path = model_path.as_ref();

        tracing::info!("Loading RVM model from {}", path.display());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        tracing::info!("RVM model loaded successfully");

        let width = 512;
        let height = 512;

        Ok(Self {
            session,
            preprocessor: Preprocessor::new(width, height),
            width,
            height,
            downsample_ratio: 0.25,
        })
    }

    // RVM accepts 1x1x1x1 zero tensors as the initial recurrent state.
    fn zero_state() -> Result<Tensor<f32>> {
        Ok(Tensor::from_array(Array4::<f32>::zeros((1, 1, 1, 1)))?)
    }
}

impl SegmentationModel for RobustVideoMatting {
    fn segment(&mut self, image: &RgbaImage) -> Result<Matte> {
        let _span = tracing::debug_span!("rvm_segment").entered();

        let input = Tensor::from_array(self.preprocessor.preprocess(image)?)?;
        let ratio = Tensor::from_array(ndarray::arr1(&[self.downsample_ratio]))?;

        // RVM expects: src, r1i, r2i, r3i, r4i, downsample_ratio
        let (matte, matte_width, matte_height) = {
            let _infer_span = tracing::debug_span!("inference").entered();
            let outputs = self
                .session
                .run(ort::inputs![
                    input,
                    Self::zero_state()?,
                    Self::zero_state()?,
                    Self::zero_state()?,
                    Self::zero_state()?,
                    ratio
                ])
                .context("Failed to run inference")?;

            // Outputs: fgr, pha, r1o..r4o. Only the alpha (pha) is needed.
            let (shape, data) = outputs[1]
                .try_extract_tensor::<f32>()
                .context("Model output 'pha' is not an f32 tensor")?;
            ensure!(shape.len() == 4, "unexpected alpha shape {:?}", shape);
            (data.to_vec(), shape[3] as u32, shape[2] as u32)
        };

        let (image_width, image_height) = image.dimensions();
        Preprocessor::postprocess_matte(
            &matte,
            matte_width,
            matte_height,
            image_width,
            image_height,
        )
    }

    fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
