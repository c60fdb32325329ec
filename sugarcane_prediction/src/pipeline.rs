//! Preprocess, infer, classify.
//!
//! Every call runs to completion on the calling thread. The pipeline owns its
//! engine through an [`EngineGuard`], so the backend is released when the
//! pipeline is closed or dropped, also after a failed request.

use crate::{
    engine::{EngineGuard, InferenceEngine},
    error::{InferenceError, PipelineError},
    image_source::load_image,
    postprocess::{classify, ClassTable, ClassificationResult, ScoreVector},
    preprocess::{Preprocessor, RawImage},
};
use std::{path::Path, time::Instant};
use tracing::instrument;

pub struct Pipeline<E: InferenceEngine> {
    preprocessor: Preprocessor,
    engine: EngineGuard<E>,
    class_table: ClassTable,
}

impl<E: InferenceEngine> Pipeline<E> {
    pub fn new(preprocessor: Preprocessor, engine: E, class_table: ClassTable) -> Self {
        Self {
            preprocessor,
            engine: EngineGuard::new(engine),
            class_table,
        }
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn class_table(&self) -> &ClassTable {
        &self.class_table
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn classify(&mut self, image: &RawImage) -> Result<ClassificationResult, PipelineError> {
        let now = Instant::now();
        let tensor = self.preprocessor.preprocess(image);
        let preprocess_elapsed = now.elapsed();

        let scores = match self.engine.infer(&tensor).and_then(ScoreVector::ensure_finite) {
            Ok(scores) => scores,
            Err(e) => {
                tracing::error!("{} inference failed: {}", self.engine.name(), e);
                return Err(e.into());
            }
        };
        let inference_elapsed = now.elapsed();
        tracing::debug!("Scores: {:?}", scores.as_slice());

        let result = classify(&scores, &self.class_table)?;
        tracing::debug!(
            "Classified as {} ({:.3}); preprocess {:.2?}, total {:.2?}",
            result.label,
            result.confidence,
            preprocess_elapsed,
            inference_elapsed
        );

        Ok(result)
    }

    pub fn classify_bytes(&mut self, image_data: &[u8]) -> Result<ClassificationResult, PipelineError> {
        let image = RawImage::from_bytes(image_data)?;
        self.classify(&image)
    }

    pub fn classify_file(&mut self, path: &Path) -> Result<ClassificationResult, PipelineError> {
        let image = load_image(path)?;
        Ok(self.classify(&image)?.with_source(path))
    }

    pub fn is_closed(&self) -> bool {
        self.engine.is_closed()
    }

    /// Releases the engine now instead of at drop.
    pub fn close(self) {
        self.engine.close();
    }
}

/// Loads an engine, classifies one image and releases the engine again,
/// on success as well as on failure.
pub fn classify_once<E, F>(
    load_engine: F,
    preprocessor: Preprocessor,
    class_table: ClassTable,
    image: &RawImage,
) -> Result<ClassificationResult, PipelineError>
where
    E: InferenceEngine,
    F: FnOnce() -> Result<E, InferenceError>,
{
    let mut pipeline = Pipeline::new(preprocessor, load_engine()?, class_table);
    let result = pipeline.classify(image);
    pipeline.close();
    result
}
