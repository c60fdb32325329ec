use crate::{
    config::Config,
    engine::InferenceEngine,
    error::{InferenceError, PipelineError},
    ort_engine::OrtEngine,
    pipeline::Pipeline,
    postprocess::{ClassTable, ImageRef},
    preprocess::Preprocessor,
};
use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("no image paths given")]
    NoImages,
    #[error("failed to start inference engine: {0}")]
    Engine(#[from] InferenceError),
    #[error("failed to write result: {0}")]
    Output(#[from] io::Error),
    #[error("{failed} of {total} images could not be classified")]
    Failures { failed: usize, total: usize },
}

pub fn start_app(config: Config, images: &[PathBuf]) -> Result<(), AppError> {
    if images.is_empty() {
        return Err(AppError::NoImages);
    }

    let preprocessor =
        Preprocessor::for_model(config.model.normalization, config.model.resize_filter);
    let engine = match OrtEngine::load(&config.model) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("Failed to initialize inference engine: {:?}", e);
            return Err(e.into());
        }
    };

    let mut pipeline = Pipeline::new(preprocessor, engine, ClassTable::sugarcane());
    let stdout = io::stdout();
    let result = run_batch(&mut pipeline, images, &mut stdout.lock());
    pipeline.close();

    result
}

/// Classifies every image in order and writes one JSON line per image to
/// `out`. A failing image is reported in its line and does not stop the batch.
pub fn run_batch<E, W>(
    pipeline: &mut Pipeline<E>,
    images: &[PathBuf],
    out: &mut W,
) -> Result<(), AppError>
where
    E: InferenceEngine,
    W: Write,
{
    let mut failed = 0;

    for path in images {
        match pipeline.classify_file(path) {
            Ok(result) => {
                tracing::info!("{:?}: {} ({:.3})", path, result.label, result.confidence);
                serde_json::to_writer(&mut *out, &result).map_err(io::Error::from)?;
            }
            Err(e) => {
                failed += 1;
                tracing::warn!("Failed to classify {:?}: {}", path, e);
                serde_json::to_writer(&mut *out, &failure_line(path, &e))
                    .map_err(io::Error::from)?;
            }
        }
        writeln!(out)?;
    }
    out.flush()?;

    if failed > 0 {
        return Err(AppError::Failures {
            failed,
            total: images.len(),
        });
    }

    Ok(())
}

fn failure_line(path: &Path, error: &PipelineError) -> serde_json::Value {
    serde_json::json!({
        "source": ImageRef::from(path),
        "error": error.to_string(),
    })
}
