use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Error decoding image: {0}")]
    Image(#[from] image::ImageError),
    #[error("Error reading image data: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image has no pixels ({width}x{height})")]
    Empty { width: u32, height: u32 },
    #[error("Raw pixel buffer has {actual} bytes, expected {expected}")]
    BufferLength { expected: usize, actual: usize },
}

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Model file not found: {0:?}")]
    ModelNotFound(PathBuf),
    #[error("Failed to load model {path:?}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: ort::Error,
    },
    #[error("Inference failed: {0}")]
    Run(#[from] ort::Error),
    #[error("Inference backend failed: {0}")]
    Backend(String),
    #[error("Inference engine has been closed")]
    Closed,
    #[error("Invalid input tensor shape: expected {expected:?}, got {actual:?}")]
    InputShape {
        expected: [usize; 4],
        actual: Vec<usize>,
    },
    #[error("Model returned non-finite score {value} at index {index}")]
    NonFiniteScore { index: usize, value: f32 },
}

/// The model output width and the class table disagree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Score vector has {scores} entries but the class table has {classes} labels")]
pub struct LabelMappingError {
    pub scores: usize,
    pub classes: usize,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No image available at {0:?}")]
    ImageUnavailable(PathBuf),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    LabelMapping(#[from] LabelMappingError),
}
