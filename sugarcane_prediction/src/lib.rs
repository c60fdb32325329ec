mod app;
mod image_source;
mod ort_engine;

pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod postprocess;
pub mod preprocess;

pub use app::{run_batch, start_app, AppError};
pub use engine::{EngineGuard, InferenceEngine};
pub use error::{DecodeError, InferenceError, LabelMappingError, PipelineError};
pub use image_source::load_image;
pub use ort_engine::OrtEngine;
pub use pipeline::{classify_once, Pipeline};
pub use postprocess::{classify, top_k, ClassTable, ClassificationResult, ScoreVector};
pub use preprocess::{preprocess, InputTensor, Preprocessor, RawImage};
