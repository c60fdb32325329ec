use crate::{
    config::{ModelConfig, Validatable},
    engine::InferenceEngine,
    error::InferenceError,
    postprocess::ScoreVector,
    preprocess::{InputTensor, MODEL_INPUT_SIZE},
};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::path::{Path, PathBuf};

const RGB_CHANNELS: usize = 3;

fn input_shape() -> [usize; 4] {
    let side = MODEL_INPUT_SIZE.get() as usize;
    [1, side, side, RGB_CHANNELS]
}

/// Copies the model output into a score vector. The width is left to
/// `classify`, which checks it against the class table.
fn scores_from_output(data: &[f32]) -> Result<ScoreVector, InferenceError> {
    ScoreVector::from(data.to_vec()).ensure_finite()
}

fn build_session(model_path: &Path) -> ort::Result<Session> {
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .commit_from_file(model_path)
}

/// ONNX Runtime backend for the packaged classifier,
/// `[1, 224, 224, 3]` in and one score per class out.
pub struct OrtEngine {
    session: Option<Session>,
    output_name: String,
    model_path: PathBuf,
}

impl OrtEngine {
    pub fn load(model_config: &ModelConfig) -> Result<Self, InferenceError> {
        Self::load_from_file(model_config.get_path())
    }

    pub fn load_from_file(model_path: impl AsRef<Path>) -> Result<Self, InferenceError> {
        let model_path = model_path.as_ref().to_path_buf();
        if !model_path.exists() {
            return Err(InferenceError::ModelNotFound(model_path));
        }

        let session = build_session(&model_path).map_err(|source| InferenceError::Load {
            path: model_path.clone(),
            source,
        })?;

        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| InferenceError::Backend("model declares no outputs".to_string()))?;

        tracing::info!(
            "Loaded ONNX model {:?} (output `{}`)",
            model_path,
            output_name
        );

        Ok(Self {
            session: Some(session),
            output_name,
            model_path,
        })
    }
}

impl InferenceEngine for OrtEngine {
    fn name(&self) -> &'static str {
        "onnx"
    }

    fn infer(&mut self, tensor: &InputTensor) -> Result<ScoreVector, InferenceError> {
        let session = self.session.as_mut().ok_or(InferenceError::Closed)?;

        let expected = input_shape();
        if tensor.shape() != expected.as_slice() {
            return Err(InferenceError::InputShape {
                expected,
                actual: tensor.shape().to_vec(),
            });
        }

        let tensor_ref = TensorRef::from_array_view(tensor.view())?;
        let outputs = session.run(ort::inputs![tensor_ref])?;

        let (_, data) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;
        scores_from_output(data)
    }

    fn close(&mut self) {
        if self.session.take().is_some() {
            tracing::info!("Released ONNX session for {:?}", self.model_path);
        }
    }

    fn is_closed(&self) -> bool {
        self.session.is_none()
    }
}
