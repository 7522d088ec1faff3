use crate::{config::ModelConfig, error::PredictionError, model_service::ModelService};
use ndarray::{Array1, Array2, ArrayD, ArrayView2, ArrayView4, ArrayViewD};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("Failed to load ONNX model: {0}")]
    Ort(#[from] ort::Error),
    #[error("Model {0:?} declares no outputs")]
    NoOutputs(String),
}

/// Round-robin pool of sessions for one ONNX graph.
struct SessionPool {
    name: &'static str,
    sessions: Vec<Mutex<Session>>,
    output_name: String,
    counter: AtomicUsize,
}

impl SessionPool {
    fn new(name: &'static str, path: &Path, num_instances: usize) -> Result<Self, ModelLoadError> {
        let sessions = (0..num_instances.max(1))
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(path)?;
                Ok(session)
            })
            .collect::<Result<Vec<_>, ort::Error>>()?;

        let output_name = sessions[0]
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| ModelLoadError::NoOutputs(path.display().to_string()))?;

        tracing::info!(
            "Created {} ONNX sessions for {} from {:?}",
            sessions.len(),
            name,
            path
        );

        Ok(Self {
            name,
            sessions: sessions.into_iter().map(Mutex::new).collect(),
            output_name,
            counter: AtomicUsize::new(0),
        })
    }

    fn run(&self, input: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, String> {
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| format!("session mutex poisoned: {}", e))?;

        tracing::debug!("Running {} with session {}", self.name, index);
        let input = input.as_standard_layout();
        let tensor_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| format!("failed to build tensor: {}", e))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| format!("inference failed: {}", e))?;

        let (shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| format!("failed to extract tensor: {}", e))?;

        ArrayD::from_shape_vec(shape.to_ixdyn(), data.to_vec())
            .map_err(|e| format!("invalid tensor shape: {}", e))
    }
}

pub struct OrtModelService {
    feature_extractor: SessionPool,
    classifier: SessionPool,
}

impl OrtModelService {
    pub fn new(model_config: &ModelConfig) -> Result<Self, ModelLoadError> {
        ort::init().with_name("image_classifier").commit()?;

        let feature_extractor = SessionPool::new(
            "feature extractor",
            &model_config.feature_extractor_path(),
            model_config.num_instances,
        )?;
        let classifier = SessionPool::new(
            "classifier",
            &model_config.classifier_path(),
            model_config.num_instances,
        )?;

        Ok(Self {
            feature_extractor,
            classifier,
        })
    }
}

impl ModelService for OrtModelService {
    fn extract_features(&self, input: ArrayView4<'_, f32>) -> Result<Array2<f32>, PredictionError> {
        let output = self
            .feature_extractor
            .run(input.into_dyn())
            .map_err(PredictionError::FeatureExtraction)?;

        let len = output.len();
        if len == 0 {
            return Err(PredictionError::EmptyOutput);
        }

        Ok(output.into_shape_with_order((1, len))?)
    }

    fn classify(&self, features: ArrayView2<'_, f32>) -> Result<Array1<f32>, PredictionError> {
        let output = self
            .classifier
            .run(features.into_dyn())
            .map_err(PredictionError::Classification)?;

        let len = output.len();
        Ok(output.into_shape_with_order(len)?)
    }
}
