use crate::{
    error::PredictionError,
    labels::ClassLabels,
    model_service::ModelService,
    preprocessing::{self, INPUT_SIZE},
};
use image::{Rgb, RgbImage};
use ndarray::ArrayView1;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub class_index: usize,
    /// Highest classifier score, unscaled.
    pub confidence: f32,
}

impl Prediction {
    pub fn confidence_percent(&self) -> String {
        format!("{:.2}%", f64::from(self.confidence) * 100.0)
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PredictionResponse {
    pub prediction: String,
    pub confidence: String,
}

impl From<Prediction> for PredictionResponse {
    fn from(prediction: Prediction) -> Self {
        let confidence = prediction.confidence_percent();
        Self {
            prediction: prediction.label,
            confidence,
        }
    }
}

/// Everything a prediction needs, built once at startup and never mutated.
pub struct InferenceContext<M: ModelService> {
    model_service: M,
    labels: ClassLabels,
}

impl<M: ModelService> InferenceContext<M> {
    pub fn new(model_service: M, labels: ClassLabels) -> Self {
        Self {
            model_service,
            labels,
        }
    }

    pub fn labels(&self) -> &ClassLabels {
        &self.labels
    }

    /// Runs decode, preprocessing, feature extraction and classification on
    /// the uploaded bytes.
    pub fn predict(&self, image_data: &[u8]) -> Result<Prediction, PredictionError> {
        let input = preprocessing::preprocess(image_data)?;
        self.predict_tensor(input.view())
    }

    fn predict_tensor(
        &self,
        input: ndarray::ArrayView4<'_, f32>,
    ) -> Result<Prediction, PredictionError> {
        let features = self.model_service.extract_features(input)?;
        tracing::debug!("Extracted {} features", features.len());

        let scores = self.model_service.classify(features.view())?;
        if scores.len() != self.labels.len() {
            return Err(PredictionError::ShapeMismatch {
                expected: self.labels.len(),
                got: scores.len(),
            });
        }

        let (class_index, confidence) = argmax(scores.view())?;
        let label = self
            .labels
            .get(class_index)
            .ok_or(PredictionError::ShapeMismatch {
                expected: self.labels.len(),
                got: scores.len(),
            })?
            .to_string();

        Ok(Prediction {
            label,
            class_index,
            confidence,
        })
    }

    /// Pushes a blank image through both models so a classifier whose output
    /// size disagrees with the label manifest is caught before serving.
    pub fn warmup(&self) -> Result<(), PredictionError> {
        let blank = RgbImage::from_pixel(INPUT_SIZE, INPUT_SIZE, Rgb([0, 0, 0]));
        let input = preprocessing::to_input_tensor(&blank)?;
        let prediction = self.predict_tensor(input.view())?;
        tracing::info!(
            "Warm-up prediction succeeded: {} ({})",
            prediction.label,
            prediction.confidence_percent()
        );
        Ok(())
    }
}

/// Index and value of the highest score. The first index wins on ties.
pub fn argmax(scores: ArrayView1<'_, f32>) -> Result<(usize, f32), PredictionError> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &score) in scores.iter().enumerate() {
        if !score.is_finite() {
            return Err(PredictionError::InvalidScore(index));
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((index, score)),
        }
    }
    best.ok_or(PredictionError::EmptyOutput)
}
