use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failure of one stage of the prediction pipeline.
#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Error decoding image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Error building input tensor: {0}")]
    Tensor(#[from] ndarray::ShapeError),
    #[error("Feature extraction failed: {0}")]
    FeatureExtraction(String),
    #[error("Classification failed: {0}")]
    Classification(String),
    #[error("Classifier returned {got} scores but {expected} labels are configured")]
    ShapeMismatch { expected: usize, got: usize },
    #[error("Model returned an empty output")]
    EmptyOutput,
    #[error("Classifier returned a non-finite score at index {0}")]
    InvalidScore(usize),
    #[error("Inference task failed: {0}")]
    Runtime(String),
}

/// Outcome of a request as reported to the caller.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("No image provided")]
    MissingInput,
    #[error("Prediction failed: {0}")]
    PredictionFailure(String),
}

impl From<PredictionError> for ServiceError {
    fn from(err: PredictionError) -> Self {
        ServiceError::PredictionFailure(err.to_string())
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match self {
            ServiceError::MissingInput => StatusCode::BAD_REQUEST,
            ServiceError::PredictionFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
