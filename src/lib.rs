mod error;
mod inference;
mod labels;
mod model_service;
mod ort_service;
mod preprocessing;
mod routes;
mod server;
mod telemetry;

#[cfg(test)]
mod testing;

pub mod app;
pub mod config;

pub use app::start_app;
pub use error::{PredictionError, ServiceError};
pub use inference::{InferenceContext, Prediction};
pub use labels::ClassLabels;
pub use model_service::ModelService;
pub use ort_service::OrtModelService;
