use crate::{
    error::PredictionError,
    inference::InferenceContext,
    labels::ClassLabels,
    model_service::ModelService,
    server::{router, SharedState},
    telemetry::Metrics,
};
use axum::{
    body::Body,
    http::{header, Request},
    Router,
};
use image::{DynamicImage, ImageFormat, RgbImage};
use ndarray::{array, Array1, Array2, ArrayView2, ArrayView4, Axis};
use std::{io::Cursor, sync::Arc};

const BOUNDARY: &str = "image-classifier-test-boundary";

/// Scores an image by its mean red, green and blue intensity, so a mostly
/// red image lands on the first label and a mostly green one on the second.
pub struct ColorModelService;

impl ModelService for ColorModelService {
    fn extract_features(&self, input: ArrayView4<'_, f32>) -> Result<Array2<f32>, PredictionError> {
        let pixels = (input.len() / 3) as f32;
        let mut features = Array2::zeros((1, 3));
        for channel in 0..3 {
            features[[0, channel]] = input.index_axis(Axis(3), channel).sum() / pixels / 255.0;
        }
        Ok(features)
    }

    fn classify(&self, features: ArrayView2<'_, f32>) -> Result<Array1<f32>, PredictionError> {
        let scores = array![
            features[[0, 0]],
            features[[0, 1]],
            features[[0, 2]],
            0.05,
            0.01
        ];
        let total = scores.sum();
        Ok(scores / total)
    }
}

pub fn test_state<M: ModelService>(model_service: M) -> SharedState<M> {
    SharedState {
        context: Arc::new(InferenceContext::new(model_service, ClassLabels::default())),
        metrics: Arc::new(Metrics::new().unwrap()),
    }
}

pub fn test_router<M: ModelService>(model_service: M) -> Router {
    router(test_state(model_service), 16 * 1024 * 1024)
}

pub fn png_bytes(img: RgbImage) -> Vec<u8> {
    let mut image_data = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut image_data), ImageFormat::Png)
        .unwrap();
    image_data
}

pub fn multipart_request(field_name: &str, content: &[u8]) -> Request<Body> {
    multipart_part_request(
        &format!("name=\"{field_name}\"; filename=\"upload.png\""),
        content,
    )
}

/// Same as `multipart_request` but the part is a plain form value with no filename.
pub fn form_field_request(field_name: &str, content: &[u8]) -> Request<Body> {
    multipart_part_request(&format!("name=\"{field_name}\""), content)
}

fn multipart_part_request(disposition: &str, content: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; {disposition}\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}
