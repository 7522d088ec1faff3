use crate::{
    error::{PredictionError, ServiceError},
    inference::PredictionResponse,
    model_service::ModelService,
    server::SharedState,
    telemetry::Outcome,
};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    Json,
};
use std::time::Instant;
use tracing::instrument;

/// Multipart field carrying the uploaded image.
pub const IMAGE_FIELD: &str = "image";

#[instrument(skip(state, multipart))]
pub async fn predict<M: ModelService>(
    State(state): State<SharedState<M>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResponse>, ServiceError> {
    let started = Instant::now();
    let result = run_prediction(&state, multipart).await;

    let outcome = match &result {
        Ok(_) => Outcome::Success,
        Err(ServiceError::MissingInput) => Outcome::MissingInput,
        Err(ServiceError::PredictionFailure(_)) => Outcome::Failure,
    };
    state.metrics.record_prediction(outcome);
    state
        .metrics
        .record_prediction_duration(started.elapsed().as_millis() as u64, outcome);

    result.map(Json)
}

async fn run_prediction<M: ModelService>(
    state: &SharedState<M>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<PredictionResponse, ServiceError> {
    let image_data = read_image_field(multipart).await?;
    tracing::debug!("Received {} bytes under `{}`", image_data.len(), IMAGE_FIELD);

    let context = state.context.clone();
    let prediction = tokio::task::spawn_blocking(move || context.predict(&image_data))
        .await
        .map_err(|e| PredictionError::Runtime(e.to_string()))?
        .map_err(|e| {
            tracing::error!("Prediction failed: {}", e);
            e
        })?;

    tracing::debug!(
        "Predicted {} (class {}) with confidence {:.4}",
        prediction.label,
        prediction.class_index,
        prediction.confidence
    );

    Ok(prediction.into())
}

async fn read_image_field(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Bytes, ServiceError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::warn!("Request body is not multipart: {}", e);
        ServiceError::MissingInput
    })?;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(ServiceError::MissingInput),
            Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                tracing::warn!("Upload rejected: {}", e.body_text());
                return Err(ServiceError::PredictionFailure(e.body_text()));
            }
            Err(e) => {
                tracing::warn!("Malformed multipart body: {}", e);
                return Err(ServiceError::MissingInput);
            }
        };

        // Plain form values named `image` are not uploads.
        if field.name() == Some(IMAGE_FIELD) && field.file_name().is_some() {
            return field
                .bytes()
                .await
                .map_err(|e| ServiceError::PredictionFailure(e.body_text()));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        server::router,
        testing::{
            form_field_request, multipart_request, png_bytes, test_router, test_state,
            ColorModelService,
        },
    };
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use image::{Rgb, RgbImage};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn parse_confidence(confidence: &str) -> f64 {
        let number = confidence.strip_suffix('%').expect("missing % suffix");
        let (_, decimals) = number.split_once('.').expect("missing decimals");
        assert_eq!(decimals.len(), 2);
        number.parse().unwrap()
    }

    #[tokio::test]
    async fn test_predict_returns_label_and_confidence() {
        let app = test_router(ColorModelService);
        let image_data = png_bytes(RgbImage::from_pixel(640, 480, Rgb([250, 5, 5])));

        let response = app
            .oneshot(multipart_request("image", &image_data))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["prediction"], "AX");
        let confidence = parse_confidence(body["confidence"].as_str().unwrap());
        assert!((0.0..=100.0).contains(&confidence));
    }

    #[tokio::test]
    async fn test_predict_is_deterministic() {
        let app = test_router(ColorModelService);
        let image_data = png_bytes(RgbImage::from_fn(33, 77, |x, y| {
            Rgb([(x * 7) as u8, (y * 3) as u8, 90])
        }));

        let first = app
            .clone()
            .oneshot(multipart_request("image", &image_data))
            .await
            .unwrap();
        let second = app
            .oneshot(multipart_request("image", &image_data))
            .await
            .unwrap();

        assert_eq!(body_json(first).await, body_json(second).await);
    }

    #[tokio::test]
    async fn test_predict_without_image_field() {
        let app = test_router(ColorModelService);
        let image_data = png_bytes(RgbImage::from_pixel(8, 8, Rgb([0, 0, 0])));

        let response = app
            .oneshot(multipart_request("file", &image_data))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "No image provided"}));
    }

    #[tokio::test]
    async fn test_predict_without_multipart_body() {
        let app = test_router(ColorModelService);
        let request = Request::builder()
            .method("POST")
            .uri("/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "No image provided"}));
    }

    #[tokio::test]
    async fn test_predict_with_non_image_bytes() {
        let app = test_router(ColorModelService);

        let response = app
            .oneshot(multipart_request("image", b"this is not an image"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Prediction failed:"));
    }

    #[tokio::test]
    async fn test_predict_with_empty_image() {
        let app = test_router(ColorModelService);

        let response = app.oneshot(multipart_request("image", &[])).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_predict_ignores_image_form_value_without_filename() {
        let app = test_router(ColorModelService);

        let response = app
            .oneshot(form_field_request("image", b"hello"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "No image provided"}));
    }

    #[tokio::test]
    async fn test_predict_with_oversized_upload() {
        let app = router(test_state(ColorModelService), 1024);
        let image_data = png_bytes(RgbImage::from_fn(200, 200, |x, y| {
            let v = (x.wrapping_mul(2_654_435_761) ^ y.wrapping_mul(40_503))
                .wrapping_mul(2_246_822_519);
            Rgb([(v >> 24) as u8, (v >> 16) as u8, (v >> 8) as u8])
        }));
        assert!(image_data.len() > 1024);

        let response = app
            .oneshot(multipart_request("image", &image_data))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Prediction failed:"));
    }
}
