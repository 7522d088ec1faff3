use crate::{model_service::ModelService, server::SharedState};
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
    labels_version: u32,
    num_labels: usize,
}

pub async fn healthcheck<M: ModelService>(State(state): State<SharedState<M>>) -> Json<Health> {
    let labels = state.context.labels();
    Json(Health {
        status: "Available",
        labels_version: labels.version(),
        num_labels: labels.len(),
    })
}
