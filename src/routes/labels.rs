use crate::{labels::ClassLabels, model_service::ModelService, server::SharedState};
use axum::{extract::State, Json};

pub async fn class_labels<M: ModelService>(
    State(state): State<SharedState<M>>,
) -> Json<ClassLabels> {
    Json(state.context.labels().clone())
}
