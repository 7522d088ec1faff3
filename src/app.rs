use crate::{
    config::Config,
    inference::InferenceContext,
    labels::ClassLabels,
    ort_service::OrtModelService,
    server::{shutdown_signal, HttpServer, SharedState},
    telemetry::Metrics,
};
use std::sync::Arc;

pub async fn start_app(config: Config) -> anyhow::Result<()> {
    let labels = match ClassLabels::load(&config.labels) {
        Ok(labels) => labels,
        Err(e) => {
            tracing::error!("Failed to load label manifest: {}", e);
            return Err(e.into());
        }
    };

    let model_service = match OrtModelService::new(&config.model) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Failed to load models: {}", e);
            return Err(e.into());
        }
    };

    let context = InferenceContext::new(model_service, labels);
    if config.model.warmup {
        if let Err(e) = context.warmup() {
            tracing::error!("Warm-up prediction failed: {}", e);
            return Err(e.into());
        }
    }

    let state = SharedState {
        context: Arc::new(context),
        metrics: Arc::new(Metrics::new()?),
    };

    let server = HttpServer::new(state, &config.server).await?;
    server.run(shutdown_signal()).await
}
