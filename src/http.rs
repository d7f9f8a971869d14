//! REST transport. Every pipeline outcome, including failed extractions,
//! is a 200 with a well-formed body; only malformed requests get a 4xx.

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;

use crate::models::{
    DependencyHealth, ExtractResponse, ExtractionRequest, HealthSummary, SearchRequest,
    SearchResponse,
};
use crate::pipeline::Pipeline;

type SharedPipeline = Arc<Pipeline>;

pub fn build_router(pipeline: SharedPipeline) -> Router {
    Router::new()
        .route("/api/tools/search", post(search))
        .route("/api/tools/extract", post(extract))
        .route("/api/tools/health", get(health))
        .route("/api/tools/health/grobid", get(health_grobid))
        .route("/api/tools/health/openalex", get(health_openalex))
        .layer(TraceLayer::new_for_http())
        .with_state(pipeline)
}

/// Bind and serve until the process is stopped.
pub async fn serve(pipeline: SharedPipeline, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "REST transport listening");
    axum::serve(listener, build_router(pipeline)).await?;
    Ok(())
}

async fn search(
    State(pipeline): State<SharedPipeline>,
    Json(request): Json<SearchRequest>,
) -> Json<SearchResponse> {
    Json(pipeline.search(&request).await)
}

async fn extract(
    State(pipeline): State<SharedPipeline>,
    Json(request): Json<ExtractionRequest>,
) -> Json<ExtractResponse> {
    Json(pipeline.extract(&request).await)
}

async fn health(State(pipeline): State<SharedPipeline>) -> Json<HealthSummary> {
    Json(pipeline.health().await)
}

async fn health_grobid(State(pipeline): State<SharedPipeline>) -> Json<DependencyHealth> {
    Json(pipeline.health_grobid().await)
}

async fn health_openalex(State(pipeline): State<SharedPipeline>) -> Json<DependencyHealth> {
    Json(pipeline.health_openalex().await)
}
