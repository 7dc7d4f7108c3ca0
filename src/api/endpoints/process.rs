//! Product processing endpoint.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ProcessRequest};
use crate::pipeline::processor::PipelineResult;

/// `POST /process`: run the pipeline for one product.
///
/// The pipeline is blocking (CLI tools, blocking HTTP clients), so it runs on
/// the blocking pool. Pipeline failures are a 200 with `{error, raw}`.
pub async fn run(
    State(ctx): State<ApiContext>,
    body: Result<Json<ProcessRequest>, JsonRejection>,
) -> Result<Json<PipelineResult>, ApiError> {
    let Json(request) = body?;
    let processor = ctx.processor.clone();

    let outcome =
        tokio::task::spawn_blocking(move || processor.process(&request.product)).await?;

    tracing::info!(
        run_id = %outcome.run_id,
        state = ?outcome.state,
        "Process request finished"
    );
    Ok(Json(outcome.result))
}
