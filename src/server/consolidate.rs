use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use chrono::Utc;

use crate::auth::CONSOLIDATE_ACTION;
use crate::migrate::{ConsolidationRequest, Consolidator};
use crate::server::AppState;
use crate::server::dto::ConsolidateRequest;
use crate::server::response::{ApiError, ApiResponse};

/// Runs a consolidation and answers with its report.
///
/// The nonce is checked before anything else. The engine itself runs on a
/// blocking thread.
pub async fn consolidate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConsolidateRequest>,
) -> impl IntoResponse {
    if state
        .nonces
        .verify(CONSOLIDATE_ACTION, &req.nonce, Utc::now())
        .is_err()
    {
        tracing::warn!("Rejected consolidation request with an invalid nonce");
        return Err(ApiError::forbidden("Invalid or expired nonce"));
    }

    let request = ConsolidationRequest::new(req.sources, req.destination);
    let store = state.store.clone();
    let settings = state.settings.clone();
    let data_dir = state.data_dir.clone();

    let report = tokio::task::spawn_blocking(move || {
        Consolidator::from_settings(store, &settings, &data_dir)?.run(&request)
    })
    .await
    .map_err(|e| {
        tracing::error!("Consolidation task panicked: {e}");
        ApiError::internal("Consolidation task failed")
    })??;

    Ok::<_, ApiError>(Json(ApiResponse::success(report)))
}
