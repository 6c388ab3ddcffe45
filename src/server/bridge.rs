use std::sync::Arc;

use axum::{
    Form, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde_json::Value;

use crate::bridge::{TaxonomyOp, TaxonomyService};
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::BridgeParams;
use crate::server::response::{ApiError, StoreOptionExt, StoreResultExt};

pub async fn bridge_read(
    State(state): State<Arc<AppState>>,
    Path(site_id): Path<i64>,
    Query(params): Query<BridgeParams>,
) -> impl IntoResponse {
    dispatch(state, site_id, params, false).await
}

pub async fn bridge_write(
    State(state): State<Arc<AppState>>,
    Path(site_id): Path<i64>,
    Form(params): Form<BridgeParams>,
) -> impl IntoResponse {
    dispatch(state, site_id, params, true).await
}

/// Decodes the call, checks it against the allow-list and runs it in the
/// site. Only the operation's result is written to the body.
async fn dispatch(
    state: Arc<AppState>,
    site_id: i64,
    params: BridgeParams,
    via_post: bool,
) -> Result<Json<Value>, ApiError> {
    let args: Vec<Value> = match params.args.as_deref().map(str::trim) {
        None | Some("") => Vec::new(),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| ApiError::bad_request(format!("args must be a JSON array: {e}")))?,
    };

    let op = TaxonomyOp::from_wire(&params.op, args).map_err(|e| {
        if let Error::UnsupportedOperation(name) = &e {
            tracing::warn!(site_id, op = %name, "Rejected unsupported bridge operation");
        }
        ApiError::from(e)
    })?;

    if op.is_write() && !via_post {
        return Err(ApiError::method_not_allowed(format!(
            "{} must be sent as POST",
            op.name()
        )));
    }

    state
        .store
        .get_site(site_id)
        .api_err("Failed to look up site")?
        .or_not_found("Site not found")?;

    let store = state.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        TaxonomyService::new(store.as_ref(), site_id).execute(&op)
    })
    .await
    .map_err(|e| {
        tracing::error!("Bridge task panicked: {e}");
        ApiError::internal("Bridge operation failed")
    })??;

    Ok(Json(result))
}
