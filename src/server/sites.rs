use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::CreateSiteRequest;
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::server::validation::validate_site;

pub async fn list_sites(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let sites = state
        .directory
        .list(state.store.as_ref())
        .api_err("Failed to list sites")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(sites)))
}

pub async fn create_site(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSiteRequest>,
) -> impl IntoResponse {
    let domain = req.domain.trim().to_lowercase();
    validate_site(&domain, &req.path)?;

    let url = req.url.unwrap_or_else(|| state.site_url(&domain, &req.path));
    let site = match state.store.create_site(&domain, &req.path, &url) {
        Ok(site) => site,
        Err(Error::AlreadyExists) => return Err(ApiError::conflict("Site already exists")),
        Err(e) => {
            tracing::error!("Failed to create site: {e}");
            return Err(ApiError::internal("Failed to create site"));
        }
    };
    state.directory.invalidate();
    tracing::info!(site_id = site.id, domain = %site.domain, "Created site");

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(site))))
}

pub async fn delete_site(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let deleted = state
        .store
        .delete_site(id)
        .api_err("Failed to delete site")?;

    if !deleted {
        return Err(ApiError::not_found("Site not found"));
    }
    state.directory.invalidate();
    tracing::info!(site_id = id, "Deleted site");

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
