use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};

use crate::server::AppState;
use crate::server::response::{ApiError, StoreOptionExt, StoreResultExt};

/// Sends a request for a consolidated post to the post's new location.
pub async fn follow_redirect(
    State(state): State<Arc<AppState>>,
    Path((site_id, post_id)): Path<(i64, i64)>,
) -> impl IntoResponse {
    let redirect = state
        .store
        .get_redirect(site_id, post_id)
        .api_err("Failed to look up redirect")?
        .or_not_found("No redirect for this post")?;

    let site = state
        .store
        .get_site(redirect.new_site_id)
        .api_err("Failed to look up site")?
        .or_not_found("Destination site not found")?;

    let location = format!(
        "{}/?p={}",
        site.url.trim_end_matches('/'),
        redirect.new_post_id
    );
    Ok::<_, ApiError>((StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]))
}
