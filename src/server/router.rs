use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{
    Router,
    routing::{delete, get, post},
};

use super::bridge::{bridge_read, bridge_write};
use super::consolidate::consolidate;
use super::redirects::follow_redirect;
use super::sites::{create_site, delete_site, list_sites};
use crate::auth::NonceSigner;
use crate::config::Settings;
use crate::directory::SiteDirectory;
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub data_dir: PathBuf,
    pub settings: Settings,
    pub directory: SiteDirectory,
    pub nonces: NonceSigner,
    /// Public base URL for external access. New sites without an explicit
    /// URL are served under it.
    pub public_base_url: Option<String>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        data_dir: PathBuf,
        settings: Settings,
        nonces: NonceSigner,
        public_base_url: Option<String>,
    ) -> Self {
        let directory =
            SiteDirectory::new(settings.site_cache_ttl(), settings.large_network_threshold);
        Self {
            store,
            data_dir,
            settings,
            directory,
            nonces,
            public_base_url,
        }
    }

    /// Base URL for a new site.
    pub fn site_url(&self, domain: &str, path: &str) -> String {
        match &self.public_base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("http://{domain}{}", path.trim_end_matches('/')),
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/sites", get(list_sites).post(create_site))
        .route("/api/v1/sites/{id}", delete(delete_site))
        .route("/api/v1/consolidate", post(consolidate))
        .route("/bridge/{site}", get(bridge_read).post(bridge_write))
        .route("/sites/{site}/redirect/{post}", get(follow_redirect))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
