use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::sources::AppState;
use crate::api::handlers::{metadata, records, sources};
use crate::services::CrmAdapter;

/// Create router with application state
pub fn create_router_with_state(adapter: CrmAdapter) -> Router {
    let state = AppState { adapter };

    Router::new()
        .route("/health", get(health_check))
        .route("/api/sources", get(sources::list_sources))
        .route(
            "/api/sources/{identity}/collections/{collection}/find",
            post(records::find),
        )
        .route(
            "/api/sources/{identity}/collections/{collection}/join",
            post(records::join),
        )
        .route(
            "/api/sources/{identity}/collections/{collection}/records",
            post(records::create).patch(records::update),
        )
        .route(
            "/api/sources/{identity}/collections/{collection}/records/{id}",
            get(records::retrieve),
        )
        .route(
            "/api/sources/{identity}/collections/{collection}/picklists",
            get(metadata::get_picklists),
        )
        .route(
            "/api/sources/{identity}/collections/{collection}/picklists/{name}",
            get(metadata::get_picklist),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
