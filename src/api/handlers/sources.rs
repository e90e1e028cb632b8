use axum::{extract::State, Json};

use crate::error::AdapterError;
use crate::services::CrmAdapter;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub adapter: CrmAdapter,
}

/// List registered data sources and their collections
pub async fn list_sources(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AdapterError> {
    let mut sources = Vec::new();
    for identity in state.adapter.identities().await {
        let collections = state.adapter.collections(&identity).await?;
        sources.push(serde_json::json!({
            "identity": identity,
            "collections": collections,
        }));
    }

    Ok(Json(serde_json::json!({
        "sources": sources
    })))
}
