use axum::{
    extract::{Path, State},
    Json,
};

use crate::api::handlers::sources::AppState;
use crate::error::AdapterError;

/// Get every picklist defined on a collection
pub async fn get_picklists(
    State(state): State<AppState>,
    Path((identity, collection)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, AdapterError> {
    tracing::info!("Getting picklists for {}.{}", identity, collection);

    let picklists = state.adapter.picklists(&identity, &collection, None).await?;

    Ok(Json(serde_json::json!({
        "picklists": picklists
    })))
}

/// Get the values of a single picklist
pub async fn get_picklist(
    State(state): State<AppState>,
    Path((identity, collection, name)): Path<(String, String, String)>,
) -> Result<Json<serde_json::Value>, AdapterError> {
    let values = state
        .adapter
        .picklists(&identity, &collection, Some(&name))
        .await?;

    Ok(Json(serde_json::json!({
        "name": name,
        "values": values
    })))
}
