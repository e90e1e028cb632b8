use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::api::handlers::sources::AppState;
use crate::error::AdapterError;
use crate::models::{Filter, JoinSpec, QuerySpec, Record, SortKey};

/// Find/join request body. `where` takes ORM-style criteria.
#[derive(Debug, Default, Deserialize)]
pub struct FindRequest {
    #[serde(default)]
    pub select: Option<Vec<String>>,
    #[serde(default, rename = "where")]
    pub criteria: Option<Value>,
    #[serde(default)]
    pub joins: Vec<JoinSpec>,
    #[serde(default)]
    pub sort: Vec<SortKey>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub skip: Option<u64>,
}

impl FindRequest {
    pub fn into_spec(self) -> Result<QuerySpec, AdapterError> {
        let filter = match &self.criteria {
            Some(criteria) => Filter::from_criteria(criteria)?,
            None => None,
        };

        Ok(QuerySpec {
            select: self.select,
            filter,
            joins: self.joins,
            sort: self.sort,
            limit: self.limit,
            skip: self.skip,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    #[serde(rename = "where")]
    pub selector: Record,
    pub values: Record,
}

pub async fn find(
    State(state): State<AppState>,
    Path((identity, collection)): Path<(String, String)>,
    Json(payload): Json<FindRequest>,
) -> Result<Json<Value>, AdapterError> {
    tracing::info!("Find on {}.{}", identity, collection);

    let spec = payload.into_spec()?;
    let records = state.adapter.find(&identity, &collection, &spec).await?;

    Ok(Json(serde_json::json!({
        "records": records,
        "row_count": records.len(),
    })))
}

pub async fn join(
    State(state): State<AppState>,
    Path((identity, collection)): Path<(String, String)>,
    Json(payload): Json<FindRequest>,
) -> Result<Json<Value>, AdapterError> {
    tracing::info!("Join on {}.{} ({} relations)", identity, collection, payload.joins.len());

    let spec = payload.into_spec()?;
    let records = state.adapter.join(&identity, &collection, &spec).await?;

    Ok(Json(serde_json::json!({
        "records": records,
        "row_count": records.len(),
    })))
}

pub async fn create(
    State(state): State<AppState>,
    Path((identity, collection)): Path<(String, String)>,
    Json(values): Json<Record>,
) -> Result<(StatusCode, Json<Value>), AdapterError> {
    let result = state.adapter.create(&identity, &collection, values).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "result": result
        })),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Path((identity, collection)): Path<(String, String)>,
    Json(payload): Json<UpdateRequest>,
) -> Result<Json<Value>, AdapterError> {
    let result = state
        .adapter
        .update(&identity, &collection, payload.selector, payload.values)
        .await?;

    Ok(Json(serde_json::json!({
        "result": result
    })))
}

/// Fetch the full record, normalised through the collection definition
pub async fn retrieve(
    State(state): State<AppState>,
    Path((identity, collection, id)): Path<(String, String, String)>,
) -> Result<Json<Value>, AdapterError> {
    let mut values = Record::new();
    values.insert("id".to_string(), Value::String(id));

    state
        .adapter
        .retrieve_full(&identity, &collection, &mut values)
        .await?;

    Ok(Json(serde_json::json!({
        "record": values
    })))
}
