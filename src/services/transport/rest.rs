// REST transport for the remote object store
//
// Binds a pre-issued access token to an HTTP client; no OAuth flow is run here.
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::{soql, ClientHandle, Transport};
use crate::error::TransportError;
use crate::models::{BulkResult, Record, RemoteQuery, SessionConfig, TableMeta};

/// Default connection timeout for HTTP requests (30 seconds).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default request timeout for HTTP requests (120 seconds).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

pub struct RestTransport {
    http: Client,
}

impl RestTransport {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeouts(
            Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn with_timeouts(connect_timeout: Duration, request_timeout: Duration) -> Result<Self, TransportError> {
        let http = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| TransportError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl Transport for RestTransport {
    async fn authenticate(&self, config: &SessionConfig) -> Result<Arc<dyn ClientHandle>, TransportError> {
        let credentials = &config.credentials;
        let instance = Url::parse(&credentials.instance_url)
            .map_err(|e| TransportError::Http(format!("Invalid instance URL: {}", e)))?;

        if instance.scheme() != "https" && instance.scheme() != "http" {
            return Err(TransportError::Http(
                "Instance URL must use http:// or https:// scheme".to_string(),
            ));
        }

        let instance_url = credentials.instance_url.trim_end_matches('/').to_string();
        let base_url = format!("{}/services/data/v{}", instance_url, credentials.api_version);

        tracing::debug!("Verifying access token against {}", mask_url(&base_url));

        // Any authenticated GET on the API root proves the token is live.
        let response = self
            .http
            .get(&base_url)
            .bearer_auth(&credentials.access_token)
            .send()
            .await?;
        check_status(response).await?;

        Ok(Arc::new(RestClient {
            session_id: uuid::Uuid::new_v4().to_string(),
            http: self.http.clone(),
            instance_url,
            base_url,
            access_token: credentials.access_token.clone(),
            picklist_key: config.picklist_key.clone(),
        }))
    }
}

/// Client bound to one authenticated session
pub struct RestClient {
    session_id: String,
    http: Client,
    instance_url: String,
    base_url: String,
    access_token: String,
    picklist_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    records: Vec<Record>,
    #[serde(default = "default_done")]
    done: bool,
    #[serde(default)]
    next_records_url: Option<String>,
}

fn default_done() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct DescribeResponse {
    #[serde(default)]
    fields: Vec<DescribeField>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeField {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default)]
    picklist_values: Vec<PicklistEntry>,
}

#[derive(Debug, Deserialize)]
struct PicklistEntry {
    value: String,
    #[serde(default = "default_done")]
    active: bool,
}

impl RestClient {
    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, TransportError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }

    /// Writes report logical rejections as 400 with an error array.
    async fn write_result(response: Response, id: Option<String>) -> Result<BulkResult, TransportError> {
        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(BulkResult {
                id,
                success: true,
                errors: Vec::new(),
            });
        }

        if status == StatusCode::BAD_REQUEST {
            let body = response.text().await?;
            return match serde_json::from_str::<Vec<Value>>(&body) {
                Ok(errors) => {
                    let value = serde_json::json!({ "success": false, "errors": errors });
                    serde_json::from_value(value).map_err(|e| TransportError::Decode(e.to_string()))
                }
                Err(_) => Err(TransportError::Status {
                    status: status.as_u16(),
                    body,
                }),
            };
        }

        let response = check_status(response).await?;
        response
            .json::<BulkResult>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[async_trait::async_trait]
impl ClientHandle for RestClient {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn query(&self, query: &RemoteQuery) -> Result<Vec<Record>, TransportError> {
        let statement = soql::render(query)?;
        tracing::debug!("Executing SOQL: {}", statement);

        let mut url = Url::parse(&format!("{}/query", self.base_url))
            .map_err(|e| TransportError::Http(e.to_string()))?;
        url.query_pairs_mut().append_pair("q", &statement);

        let mut page: QueryResponse = self.get_json(url.as_str()).await?;
        let mut records = std::mem::take(&mut page.records);

        while !page.done {
            let Some(next) = page.next_records_url.take() else {
                break;
            };
            page = self.get_json(&format!("{}{}", self.instance_url, next)).await?;
            records.append(&mut page.records);
        }

        Ok(records)
    }

    async fn create(&self, collection: &str, payload: &Record) -> Result<BulkResult, TransportError> {
        let response = self
            .http
            .post(format!("{}/sobjects/{}", self.base_url, collection))
            .bearer_auth(&self.access_token)
            .json(payload)
            .send()
            .await?;
        Self::write_result(response, None).await
    }

    async fn update(&self, collection: &str, payload: &Record) -> Result<BulkResult, TransportError> {
        let mut body = payload.clone();
        let id = body
            .remove("Id")
            .or_else(|| body.remove("id"))
            .and_then(|v| v.as_str().map(str::to_string));

        let Some(id) = id else {
            return Ok(BulkResult::failed(["Update payload has no Id"]));
        };

        let response = self
            .http
            .patch(format!("{}/sobjects/{}/{}", self.base_url, collection, id))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        Self::write_result(response, Some(id)).await
    }

    async fn retrieve(&self, collection: &str, id: &str) -> Result<Record, TransportError> {
        self.get_json(&format!("{}/sobjects/{}/{}", self.base_url, collection, id))
            .await
    }

    async fn fetch_metadata(&self, collection: &str) -> Result<TableMeta, TransportError> {
        let describe: DescribeResponse = self
            .get_json(&format!("{}/sobjects/{}/describe", self.base_url, collection))
            .await?;

        Ok(table_meta(describe, &self.picklist_key))
    }
}

fn table_meta(describe: DescribeResponse, picklist_key: &str) -> TableMeta {
    let picklists = describe
        .fields
        .into_iter()
        .filter(|field| field.field_type == picklist_key)
        .map(|field| {
            let values: Vec<Value> = field
                .picklist_values
                .into_iter()
                .filter(|entry| entry.active)
                .map(|entry| Value::String(entry.value))
                .collect();
            (field.name, Value::Array(values))
        })
        .collect();

    TableMeta { picklists }
}

async fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(TransportError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Mask credentials in a URL for safe logging
pub fn mask_url(url: &str) -> String {
    if let Ok(parsed_url) = Url::parse(url) {
        let mut masked = parsed_url.clone();
        if parsed_url.password().is_some() {
            let _ = masked.set_password(Some("***"));
        }
        masked.to_string()
    } else {
        "[invalid-url]".to_string()
    }
}
