// In-memory transport used by unit tests
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{ClientHandle, Transport};
use crate::error::TransportError;
use crate::models::{BulkResult, Record, RemoteQuery, SessionConfig, TableMeta};

/// Canned remote state shared by every client the transport hands out
#[derive(Default)]
pub struct MockStore {
    pub records: HashMap<String, Vec<Record>>,
    pub metadata: HashMap<String, TableMeta>,
    pub write_result: Option<BulkResult>,
    pub queries: Vec<RemoteQuery>,
    pub writes: Vec<(String, Record)>,
}

#[derive(Default)]
pub struct MockTransport {
    pub store: Arc<Mutex<MockStore>>,
    auth_calls: AtomicUsize,
    auth_delay: Option<Duration>,
    fail_auth: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auth_delay(mut self, delay: Duration) -> Self {
        self.auth_delay = Some(delay);
        self
    }

    pub fn with_records(self, collection: &str, records: Vec<serde_json::Value>) -> Self {
        let records = records
            .into_iter()
            .filter_map(|v| v.as_object().cloned())
            .collect();
        self.store
            .lock()
            .unwrap()
            .records
            .insert(collection.to_string(), records);
        self
    }

    pub fn with_metadata(self, collection: &str, meta: TableMeta) -> Self {
        self.store
            .lock()
            .unwrap()
            .metadata
            .insert(collection.to_string(), meta);
        self
    }

    pub fn with_write_result(self, result: BulkResult) -> Self {
        self.store.lock().unwrap().write_result = Some(result);
        self
    }

    pub fn fail_auth(&self, fail: bool) {
        self.fail_auth.store(fail, Ordering::SeqCst);
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<RemoteQuery> {
        self.store.lock().unwrap().queries.clone()
    }

    pub fn writes(&self) -> Vec<(String, Record)> {
        self.store.lock().unwrap().writes.clone()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn authenticate(&self, _config: &SessionConfig) -> Result<Arc<dyn ClientHandle>, TransportError> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.auth_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(TransportError::Status {
                status: 401,
                body: "INVALID_SESSION_ID".to_string(),
            });
        }
        Ok(Arc::new(MockClient {
            session_id: uuid::Uuid::new_v4().to_string(),
            store: self.store.clone(),
        }))
    }
}

pub struct MockClient {
    session_id: String,
    store: Arc<Mutex<MockStore>>,
}

#[async_trait::async_trait]
impl ClientHandle for MockClient {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Projects fields and applies skip/limit; filters are recorded, not evaluated.
    async fn query(&self, query: &RemoteQuery) -> Result<Vec<Record>, TransportError> {
        let mut store = self.store.lock().unwrap();
        store.queries.push(query.clone());

        let rows = store.records.get(&query.collection).cloned().unwrap_or_default();
        let skip = query.skip.unwrap_or(0) as usize;
        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);

        Ok(rows
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|row| {
                let mut projected: Record = row
                    .into_iter()
                    .filter(|(key, _)| query.fields.contains(key))
                    .collect();
                projected.insert(
                    "attributes".to_string(),
                    serde_json::json!({ "type": query.collection }),
                );
                projected
            })
            .collect())
    }

    async fn create(&self, collection: &str, payload: &Record) -> Result<BulkResult, TransportError> {
        let mut store = self.store.lock().unwrap();
        store.writes.push((collection.to_string(), payload.clone()));
        Ok(store
            .write_result
            .clone()
            .unwrap_or_else(|| BulkResult::succeeded("001000000000001")))
    }

    async fn update(&self, collection: &str, payload: &Record) -> Result<BulkResult, TransportError> {
        self.create(collection, payload).await
    }

    async fn retrieve(&self, collection: &str, id: &str) -> Result<Record, TransportError> {
        let store = self.store.lock().unwrap();
        store
            .records
            .get(collection)
            .and_then(|rows| {
                rows.iter()
                    .find(|row| row.get("Id").and_then(|v| v.as_str()) == Some(id))
                    .cloned()
            })
            .ok_or_else(|| TransportError::Status {
                status: 404,
                body: format!("{} {} not found", collection, id),
            })
    }

    async fn fetch_metadata(&self, collection: &str) -> Result<TableMeta, TransportError> {
        let store = self.store.lock().unwrap();
        Ok(store.metadata.get(collection).cloned().unwrap_or_default())
    }
}
