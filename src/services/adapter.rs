use serde_json::Value;
use std::sync::Arc;

use crate::error::AdapterError;
use crate::models::{BulkResult, CollectionDescriptor, QuerySpec, Record, SessionConfig};
use crate::services::connection_manager::ConnectionManager;
use crate::services::normalizer::ResultNormalizer;
use crate::services::query_executor::QueryExecutor;
use crate::services::session_cache::SessionCache;
use crate::services::transport::{ClientHandle, Transport};

/// Caller-facing adapter over the remote object store.
///
/// Cheap to clone; every clone shares the same session registry.
#[derive(Clone)]
pub struct CrmAdapter {
    connections: ConnectionManager,
    executor: Arc<QueryExecutor>,
}

/// Live client bound to one collection
#[derive(Clone)]
pub struct CollectionHandle {
    client: Arc<dyn ClientHandle>,
    collection: Arc<CollectionDescriptor>,
}

impl CollectionHandle {
    pub fn client(&self) -> &Arc<dyn ClientHandle> {
        &self.client
    }

    pub fn collection(&self) -> &CollectionDescriptor {
        &self.collection
    }

    /// Raw remote record, untouched by the collection rules
    pub async fn retrieve(&self, id: &str) -> Result<Record, AdapterError> {
        Ok(self.client.retrieve(self.collection.name(), id).await?)
    }
}

impl CrmAdapter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let connections = ConnectionManager::new(Arc::new(SessionCache::new(transport)));
        let executor = Arc::new(QueryExecutor::new(connections.clone()));
        Self {
            connections,
            executor,
        }
    }

    pub async fn register(
        &self,
        identity: &str,
        config: SessionConfig,
        collections: Vec<CollectionDescriptor>,
    ) -> Result<(), AdapterError> {
        self.connections.register(identity, config, collections).await
    }

    pub async fn identities(&self) -> Vec<String> {
        self.connections.identities().await
    }

    pub async fn collections(&self, identity: &str) -> Result<Vec<String>, AdapterError> {
        self.connections.collection_names(identity).await
    }

    pub async fn find(
        &self,
        identity: &str,
        collection: &str,
        spec: &QuerySpec,
    ) -> Result<Vec<Record>, AdapterError> {
        self.executor.find(identity, collection, spec).await
    }

    pub async fn join(
        &self,
        identity: &str,
        collection: &str,
        spec: &QuerySpec,
    ) -> Result<Vec<Record>, AdapterError> {
        self.executor.join(identity, collection, spec).await
    }

    pub async fn create(
        &self,
        identity: &str,
        collection: &str,
        values: Record,
    ) -> Result<BulkResult, AdapterError> {
        let descriptor = self.connections.collection(identity, collection).await?;
        let payload = descriptor.serialize(values);

        let session = self.connections.get_session(identity).await?;
        let result = session.client.create(descriptor.name(), &payload).await?;

        ResultNormalizer::check_write(result)
    }

    /// Update the record picked by `selector` (normally `{ "id": .. }`).
    /// Keys present in both take the value from `values`.
    pub async fn update(
        &self,
        identity: &str,
        collection: &str,
        selector: Record,
        values: Record,
    ) -> Result<BulkResult, AdapterError> {
        let descriptor = self.connections.collection(identity, collection).await?;

        let mut merged = selector;
        merged.extend(values);
        let payload = descriptor.serialize(merged);

        let session = self.connections.get_session(identity).await?;
        let result = session.client.update(descriptor.name(), &payload).await?;

        ResultNormalizer::check_write(result)
    }

    /// The live client for the data source, refreshed if needed
    pub async fn raw_connection(&self, identity: &str) -> Result<Arc<dyn ClientHandle>, AdapterError> {
        Ok(self.connections.get_session(identity).await?.client)
    }

    pub async fn native(&self, identity: &str, collection: &str) -> Result<CollectionHandle, AdapterError> {
        let descriptor = self.connections.collection(identity, collection).await?;
        let client = self.raw_connection(identity).await?;
        Ok(CollectionHandle {
            client,
            collection: descriptor,
        })
    }

    /// Enumerated values for the collection, or for one field when `name` is given
    pub async fn picklists(
        &self,
        identity: &str,
        collection: &str,
        name: Option<&str>,
    ) -> Result<Value, AdapterError> {
        let descriptor = self.connections.collection(identity, collection).await?;
        let meta = self.connections.table_meta(identity, descriptor.name()).await?;
        ResultNormalizer::picklists(&descriptor, meta, name)
    }

    /// Replace `values` in place with the full remote record for `values["id"]`
    pub async fn retrieve_full(
        &self,
        identity: &str,
        collection: &str,
        values: &mut Record,
    ) -> Result<(), AdapterError> {
        let id = values
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                AdapterError::ContractAssertion(format!("{}.retrieve_full requires a string id", collection))
            })?;

        let handle = self.native(identity, collection).await?;
        let raw = handle.retrieve(&id).await?;
        let record = ResultNormalizer::record(handle.collection(), raw);

        values.clear();
        values.extend(record);
        Ok(())
    }

    pub async fn teardown(&self, _identity: &str) -> Result<(), AdapterError> {
        Err(AdapterError::Unsupported("teardown"))
    }

    pub async fn define(&self, _identity: &str, _collection: &str, _definition: &CollectionDescriptor) -> Result<(), AdapterError> {
        Err(AdapterError::Unsupported("define"))
    }

    pub async fn describe(&self, _identity: &str, _collection: &str) -> Result<(), AdapterError> {
        Err(AdapterError::Unsupported("describe"))
    }

    pub async fn drop(&self, _identity: &str, _collection: &str) -> Result<(), AdapterError> {
        Err(AdapterError::Unsupported("drop"))
    }

    pub async fn destroy(&self, _identity: &str, _collection: &str, _spec: &QuerySpec) -> Result<(), AdapterError> {
        Err(AdapterError::Unsupported("destroy"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::models::{Credentials, FieldDefinition, FieldType, JoinSpec, TableMeta};
    use crate::services::transport::mock::MockTransport;
    use serde_json::json;
    use std::time::Duration;

    fn config() -> SessionConfig {
        SessionConfig::new(Credentials {
            instance_url: "https://example.my.salesforce.com".to_string(),
            access_token: "token".to_string(),
            api_version: "59.0".to_string(),
        })
    }

    fn account() -> CollectionDescriptor {
        CollectionDescriptor::new(
            "Account",
            vec![
                FieldDefinition::new("id", FieldType::String).with_column("Id"),
                FieldDefinition::new("name", FieldType::String).with_column("Name"),
                FieldDefinition::new("industry", FieldType::String).with_column("Industry"),
                FieldDefinition::new("rating", FieldType::String).with_column("Rating"),
                FieldDefinition::new("ownerId", FieldType::String).with_column("OwnerId"),
            ],
        )
        .unwrap()
    }

    fn user() -> CollectionDescriptor {
        CollectionDescriptor::new(
            "User",
            vec![
                FieldDefinition::new("id", FieldType::String).with_column("Id"),
                FieldDefinition::new("name", FieldType::String).with_column("Name"),
            ],
        )
        .unwrap()
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    async fn adapter(transport: Arc<MockTransport>) -> CrmAdapter {
        let adapter = CrmAdapter::new(transport);
        adapter.register("crm", config(), vec![account(), user()]).await.unwrap();
        adapter
    }

    #[tokio::test]
    async fn test_register_duplicate_and_missing_identity() {
        let adapter = adapter(Arc::new(MockTransport::new())).await;
        let duplicate = adapter.register("crm", config(), vec![]).await;
        assert!(matches!(duplicate, Err(AdapterError::Config(_))));
        let missing = adapter.register("", config(), vec![]).await;
        assert!(matches!(missing, Err(AdapterError::Config(_))));
    }

    #[tokio::test]
    async fn test_unregistered_identity() {
        let adapter = CrmAdapter::new(Arc::new(MockTransport::new()));
        let result = adapter.find("crm", "Account", &QuerySpec::new()).await;
        assert!(matches!(result, Err(AdapterError::NotRegistered(_))));
    }

    #[tokio::test]
    async fn test_create_serializes_and_checks_result() {
        let transport = Arc::new(MockTransport::new());
        let adapter = adapter(transport.clone()).await;

        let result = adapter
            .create("crm", "Account", record(json!({ "name": "Acme", "junk": 1 })))
            .await
            .unwrap();
        assert!(result.success);

        let writes = transport.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, "Account");
        assert_eq!(Value::Object(writes[0].1.clone()), json!({ "Name": "Acme" }));
    }

    #[tokio::test]
    async fn test_create_logical_failure() {
        let transport = Arc::new(
            MockTransport::new().with_write_result(BulkResult::failed(["DUPLICATE_VALUE: exists", "bad rating"])),
        );
        let adapter = adapter(transport).await;

        let result = adapter.create("crm", "Account", record(json!({ "name": "Acme" }))).await;
        match result {
            Err(AdapterError::WriteFailed(message)) => {
                assert_eq!(message, "DUPLICATE_VALUE: exists, bad rating")
            }
            other => panic!("expected write failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_merges_selector_and_values() {
        let transport = Arc::new(MockTransport::new());
        let adapter = adapter(transport.clone()).await;

        adapter
            .update(
                "crm",
                "Account",
                record(json!({ "id": "001A", "name": "old" })),
                record(json!({ "name": "New Name" })),
            )
            .await
            .unwrap();

        let writes = transport.writes();
        assert_eq!(
            Value::Object(writes[0].1.clone()),
            json!({ "Id": "001A", "Name": "New Name" })
        );
    }

    #[tokio::test]
    async fn test_picklists() {
        let mut meta = TableMeta::default();
        meta.picklists.insert("Industry".to_string(), json!(["Banking", "Retail"]));
        meta.picklists.insert("Type".to_string(), json!(["Customer"]));
        meta.picklists.insert("Rating".to_string(), json!(["Hot", "Cold"]));
        let adapter = adapter(Arc::new(MockTransport::new().with_metadata("Account", meta))).await;

        let all = adapter.picklists("crm", "Account", None).await.unwrap();
        assert_eq!(all, json!({ "industry": ["Banking", "Retail"], "rating": ["Hot", "Cold"] }));

        let rating = adapter.picklists("crm", "Account", Some("rating")).await.unwrap();
        assert_eq!(rating, json!(["Hot", "Cold"]));

        let missing = adapter.picklists("crm", "Account", Some("Type")).await;
        assert!(matches!(missing, Err(AdapterError::ContractAssertion(_))));
    }

    #[tokio::test]
    async fn test_retrieve_full_replaces_values_in_place() {
        let transport = Arc::new(MockTransport::new().with_records(
            "Account",
            vec![json!({ "Id": "001A", "Name": "Acme", "Industry": "Retail", "SystemModstamp": "x" })],
        ));
        let adapter = adapter(transport).await;

        let mut values = record(json!({ "id": "001A", "stale": true }));
        adapter.retrieve_full("crm", "Account", &mut values).await.unwrap();

        assert_eq!(
            Value::Object(values),
            json!({ "id": "001A", "name": "Acme", "industry": "Retail" })
        );
    }

    #[tokio::test]
    async fn test_retrieve_full_requires_id() {
        let adapter = adapter(Arc::new(MockTransport::new())).await;
        let mut values = record(json!({ "name": "Acme" }));
        let result = adapter.retrieve_full("crm", "Account", &mut values).await;
        assert!(matches!(result, Err(AdapterError::ContractAssertion(_))));
        assert_eq!(values.len(), 1);
    }

    #[tokio::test]
    async fn test_retrieve_full_missing_record_is_transport_error() {
        let adapter = adapter(Arc::new(MockTransport::new())).await;
        let mut values = record(json!({ "id": "001Z" }));
        let result = adapter.retrieve_full("crm", "Account", &mut values).await;
        assert!(matches!(
            result,
            Err(AdapterError::Transport(TransportError::Status { status: 404, .. }))
        ));
        assert_eq!(values.len(), 1);
    }

    #[tokio::test]
    async fn test_raw_connection_shares_session() {
        let transport = Arc::new(MockTransport::new());
        let adapter = adapter(transport.clone()).await;

        let client = adapter.raw_connection("crm").await.unwrap();
        let handle = adapter.native("crm", "Account").await.unwrap();
        assert_eq!(client.session_id(), handle.client().session_id());
        assert_eq!(handle.collection().name(), "Account");
        assert_eq!(transport.auth_calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_operations_share_one_authentication() {
        let transport = Arc::new(
            MockTransport::new()
                .with_auth_delay(Duration::from_millis(30))
                .with_records("Account", vec![json!({ "Id": "001A", "Name": "Acme", "OwnerId": "005A" })])
                .with_records("User", vec![json!({ "Id": "005A", "Name": "Ada" })]),
        );
        let adapter = adapter(transport.clone()).await;

        let all = QuerySpec::new();
        let spec = QuerySpec::new().join(JoinSpec::new("owner", "User", "ownerId"));
        let (found, joined, picklists) = tokio::join!(
            adapter.find("crm", "Account", &all),
            adapter.join("crm", "Account", &spec),
            adapter.picklists("crm", "Account", None),
        );

        assert_eq!(found.unwrap().len(), 1);
        assert_eq!(joined.unwrap()[0]["owner"]["name"], json!("Ada"));
        assert_eq!(picklists.unwrap(), json!({}));
        assert_eq!(transport.auth_calls(), 1);
    }

    #[tokio::test]
    async fn test_lifecycle_operations_are_unsupported() {
        let adapter = adapter(Arc::new(MockTransport::new())).await;
        assert!(matches!(adapter.teardown("crm").await, Err(AdapterError::Unsupported("teardown"))));
        assert!(matches!(adapter.describe("crm", "Account").await, Err(AdapterError::Unsupported(_))));
        assert!(matches!(adapter.drop("crm", "Account").await, Err(AdapterError::Unsupported(_))));
        assert!(matches!(
            adapter.destroy("crm", "Account", &QuerySpec::new()).await,
            Err(AdapterError::Unsupported(_))
        ));
        assert!(matches!(
            adapter.define("crm", "Account", &account()).await,
            Err(AdapterError::Unsupported(_))
        ));
    }
}
