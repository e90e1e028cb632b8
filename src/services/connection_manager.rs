use futures::future::try_join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::AdapterError;
use crate::models::{CollectionDescriptor, JoinSpec, Record, RemoteQuery, SessionConfig, TableMeta};
use crate::services::session_cache::{Session, SessionCache};

/// Related records for one join alias, keyed by the related record's join key
pub type LookupTable = HashMap<String, Record>;

/// Lookup tables for every join alias of a query
pub type JoinTables = HashMap<String, LookupTable>;

/// Connection manager for all registered data sources.
///
/// Hands out live sessions and resolves the lookups that joined queries need.
#[derive(Clone)]
pub struct ConnectionManager {
    cache: Arc<SessionCache>,
}

impl ConnectionManager {
    pub fn new(cache: Arc<SessionCache>) -> Self {
        Self { cache }
    }

    pub async fn register(
        &self,
        identity: &str,
        config: SessionConfig,
        collections: Vec<CollectionDescriptor>,
    ) -> Result<(), AdapterError> {
        self.cache.register(identity, config, collections).await
    }

    /// Get a live, valid session for the data source
    pub async fn get_session(&self, identity: &str) -> Result<Session, AdapterError> {
        self.cache.get_session(identity).await
    }

    pub async fn collection(
        &self,
        identity: &str,
        name: &str,
    ) -> Result<Arc<CollectionDescriptor>, AdapterError> {
        self.cache
            .get(identity)
            .await?
            .collection(name)
            .ok_or_else(|| AdapterError::NotRegistered(format!("{}.{}", identity, name)))
    }

    pub async fn identities(&self) -> Vec<String> {
        self.cache.identities().await
    }

    pub async fn collection_names(&self, identity: &str) -> Result<Vec<String>, AdapterError> {
        Ok(self.cache.get(identity).await?.collection_names())
    }

    /// Fetch every related collection in full and index it by join key.
    ///
    /// Related collections must be registered on the same data source; their
    /// records are deserialized before indexing, so keys are logical values.
    pub async fn resolve_join(
        &self,
        identity: &str,
        joins: &[JoinSpec],
    ) -> Result<JoinTables, AdapterError> {
        if joins.is_empty() {
            return Ok(JoinTables::new());
        }

        let session = self.get_session(identity).await?;

        let lookups = joins.iter().map(|join| {
            let session = session.clone();
            async move {
                let descriptor = self.collection(identity, &join.collection).await?;
                let table = Self::lookup_table(&session, &descriptor, join).await?;
                Ok::<_, AdapterError>((join.alias.clone(), table))
            }
        });

        let tables: JoinTables = try_join_all(lookups).await?.into_iter().collect();
        Ok(tables)
    }

    async fn lookup_table(
        session: &Session,
        descriptor: &CollectionDescriptor,
        join: &JoinSpec,
    ) -> Result<LookupTable, AdapterError> {
        // Records are indexed after deserialization, so the key must be logical
        let child_key = descriptor.logical_key(&join.child_key).ok_or_else(|| {
            AdapterError::ContractAssertion(format!(
                "Join {} uses unknown child key {}.{}",
                join.alias,
                descriptor.name(),
                join.child_key
            ))
        })?;

        let query = RemoteQuery::all(descriptor.name(), descriptor.remote_fields());
        let rows = session.client.query(&query).await?;

        let mut table = LookupTable::with_capacity(rows.len());
        for row in rows {
            let record = descriptor.deserialize(row);
            match record.get(child_key).and_then(join_key) {
                Some(key) => {
                    table.insert(key, record);
                }
                None => {
                    tracing::warn!(
                        "Skipping {} record without join key {}",
                        descriptor.name(),
                        child_key
                    );
                }
            }
        }

        tracing::debug!(
            "Resolved join {} -> {} ({} records)",
            join.alias,
            descriptor.name(),
            table.len()
        );

        Ok(table)
    }

    /// Fetch collection metadata through the live session
    pub async fn table_meta(&self, identity: &str, collection: &str) -> Result<TableMeta, AdapterError> {
        let session = self.get_session(identity).await?;
        Ok(session.client.fetch_metadata(collection).await?)
    }
}

/// Normalise a scalar into a lookup key. Objects, arrays and nulls never match.
pub fn join_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Credentials, FieldDefinition, FieldType};
    use crate::services::transport::mock::MockTransport;
    use serde_json::json;

    fn config() -> SessionConfig {
        SessionConfig::new(Credentials {
            instance_url: "https://example.my.salesforce.com".to_string(),
            access_token: "token".to_string(),
            api_version: "59.0".to_string(),
        })
    }

    fn owner() -> CollectionDescriptor {
        CollectionDescriptor::new(
            "User",
            vec![
                FieldDefinition::new("id", FieldType::String).with_column("Id"),
                FieldDefinition::new("name", FieldType::String).with_column("Name"),
            ],
        )
        .unwrap()
    }

    async fn manager(transport: Arc<MockTransport>) -> ConnectionManager {
        let manager = ConnectionManager::new(Arc::new(SessionCache::new(transport)));
        manager.register("crm", config(), vec![owner()]).await.unwrap();
        manager
    }

    #[tokio::test]
    async fn test_resolve_join_builds_lookup_by_id() {
        let transport = Arc::new(MockTransport::new().with_records(
            "User",
            vec![
                json!({ "Id": "005A", "Name": "Ada", "Email": "ada@example.com" }),
                json!({ "Id": "005B", "Name": "Grace" }),
            ],
        ));
        let manager = manager(transport.clone()).await;

        let tables = manager
            .resolve_join("crm", &[JoinSpec::new("owner", "User", "ownerId")])
            .await
            .unwrap();

        let owners = &tables["owner"];
        assert_eq!(owners.len(), 2);
        assert_eq!(owners["005A"]["name"], json!("Ada"));
        assert!(owners["005A"].get("Email").is_none());

        // Unfiltered, full-field fetch of the related collection
        let queries = transport.queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0], RemoteQuery::all("User", vec!["Id".to_string(), "Name".to_string()]));
    }

    #[tokio::test]
    async fn test_resolve_join_accepts_remote_child_key() {
        let transport = Arc::new(MockTransport::new().with_records(
            "User",
            vec![json!({ "Id": "005A", "Name": "Ada" })],
        ));
        let manager = manager(transport).await;

        let mut join = JoinSpec::new("owner", "User", "ownerId");
        join.child_key = "Id".to_string();
        let tables = manager.resolve_join("crm", &[join]).await.unwrap();
        assert_eq!(tables["owner"]["005A"]["name"], json!("Ada"));
    }

    #[tokio::test]
    async fn test_resolve_join_unknown_child_key() {
        let manager = manager(Arc::new(MockTransport::new())).await;

        let mut join = JoinSpec::new("owner", "User", "ownerId");
        join.child_key = "email".to_string();
        let result = manager.resolve_join("crm", &[join]).await;
        assert!(matches!(result, Err(AdapterError::ContractAssertion(_))));
    }

    #[tokio::test]
    async fn test_resolve_join_unknown_collection() {
        let manager = manager(Arc::new(MockTransport::new())).await;
        let result = manager
            .resolve_join("crm", &[JoinSpec::new("owner", "Group", "ownerId")])
            .await;
        assert!(matches!(result, Err(AdapterError::NotRegistered(name)) if name == "crm.Group"));
    }

    #[tokio::test]
    async fn test_resolve_join_empty_skips_session() {
        let transport = Arc::new(MockTransport::new());
        let manager = manager(transport.clone()).await;
        let tables = manager.resolve_join("crm", &[]).await.unwrap();
        assert!(tables.is_empty());
        assert_eq!(transport.auth_calls(), 0);
    }

    #[test]
    fn test_join_key() {
        assert_eq!(join_key(&json!("a")), Some("a".to_string()));
        assert_eq!(join_key(&json!(7)), Some("7".to_string()));
        assert_eq!(join_key(&Value::Null), None);
        assert_eq!(join_key(&json!({ "a": 1 })), None);
    }
}
