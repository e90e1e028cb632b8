// Transport abstraction for the remote object store
pub mod rest;
pub mod soql;

#[cfg(test)]
pub mod mock;

pub use rest::RestTransport;

use crate::error::TransportError;
use crate::models::{BulkResult, Record, RemoteQuery, SessionConfig, TableMeta};
use std::sync::Arc;

/// Authenticates a data source and hands back a client bound to that session.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn authenticate(&self, config: &SessionConfig) -> Result<Arc<dyn ClientHandle>, TransportError>;
}

/// Authenticated client for one data source.
///
/// All field names crossing this boundary are remote names.
#[async_trait::async_trait]
pub trait ClientHandle: Send + Sync {
    /// Unique per authenticate call; a refreshed session gets a new id.
    fn session_id(&self) -> &str;

    /// Run a query and return every matching raw record.
    async fn query(&self, query: &RemoteQuery) -> Result<Vec<Record>, TransportError>;

    async fn create(&self, collection: &str, payload: &Record) -> Result<BulkResult, TransportError>;

    async fn update(&self, collection: &str, payload: &Record) -> Result<BulkResult, TransportError>;

    async fn retrieve(&self, collection: &str, id: &str) -> Result<Record, TransportError>;

    async fn fetch_metadata(&self, collection: &str) -> Result<TableMeta, TransportError>;
}

impl std::fmt::Debug for dyn ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("session_id", &self.session_id())
            .finish()
    }
}
