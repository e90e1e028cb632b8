use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::error::AdapterError;
use crate::models::{CollectionDescriptor, SessionConfig};
use crate::services::transport::{ClientHandle, Transport};

/// A live authenticated client and the instant it stops being trusted
#[derive(Debug, Clone)]
pub struct Session {
    pub client: Arc<dyn ClientHandle>,
    pub expires_on: DateTime<Utc>,
}

impl Session {
    pub fn session_id(&self) -> &str {
        self.client.session_id()
    }
}

struct SessionState {
    client: Option<Arc<dyn ClientHandle>>,
    expires_on: DateTime<Utc>,
}

impl SessionState {
    fn live(&self, now: DateTime<Utc>) -> Option<Session> {
        match &self.client {
            Some(client) if now < self.expires_on => Some(Session {
                client: client.clone(),
                expires_on: self.expires_on,
            }),
            _ => None,
        }
    }
}

/// One registered data source: its config, collections and current session
pub struct ManagedSession {
    identity: String,
    config: SessionConfig,
    max_age: TimeDelta,
    collections: HashMap<String, Arc<CollectionDescriptor>>,
    state: RwLock<SessionState>,
    /// Held for the whole authenticate call so only one refresh runs per identity
    refresh: Mutex<()>,
}

impl ManagedSession {
    pub fn collection(&self, name: &str) -> Option<Arc<CollectionDescriptor>> {
        self.collections.get(name).cloned()
    }

    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.keys().cloned().collect();
        names.sort();
        names
    }

    /// Return the live session, authenticating first if there is none or it expired.
    ///
    /// Concurrent callers that find the session stale queue on the refresh lock;
    /// the first one authenticates and the rest reuse its result.
    pub async fn session(&self, transport: &dyn Transport) -> Result<Session, AdapterError> {
        // Fast path: still valid (read lock)
        if let Some(session) = self.state.read().await.live(Utc::now()) {
            tracing::debug!("Reusing session {} for {}", session.session_id(), self.identity);
            return Ok(session);
        }

        let _refresh = self.refresh.lock().await;

        // Double-check in case another task refreshed while we were waiting
        if let Some(session) = self.state.read().await.live(Utc::now()) {
            tracing::debug!("Session for {} refreshed by another task", self.identity);
            return Ok(session);
        }

        tracing::info!("Authenticating data source {}", self.identity);

        let client = transport.authenticate(&self.config).await.map_err(|e| {
            tracing::error!("Failed to authenticate data source {}: {}", self.identity, e);
            AdapterError::Auth(e)
        })?;

        let expires_on = Utc::now()
            .checked_add_signed(self.max_age)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut state = self.state.write().await;
        state.client = Some(client.clone());
        state.expires_on = expires_on;

        tracing::info!(
            "Data source {} authenticated (session: {}, expires: {})",
            self.identity,
            client.session_id(),
            expires_on
        );

        Ok(Session { client, expires_on })
    }
}

/// Registry of data sources keyed by identity.
///
/// Created once and shared by handle; independent registries do not see
/// each other's sources.
pub struct SessionCache {
    transport: Arc<dyn Transport>,
    sessions: RwLock<HashMap<String, Arc<ManagedSession>>>,
}

impl SessionCache {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a data source. The session stays empty until first use.
    pub async fn register(
        &self,
        identity: &str,
        config: SessionConfig,
        collections: Vec<CollectionDescriptor>,
    ) -> Result<(), AdapterError> {
        if identity.trim().is_empty() {
            return Err(AdapterError::Config("Data source identity is missing".to_string()));
        }

        let max_age = TimeDelta::from_std(config.max_connection_age).map_err(|_| {
            AdapterError::Config(format!("max connection age for {} is out of range", identity))
        })?;

        let mut by_name = HashMap::with_capacity(collections.len());
        for collection in collections {
            let name = collection.name().to_string();
            if by_name.insert(name.clone(), Arc::new(collection)).is_some() {
                return Err(AdapterError::Config(format!(
                    "Collection {} registered twice on {}",
                    name, identity
                )));
            }
        }

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(identity) {
            return Err(AdapterError::Config(format!(
                "Data source identity {} is already registered",
                identity
            )));
        }

        tracing::info!(
            "Registered data source {} ({} collections, max age: {}s)",
            identity,
            by_name.len(),
            config.max_connection_age.as_secs()
        );

        sessions.insert(
            identity.to_string(),
            Arc::new(ManagedSession {
                identity: identity.to_string(),
                config,
                max_age,
                collections: by_name,
                state: RwLock::new(SessionState {
                    client: None,
                    expires_on: DateTime::<Utc>::MIN_UTC,
                }),
                refresh: Mutex::new(()),
            }),
        );

        Ok(())
    }

    pub async fn get(&self, identity: &str) -> Result<Arc<ManagedSession>, AdapterError> {
        self.sessions
            .read()
            .await
            .get(identity)
            .cloned()
            .ok_or_else(|| AdapterError::NotRegistered(identity.to_string()))
    }

    pub async fn get_session(&self, identity: &str) -> Result<Session, AdapterError> {
        let managed = self.get(identity).await?;
        managed.session(self.transport.as_ref()).await
    }

    /// Registered identities, sorted
    pub async fn identities(&self) -> Vec<String> {
        let mut identities: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        identities.sort();
        identities
    }
}
