use thiserror::Error;

/// Failures reported by the transport collaborator.
///
/// The core never rewrites these; they reach the caller wrapped in
/// [`AdapterError::Auth`] or [`AdapterError::Transport`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Remote API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode remote response: {0}")]
    Decode(String),

    #[error("Request timed out: {0}")]
    Timeout(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

/// Adapter error types
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Missing or duplicate data source identity, or an invalid collection definition.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data source not registered: {0}")]
    NotRegistered(String),

    #[error("Authentication failed: {0}")]
    Auth(#[source] TransportError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The write reached the remote API but was rejected there.
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Contract violated: {0}")]
    ContractAssertion(String),

    #[error("No such fields selected on collection {collection}")]
    NoSuchFields { collection: String },

    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),
}

impl AdapterError {
    /// Stable machine-readable code, used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AdapterError::Config(_) => "CONFIG_ERROR",
            AdapterError::NotRegistered(_) => "NOT_REGISTERED",
            AdapterError::Auth(_) => "AUTH_ERROR",
            AdapterError::Transport(_) => "TRANSPORT_ERROR",
            AdapterError::WriteFailed(_) => "WRITE_FAILED",
            AdapterError::ContractAssertion(_) => "CONTRACT_ASSERTION",
            AdapterError::NoSuchFields { .. } => "NO_SUCH_FIELDS",
            AdapterError::Unsupported(_) => "UNSUPPORTED",
        }
    }
}
