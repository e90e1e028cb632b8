use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Combined success flag and error list returned by remote writes,
/// even when only one record was written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BulkResult {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "error_messages")]
    pub errors: Vec<String>,
}

impl BulkResult {
    pub fn succeeded(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            success: true,
            errors: Vec::new(),
        }
    }

    pub fn failed<I, S>(errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: None,
            success: false,
            errors: errors.into_iter().map(Into::into).collect(),
        }
    }
}

/// The remote API reports errors either as bare strings or as
/// `{ "statusCode", "message", "fields" }` objects.
#[derive(Deserialize)]
#[serde(untagged)]
enum RemoteError {
    Message(String),
    Detailed {
        message: String,
        #[serde(rename = "statusCode", default)]
        status_code: Option<String>,
    },
}

fn error_messages<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let errors = Option::<Vec<RemoteError>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(errors
        .into_iter()
        .map(|err| match err {
            RemoteError::Message(message) => message,
            RemoteError::Detailed {
                message,
                status_code: Some(code),
            } => format!("{}: {}", code, message),
            RemoteError::Detailed { message, .. } => message,
        })
        .collect())
}

/// Collection metadata: enumerated values keyed by remote field name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TableMeta {
    #[serde(default)]
    pub picklists: BTreeMap<String, Value>,
}
