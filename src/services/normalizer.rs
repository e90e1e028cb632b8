use serde_json::Value;

use crate::error::AdapterError;
use crate::models::{BulkResult, CollectionDescriptor, Record, TableMeta};

/// Turns raw remote payloads into the shapes callers get back
pub struct ResultNormalizer;

impl ResultNormalizer {
    /// A write succeeded only if the error list is empty and the success flag is set.
    /// Any error entry fails the whole write, whatever the flag says.
    pub fn check_write(result: BulkResult) -> Result<BulkResult, AdapterError> {
        if !result.errors.is_empty() {
            if result.success {
                tracing::warn!("Remote write reported success alongside {} errors", result.errors.len());
            }
            return Err(AdapterError::WriteFailed(result.errors.join(", ")));
        }
        if !result.success {
            return Err(AdapterError::WriteFailed("Was not successful".to_string()));
        }
        Ok(result)
    }

    /// Map raw records through the collection's deserialization rules
    pub fn records(descriptor: &CollectionDescriptor, rows: Vec<Record>) -> Vec<Record> {
        rows.into_iter().map(|row| descriptor.deserialize(row)).collect()
    }

    /// Single retrieved record: drop undefined remote fields, then deserialize
    pub fn record(descriptor: &CollectionDescriptor, mut raw: Record) -> Record {
        descriptor.retain_defined(&mut raw);
        descriptor.deserialize(raw)
    }

    /// Picklists restricted to defined fields, keyed by logical name.
    ///
    /// When `name` is given it must be one of them; otherwise the caller asked
    /// for something that is not a picklist and gets a contract failure.
    pub fn picklists(
        descriptor: &CollectionDescriptor,
        meta: TableMeta,
        name: Option<&str>,
    ) -> Result<Value, AdapterError> {
        let defined: Record = meta
            .picklists
            .into_iter()
            .filter(|(key, _)| descriptor.is_remote_field(key))
            .collect();
        let mut picklists = descriptor.rename_to_logical(defined);

        match name {
            Some(name) => picklists.remove(name).ok_or_else(|| {
                AdapterError::ContractAssertion(format!(
                    "{}.{} is not a picklist",
                    descriptor.name(),
                    name
                ))
            }),
            None => Ok(Value::Object(picklists)),
        }
    }
}
