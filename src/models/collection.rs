use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::HashMap;

use crate::error::AdapterError;

/// A single record as exchanged with callers and the remote API.
pub type Record = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Json,
}

impl FieldType {
    /// Coerce a value received from the remote API into its logical shape.
    /// Values that cannot be coerced are returned unchanged.
    fn from_remote(&self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (FieldType::Integer, Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(v) => Value::Number(Number::from(v)),
                Err(_) => Value::String(s),
            },
            (FieldType::Integer, Value::Number(n)) => match n.as_f64() {
                // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
                Some(f)
                    if n.as_i64().is_none()
                        && f.fract() == 0.0
                        && f >= i64::MIN as f64
                        && f < i64::MAX as f64 =>
                {
                    Value::Number(Number::from(f as i64))
                }
                _ => Value::Number(n),
            },
            (FieldType::Float, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::String(s)),
            (FieldType::Boolean, Value::String(s)) => match s.to_lowercase().as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::String(s),
            },
            (FieldType::Date, Value::String(s)) => match parse_date(&s) {
                Some(date) => Value::String(date.format("%Y-%m-%d").to_string()),
                None => Value::String(s),
            },
            (FieldType::DateTime, Value::String(s)) => match parse_datetime(&s) {
                Some(ts) => Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
                None => Value::String(s),
            },
            (FieldType::Json, Value::String(s)) => {
                serde_json::from_str(&s).unwrap_or(Value::String(s))
            }
            (_, other) => other,
        }
    }

    /// Convert a logical value into what the remote API accepts on writes.
    fn to_remote(&self, value: Value) -> Value {
        match (self, value) {
            (FieldType::Date, Value::String(s)) => match parse_date(&s) {
                Some(date) => Value::String(date.format("%Y-%m-%d").to_string()),
                None => Value::String(s),
            },
            (FieldType::DateTime, Value::String(s)) => match parse_datetime(&s) {
                Some(ts) => Value::String(ts.format("%Y-%m-%dT%H:%M:%S%.3f%z").to_string()),
                None => Value::String(s),
            },
            (FieldType::Json, v @ (Value::Object(_) | Value::Array(_))) => {
                Value::String(v.to_string())
            }
            (_, other) => other,
        }
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(s).map(|ts| ts.date_naive()))
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // The remote API emits offsets without a colon ("+0000").
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// One attribute of a collection: its logical name, remote column and type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    /// Remote field name; defaults to the logical name.
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default, rename = "type")]
    pub field_type: FieldType,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            column: None,
            field_type,
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }
}

/// Field mapping and (de)serialization rules for one remote collection.
///
/// Built and validated once at registration; read-only afterwards.
#[derive(Debug, Clone)]
pub struct CollectionDescriptor {
    name: String,
    fields: Vec<FieldDefinition>,
    /// logical name -> index into `fields`
    by_logical: HashMap<String, usize>,
    /// remote name -> index into `fields`
    by_remote: HashMap<String, usize>,
}

impl CollectionDescriptor {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDefinition>) -> Result<Self, AdapterError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AdapterError::Config("Collection name cannot be empty".to_string()));
        }
        if fields.is_empty() {
            return Err(AdapterError::Config(format!(
                "Collection {} must define at least one field",
                name
            )));
        }

        let mut by_logical = HashMap::with_capacity(fields.len());
        let mut by_remote = HashMap::with_capacity(fields.len());

        for (idx, field) in fields.iter().enumerate() {
            if field.name.is_empty() || field.column_name().is_empty() {
                return Err(AdapterError::Config(format!(
                    "Collection {} has a field with an empty name",
                    name
                )));
            }
            if by_logical.insert(field.name.clone(), idx).is_some() {
                return Err(AdapterError::Config(format!(
                    "Collection {} defines field {} twice",
                    name, field.name
                )));
            }
            if by_remote.insert(field.column_name().to_string(), idx).is_some() {
                return Err(AdapterError::Config(format!(
                    "Collection {} maps remote field {} twice",
                    name,
                    field.column_name()
                )));
            }
        }

        Ok(Self {
            name,
            fields,
            by_logical,
            by_remote,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Logical -> remote name pairs, in definition order.
    pub fn field_map(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|f| (f.name.as_str(), f.column_name()))
    }

    pub fn remote_name(&self, logical: &str) -> Option<&str> {
        self.by_logical
            .get(logical)
            .map(|&idx| self.fields[idx].column_name())
    }

    pub fn logical_name(&self, remote: &str) -> Option<&str> {
        self.by_remote.get(remote).map(|&idx| self.fields[idx].name.as_str())
    }

    pub fn is_remote_field(&self, remote: &str) -> bool {
        self.by_remote.contains_key(remote)
    }

    /// Logical name for a field given by either its logical or its remote name.
    pub fn logical_key(&self, name: &str) -> Option<&str> {
        match self.by_logical.get(name) {
            Some(&idx) => Some(self.fields[idx].name.as_str()),
            None => self.logical_name(name),
        }
    }

    /// Every remote field name, in definition order.
    pub fn remote_fields(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.column_name().to_string()).collect()
    }

    /// Logical record -> remote payload. Unknown attributes are dropped.
    pub fn serialize(&self, record: Record) -> Record {
        let mut out = Record::new();
        for (key, value) in record {
            match self.by_logical.get(&key) {
                Some(&idx) => {
                    let field = &self.fields[idx];
                    out.insert(field.column_name().to_string(), field.field_type.to_remote(value));
                }
                None => {
                    tracing::warn!("Dropping unknown attribute {}.{} from write payload", self.name, key);
                }
            }
        }
        out
    }

    /// Remote record -> logical record. Remote fields outside the definition are dropped.
    pub fn deserialize(&self, record: Record) -> Record {
        let mut out = Record::new();
        for (key, value) in record {
            if let Some(&idx) = self.by_remote.get(&key) {
                let field = &self.fields[idx];
                out.insert(field.name.clone(), field.field_type.from_remote(value));
            }
        }
        out
    }

    /// Rename remote keys to logical names without touching values.
    pub fn rename_to_logical(&self, record: Record) -> Record {
        record
            .into_iter()
            .filter_map(|(key, value)| {
                self.logical_name(&key).map(|logical| (logical.to_string(), value))
            })
            .collect()
    }

    /// Drop every remote key that the definition does not know about.
    pub fn retain_defined(&self, record: &mut Record) {
        record.retain(|key, _| self.by_remote.contains_key(key));
    }
}
