use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AdapterError;

/// Comparison operators understood by the query translator
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    In,
    NotIn,
}

impl Operator {
    /// Parse an ORM criteria modifier (`"<"`, `"lessThan"`, `"in"`, ...)
    pub fn from_modifier(s: &str) -> Option<Self> {
        match s {
            "=" | "equals" => Some(Operator::Eq),
            "!" | "!=" | "not" => Some(Operator::Ne),
            "<" | "lessThan" => Some(Operator::Lt),
            "<=" | "lessThanOrEqual" => Some(Operator::Lte),
            ">" | "greaterThan" => Some(Operator::Gt),
            ">=" | "greaterThanOrEqual" => Some(Operator::Gte),
            "like" => Some(Operator::Like),
            "in" => Some(Operator::In),
            "nin" | "notIn" => Some(Operator::NotIn),
            _ => None,
        }
    }
}

/// Filter tree over field names.
///
/// Field names are logical when built by callers and remote after translation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    Condition {
        field: String,
        op: Operator,
        value: Value,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Condition {
            field: field.into(),
            op: Operator::Eq,
            value: value.into(),
        }
    }

    pub fn condition(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Filter::Condition {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Parse ORM-style criteria:
    ///
    /// ```text
    /// { "name": "Acme", "employees": { ">": 10 }, "or": [ {..}, {..} ] }
    /// ```
    ///
    /// An array value without a modifier means `in`.
    pub fn from_criteria(criteria: &Value) -> Result<Option<Filter>, AdapterError> {
        let object = match criteria {
            Value::Null => return Ok(None),
            Value::Object(object) => object,
            other => {
                return Err(AdapterError::ContractAssertion(format!(
                    "Criteria must be an object, got {}",
                    other
                )))
            }
        };

        let mut clauses = Vec::with_capacity(object.len());
        for (key, value) in object {
            match key.as_str() {
                "or" | "and" => {
                    let items = value.as_array().ok_or_else(|| {
                        AdapterError::ContractAssertion(format!("'{}' expects an array of criteria", key))
                    })?;
                    let mut children = Vec::with_capacity(items.len());
                    for item in items {
                        // `{}` matches everything, which an empty AND expresses
                        children.push(Filter::from_criteria(item)?.unwrap_or(Filter::And(Vec::new())));
                    }
                    if key == "or" {
                        clauses.push(Filter::Or(children));
                    } else {
                        clauses.push(Filter::And(children));
                    }
                }
                field => clauses.extend(Self::field_clauses(field, value)?),
            }
        }

        Ok(match clauses.len() {
            0 => None,
            1 => clauses.pop(),
            _ => Some(Filter::And(clauses)),
        })
    }

    fn field_clauses(field: &str, value: &Value) -> Result<Vec<Filter>, AdapterError> {
        match value {
            Value::Array(_) => Ok(vec![Filter::condition(field, Operator::In, value.clone())]),
            Value::Object(modifiers) if modifiers.is_empty() => Err(AdapterError::ContractAssertion(
                format!("Empty criteria modifier on field {}", field),
            )),
            Value::Object(modifiers) => modifiers
                .iter()
                .map(|(modifier, operand)| {
                    let op = Operator::from_modifier(modifier).ok_or_else(|| {
                        AdapterError::ContractAssertion(format!(
                            "Unknown criteria modifier '{}' on field {}",
                            modifier, field
                        ))
                    })?;
                    Ok(Filter::condition(field, op, operand.clone()))
                })
                .collect(),
            scalar => Ok(vec![Filter::eq(field, scalar.clone())]),
        }
    }

    /// Fold away the parts whose outcome does not depend on any record.
    ///
    /// An empty AND or `not in []` holds for every record; an empty OR or
    /// `in []` holds for none.
    pub fn reduce(&self) -> Reduced {
        match self {
            Filter::Condition { op, value: Value::Array(items), .. } if items.is_empty() => match op {
                Operator::In => Reduced::Nothing,
                Operator::NotIn => Reduced::All,
                _ => Reduced::Where(self.clone()),
            },
            Filter::Condition { .. } => Reduced::Where(self.clone()),
            Filter::And(children) => {
                let mut kept = Vec::with_capacity(children.len());
                for child in children {
                    match child.reduce() {
                        Reduced::All => {}
                        Reduced::Nothing => return Reduced::Nothing,
                        Reduced::Where(filter) => kept.push(filter),
                    }
                }
                Self::regroup(kept, Filter::And, Reduced::All)
            }
            Filter::Or(children) => {
                let mut kept = Vec::with_capacity(children.len());
                for child in children {
                    match child.reduce() {
                        Reduced::All => return Reduced::All,
                        Reduced::Nothing => {}
                        Reduced::Where(filter) => kept.push(filter),
                    }
                }
                Self::regroup(kept, Filter::Or, Reduced::Nothing)
            }
            Filter::Not(inner) => match inner.reduce() {
                Reduced::All => Reduced::Nothing,
                Reduced::Nothing => Reduced::All,
                Reduced::Where(filter) => Reduced::Where(Filter::Not(Box::new(filter))),
            },
        }
    }

    fn regroup(mut kept: Vec<Filter>, group: fn(Vec<Filter>) -> Filter, empty: Reduced) -> Reduced {
        match kept.len() {
            0 => empty,
            1 => Reduced::Where(kept.remove(0)),
            _ => Reduced::Where(group(kept)),
        }
    }

    /// Reject a negated empty group anywhere in the tree.
    pub fn check_negations(&self) -> Result<(), AdapterError> {
        match self {
            Filter::Condition { .. } => Ok(()),
            Filter::And(children) | Filter::Or(children) => {
                children.iter().try_for_each(Filter::check_negations)
            }
            Filter::Not(inner) => match &**inner {
                Filter::And(children) | Filter::Or(children) if children.is_empty() => Err(
                    AdapterError::ContractAssertion("Cannot negate an empty filter group".to_string()),
                ),
                other => other.check_negations(),
            },
        }
    }

    /// Rebuild the tree with every field name passed through `rename`.
    /// Conditions whose field cannot be renamed are reported as `Err(field)`.
    pub fn try_map_fields<F>(&self, rename: &F) -> Result<Filter, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(match self {
            Filter::Condition { field, op, value } => Filter::Condition {
                field: rename(field).ok_or_else(|| field.clone())?,
                op: *op,
                value: value.clone(),
            },
            Filter::And(children) => Filter::And(
                children
                    .iter()
                    .map(|c| c.try_map_fields(rename))
                    .collect::<Result<_, _>>()?,
            ),
            Filter::Or(children) => Filter::Or(
                children
                    .iter()
                    .map(|c| c.try_map_fields(rename))
                    .collect::<Result<_, _>>()?,
            ),
            Filter::Not(inner) => Filter::Not(Box::new(inner.try_map_fields(rename)?)),
        })
    }
}

/// A filter after [`Filter::reduce`]
#[derive(Debug, Clone, PartialEq)]
pub enum Reduced {
    All,
    Nothing,
    Where(Filter),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SortKey {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// A relation resolved client-side before the main query runs.
///
/// Each parent record gets the related record under `alias`, looked up by
/// the parent's `parent_key` value against the related record's `child_key`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinSpec {
    pub alias: String,
    pub collection: String,
    pub parent_key: String,
    #[serde(default = "default_child_key")]
    pub child_key: String,
}

fn default_child_key() -> String {
    "id".to_string()
}

impl JoinSpec {
    pub fn new(
        alias: impl Into<String>,
        collection: impl Into<String>,
        parent_key: impl Into<String>,
    ) -> Self {
        Self {
            alias: alias.into(),
            collection: collection.into(),
            parent_key: parent_key.into(),
            child_key: default_child_key(),
        }
    }

    pub fn with_child_key(mut self, child_key: impl Into<String>) -> Self {
        self.child_key = child_key.into();
        self
    }
}

/// Abstract description of a find/join call, in logical field names
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QuerySpec {
    /// `None` selects every defined field; `Some` is an explicit projection.
    #[serde(default)]
    pub select: Option<Vec<String>>,
    #[serde(default, rename = "where")]
    pub filter: Option<Filter>,
    #[serde(default)]
    pub joins: Vec<JoinSpec>,
    #[serde(default)]
    pub sort: Vec<SortKey>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub skip: Option<u64>,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn join(mut self, join: JoinSpec) -> Self {
        self.joins.push(join);
        self
    }

    pub fn sort(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }
}

/// Query handed to the transport, expressed in remote field names only
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteQuery {
    pub collection: String,
    pub fields: Vec<String>,
    pub filter: Option<Filter>,
    pub sort: Vec<SortKey>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

impl RemoteQuery {
    /// Unfiltered query over the given fields
    pub fn all(collection: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            collection: collection.into(),
            fields,
            filter: None,
            sort: Vec::new(),
            limit: None,
            skip: None,
        }
    }
}
