// SOQL rendering for translated queries
//
// Field names are emitted as given; they come from validated collection
// definitions. Literal values are always quoted and escaped here.

use serde_json::Value;

use crate::error::TransportError;
use crate::models::{Filter, Operator, Reduced, RemoteQuery, SortDirection};

/// SOQL has no boolean literal in WHERE; every sobject has a non-null Id
const MATCH_NOTHING: &str = "Id = null";

/// Render a full SELECT statement
pub fn render(query: &RemoteQuery) -> Result<String, TransportError> {
    if query.fields.is_empty() {
        return Err(TransportError::Decode(format!(
            "Cannot query {} without fields",
            query.collection
        )));
    }

    let mut soql = format!("SELECT {} FROM {}", query.fields.join(", "), query.collection);

    if let Some(filter) = &query.filter {
        match filter.reduce() {
            Reduced::All => {}
            Reduced::Nothing => {
                soql.push_str(" WHERE ");
                soql.push_str(MATCH_NOTHING);
            }
            Reduced::Where(filter) => {
                soql.push_str(" WHERE ");
                soql.push_str(&render_filter(&filter)?);
            }
        }
    }

    if !query.sort.is_empty() {
        let keys: Vec<String> = query
            .sort
            .iter()
            .map(|key| match key.direction {
                SortDirection::Asc => format!("{} ASC", key.field),
                SortDirection::Desc => format!("{} DESC", key.field),
            })
            .collect();
        soql.push_str(" ORDER BY ");
        soql.push_str(&keys.join(", "));
    }

    if let Some(limit) = query.limit {
        soql.push_str(&format!(" LIMIT {}", limit));
    }
    if let Some(skip) = query.skip {
        soql.push_str(&format!(" OFFSET {}", skip));
    }

    Ok(soql)
}

fn render_filter(filter: &Filter) -> Result<String, TransportError> {
    match filter {
        Filter::Condition { field, op, value } => render_condition(field, *op, value),
        Filter::And(children) => join_children(children, " AND "),
        Filter::Or(children) => join_children(children, " OR "),
        Filter::Not(inner) => Ok(format!("(NOT {})", render_filter(inner)?)),
    }
}

/// Groups reaching here come out of `Filter::reduce` and are never empty
fn join_children(children: &[Filter], separator: &str) -> Result<String, TransportError> {
    let mut parts = children.iter().map(render_filter).collect::<Result<Vec<_>, _>>()?;

    match parts.len() {
        0 => Err(TransportError::Decode("Cannot render an empty filter group".to_string())),
        1 => Ok(parts.remove(0)),
        _ => Ok(format!("({})", parts.join(separator))),
    }
}

fn render_condition(field: &str, op: Operator, value: &Value) -> Result<String, TransportError> {
    let symbol = match op {
        Operator::Eq => "=",
        Operator::Ne => "!=",
        Operator::Lt => "<",
        Operator::Lte => "<=",
        Operator::Gt => ">",
        Operator::Gte => ">=",
        Operator::Like => "LIKE",
        Operator::In => "IN",
        Operator::NotIn => "NOT IN",
    };

    let operand = match op {
        Operator::In | Operator::NotIn => {
            let items = value.as_array().ok_or_else(|| {
                TransportError::Decode(format!("{} on {} expects an array", symbol, field))
            })?;
            let literals = items.iter().map(literal).collect::<Result<Vec<_>, _>>()?;
            format!("({})", literals.join(", "))
        }
        _ => literal(value)?,
    };

    Ok(format!("{} {} {}", field, symbol, operand))
}

fn literal(value: &Value) -> Result<String, TransportError> {
    match value {
        Value::Null => Ok("null".to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(format!("'{}'", escape(s))),
        other => Err(TransportError::Decode(format!("Unsupported literal in filter: {}", other))),
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}
