//! Payload filter construction
//!
//! Translates declared filterable fields plus tool-call arguments into a
//! Qdrant filter object:
//!
//! ```json
//! {
//!   "must": [{ "key": "metadata.type", "match": { "value": "code" } }],
//!   "must_not": [{ "key": "metadata.source", "match": { "value": "imported" } }]
//! }
//! ```
//!
//! Equality, range, and membership conditions land in `must`; negated
//! equality in `must_not`.

use serde_json::{json, Map, Value};

use crate::error::{RecallError, Result};
use crate::types::{FieldCondition, FilterableField};

/// Build a payload filter from declared fields and tool arguments.
///
/// Fields whose argument is absent or null are skipped unless marked
/// required. Returns None when no clause applies.
pub fn build_filter(
    fields: &[&FilterableField],
    args: &Map<String, Value>,
) -> Result<Option<Value>> {
    let mut must: Vec<Value> = Vec::new();
    let mut must_not: Vec<Value> = Vec::new();

    for field in fields {
        let value = args.get(&field.name).filter(|v| !v.is_null());
        let Some(value) = value else {
            if field.required {
                return Err(RecallError::InvalidInput(format!(
                    "Missing required filter field: {}",
                    field.name
                )));
            }
            continue;
        };
        let Some(condition) = field.condition else {
            continue;
        };

        match condition {
            FieldCondition::Eq => {
                must.push(json!({ "key": field.name, "match": { "value": value } }));
            }
            FieldCondition::Ne => {
                must_not.push(json!({ "key": field.name, "match": { "value": value } }));
            }
            FieldCondition::Gt => must.push(range_clause(&field.name, "gt", value)),
            FieldCondition::Gte => must.push(range_clause(&field.name, "gte", value)),
            FieldCondition::Lt => must.push(range_clause(&field.name, "lt", value)),
            FieldCondition::Lte => must.push(range_clause(&field.name, "lte", value)),
            FieldCondition::Any => {
                must.push(membership_clause(field, "any", value)?);
            }
            FieldCondition::Except => {
                must.push(membership_clause(field, "except", value)?);
            }
        }
    }

    if must.is_empty() && must_not.is_empty() {
        return Ok(None);
    }

    let mut filter = Map::new();
    if !must.is_empty() {
        filter.insert("must".to_string(), Value::Array(must));
    }
    if !must_not.is_empty() {
        filter.insert("must_not".to_string(), Value::Array(must_not));
    }
    Ok(Some(Value::Object(filter)))
}

fn range_clause(key: &str, op: &str, value: &Value) -> Value {
    let mut range = Map::new();
    range.insert(op.to_string(), value.clone());
    json!({ "key": key, "range": range })
}

fn membership_clause(field: &FilterableField, op: &str, value: &Value) -> Result<Value> {
    if !value.is_array() {
        return Err(RecallError::InvalidInput(format!(
            "Filter field '{}' expects an array of values",
            field.name
        )));
    }
    let mut matcher = Map::new();
    matcher.insert(op.to_string(), value.clone());
    Ok(json!({ "key": field.name, "match": matcher }))
}
