use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;

use crate::error::ApiError;
use crate::models::UPDATED_AT;

/// A compiled partial update: a `SET` instruction over opaque placeholders
/// plus the two binding tables that give the placeholders meaning.
///
/// Field names and values never appear in the instruction itself — each
/// assignment references a `#attr<i>` name placeholder and a `:val<i>` value
/// placeholder, so a field named `a = b, c` (or one spelled like a
/// placeholder) cannot leak into the instruction's control syntax. The store
/// resolves assignments strictly through the tables; `apply_to` does the
/// same resolution for stores that merge client-side.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateExpression {
    expression: String,
    names: HashMap<String, String>,
    values: HashMap<String, JsonValue>,
    assignments: Vec<(String, String)>,
}

impl UpdateExpression {
    /// The full instruction, e.g. `SET #attr0 = :val0, #updatedAt = :updatedAt`
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Placeholder → real field name
    pub fn names(&self) -> &HashMap<String, String> {
        &self.names
    }

    /// Placeholder → replacement value
    pub fn values(&self) -> &HashMap<String, JsonValue> {
        &self.values
    }

    /// Apply the compiled assignments to a stored record, resolving each
    /// clause through the binding tables only. Fields not named by any
    /// assignment are left untouched.
    pub fn apply_to(&self, record: &mut Map<String, JsonValue>) {
        for (name_key, value_key) in &self.assignments {
            if let (Some(field), Some(value)) =
                (self.names.get(name_key), self.values.get(value_key))
            {
                record.insert(field.clone(), value.clone());
            }
        }
    }
}

/// Compile a sparse field→value mapping into an update instruction.
///
/// The key field is excluded even if present in the input; the key is
/// immutable after creation. A clause refreshing `updatedAt` to `now` is
/// appended unless the caller supplied that field explicitly, in which case
/// the caller's value wins and no second clause is emitted.
///
/// An input with zero remaining caller fields is a client error ("No fields
/// to update") — the synthesized timestamp clause alone never justifies a
/// write.
pub fn compile(
    fields: &Map<String, JsonValue>,
    key_field: &str,
    now: &str,
) -> Result<UpdateExpression, ApiError> {
    let mut assignments = Vec::new();
    let mut names = HashMap::new();
    let mut values = HashMap::new();

    for (index, (field, value)) in fields
        .iter()
        .filter(|(field, _)| field.as_str() != key_field)
        .enumerate()
    {
        let name_key = format!("#attr{}", index);
        let value_key = format!(":val{}", index);
        names.insert(name_key.clone(), field.clone());
        values.insert(value_key.clone(), value.clone());
        assignments.push((name_key, value_key));
    }

    if assignments.is_empty() {
        return Err(ApiError::validation("No fields to update"));
    }

    if !fields.contains_key(UPDATED_AT) {
        names.insert("#updatedAt".to_string(), UPDATED_AT.to_string());
        values.insert(
            ":updatedAt".to_string(),
            JsonValue::String(now.to_string()),
        );
        assignments.push(("#updatedAt".to_string(), ":updatedAt".to_string()));
    }

    let clauses: Vec<String> = assignments
        .iter()
        .map(|(name_key, value_key)| format!("{} = {}", name_key, value_key))
        .collect();

    Ok(UpdateExpression {
        expression: format!("SET {}", clauses.join(", ")),
        names,
        values,
        assignments,
    })
}
