//! # Data Materializer
//!
//! Normalizes a fetched payload into the record's two views:
//!
//! - **Array payloads** replace the ordered collection. When items carry the
//!   configured id field the keyed view is rebuilt from scratch, one entry per
//!   keyable item.
//! - **Object payloads** are merged into the keyed view. Keys present in the
//!   payload take the new value, keys absent from it survive. Map-sourced
//!   references therefore only grow unless re-keyed from an array payload.
//!
//! Materialization is pure: it returns new containers and the record swaps
//! them in under its write lock.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::core::reference::ReferenceKind;
use crate::error::{RefDataError, Result};

/// Fresh content for a record. `None` fields leave the current container in place.
#[derive(Debug, Clone)]
pub struct Materialized {
    /// Shape of the payload.
    pub kind: ReferenceKind,
    /// Replacement ordered items.
    pub array: Option<Arc<Vec<Value>>>,
    /// Replacement keyed items.
    pub map: Option<Arc<Map<String, Value>>>,
}

/// Builds the new views for `payload`.
///
/// `base` is the record's current keyed view, used as the merge target for
/// object payloads.
pub fn materialize(
    reference: &str,
    payload: Value,
    id_field: &str,
    base: &Map<String, Value>,
) -> Result<Materialized> {
    match payload {
        Value::Array(items) => {
            let map = keyable(&items, id_field).then(|| Arc::new(key_items(&items, id_field)));
            Ok(Materialized {
                kind: ReferenceKind::Array,
                array: Some(Arc::new(items)),
                map,
            })
        }
        Value::Object(entries) => {
            let mut merged = base.clone();
            merged.extend(entries);
            Ok(Materialized {
                kind: ReferenceKind::Map,
                array: None,
                map: Some(Arc::new(merged)),
            })
        }
        other => Err(RefDataError::InvalidPayload {
            reference: reference.to_string(),
            found: type_name(&other),
        }),
    }
}

/// Array items are keyable when the first one exposes a usable id.
/// An empty payload is trivially keyable and clears the keyed view.
fn keyable(items: &[Value], id_field: &str) -> bool {
    match items.first() {
        None => true,
        Some(first) => key_of(first, id_field).is_some(),
    }
}

fn key_items(items: &[Value], id_field: &str) -> Map<String, Value> {
    items
        .iter()
        .filter_map(|item| key_of(item, id_field).map(|key| (key, item.clone())))
        .collect()
}

/// Strings key as-is, numbers and booleans by their JSON rendering.
fn key_of(item: &Value, id_field: &str) -> Option<String> {
    match item.get(id_field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
