//! # Helper Binder
//!
//! Helpers are functions declared alongside a definition that operate on the
//! reference's data. Binding pairs each one with a weak handle to its record,
//! so a caller can invoke it without knowing which reference it came from and
//! it always sees the record's current state.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use serde_json::Value;

use crate::core::reference::{Reference, ReferenceSnapshot};
use crate::error::{RefDataError, Result};

/// A helper as declared: receives the live record view and call arguments.
pub type HelperFn = Arc<dyn Fn(&ReferenceSnapshot, &[Value]) -> Value + Send + Sync>;

/// A helper bound to one record.
#[derive(Clone)]
pub struct BoundHelper {
    name: Arc<str>,
    target: Weak<Reference>,
    func: HelperFn,
}

impl BoundHelper {
    /// Helper name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the helper against the record's current data.
    ///
    /// Returns `None` once the record has been dropped by a registry reset.
    pub fn call(&self, args: &[Value]) -> Option<Value> {
        let reference = self.target.upgrade()?;
        let snapshot = reference.snapshot();
        Some((self.func)(&snapshot, args))
    }
}

impl fmt::Debug for BoundHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundHelper")
            .field("name", &self.name)
            .field("live", &(self.target.strong_count() > 0))
            .finish()
    }
}

/// Binds every declared helper to `target`.
pub(crate) fn bind_all(
    target: &Weak<Reference>,
    defs: &BTreeMap<String, HelperFn>,
) -> BTreeMap<String, BoundHelper> {
    defs.iter()
        .map(|(name, func)| {
            let bound = BoundHelper {
                name: Arc::from(name.as_str()),
                target: target.clone(),
                func: Arc::clone(func),
            };
            (name.clone(), bound)
        })
        .collect()
}

/// Resolves one of the built-in helpers by name.
///
/// - `first`: first array item, else first map value.
/// - `count`: array length, else map key count.
/// - `keys`: keys of the keyed view.
/// - `find`: first array item whose `args[0]` field equals `args[1]`.
pub fn builtin(kind: &str) -> Result<HelperFn> {
    let func: HelperFn = match kind {
        "first" => Arc::new(|snapshot: &ReferenceSnapshot, _: &[Value]| snapshot.sample().cloned().unwrap_or(Value::Null)),
        "count" => Arc::new(|snapshot: &ReferenceSnapshot, _: &[Value]| Value::from(snapshot.count())),
        "keys" => Arc::new(|snapshot: &ReferenceSnapshot, _: &[Value]| {
            Value::Array(snapshot.map.keys().cloned().map(Value::String).collect())
        }),
        "find" => Arc::new(|snapshot: &ReferenceSnapshot, args: &[Value]| {
            let (Some(Value::String(field)), Some(wanted)) = (args.first(), args.get(1)) else {
                return Value::Null;
            };
            snapshot
                .array
                .iter()
                .find(|item| item.get(field) == Some(wanted))
                .cloned()
                .unwrap_or(Value::Null)
        }),
        other => {
            return Err(RefDataError::UnknownKind {
                what: "helper",
                kind: other.to_string(),
            })
        }
    };
    Ok(func)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reference::ReferenceKind;
    use serde_json::{json, Map};

    fn snapshot(array: Value) -> ReferenceSnapshot {
        let items = array.as_array().cloned().unwrap_or_default();
        let map: Map<String, Value> = items
            .iter()
            .filter_map(|i| Some((i.get("id")?.as_str()?.to_string(), i.clone())))
            .collect();
        ReferenceSnapshot {
            name: Arc::from("muppets"),
            kind: Some(ReferenceKind::Array),
            array: Arc::new(items),
            map: Arc::new(map),
            loaded: true,
            err: None,
            loaded_time: None,
        }
    }

    #[test]
    fn builtins_read_the_snapshot() {
        let snap = snapshot(json!([
            {"id": "1", "name": "Kermit"},
            {"id": "2", "name": "Piggy"}
        ]));
        assert_eq!(builtin("first").unwrap()(&snap, &[])["name"], "Kermit");
        assert_eq!(builtin("count").unwrap()(&snap, &[]), json!(2));
        assert_eq!(builtin("keys").unwrap()(&snap, &[]), json!(["1", "2"]));
        let found = builtin("find").unwrap()(&snap, &[json!("name"), json!("Piggy")]);
        assert_eq!(found["id"], "2");
        assert_eq!(builtin("find").unwrap()(&snap, &[]), Value::Null);
    }

    #[test]
    fn unknown_builtin_is_an_error() {
        assert!(matches!(
            builtin("explode"),
            Err(RefDataError::UnknownKind { what: "helper", .. })
        ));
    }

    #[test]
    fn bound_helper_outliving_its_record_returns_none() {
        let defs: BTreeMap<String, HelperFn> =
            [("count".to_string(), builtin("count").unwrap())].into_iter().collect();
        let bound = bind_all(&Weak::new(), &defs);
        assert!(bound["count"].call(&[]).is_none());
    }
}
