//! # Status Reporter
//!
//! Serializable per-reference snapshots for observability.

use chrono::Utc;
use chrono_humanize::HumanTime;
use serde::Serialize;
use serde_json::Value;

use crate::core::reference::{Reference, ReferenceError, ReferenceKind};

/// Observability view of one enabled reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceStatus {
    pub name: String,
    pub interval_ms: u64,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: Option<ReferenceKind>,
    pub err: Option<ReferenceError>,
    pub loaded: bool,
    /// Array length, or map key count when the array is empty.
    pub count: usize,
    /// Humanized age of the last successful load, e.g. "2 minutes ago".
    pub age: Option<String>,
    pub sample: Option<Value>,
}

impl ReferenceStatus {
    pub(crate) fn of(reference: &Reference) -> Self {
        let snapshot = reference.snapshot();
        let age = snapshot
            .loaded_time
            .map(|at| HumanTime::from(at.signed_duration_since(Utc::now())).to_string());
        Self {
            name: reference.name().to_string(),
            interval_ms: reference.interval().as_millis() as u64,
            id: reference.id_field().to_string(),
            kind: snapshot.kind,
            err: snapshot.err.clone(),
            loaded: snapshot.loaded,
            count: snapshot.count(),
            age,
            sample: snapshot.sample().cloned(),
        }
    }
}
