//! # Reference Definitions and Records
//!
//! A [`ReferenceDefinition`] is what callers hand to the registry: a name, the
//! two capabilities and a few optional knobs. Once it passes validation it is
//! turned into a [`Reference`], the long-lived record that the tick cycle
//! mutates and readers observe.
//!
//! ## Consistency model
//!
//! All data fields (`kind`, `array`, `map`, `loaded`, `err`, `loaded_time`)
//! live behind a single `RwLock`. The tick cycle builds new content off to the
//! side and swaps it in under the write lock, so a reader either sees the
//! previous generation or the next one, never a half-cleared collection.
//! The record itself is the container whose identity never changes: anyone
//! holding an `Arc<Reference>` observes every later refresh.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::configs::RegistryOptions;
use crate::core::capabilities::{Poller, Retriever};
use crate::core::helpers::{self, BoundHelper, HelperFn};
use crate::core::materialize::Materialized;
use crate::core::scheduler::TickerHandle;

/// # Reference Definition
///
/// Raw input to [`Registry::attach`](crate::core::registry::Registry::attach).
/// `name`, `retriever` and `poller` are required; everything else falls back
/// to the registry's [`RegistryOptions`].
#[derive(Clone, Default)]
pub struct ReferenceDefinition {
    /// Unique key in the registry.
    pub name: String,
    /// Full-fetch capability.
    pub retriever: Option<Arc<dyn Retriever>>,
    /// Change-detection capability.
    pub poller: Option<Arc<dyn Poller>>,
    /// Refresh period. Defaults to `RegistryOptions::default_interval_ms`.
    pub interval: Option<Duration>,
    /// Item field used for auto-keying array payloads. Defaults to `"id"`.
    pub id: Option<String>,
    /// Named helpers, bound to the record once attached.
    pub helpers: BTreeMap<String, HelperFn>,
}

impl ReferenceDefinition {
    /// Starts a definition with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the retriever.
    pub fn retriever(mut self, retriever: impl Retriever + 'static) -> Self {
        self.retriever = Some(Arc::new(retriever));
        self
    }

    /// Sets the poller.
    pub fn poller(mut self, poller: impl Poller + 'static) -> Self {
        self.poller = Some(Arc::new(poller));
        self
    }

    /// Sets the refresh period.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Sets the refresh period in milliseconds.
    pub fn interval_ms(self, millis: u64) -> Self {
        self.interval(Duration::from_millis(millis))
    }

    /// Sets the field used to key array items.
    pub fn id_field(mut self, field: impl Into<String>) -> Self {
        self.id = Some(field.into());
        self
    }

    /// Declares a helper operating on the record's live data.
    pub fn helper<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&ReferenceSnapshot, &[Value]) -> Value + Send + Sync + 'static,
    {
        self.helpers.insert(name.into(), Arc::new(f));
        self
    }

    /// True when the definition carries everything `attach` requires.
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && self.retriever.is_some() && self.poller.is_some()
    }
}

impl fmt::Debug for ReferenceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceDefinition")
            .field("name", &self.name)
            .field("retriever", &self.retriever.is_some())
            .field("poller", &self.poller.is_some())
            .field("interval", &self.interval)
            .field("id", &self.id)
            .field("helpers", &self.helpers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Shape of the most recently fetched payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    /// The retriever returned an ordered collection.
    Array,
    /// The retriever returned a keyed structure.
    Map,
}

/// Which capability produced a recorded error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSource {
    /// The poller failed; no fetch was attempted that cycle.
    Poll,
    /// The retriever failed, or returned an unusable payload.
    Fetch,
}

/// The last failure observed on a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceError {
    /// Capability that failed.
    pub source: ErrorSource,
    /// Rendered error chain.
    pub message: String,
    /// When the failure was recorded.
    pub at: DateTime<Utc>,
}

impl ReferenceError {
    pub(crate) fn new(source: ErrorSource, err: &anyhow::Error) -> Self {
        Self {
            source,
            message: format!("{err:#}"),
            at: Utc::now(),
        }
    }
}

impl fmt::Display for ReferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match self.source {
            ErrorSource::Poll => "poll",
            ErrorSource::Fetch => "fetch",
        };
        write!(f, "{} failed: {}", source, self.message)
    }
}

/// A consistent, cheaply cloned view of a record's data at one instant.
///
/// The collections are `Arc`-shared with the record, so taking a snapshot
/// never copies items.
#[derive(Debug, Clone)]
pub struct ReferenceSnapshot {
    /// Reference name.
    pub name: Arc<str>,
    /// Shape of the last successful payload, `None` before the first one.
    pub kind: Option<ReferenceKind>,
    /// Ordered items.
    pub array: Arc<Vec<Value>>,
    /// Keyed items.
    pub map: Arc<Map<String, Value>>,
    /// Whether the last cycle ended in a successful fetch.
    pub loaded: bool,
    /// Last recorded failure.
    pub err: Option<ReferenceError>,
    /// Time of the last successful fetch.
    pub loaded_time: Option<DateTime<Utc>>,
}

impl ReferenceSnapshot {
    /// Array length, or the map key count when the array is empty.
    pub fn count(&self) -> usize {
        if self.array.is_empty() {
            self.map.len()
        } else {
            self.array.len()
        }
    }

    /// A representative element: the first array item, else the first map value.
    pub fn sample(&self) -> Option<&Value> {
        self.array.first().or_else(|| self.map.values().next())
    }
}

#[derive(Debug, Default)]
struct ReferenceData {
    kind: Option<ReferenceKind>,
    array: Arc<Vec<Value>>,
    map: Arc<Map<String, Value>>,
    loaded: bool,
    err: Option<ReferenceError>,
    loaded_time: Option<DateTime<Utc>>,
}

/// # Reference Record
///
/// One per attached definition. Data fields are written only by the record's
/// own tick cycle; `enabled` and `ticker` only by the scheduler.
pub struct Reference {
    name: Arc<str>,
    interval: Duration,
    id_field: String,
    retriever: Arc<dyn Retriever>,
    poller: Arc<dyn Poller>,
    helper_defs: BTreeMap<String, HelperFn>,
    enabled: AtomicBool,
    ticker: Mutex<Option<TickerHandle>>,
    data: RwLock<ReferenceData>,
    bound: RwLock<BTreeMap<String, BoundHelper>>,
    this: Weak<Reference>,
}

impl Reference {
    /// Validates a definition and applies defaults.
    ///
    /// Returns `None` for incomplete definitions; the caller drops them
    /// without surfacing an error.
    pub(crate) fn from_definition(
        definition: ReferenceDefinition,
        options: &RegistryOptions,
    ) -> Option<Arc<Self>> {
        if !definition.is_complete() {
            return None;
        }
        let ReferenceDefinition {
            name,
            retriever,
            poller,
            interval,
            id,
            helpers,
        } = definition;
        let (retriever, poller) = (retriever?, poller?);

        let reference = Arc::new_cyclic(|this| Self {
            name: Arc::from(name),
            interval: interval.unwrap_or_else(|| options.default_interval()),
            id_field: id.unwrap_or_else(|| options.default_id_field.clone()),
            retriever,
            poller,
            helper_defs: helpers,
            enabled: AtomicBool::new(false),
            ticker: Mutex::new(None),
            data: RwLock::new(ReferenceData::default()),
            bound: RwLock::new(BTreeMap::new()),
            this: this.clone(),
        });
        reference.rebind_helpers();
        Some(reference)
    }

    /// Unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Effective refresh period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Field used for auto-keying array items.
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Whether the scheduler has started ticking this reference.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Handle to the running schedule, once scheduled.
    pub fn ticker(&self) -> Option<TickerHandle> {
        self.lock_ticker().clone()
    }

    /// Shape of the last successful payload.
    pub fn kind(&self) -> Option<ReferenceKind> {
        self.read_data().kind
    }

    /// Current ordered items.
    ///
    /// The returned `Arc` is a point-in-time snapshot and does not follow later
    /// refreshes. Hold the `Reference` and call this again for fresh data.
    pub fn array(&self) -> Arc<Vec<Value>> {
        Arc::clone(&self.read_data().array)
    }

    /// Current keyed items. Like [`array`](Self::array), a snapshot.
    pub fn map(&self) -> Arc<Map<String, Value>> {
        Arc::clone(&self.read_data().map)
    }

    /// Keyed lookup of a single item.
    pub fn lookup(&self, key: &str) -> Option<Value> {
        self.read_data().map.get(key).cloned()
    }

    /// True once a fetch has succeeded since creation or since the last error.
    pub fn loaded(&self) -> bool {
        self.read_data().loaded
    }

    /// Last recorded failure, cleared by the next successful fetch.
    pub fn err(&self) -> Option<ReferenceError> {
        self.read_data().err.clone()
    }

    /// Time of the last successful fetch.
    pub fn loaded_time(&self) -> Option<DateTime<Utc>> {
        self.read_data().loaded_time
    }

    /// Loaded or errored: the condition the load barrier waits for.
    pub fn is_settled(&self) -> bool {
        let data = self.read_data();
        data.loaded || data.err.is_some()
    }

    /// A consistent view of all data fields.
    pub fn snapshot(&self) -> ReferenceSnapshot {
        let data = self.read_data();
        ReferenceSnapshot {
            name: Arc::clone(&self.name),
            kind: data.kind,
            array: Arc::clone(&data.array),
            map: Arc::clone(&data.map),
            loaded: data.loaded,
            err: data.err.clone(),
            loaded_time: data.loaded_time,
        }
    }

    /// Names of the declared helpers.
    pub fn helper_names(&self) -> Vec<String> {
        self.helper_defs.keys().cloned().collect()
    }

    /// The bound helper called `name`.
    pub fn helper(&self, name: &str) -> Option<BoundHelper> {
        self.bound
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Invokes the helper called `name` against the live data.
    pub fn call(&self, name: &str, args: &[Value]) -> Option<Value> {
        self.helper(name)?.call(args)
    }

    pub(crate) fn retriever(&self) -> &Arc<dyn Retriever> {
        &self.retriever
    }

    pub(crate) fn poller(&self) -> &Arc<dyn Poller> {
        &self.poller
    }

    pub(crate) fn set_enabled(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    pub(crate) fn lock_ticker(&self) -> MutexGuard<'_, Option<TickerHandle>> {
        self.ticker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current keyed items, used as the merge base for map payloads.
    pub(crate) fn map_base(&self) -> Arc<Map<String, Value>> {
        self.map()
    }

    /// Records a failure. Cached data is left untouched.
    pub(crate) fn record_error(&self, error: ReferenceError) {
        let mut data = self.write_data();
        data.loaded = false;
        data.err = Some(error);
    }

    /// Swaps in freshly materialized content and marks the record loaded.
    pub(crate) fn publish(&self, materialized: Materialized) {
        {
            let mut data = self.write_data();
            data.kind = Some(materialized.kind);
            if let Some(array) = materialized.array {
                data.array = array;
            }
            if let Some(map) = materialized.map {
                data.map = map;
            }
            data.err = None;
            data.loaded_time = Some(Utc::now());
            data.loaded = true;
        }
        self.rebind_helpers();
    }

    fn rebind_helpers(&self) {
        let bound = helpers::bind_all(&self.this, &self.helper_defs);
        *self.bound.write().unwrap_or_else(PoisonError::into_inner) = bound;
    }

    fn read_data(&self) -> RwLockReadGuard<'_, ReferenceData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_data(&self) -> RwLockWriteGuard<'_, ReferenceData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.read_data();
        f.debug_struct("Reference")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("id_field", &self.id_field)
            .field("enabled", &self.is_enabled())
            .field("kind", &data.kind)
            .field("count", &data.array.len().max(data.map.len()))
            .field("loaded", &data.loaded)
            .field("err", &data.err)
            .finish()
    }
}
