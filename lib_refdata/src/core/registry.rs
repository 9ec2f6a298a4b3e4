//! # Registry
//!
//! The one piece of shared mutable state: a map from reference name to its
//! record, plus the scheduler that owns the ticker tasks and the cancellation
//! token they all descend from. A `Registry` is an explicitly owned handle;
//! clones share the same state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::configs::RegistryOptions;
use crate::core::barrier;
use crate::core::reference::{Reference, ReferenceDefinition};
use crate::core::scheduler::{Scheduler, TickerHandle};
use crate::core::status::ReferenceStatus;

struct Inner {
    references: RwLock<HashMap<String, Arc<Reference>>>,
    scheduler: Scheduler,
    shutdown: Mutex<CancellationToken>,
    options: RegistryOptions,
    loaded_check: AtomicBool,
    loaded_warning: AtomicBool,
}

/// # Reference Registry
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Inner>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(RegistryOptions::default())
    }
}

impl Registry {
    pub fn new(options: RegistryOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                references: RwLock::new(HashMap::new()),
                scheduler: Scheduler::new(&options),
                shutdown: Mutex::new(CancellationToken::new()),
                options,
                loaded_check: AtomicBool::new(false),
                loaded_warning: AtomicBool::new(false),
            }),
        }
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.inner.options
    }

    /// Registers one reference.
    ///
    /// Definitions missing a name, retriever or poller are dropped without an
    /// error; `get` will simply not find them. A definition replacing an
    /// existing name stops the previous record's ticker.
    pub fn attach(&self, definition: ReferenceDefinition) {
        let name = definition.name.clone();
        let Some(reference) = Reference::from_definition(definition, &self.inner.options) else {
            debug!(reference = %name, "dropping incomplete reference definition");
            return;
        };

        let previous = self.write_references().insert(name.clone(), reference);
        if let Some(ticker) = previous.and_then(|old| old.ticker()) {
            ticker.cancel();
            info!(reference = %name, "replaced scheduled reference, previous ticker stopped");
        } else {
            debug!(reference = %name, "attached reference");
        }
    }

    /// Registers every definition, returning how many were handed to `attach`.
    pub fn attach_all(&self, definitions: impl IntoIterator<Item = ReferenceDefinition>) -> usize {
        let mut attached = 0;
        for definition in definitions {
            self.attach(definition);
            attached += 1;
        }
        attached
    }

    /// The record for `name`. Never triggers loading.
    pub fn get(&self, name: &str) -> Option<Arc<Reference>> {
        self.warn_if_unchecked();
        self.read_references().get(name).cloned()
    }

    /// Names of all attached references, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_references().keys().cloned().collect();
        names.sort();
        names
    }

    /// Stops every ticker, then drops all records.
    pub fn reset(&self) {
        let dropped = {
            // Same lock order as scheduling: references, then the root token.
            let mut references = self.write_references();
            let mut shutdown = self.inner.shutdown.lock().unwrap_or_else(PoisonError::into_inner);
            shutdown.cancel();
            *shutdown = CancellationToken::new();
            let count = references.len();
            references.clear();
            count
        };
        self.inner.loaded_check.store(false, Ordering::Release);
        self.inner.loaded_warning.store(false, Ordering::Release);
        info!(dropped, "registry reset");
    }

    /// Number of ticker tasks still running.
    pub fn active_tickers(&self) -> usize {
        self.inner.scheduler.active()
    }

    /// Starts ticking `name`. Idempotent; returns `None` for unknown names.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule(&self, name: &str) -> Option<TickerHandle> {
        let references = self.read_references();
        let reference = references.get(name)?;
        Some(self.schedule_reference(reference))
    }

    /// Schedules the named references (all attached ones when `names` is
    /// empty), then waits for the load barrier.
    pub async fn load<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut requested: Vec<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();
        if requested.is_empty() {
            requested = self.list();
        }

        let mut any_scheduled = false;
        for name in &requested {
            if self.schedule(name).is_some() {
                any_scheduled = true;
            } else {
                warn!(reference = %name, "attempted to load reference that doesn't exist");
            }
        }

        if any_scheduled {
            self.loaded().await;
        }
    }

    /// Schedules every attached reference and waits for the barrier.
    pub async fn load_all(&self) {
        self.load(std::iter::empty::<&str>()).await;
    }

    /// Waits until every enabled reference has loaded or errored at least once.
    ///
    /// Resolves immediately when nothing is enabled. A resolved barrier does
    /// not imply success: check `err` on the records you care about.
    pub async fn loaded(&self) {
        let cadence = self.inner.options.load_check();
        barrier::wait(|| self.all_settled(), cadence).await;
        self.inner.loaded_check.store(true, Ordering::Release);
    }

    /// Continuation form of [`loaded`](Self::loaded): runs `f` exactly once
    /// when the barrier resolves.
    pub fn on_loaded<F>(&self, f: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let registry = self.clone();
        tokio::spawn(async move {
            registry.loaded().await;
            f();
        })
    }

    /// Continuation form of [`load`](Self::load).
    pub fn load_then<F>(&self, names: Vec<String>, f: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let registry = self.clone();
        tokio::spawn(async move {
            registry.load(names).await;
            f();
        })
    }

    /// Snapshots every enabled reference, sorted by name. Disabled ones are omitted.
    pub fn status(&self) -> Vec<ReferenceStatus> {
        let mut statuses: Vec<ReferenceStatus> = self
            .read_references()
            .values()
            .filter(|reference| reference.is_enabled())
            .map(|reference| ReferenceStatus::of(reference))
            .collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    /// Callers hold the `references` read lock, so a concurrent `attach` of
    /// the same name cannot swap the record out before its ticker exists.
    fn schedule_reference(&self, reference: &Arc<Reference>) -> TickerHandle {
        let parent = self
            .inner
            .shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        self.inner.scheduler.schedule(reference, &parent)
    }

    fn all_settled(&self) -> bool {
        let references = self.read_references();
        barrier::all_settled(references.values().map(|reference| reference.as_ref()))
    }

    fn warn_if_unchecked(&self) {
        if !self.inner.options.warn_unchecked_reads || self.inner.loaded_check.load(Ordering::Acquire) {
            return;
        }
        if !self.inner.loaded_warning.swap(true, Ordering::AcqRel) {
            warn!("accessing reference data before any load barrier resolved, this may or may not be a problem");
        }
    }

    fn read_references(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Reference>>> {
        self.inner.references.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_references(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Reference>>> {
        self.inner.references.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn muppets() -> ReferenceDefinition {
        ReferenceDefinition::new("muppets")
            .retriever(|| async { Ok(json!([{"id": "1", "name": "Kermit"}, {"id": "2", "name": "Piggy"}])) })
            .poller(|| async { Ok(None) })
    }

    #[test]
    fn attach_and_list() {
        let registry = Registry::default();
        registry.attach(muppets());
        registry.attach(ReferenceDefinition::new("incomplete"));
        assert_eq!(registry.list(), vec!["muppets".to_string()]);
        assert!(registry.get("incomplete").is_none());
        assert!(registry.status().is_empty());
    }

    #[tokio::test]
    async fn load_then_read() {
        let registry = Registry::default();
        registry.attach(muppets());
        registry.load(["muppets"]).await;

        let reference = registry.get("muppets").unwrap();
        assert!(reference.loaded());
        assert_eq!(reference.array().len(), 2);
        assert_eq!(reference.lookup("1").unwrap()["name"], "Kermit");
        registry.reset();
    }

    #[tokio::test]
    async fn unknown_names_resolve_immediately() {
        let registry = Registry::default();
        tokio::time::timeout(Duration::from_millis(200), registry.load(["nobody"]))
            .await
            .unwrap();
        assert_eq!(registry.active_tickers(), 0);
    }

    #[tokio::test]
    async fn huge_interval_still_loads() {
        let registry = Registry::default();
        registry.attach(muppets().interval(Duration::MAX));
        tokio::time::timeout(Duration::from_secs(2), registry.load(["muppets"]))
            .await
            .unwrap();

        let reference = registry.get("muppets").unwrap();
        assert!(reference.loaded());
        assert!(reference.err().is_none());
        assert_eq!(registry.active_tickers(), 1);
        registry.reset();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_attach_and_schedule_leaves_one_ticker() {
        let registry = Registry::default();
        registry.attach(muppets().interval(Duration::from_secs(60)));

        let mut tasks = Vec::new();
        for worker in 0..4 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..200 {
                    if worker % 2 == 0 {
                        registry.attach(muppets().interval(Duration::from_secs(60)));
                    } else {
                        registry.schedule("muppets");
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        registry.schedule("muppets").unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while registry.active_tickers() > 1 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(registry.active_tickers(), 1);
        registry.reset();
    }

    #[tokio::test]
    async fn replacing_a_scheduled_reference_stops_its_ticker() {
        let registry = Registry::default();
        registry.attach(muppets());
        let old = registry.schedule("muppets").unwrap();
        registry.attach(muppets());
        assert!(old.is_cancelled());
        assert!(registry.get("muppets").unwrap().ticker().is_none());
        registry.reset();
    }
}
