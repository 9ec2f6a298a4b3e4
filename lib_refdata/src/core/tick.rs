//! # Tick Cycle
//!
//! One execution of a reference's poll-then-maybe-fetch cycle, written as an
//! explicit state machine:
//!
//! ```text
//! idle -> polling -> (unchanged | fetching) -> (updated | errored) -> idle
//! ```
//!
//! Poll and fetch failures are absorbed into the record (`err` set, `loaded`
//! forced false, cached data untouched) and never escape to the scheduler.

use tracing::{debug, warn};

use crate::core::materialize::materialize;
use crate::core::reference::{ErrorSource, Reference, ReferenceError};

/// How a tick ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The poller reported no change; cached data was not touched.
    Unchanged,
    /// A fetch succeeded and the new data was published.
    Updated,
    /// The poller or retriever failed.
    Errored(ErrorSource),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickState {
    Polling,
    Fetching,
    Done(TickOutcome),
}

/// Runs one tick. The first tick of a reference always fetches.
pub(crate) async fn run(reference: &Reference, first_tick: bool) -> TickOutcome {
    let mut state = TickState::Polling;
    loop {
        state = match state {
            TickState::Polling => poll(reference, first_tick).await,
            TickState::Fetching => fetch(reference).await,
            TickState::Done(outcome) => {
                debug!(reference = %reference.name(), ?outcome, "tick finished");
                return outcome;
            }
        };
    }
}

async fn poll(reference: &Reference, first_tick: bool) -> TickState {
    match reference.poller().should_refresh().await {
        Err(e) => {
            warn!(reference = %reference.name(), error = %e, "poller failed");
            reference.record_error(ReferenceError::new(ErrorSource::Poll, &e));
            TickState::Done(TickOutcome::Errored(ErrorSource::Poll))
        }
        Ok(changed) if first_tick || changed == Some(true) => TickState::Fetching,
        Ok(_) => TickState::Done(TickOutcome::Unchanged),
    }
}

async fn fetch(reference: &Reference) -> TickState {
    let materialized = reference.retriever().fetch().await.and_then(|payload| {
        let base = reference.map_base();
        materialize(reference.name(), payload, reference.id_field(), &base).map_err(anyhow::Error::from)
    });

    match materialized {
        Ok(materialized) => {
            reference.publish(materialized);
            TickState::Done(TickOutcome::Updated)
        }
        Err(e) => {
            warn!(reference = %reference.name(), error = %e, "retriever failed, keeping cached data");
            reference.record_error(ReferenceError::new(ErrorSource::Fetch, &e));
            TickState::Done(TickOutcome::Errored(ErrorSource::Fetch))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::RegistryOptions;
    use crate::core::reference::ReferenceDefinition;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counted(changed: Option<bool>, fetches: Arc<AtomicUsize>) -> Arc<Reference> {
        let definition = ReferenceDefinition::new("muppets")
            .retriever(move || {
                let fetches = Arc::clone(&fetches);
                async move {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(json!([{"id": "1", "name": "Kermit"}]))
                }
            })
            .poller(move || async move { Ok(changed) });
        Reference::from_definition(definition, &RegistryOptions::default()).unwrap()
    }

    #[tokio::test]
    async fn first_tick_fetches_without_change_signal() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let reference = counted(None, Arc::clone(&fetches));

        assert_eq!(run(&reference, true).await, TickOutcome::Updated);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert!(reference.loaded());

        assert_eq!(run(&reference, false).await, TickOutcome::Unchanged);
        assert_eq!(run(&reference, false).await, TickOutcome::Unchanged);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn change_signal_triggers_fetch() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let reference = counted(Some(true), Arc::clone(&fetches));
        run(&reference, true).await;
        run(&reference, false).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn poll_error_is_recorded_without_fetching() {
        let definition = ReferenceDefinition::new("broken")
            .retriever(|| async { Ok(json!([])) })
            .poller(|| async { Err(anyhow::anyhow!("poller offline")) });
        let reference = Reference::from_definition(definition, &RegistryOptions::default()).unwrap();

        assert_eq!(run(&reference, true).await, TickOutcome::Errored(ErrorSource::Poll));
        let err = reference.err().unwrap();
        assert_eq!(err.source, ErrorSource::Poll);
        assert!(err.message.contains("poller offline"));
        assert!(!reference.loaded());
        assert!(reference.kind().is_none());
    }

    #[tokio::test]
    async fn scalar_payload_counts_as_fetch_error() {
        let definition = ReferenceDefinition::new("scalar")
            .retriever(|| async { Ok(json!(42)) })
            .poller(|| async { Ok(None) });
        let reference = Reference::from_definition(definition, &RegistryOptions::default()).unwrap();

        assert_eq!(run(&reference, true).await, TickOutcome::Errored(ErrorSource::Fetch));
        assert!(reference.is_settled());
        assert!(!reference.loaded());
    }
}
