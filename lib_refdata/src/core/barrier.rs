//! # Load Barrier
//!
//! Cooperative wait for "every enabled reference has loaded or errored at
//! least once". The condition is re-evaluated on a short fixed cadence rather
//! than through wakeups, so references scheduled while a wait is pending are
//! picked up on the next check and the wait composes with current-thread
//! runtimes as well as multi-threaded ones.

use std::time::Duration;

use tokio::time::sleep;

use crate::core::reference::Reference;

/// True when every enabled record is settled. Vacuously true with none enabled.
pub(crate) fn all_settled<'a>(references: impl IntoIterator<Item = &'a Reference>) -> bool {
    references
        .into_iter()
        .filter(|reference| reference.is_enabled())
        .all(Reference::is_settled)
}

/// Resolves once `ready` returns true, checking every `cadence`.
///
/// Returns without sleeping when the condition already holds.
pub(crate) async fn wait<F>(ready: F, cadence: Duration)
where
    F: Fn() -> bool,
{
    while !ready() {
        sleep(cadence).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn satisfied_condition_returns_immediately() {
        let checks = AtomicUsize::new(0);
        wait(
            || {
                checks.fetch_add(1, Ordering::SeqCst);
                true
            },
            Duration::from_secs(3600),
        )
        .await;
        assert_eq!(checks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn waits_until_condition_flips() {
        let checks = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&checks);
        wait(move || seen.fetch_add(1, Ordering::SeqCst) >= 3, Duration::from_millis(1)).await;
        assert_eq!(checks.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn empty_set_is_settled() {
        assert!(all_settled(std::iter::empty()));
    }
}
