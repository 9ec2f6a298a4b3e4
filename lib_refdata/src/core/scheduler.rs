//! # Scheduler
//!
//! Starts one independent ticker task per enabled reference. Each task runs a
//! tick immediately, then fires on the reference's interval. The first
//! recurring fire is pushed back by a small random delay so references that
//! share a backend do not poll it in lockstep.
//!
//! Ticks for one reference run sequentially inside its task, so a slow fetch
//! delays the next fire instead of overlapping with it. Every task holds a
//! child of the registry's cancellation token; `reset` cancels the parent.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::configs::RegistryOptions;
use crate::core::reference::Reference;
use crate::core::tick;

static NEXT_TICKER_ID: AtomicU64 = AtomicU64::new(1);

/// Longest refresh period a ticker will honour. Larger intervals are treated
/// as this one, which keeps deadline arithmetic on `Instant` in range.
const MAX_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Handle to a reference's running schedule.
///
/// Two handles compare equal only if they refer to the same ticker task.
#[derive(Debug, Clone)]
pub struct TickerHandle {
    id: u64,
    started_at: DateTime<Utc>,
    token: CancellationToken,
}

impl TickerHandle {
    fn new(token: CancellationToken) -> Self {
        Self {
            id: NEXT_TICKER_ID.fetch_add(1, Ordering::Relaxed),
            started_at: Utc::now(),
            token,
        }
    }

    /// Process-unique ticker id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// When scheduling started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// True once the ticker has been stopped by a reset or a replacing attach.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }
}

impl PartialEq for TickerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TickerHandle {}

/// Spawns ticker tasks for the registry.
pub(crate) struct Scheduler {
    tracker: TaskTracker,
    jitter_min: Duration,
    jitter_span: Duration,
}

impl Scheduler {
    pub(crate) fn new(options: &RegistryOptions) -> Self {
        Self {
            tracker: TaskTracker::new(),
            jitter_min: Duration::from_millis(options.jitter_min_ms),
            jitter_span: Duration::from_millis(options.jitter_span_ms),
        }
    }

    /// Starts ticking `reference` unless it already has a ticker.
    ///
    /// Returns the (possibly pre-existing) handle. Must be called from within
    /// a Tokio runtime.
    pub(crate) fn schedule(&self, reference: &Arc<Reference>, parent: &CancellationToken) -> TickerHandle {
        let mut slot = reference.lock_ticker();
        if let Some(existing) = slot.as_ref() {
            debug!(reference = %reference.name(), ticker = existing.id(), "already scheduled");
            return existing.clone();
        }

        let token = parent.child_token();
        let handle = TickerHandle::new(token.clone());
        *slot = Some(handle.clone());
        reference.set_enabled();
        drop(slot);

        let jitter = self.jitter();
        info!(
            reference = %reference.name(),
            ticker = handle.id(),
            interval_ms = reference.interval().as_millis() as u64,
            jitter_ms = jitter.as_millis() as u64,
            "scheduling reference"
        );
        self.tracker.spawn(run_ticker(Arc::clone(reference), token, jitter));
        handle
    }

    /// Number of ticker tasks still alive.
    pub(crate) fn active(&self) -> usize {
        self.tracker.len()
    }

    fn jitter(&self) -> Duration {
        let span = self.jitter_span.as_millis() as u64;
        if span == 0 {
            return self.jitter_min;
        }
        self.jitter_min + Duration::from_millis(rand::rng().random_range(0..span))
    }
}

async fn run_ticker(reference: Arc<Reference>, token: CancellationToken, jitter: Duration) {
    let period = clamp_period(reference.interval());
    let first_fire = Instant::now() + jitter + period;

    tokio::select! {
        _ = token.cancelled() => return,
        _ = tick::run(&reference, true) => {}
    }

    let mut ticker = interval_at(first_fire, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tick::run(&reference, false) => {}
                }
            }
        }
    }
    debug!(reference = %reference.name(), "ticker stopped");
}

fn clamp_period(interval: Duration) -> Duration {
    interval.clamp(Duration::from_millis(1), MAX_PERIOD)
}
