// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Background evictor.
//!
//! A tokio task that wakes every `evictor_interval` and sweeps whatever
//! overflow reads left behind (a read can't evict the file it is reading,
//! so a single huge file can leave the cache over its hard watermark).
//!
//! ```text
//!        ┌──────── tick (period) ────────┐
//!        │                               ▼
//!   [ waiting ] ◀──────────────── relieve_overflow()
//!        │  ▲                            ▲
//!        │  └──── wake() ────────────────┘
//!        ▼
//!   shutdown() / handle dropped → task exits
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::coordinator::{CacheEngine, SweepTrigger};

#[derive(Debug, Default)]
struct EvictorCounters {
    checks: AtomicU64,
    reclaimed: AtomicU64,
}

/// Handle to a running background evictor.
///
/// Dropping the handle stops the task at its next wakeup; call
/// [`shutdown`](Self::shutdown) to stop it and wait for it to exit.
#[derive(Debug)]
pub struct BackgroundEvictor {
    shutdown: watch::Sender<bool>,
    wake: Arc<Notify>,
    counters: Arc<EvictorCounters>,
    handle: JoinHandle<()>,
}

impl BackgroundEvictor {
    /// Spawn the evictor for `engine` on the current tokio runtime. The
    /// first check happens one `period` from now.
    pub fn spawn(engine: Arc<CacheEngine>, period: Duration) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let wake = Arc::new(Notify::new());
        let counters = Arc::new(EvictorCounters::default());

        let handle = tokio::spawn(run(
            engine,
            period,
            shutdown_rx,
            Arc::clone(&wake),
            Arc::clone(&counters),
        ));

        Self {
            shutdown,
            wake,
            counters,
            handle,
        }
    }

    /// Check for overflow now instead of waiting for the next tick.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Wakeups handled so far, whether or not they found overflow.
    #[must_use]
    pub fn checks(&self) -> u64 {
        self.counters.checks.load(Ordering::Relaxed)
    }

    /// Total bytes freed by this evictor.
    #[must_use]
    pub fn reclaimed_bytes(&self) -> u64 {
        self.counters.reclaimed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the task and wait for it to exit. A sweep already in progress
    /// finishes first.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Background evictor task failed");
        }
    }
}

async fn run(
    engine: Arc<CacheEngine>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    wake: Arc<Notify>,
    counters: Arc<EvictorCounters>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
            _ = wake.notified() => {
                ticker.reset();
            }
        }

        let freed = engine.relieve_overflow(SweepTrigger::Background);
        counters.checks.fetch_add(1, Ordering::Relaxed);
        if freed > 0 {
            counters.reclaimed.fetch_add(freed, Ordering::Relaxed);
            debug!(freed, "Background sweep reclaimed overflow");
        }
    }

    info!(
        checks = counters.checks.load(Ordering::Relaxed),
        reclaimed = counters.reclaimed.load(Ordering::Relaxed),
        "Background evictor stopped"
    );
}
