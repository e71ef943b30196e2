//! Watermark sweep: decide how much to reclaim and split it between tiers.
//!
//! A sweep only starts once occupancy crosses the hard watermark, and then
//! reclaims everything above the soft watermark. The gap between the two
//! keeps back-to-back reads from each triggering a small sweep.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::bucket::{Reclaimed, Tier};
use crate::config::EngineConfig;

use super::{CacheEngine, ReclaimPlan, SweepTrigger, TierState};

/// Result of one sweep, carried out of the engine lock for reporting.
#[derive(Debug, Default)]
pub(super) struct SweepOutcome {
    pub(super) to_free: u64,
    /// `None` when there was nothing to reclaim
    pub(super) plan: Option<ReclaimPlan>,
    pub(super) single: Reclaimed,
    pub(super) multi: Reclaimed,
    pub(super) elapsed: Duration,
}

impl SweepOutcome {
    pub(super) fn freed(&self) -> u64 {
        self.single.freed.saturating_add(self.multi.freed)
    }
}

impl TierState {
    /// Saturates at `u64::MAX`, which is over any watermark.
    pub(super) fn occupancy(&self) -> u64 {
        self.single.total_size().saturating_add(self.multi.total_size())
    }

    pub(super) fn overflow(&self, config: &EngineConfig) -> u64 {
        config.overflow_at(self.occupancy())
    }

    /// Reclaim `to_free` bytes, skipping the protected path.
    ///
    /// The split follows [`ReclaimPlan::choose`]. Whatever the planned tier
    /// could not supply is taken from the other one.
    pub(super) fn sweep(&mut self, to_free: u64, config: &EngineConfig) -> SweepOutcome {
        if to_free == 0 {
            return SweepOutcome::default();
        }
        let start = Instant::now();

        let plan = ReclaimPlan::choose(
            self.single.total_size(),
            self.multi.total_size(),
            to_free,
            config.single_factor,
            config.multi_factor,
        );
        let protected = self.protected.as_deref();

        let (mut single, mut multi) = match plan {
            ReclaimPlan::MultiOnly => (
                Reclaimed::default(),
                self.multi.evict_excluding(to_free, protected),
            ),
            ReclaimPlan::SingleOnly => (
                self.single.evict_excluding(to_free, protected),
                Reclaimed::default(),
            ),
            ReclaimPlan::Both { from_single } => {
                let single = self.single.evict_excluding(from_single, protected);
                let rest = to_free.saturating_sub(single.freed);
                (single, self.multi.evict_excluding(rest, protected))
            }
        };

        let shortfall = to_free.saturating_sub(single.freed.saturating_add(multi.freed));
        if shortfall > 0 {
            match plan {
                ReclaimPlan::SingleOnly => {
                    multi.absorb(self.multi.evict_excluding(shortfall, protected));
                }
                ReclaimPlan::MultiOnly | ReclaimPlan::Both { .. } => {
                    single.absorb(self.single.evict_excluding(shortfall, protected));
                }
            }
        }

        debug!(
            ?plan,
            to_free,
            from_single = single.freed,
            from_multi = multi.freed,
            shortfall,
            "Sweep apportioned"
        );

        SweepOutcome {
            to_free,
            plan: Some(plan),
            single,
            multi,
            elapsed: start.elapsed(),
        }
    }
}

impl CacheEngine {
    /// Report a finished sweep: metrics, eviction log lines, under-free
    /// warning. Runs after the engine lock is released.
    pub(super) fn finish_sweep(&self, outcome: &SweepOutcome, trigger: SweepTrigger) -> u64 {
        if outcome.plan.is_none() {
            return 0;
        }

        for (tier, reclaimed) in [(Tier::Single, &outcome.single), (Tier::Multi, &outcome.multi)] {
            if reclaimed.victims.is_empty() {
                continue;
            }
            crate::metrics::record_eviction(tier, reclaimed.victims.len(), reclaimed.freed);
            for victim in &reclaimed.victims {
                self.eviction_log.record_eviction(tier, victim);
            }
        }

        let freed = outcome.freed();
        crate::metrics::record_sweep(trigger.as_str(), freed, outcome.elapsed);

        if freed < outcome.to_free {
            warn!(
                trigger = trigger.as_str(),
                to_free = outcome.to_free,
                freed,
                "Sweep ran out of evictable entries"
            );
            crate::metrics::record_under_freed(trigger.as_str());
        } else {
            debug!(
                trigger = trigger.as_str(),
                freed,
                victims = outcome.single.victims.len() + outcome.multi.victims.len(),
                "Sweep complete"
            );
        }
        freed
    }
}
