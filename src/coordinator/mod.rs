// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache engine coordinator.
//!
//! The [`CacheEngine`] owns the two cache tiers and decides, on every open or
//! read event, where a file lives and whether something has to go:
//! - **single-access** tier: files opened once, evicted oldest-touched first
//! - **multi-access** tier: files opened again, evicted least-frequent first
//!
//! # Per-path lifecycle
//!
//! ```text
//! absent ──open──▶ single-access ──open──▶ multi-access ──open──┐
//!    ▲                   │                      │  ▲            │
//!    └──── evict/remove ─┴──────────────────────┘  └────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use evict_engine::{Access, CacheEngine, EngineConfig, Tier};
//!
//! let config = EngineConfig {
//!     cache_size: 100,
//!     background_evictor: false,
//!     ..Default::default()
//! };
//! let engine = CacheEngine::new(config).unwrap();
//!
//! assert_eq!(engine.open("a").unwrap(), Access::Miss);
//! engine.read("a", 50).unwrap();
//! assert_eq!(engine.overflow(), 0);
//!
//! // A second open promotes to the multi-access tier
//! assert_eq!(engine.open("a").unwrap(), Access::Promoted);
//! assert_eq!(engine.tier_of("a"), Some(Tier::Multi));
//! assert_eq!(engine.hit_rate(), Some(0.5));
//! ```

mod types;
mod api;
mod sweep;
mod lifecycle;

pub use types::{Access, CacheStats, EngineError, ReclaimPlan, SweepTrigger};

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::bucket::{Bucket, BucketError, Tier};
use crate::config::{ConfigError, EngineConfig};
use crate::entry::Entry;
use crate::eviction_log::EvictionLog;

/// Two-tier eviction engine.
///
/// # Thread Safety
///
/// The engine is `Send + Sync`. Every mutation (open, read, eviction, tier
/// membership) runs under one engine-wide lock, because apportioning a sweep
/// needs both tiers' sizes and the watermarks at the same instant. Counters
/// and per-tier usage are mirrored into atomics so [`stats`](Self::stats)
/// never waits on that lock.
pub struct CacheEngine {
    pub(super) config: EngineConfig,

    /// Both tiers plus the in-flight path, behind the engine lock
    pub(super) tiers: Mutex<TierState>,

    /// Lifetime access counters
    pub(super) hits: AtomicU64,
    pub(super) misses: AtomicU64,

    /// Tier usage mirrors for lock-free diagnostics
    pub(super) single_bytes: AtomicU64,
    pub(super) single_entries: AtomicUsize,
    pub(super) multi_bytes: AtomicU64,
    pub(super) multi_entries: AtomicUsize,

    pub(super) eviction_log: EvictionLog,
}

/// State guarded by the engine lock.
#[derive(Debug)]
pub(crate) struct TierState {
    pub(super) single: Bucket,
    pub(super) multi: Bucket,
    /// Path of the open/read currently holding the lock; never a victim
    pub(super) protected: Option<String>,
}

impl TierState {
    fn bucket(&self, tier: Tier) -> &Bucket {
        match tier {
            Tier::Single => &self.single,
            Tier::Multi => &self.multi,
        }
    }

    fn tier_of(&self, path: &str) -> Option<Tier> {
        if self.single.contains(path) {
            Some(Tier::Single)
        } else if self.multi.contains(path) {
            Some(Tier::Multi)
        } else {
            None
        }
    }
}

impl CacheEngine {
    /// Validate `config` and build an empty engine.
    ///
    /// The background evictor is not started here; see
    /// [`start_background_evictor`](Self::start_background_evictor).
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let eviction_log = match config.eviction_log.as_deref() {
            Some(path) => EvictionLog::open(path),
            None => EvictionLog::disabled(),
        };

        let tiers = TierState {
            single: Bucket::new(Tier::Single, config.single_capacity()),
            multi: Bucket::new(Tier::Multi, config.multi_capacity()),
            protected: None,
        };

        info!(
            cache_size = config.cache_size,
            single_capacity = tiers.single.capacity(),
            multi_capacity = tiers.multi.capacity(),
            hard_max = config.hard_max_bytes(),
            soft_max = config.soft_max_bytes(),
            eviction_log = eviction_log.is_enabled(),
            "Cache engine created"
        );

        Ok(Self {
            config,
            tiers: Mutex::new(tiers),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            single_bytes: AtomicU64::new(0),
            single_entries: AtomicUsize::new(0),
            multi_bytes: AtomicU64::new(0),
            multi_entries: AtomicUsize::new(0),
            eviction_log,
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Lock-free counters snapshot.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let single_bytes = self.single_bytes.load(Ordering::Relaxed);
        let multi_bytes = self.multi_bytes.load(Ordering::Relaxed);
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            single_bytes,
            single_entries: self.single_entries.load(Ordering::Relaxed),
            multi_bytes,
            multi_entries: self.multi_entries.load(Ordering::Relaxed),
            cache_size: self.config.cache_size,
            overflow: self.config.overflow_at(single_bytes.saturating_add(multi_bytes)),
        }
    }

    /// `hits / (hits + misses)`, or `None` before the first access.
    #[must_use]
    pub fn hit_rate(&self) -> Option<f64> {
        self.stats().hit_rate()
    }

    /// `1 - hit_rate()`, or `None` before the first access.
    #[must_use]
    pub fn miss_rate(&self) -> Option<f64> {
        self.hit_rate().map(|rate| 1.0 - rate)
    }

    /// Bytes resident across both tiers (lock-free, may lag a concurrent
    /// mutation). Saturates at `u64::MAX`.
    #[must_use]
    pub fn resident_bytes(&self) -> u64 {
        self.single_bytes
            .load(Ordering::Relaxed)
            .saturating_add(self.multi_bytes.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn tier_of(&self, path: &str) -> Option<Tier> {
        self.tiers.lock().tier_of(path)
    }

    /// Copy of the resident entry for `path`.
    #[must_use]
    pub fn entry(&self, path: &str) -> Option<Entry> {
        let tiers = self.tiers.lock();
        let tier = tiers.tier_of(path)?;
        tiers.bucket(tier).get(path).cloned()
    }

    /// Every resident entry, single-access tier first, each tier in victim
    /// order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(Tier, Entry)> {
        let guard = self.tiers.lock();
        let tiers = &*guard;
        [Tier::Single, Tier::Multi]
            .into_iter()
            .flat_map(|tier| tiers.bucket(tier).iter().map(move |e| (tier, e.clone())))
            .collect()
    }

    /// Validate configuration, per-tier accounting, and tier exclusivity.
    #[must_use]
    pub fn check_invariants(&self) -> bool {
        if let Err(e) = self.config.validate() {
            error!(error = %e, "Engine configuration invalid");
            return false;
        }
        let tiers = self.tiers.lock();
        if !tiers.single.check_invariants() || !tiers.multi.check_invariants() {
            return false;
        }
        if let Some(shared) = tiers.single.iter().find(|e| tiers.multi.contains(e.path())) {
            error!(path = %shared.path(), "Path resident in both tiers");
            return false;
        }
        true
    }

    /// Mirror tier usage into the lock-free counters and gauges.
    pub(super) fn publish(&self, tiers: &TierState) {
        for bucket in [&tiers.single, &tiers.multi] {
            let (bytes, entries) = match bucket.tier() {
                Tier::Single => (&self.single_bytes, &self.single_entries),
                Tier::Multi => (&self.multi_bytes, &self.multi_entries),
            };
            bytes.store(bucket.total_size(), Ordering::Relaxed);
            entries.store(bucket.len(), Ordering::Relaxed);
            crate::metrics::set_tier_usage(bucket.tier(), bucket.total_size(), bucket.len());
        }
    }

    pub(super) fn record_access(&self, access: Access) {
        if access.is_hit() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        crate::metrics::record_access(access.tier(), access.as_str());
        if access == Access::Promoted {
            crate::metrics::record_promotion();
        }
        if let Some(rate) = self.hit_rate() {
            crate::metrics::set_hit_rate(rate);
        }
    }

    pub(super) fn reject(&self, err: BucketError) -> EngineError {
        let err = EngineError::from(err);
        match &err {
            EngineError::Invariant(e) => error!(error = %e, "Cache invariant violated"),
            EngineError::Oversized(e) => warn!(error = %e, "Event dropped"),
        }
        err
    }
}
