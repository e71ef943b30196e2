//! Public types for the cache engine.

use thiserror::Error;

use crate::bucket::{BucketError, Tier};

/// Error from an engine operation.
///
/// Cache misses and under-freed sweeps are normal outcomes, not errors.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A tier's internal bookkeeping contradicts itself
    #[error("cache invariant violated: {0}")]
    Invariant(BucketError),
    /// A reported size would push a tier's byte total past `u64::MAX`.
    /// The event is dropped and the engine keeps its previous state.
    #[error("size rejected: {0}")]
    Oversized(BucketError),
}

impl From<BucketError> for EngineError {
    fn from(err: BucketError) -> Self {
        match err {
            BucketError::SizeOverflow { .. } => Self::Oversized(err),
            BucketError::AlreadyResident { .. } | BucketError::NotResident { .. } => {
                Self::Invariant(err)
            }
        }
    }
}

/// What an open did to the path's tier membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Not resident; created in the single-access tier
    Miss,
    /// Was single-access; moved to the multi-access tier
    Promoted,
    /// Was already multi-access
    Hit,
}

impl Access {
    /// Tier the path is resident in after the access.
    #[must_use]
    pub fn tier(self) -> Tier {
        match self {
            Self::Miss => Tier::Single,
            Self::Promoted | Self::Hit => Tier::Multi,
        }
    }

    #[must_use]
    pub fn is_hit(self) -> bool {
        !matches!(self, Self::Miss)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Miss => "miss",
            Self::Promoted => "promoted",
            Self::Hit => "hit",
        }
    }
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What started a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepTrigger {
    /// Overflow found after a read
    Read,
    /// Direct call to [`super::CacheEngine::evict`]
    Manual,
    /// Periodic background evictor
    Background,
}

impl SweepTrigger {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Manual => "manual",
            Self::Background => "background",
        }
    }
}

/// How one sweep's reclaim target is split between the tiers.
///
/// Chosen against the post-sweep occupancy `remain`, so that afterwards the
/// tiers sit close to the configured `single_factor : multi_factor` split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReclaimPlan {
    /// Single-access tier is already under its share: take it all from multi
    MultiOnly,
    /// Multi-access tier is under its share: take it all from single
    SingleOnly,
    /// Both over: bring single down to its share, the rest from multi
    Both { from_single: u64 },
}

impl ReclaimPlan {
    #[must_use]
    pub fn choose(
        single_bytes: u64,
        multi_bytes: u64,
        to_free: u64,
        single_factor: f64,
        multi_factor: f64,
    ) -> Self {
        let remain = single_bytes.saturating_add(multi_bytes).saturating_sub(to_free) as f64;
        let single_share = remain * single_factor;
        if (single_bytes as f64) < single_share {
            Self::MultiOnly
        } else if (multi_bytes as f64) < remain * multi_factor {
            Self::SingleOnly
        } else {
            Self::Both {
                from_single: single_bytes.saturating_sub(single_share as u64),
            }
        }
    }
}

/// Point-in-time engine counters.
///
/// Read without taking the engine lock; fields may come from slightly
/// different moments during a concurrent mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub single_bytes: u64,
    pub single_entries: usize,
    pub multi_bytes: u64,
    pub multi_entries: usize,
    pub cache_size: u64,
    /// Bytes a sweep would reclaim right now
    pub overflow: u64,
}

impl CacheStats {
    #[must_use]
    pub fn resident_bytes(&self) -> u64 {
        self.single_bytes.saturating_add(self.multi_bytes)
    }

    #[must_use]
    pub fn resident_entries(&self) -> usize {
        self.single_entries + self.multi_entries
    }

    /// `hits / (hits + misses)`, or `None` before the first access.
    #[must_use]
    pub fn hit_rate(&self) -> Option<f64> {
        let total = self.hits + self.misses;
        (total > 0).then(|| self.hits as f64 / total as f64)
    }

    #[must_use]
    pub fn fill_rate(&self) -> f64 {
        if self.cache_size == 0 {
            0.0
        } else {
            self.resident_bytes() as f64 / self.cache_size as f64
        }
    }
}
