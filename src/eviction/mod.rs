//! Victim ordering for the cache tiers.
//!
//! Each [`Bucket`](crate::bucket::Bucket) owns one [`VictimSelector`] that
//! decides which of its entries is reclaimed next.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Eviction Module                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  recency.rs     - single-access tier                         │
//! │  └─ RecencyOrder: FIFO by insertion / last touch             │
//! ├──────────────────────────────────────────────────────────────┤
//! │  frequency.rs   - multi-access tier                          │
//! │  └─ FrequencyOrder: lowest access count first,               │
//! │     ties broken by larger size, then oldest registration     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Selectors only hold paths and ranking keys. Entry data stays in the
//! bucket's lookup map; the bucket re-registers an entry every time its
//! access count or size changes.

pub mod frequency;
pub mod recency;

pub use frequency::FrequencyOrder;
pub use recency::RecencyOrder;

use crate::entry::Entry;

/// Ordering structure used to pick eviction victims within one tier.
pub trait VictimSelector: Send + std::fmt::Debug {
    /// Register `entry`, or move it to the position its current stats imply
    /// if it is already registered.
    fn register(&mut self, entry: &Entry);

    /// Forget `path`. Returns `false` if it was not registered.
    fn unregister(&mut self, path: &str) -> bool;

    /// Next victim, without removing it.
    fn peek(&self) -> Option<&str>;

    fn contains(&self, path: &str) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered paths, next victim first.
    fn paths(&self) -> Vec<&str>;
}

/// Which [`VictimSelector`] a bucket is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderPolicy {
    /// Oldest-touched first (LRU over hits, FIFO over inserts)
    Recency,
    /// Least frequently accessed first
    Frequency,
}

impl OrderPolicy {
    #[must_use]
    pub fn selector(self) -> Box<dyn VictimSelector> {
        match self {
            Self::Recency => Box::new(RecencyOrder::default()),
            Self::Frequency => Box::new(FrequencyOrder::default()),
        }
    }
}

impl std::fmt::Display for OrderPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Recency => write!(f, "LRU"),
            Self::Frequency => write!(f, "LFU"),
        }
    }
}
