// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! One cache tier: entries, their byte total, and a victim ordering.
//!
//! # Example
//!
//! ```
//! use evict_engine::{Bucket, Entry, Tier};
//!
//! let mut bucket = Bucket::new(Tier::Single, 100);
//! bucket.add(Entry::with_size("a", 40)).unwrap();
//! bucket.add(Entry::with_size("b", 30)).unwrap();
//!
//! // Oldest-touched entry goes first in the single-access tier
//! assert_eq!(bucket.select_victim().map(|e| e.path()), Some("a"));
//!
//! let reclaimed = bucket.evict(10);
//! assert_eq!(reclaimed.freed, 40);
//! assert_eq!(bucket.total_size(), 30);
//! ```

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, error};

use crate::entry::Entry;
use crate::eviction::{OrderPolicy, VictimSelector};

/// Cache tier identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Files opened once so far
    Single,
    /// Files opened more than once
    Multi,
}

impl Tier {
    /// Victim ordering used by this tier.
    #[must_use]
    pub fn order_policy(self) -> OrderPolicy {
        match self {
            Self::Single => OrderPolicy::Recency,
            Self::Multi => OrderPolicy::Frequency,
        }
    }

    /// Short label for metrics and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Multi => "multi",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single-access"),
            Self::Multi => write!(f, "multi-access"),
        }
    }
}

/// Broken bucket precondition. Always a caller bug, never a cache condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BucketError {
    #[error("'{path}' is already resident in the {tier} tier")]
    AlreadyResident { tier: Tier, path: String },
    #[error("'{path}' is not resident in the {tier} tier")]
    NotResident { tier: Tier, path: String },
    /// The bucket is left as it was before the rejected change
    #[error("{size} bytes for '{path}' would overflow the {tier} tier's byte total")]
    SizeOverflow { tier: Tier, path: String, size: u64 },
}

/// Entries removed by one eviction pass.
#[derive(Debug, Default)]
pub struct Reclaimed {
    /// Bytes released
    pub freed: u64,
    /// Evicted entries, in eviction order
    pub victims: Vec<Entry>,
}

impl Reclaimed {
    pub fn absorb(&mut self, other: Reclaimed) {
        self.freed += other.freed;
        self.victims.extend(other.victims);
    }
}

/// A size-accounted set of entries with one eviction ordering.
#[derive(Debug)]
pub struct Bucket {
    tier: Tier,
    capacity: u64,
    entries: HashMap<String, Entry>,
    order: Box<dyn VictimSelector>,
    total_size: u64,
}

impl Bucket {
    /// Bucket for `tier`, ordered by the tier's default policy.
    #[must_use]
    pub fn new(tier: Tier, capacity: u64) -> Self {
        Self::with_policy(tier, capacity, tier.order_policy())
    }

    #[must_use]
    pub fn with_policy(tier: Tier, capacity: u64, policy: OrderPolicy) -> Self {
        Self {
            tier,
            capacity,
            entries: HashMap::new(),
            order: policy.selector(),
            total_size: 0,
        }
    }

    #[must_use]
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Soft size target for this tier.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.entries.get(path)
    }

    /// Entries, next victim first.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.order
            .paths()
            .into_iter()
            .filter_map(|path| self.entries.get(path))
    }

    pub fn add(&mut self, entry: Entry) -> Result<(), BucketError> {
        if self.entries.contains_key(entry.path()) {
            return Err(self.already_resident(entry.path()));
        }
        self.total_size = self.total_with(&entry)?;
        self.order.register(&entry);
        self.entries.insert(entry.path().to_owned(), entry);
        Ok(())
    }

    /// Remove `path`, returning its entry. No-op if absent.
    pub fn remove(&mut self, path: &str) -> Option<Entry> {
        let entry = self.entries.remove(path)?;
        self.order.unregister(path);
        debug_assert!(self.total_size >= entry.size(), "bucket size underflow");
        self.total_size = self.total_size.saturating_sub(entry.size());
        Some(entry)
    }

    /// Re-register `path` in the victim ordering after its stats changed.
    pub fn touch(&mut self, path: &str) -> Result<(), BucketError> {
        self.renew(path, |_| {}).map(|_| ())
    }

    pub fn record_hit(&mut self, path: &str) -> Result<&Entry, BucketError> {
        self.renew(path, Entry::record_hit)
    }

    pub fn record_hit_with_size(&mut self, path: &str, new_size: u64) -> Result<&Entry, BucketError> {
        self.renew(path, |entry| entry.record_hit_with_size(new_size))
    }

    pub fn record_hit_with_range(
        &mut self,
        path: &str,
        offset: u64,
        length: u64,
    ) -> Result<&Entry, BucketError> {
        self.renew(path, |entry| entry.record_hit_with_range(offset, length))
    }

    /// Apply `update` to a resident entry, then fix up the byte total and
    /// the entry's victim position. An update whose new size doesn't fit
    /// the byte total is rolled back.
    fn renew<F>(&mut self, path: &str, update: F) -> Result<&Entry, BucketError>
    where
        F: FnOnce(&mut Entry),
    {
        let tier = self.tier;
        let Some(entry) = self.entries.get_mut(path) else {
            return Err(BucketError::NotResident {
                tier,
                path: path.to_owned(),
            });
        };
        let previous = entry.clone();
        update(entry);

        debug_assert!(self.total_size >= previous.size(), "bucket size underflow");
        let rest = self.total_size.saturating_sub(previous.size());
        let Some(total) = rest.checked_add(entry.size()) else {
            let err = BucketError::SizeOverflow {
                tier,
                path: path.to_owned(),
                size: entry.size(),
            };
            *entry = previous;
            return Err(err);
        };
        self.total_size = total;
        self.order.register(entry);
        Ok(entry)
    }

    /// Byte total once `entry` is added.
    fn total_with(&self, entry: &Entry) -> Result<u64, BucketError> {
        self.total_size
            .checked_add(entry.size())
            .ok_or_else(|| BucketError::SizeOverflow {
                tier: self.tier,
                path: entry.path().to_owned(),
                size: entry.size(),
            })
    }

    /// Next eviction candidate, without removing it.
    #[must_use]
    pub fn select_victim(&self) -> Option<&Entry> {
        self.order.peek().and_then(|path| self.entries.get(path))
    }

    /// Evict victims until at least `target` bytes are freed or the bucket
    /// is empty.
    pub fn evict(&mut self, target: u64) -> Reclaimed {
        self.evict_excluding(target, None)
    }

    /// Like [`evict`](Self::evict), but never evicts `protected`.
    ///
    /// When the protected entry comes up as victim it is set aside and
    /// re-registered at the back once the pass is over. The pass stops
    /// early once the protected entry holds every byte left in the bucket.
    pub fn evict_excluding(&mut self, target: u64, protected: Option<&str>) -> Reclaimed {
        let mut reclaimed = Reclaimed::default();
        let mut set_aside = false;

        while reclaimed.freed < target && self.total_size > 0 {
            let Some(path) = self.order.peek().map(str::to_owned) else {
                break;
            };

            if protected == Some(path.as_str()) {
                self.order.unregister(&path);
                set_aside = true;
            } else if let Some(victim) = self.remove(&path) {
                debug!(tier = %self.tier, path = %victim.path(), bytes = victim.size(), "Evicted");
                reclaimed.freed += victim.size();
                reclaimed.victims.push(victim);
            } else {
                error!(tier = %self.tier, path = %path, "Victim ordering references an unknown entry");
                self.order.unregister(&path);
            }

            if let Some(kept) = protected.and_then(|p| self.entries.get(p)) {
                if kept.size() >= self.total_size {
                    break;
                }
            }
        }

        if set_aside {
            if let Some(kept) = protected.and_then(|p| self.entries.get(p)) {
                self.order.register(kept);
            }
        }

        debug!(tier = %self.tier, target, freed = reclaimed.freed, "Bucket eviction pass done");
        reclaimed
    }

    /// Bytes above this tier's capacity.
    #[must_use]
    pub fn overflow(&self) -> u64 {
        self.total_size.saturating_sub(self.capacity)
    }

    /// Byte total and ordering structure agree with the lookup map.
    #[must_use]
    pub fn check_invariants(&self) -> bool {
        let Some(sum) = self
            .entries
            .values()
            .try_fold(0u64, |sum, entry| sum.checked_add(entry.size()))
        else {
            error!(tier = %self.tier, total = self.total_size, "Bucket entry sizes overflow u64");
            return false;
        };
        if sum != self.total_size {
            error!(tier = %self.tier, sum, total = self.total_size, "Bucket size accounting drifted");
            return false;
        }
        if self.entries.len() != self.order.len() {
            error!(
                tier = %self.tier,
                entries = self.entries.len(),
                ordered = self.order.len(),
                "Bucket ordering out of sync with entries"
            );
            return false;
        }
        if let Some(path) = self.entries.keys().find(|p| !self.order.contains(p)) {
            error!(tier = %self.tier, path = %path, "Entry missing from victim ordering");
            return false;
        }
        true
    }

    fn already_resident(&self, path: &str) -> BucketError {
        BucketError::AlreadyResident {
            tier: self.tier,
            path: path.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(entries: &[(&str, u64)]) -> Bucket {
        let mut bucket = Bucket::new(Tier::Single, 100);
        for (path, size) in entries {
            bucket.add(Entry::with_size(*path, *size)).unwrap();
        }
        bucket
    }

    fn victims(reclaimed: &Reclaimed) -> Vec<&str> {
        reclaimed.victims.iter().map(Entry::path).collect()
    }

    #[test]
    fn test_add_tracks_size() {
        let bucket = single(&[("a", 10), ("b", 20)]);
        assert_eq!(bucket.total_size(), 30);
        assert_eq!(bucket.len(), 2);
        assert!(bucket.contains("a"));
        assert!(bucket.check_invariants());
    }

    #[test]
    fn test_add_duplicate_rejected() {
        let mut bucket = single(&[("a", 10)]);
        let err = bucket.add(Entry::with_size("a", 5)).unwrap_err();
        assert_eq!(
            err,
            BucketError::AlreadyResident { tier: Tier::Single, path: "a".into() }
        );
        assert_eq!(bucket.total_size(), 10);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut bucket = single(&[("a", 10)]);
        assert!(bucket.remove("zzz").is_none());
        let removed = bucket.remove("a").unwrap();
        assert_eq!(removed.size(), 10);
        assert_eq!(bucket.total_size(), 0);
        assert!(bucket.check_invariants());
    }

    #[test]
    fn test_renew_adjusts_total_size() {
        let mut bucket = single(&[("a", 10), ("b", 20)]);
        bucket.record_hit_with_size("a", 50).unwrap();
        assert_eq!(bucket.total_size(), 70);
        bucket.record_hit_with_size("b", 5).unwrap();
        assert_eq!(bucket.total_size(), 55);
        assert!(bucket.check_invariants());
    }

    #[test]
    fn test_add_rejects_size_past_u64_max() {
        let mut bucket = single(&[("a", u64::MAX - 5)]);
        let err = bucket.add(Entry::with_size("b", 10)).unwrap_err();
        assert_eq!(
            err,
            BucketError::SizeOverflow { tier: Tier::Single, path: "b".into(), size: 10 }
        );
        assert!(!bucket.contains("b"));
        assert_eq!(bucket.total_size(), u64::MAX - 5);
        assert!(bucket.check_invariants());
    }

    #[test]
    fn test_renew_past_u64_max_rolls_back() {
        let mut bucket = single(&[("a", u64::MAX), ("b", 0)]);
        let err = bucket.record_hit_with_size("b", 1).unwrap_err();
        assert!(matches!(err, BucketError::SizeOverflow { size: 1, .. }));

        let b = bucket.get("b").unwrap();
        assert_eq!(b.size(), 0);
        assert_eq!(b.access_count(), 1);
        assert_eq!(bucket.total_size(), u64::MAX);
        assert!(bucket.check_invariants());

        // Shrinking the big entry makes room again
        bucket.record_hit_with_size("a", 100).unwrap();
        bucket.record_hit_with_size("b", 1).unwrap();
        assert_eq!(bucket.total_size(), 101);
        assert!(bucket.check_invariants());
    }

    #[test]
    fn test_touch_absent_is_error() {
        let mut bucket = single(&[]);
        assert!(matches!(bucket.touch("a"), Err(BucketError::NotResident { .. })));
    }

    #[test]
    fn test_recency_touch_moves_to_back() {
        let mut bucket = single(&[("a", 10), ("b", 10)]);
        assert_eq!(bucket.select_victim().unwrap().path(), "a");
        bucket.touch("a").unwrap();
        assert_eq!(bucket.select_victim().unwrap().path(), "b");
    }

    #[test]
    fn test_frequency_victim_order() {
        let mut bucket = Bucket::new(Tier::Multi, 100);
        bucket.add(Entry::with_size("a", 10)).unwrap();
        bucket.add(Entry::with_size("b", 30)).unwrap();
        bucket.record_hit("a").unwrap();

        // b: count 1, a: count 2
        assert_eq!(bucket.select_victim().unwrap().path(), "b");

        bucket.record_hit("b").unwrap();
        // Equal counts, larger goes first
        assert_eq!(bucket.select_victim().unwrap().path(), "b");
        let order: Vec<_> = bucket.iter().map(Entry::path).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn test_evict_stops_once_target_met() {
        let mut bucket = single(&[("a", 10), ("b", 20), ("c", 30)]);
        let reclaimed = bucket.evict(25);
        assert_eq!(victims(&reclaimed), vec!["a", "b"]);
        assert_eq!(reclaimed.freed, 30);
        assert_eq!(bucket.total_size(), 30);
        assert!(bucket.check_invariants());
    }

    #[test]
    fn test_evict_under_frees_when_bucket_empties() {
        let mut bucket = single(&[("a", 10), ("b", 20)]);
        let reclaimed = bucket.evict(1_000);
        assert_eq!(reclaimed.freed, 30);
        assert!(bucket.is_empty());
        assert_eq!(bucket.total_size(), 0);
    }

    #[test]
    fn test_evict_zero_target_is_noop() {
        let mut bucket = single(&[("a", 10)]);
        let reclaimed = bucket.evict(0);
        assert_eq!(reclaimed.freed, 0);
        assert_eq!(bucket.len(), 1);
    }

    #[test]
    fn test_evict_excluding_skips_protected_victim() {
        let mut bucket = single(&[("a", 10), ("b", 20), ("c", 30)]);
        let reclaimed = bucket.evict_excluding(25, Some("a"));

        assert_eq!(victims(&reclaimed), vec!["b", "c"]);
        assert!(bucket.contains("a"));
        assert_eq!(bucket.total_size(), 10);
        assert!(bucket.check_invariants());
    }

    #[test]
    fn test_evict_excluding_stops_when_only_protected_left() {
        let mut bucket = single(&[("a", 10), ("b", 50)]);
        let reclaimed = bucket.evict_excluding(100, Some("b"));

        assert_eq!(reclaimed.freed, 10);
        assert_eq!(bucket.len(), 1);
        assert!(bucket.contains("b"));
        assert!(bucket.check_invariants());
    }

    #[test]
    fn test_evict_excluding_reinserts_protected_at_back() {
        let mut bucket = single(&[("a", 10), ("b", 10), ("c", 10)]);
        let _ = bucket.evict_excluding(10, Some("a"));

        // a was set aside and re-registered behind c
        let order: Vec<_> = bucket.iter().map(Entry::path).collect();
        assert_eq!(order, vec!["c", "a"]);
    }

    #[test]
    fn test_evict_excluding_absent_protected_behaves_like_evict() {
        let mut bucket = single(&[("a", 10), ("b", 20)]);
        let reclaimed = bucket.evict_excluding(5, Some("zzz"));
        assert_eq!(victims(&reclaimed), vec!["a"]);
    }

    #[test]
    fn test_bucket_overflow() {
        let mut bucket = Bucket::new(Tier::Single, 25);
        assert_eq!(bucket.overflow(), 0);
        bucket.add(Entry::with_size("a", 40)).unwrap();
        assert_eq!(bucket.overflow(), 15);
    }
}
