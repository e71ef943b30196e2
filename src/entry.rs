// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-file metadata tracked by the cache tiers.

use std::time::{Duration, Instant};

/// Byte range of a file that has been read into the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub offset: u64,
    pub length: u64,
}

impl Extent {
    #[must_use]
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    #[must_use]
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }

    /// Grow this extent to the union span of `self` and `other`.
    pub fn merge(&mut self, other: Extent) {
        let start = self.offset.min(other.offset);
        let end = self.end().max(other.end());
        self.offset = start;
        self.length = end - start;
    }
}

/// Cache metadata for one file path.
///
/// An entry is created on the first open of a path and lives in exactly one
/// tier until it is evicted or removed. Size changes made while the entry is
/// resident must go through its [`Bucket`](crate::bucket::Bucket) so the
/// tier's byte accounting stays in step.
#[derive(Debug, Clone)]
pub struct Entry {
    path: String,
    size: u64,
    access_count: u64,
    last_access: Instant,
    extent: Option<Extent>,
}

impl Entry {
    /// New entry for a first access: zero bytes, one access.
    pub fn new(path: impl Into<String>) -> Self {
        Self::with_size(path, 0)
    }

    pub fn with_size(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
            access_count: 1,
            last_access: Instant::now(),
            extent: None,
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    #[must_use]
    pub fn last_access(&self) -> Instant {
        self.last_access
    }

    #[must_use]
    pub fn extent(&self) -> Option<Extent> {
        self.extent
    }

    /// Time since the last hit.
    #[must_use]
    pub fn idle(&self) -> Duration {
        self.last_access.elapsed()
    }

    pub fn record_hit(&mut self) {
        self.last_access = Instant::now();
        self.access_count = self.access_count.saturating_add(1);
    }

    /// Overwrite the tracked size without counting an access.
    pub fn resize(&mut self, new_size: u64) {
        self.size = new_size;
    }

    pub fn record_hit_with_size(&mut self, new_size: u64) {
        self.record_hit();
        self.resize(new_size);
    }

    /// Count a hit that read `length` bytes at `offset`.
    ///
    /// The range is coalesced into the tracked extent, and the entry's size
    /// becomes the length of the union of every range read so far.
    pub fn record_hit_with_range(&mut self, offset: u64, length: u64) {
        let range = Extent::new(offset, length);
        let extent = match self.extent.as_mut() {
            Some(extent) => {
                extent.merge(range);
                *extent
            }
            None => {
                self.extent = Some(range);
                range
            }
        };
        self.record_hit_with_size(extent.length);
    }
}
