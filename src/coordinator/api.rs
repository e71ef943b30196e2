//! Event API: open/read reporting, eviction and removal.
//!
//! - `open()` - Record an open, promoting on the second one
//! - `read()` / `read_range()` - Record a read, then sweep if over the hard watermark
//! - `overflow()` - Bytes a sweep would reclaim right now
//! - `evict()` - Reclaim an explicit number of bytes
//! - `remove()` - Drop a path from whichever tier holds it

use tracing::debug;

use crate::bucket::BucketError;
use crate::entry::Entry;
use crate::metrics::LatencyTimer;

use super::{Access, CacheEngine, EngineError, SweepTrigger, TierState};

/// How a read reports the bytes it touched.
#[derive(Debug, Clone, Copy)]
enum ReadExtent {
    /// Whole-file size as of this read
    Size(u64),
    /// One byte range, coalesced into the entry's extent
    Range { offset: u64, length: u64 },
}

/// Clears the protected path when dropped, including on unwind.
struct ProtectionWindow<'a>(&'a mut TierState);

impl Drop for ProtectionWindow<'_> {
    fn drop(&mut self) {
        self.0.protected = None;
    }
}

impl TierState {
    /// Run `op` with `path` shielded from eviction.
    fn with_protected<T>(&mut self, path: &str, op: impl FnOnce(&mut Self) -> T) -> T {
        self.protected = Some(path.to_owned());
        let window = ProtectionWindow(self);
        op(&mut *window.0)
    }

    fn open(&mut self, path: &str) -> Result<Access, BucketError> {
        if let Some(entry) = self.single.remove(path) {
            let mut promoted = entry.clone();
            promoted.record_hit();
            if let Err(err) = self.multi.add(promoted) {
                self.single.add(entry)?;
                return Err(err);
            }
            Ok(Access::Promoted)
        } else if self.multi.contains(path) {
            self.multi.record_hit(path)?;
            Ok(Access::Hit)
        } else {
            self.single.add(Entry::new(path))?;
            Ok(Access::Miss)
        }
    }

    /// Apply a read, opening `path` first if it isn't resident.
    /// Returns the implicit open's access, if one happened. A rejected read
    /// also undoes its implicit open.
    fn apply_read(&mut self, path: &str, extent: ReadExtent) -> Result<Option<Access>, BucketError> {
        let implicit = match self.tier_of(path) {
            Some(_) => None,
            None => Some(self.open(path)?),
        };

        let bucket = if self.single.contains(path) {
            &mut self.single
        } else {
            &mut self.multi
        };
        let applied = match extent {
            ReadExtent::Size(size) => bucket.record_hit_with_size(path, size).map(|_| ()),
            ReadExtent::Range { offset, length } => {
                bucket.record_hit_with_range(path, offset, length).map(|_| ())
            }
        };
        if let Err(err) = applied {
            if implicit.is_some() {
                self.single.remove(path);
            }
            return Err(err);
        }
        Ok(implicit)
    }
}

impl CacheEngine {
    /// Record that `path` was opened.
    ///
    /// First open places the file in the single-access tier (a miss); the
    /// next one promotes it to the multi-access tier; later ones hit in
    /// place. Opening never triggers a sweep.
    #[tracing::instrument(skip(self))]
    pub fn open(&self, path: &str) -> Result<Access, EngineError> {
        let _timer = LatencyTimer::new("open");

        let mut tiers = self.tiers.lock();
        let access = tiers.with_protected(path, |state| state.open(path));
        self.publish(&tiers);
        if let Ok(access) = &access {
            self.record_access(*access);
        }
        drop(tiers);

        let access = access.map_err(|e| self.reject(e))?;
        debug!(%access, "Open recorded");
        Ok(access)
    }

    /// Record a read of `path` with the file's current `size`.
    ///
    /// An unknown path is opened implicitly. If occupancy then crosses the
    /// hard watermark, a sweep reclaims down to the soft watermark without
    /// touching `path`. Returns the bytes that sweep freed.
    #[tracing::instrument(skip(self))]
    pub fn read(&self, path: &str, size: u64) -> Result<u64, EngineError> {
        let _timer = LatencyTimer::new("read");
        self.read_extent(path, ReadExtent::Size(size))
    }

    /// Like [`read`](Self::read), for `length` bytes at `offset`. The
    /// entry's size becomes the span of all ranges read so far.
    #[tracing::instrument(skip(self))]
    pub fn read_range(&self, path: &str, offset: u64, length: u64) -> Result<u64, EngineError> {
        let _timer = LatencyTimer::new("read");
        self.read_extent(path, ReadExtent::Range { offset, length })
    }

    fn read_extent(&self, path: &str, extent: ReadExtent) -> Result<u64, EngineError> {
        let config = &self.config;

        let mut tiers = self.tiers.lock();
        let result = tiers.with_protected(path, |state| -> Result<_, BucketError> {
            let implicit = state.apply_read(path, extent)?;
            let to_free = state.overflow(config);
            Ok((implicit, state.sweep(to_free, config)))
        });
        self.publish(&tiers);
        if let Ok((Some(access), _)) = &result {
            self.record_access(*access);
        }
        drop(tiers);

        let (implicit, outcome) = result.map_err(|e| self.reject(e))?;
        if let Some(access) = implicit {
            debug!(%access, "Read of unknown path opened it");
        }
        Ok(self.finish_sweep(&outcome, SweepTrigger::Read))
    }

    /// Bytes above the soft watermark once the hard watermark is crossed,
    /// otherwise 0.
    #[must_use]
    pub fn overflow(&self) -> u64 {
        self.tiers.lock().overflow(&self.config)
    }

    /// Reclaim at least `to_free` bytes if that many are evictable.
    ///
    /// The target is split so the tiers end near their configured ratio.
    /// Returns the bytes actually freed, which may fall short.
    #[tracing::instrument(skip(self))]
    pub fn evict(&self, to_free: u64) -> u64 {
        if to_free == 0 {
            return 0;
        }
        let _timer = LatencyTimer::new("evict");

        let mut tiers = self.tiers.lock();
        let outcome = tiers.sweep(to_free, &self.config);
        self.publish(&tiers);
        drop(tiers);

        self.finish_sweep(&outcome, SweepTrigger::Manual)
    }

    /// Sweep the current overflow, measured and reclaimed under one lock.
    /// Returns 0 without sweeping when under the hard watermark.
    pub fn relieve_overflow(&self, trigger: SweepTrigger) -> u64 {
        let mut tiers = self.tiers.lock();
        let to_free = tiers.overflow(&self.config);
        if to_free == 0 {
            return 0;
        }
        let outcome = tiers.sweep(to_free, &self.config);
        self.publish(&tiers);
        drop(tiers);

        self.finish_sweep(&outcome, trigger)
    }

    /// Forget `path`, returning its entry if it was resident.
    #[tracing::instrument(skip(self))]
    pub fn remove(&self, path: &str) -> Option<Entry> {
        let _timer = LatencyTimer::new("remove");

        let mut tiers = self.tiers.lock();
        let removed = match tiers.single.remove(path) {
            Some(entry) => Some(entry),
            None => tiers.multi.remove(path),
        };
        if removed.is_some() {
            self.publish(&tiers);
            debug!(path, "Removed");
        }
        removed
    }
}
