// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the eviction engine.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding process chooses the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `evict_engine_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//! - `_bytes` suffix for size gauges and counters
//!
//! # Labels
//! - `tier`: single, multi
//! - `outcome`: miss, hit, promoted
//! - `trigger`: read, manual, background
//! - `operation`: open, read, evict, remove

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

use crate::bucket::Tier;

/// Record an open (or implicit open) and where it landed
pub fn record_access(tier: Tier, outcome: &'static str) {
    counter!(
        "evict_engine_accesses_total",
        "tier" => tier.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a single-access → multi-access move
pub fn record_promotion() {
    counter!("evict_engine_promotions_total").increment(1);
}

/// Record entries evicted from one tier
pub fn record_eviction(tier: Tier, count: usize, bytes: u64) {
    counter!("evict_engine_evictions_total", "tier" => tier.as_str()).increment(count as u64);
    counter!("evict_engine_evicted_bytes_total", "tier" => tier.as_str()).increment(bytes);
}

/// Record a completed sweep
pub fn record_sweep(trigger: &'static str, freed: u64, duration: Duration) {
    counter!("evict_engine_sweeps_total", "trigger" => trigger).increment(1);
    counter!("evict_engine_swept_bytes_total", "trigger" => trigger).increment(freed);
    histogram!("evict_engine_sweep_seconds", "trigger" => trigger).record(duration.as_secs_f64());
}

/// Record a sweep that ran out of evictable bytes before its target
pub fn record_under_freed(trigger: &'static str) {
    counter!("evict_engine_under_freed_total", "trigger" => trigger).increment(1);
}

/// Set current tier occupancy
pub fn set_tier_usage(tier: Tier, bytes: u64, entries: usize) {
    gauge!("evict_engine_tier_bytes", "tier" => tier.as_str()).set(bytes as f64);
    gauge!("evict_engine_tier_entries", "tier" => tier.as_str()).set(entries as f64);
}

/// Set the lifetime hit rate (0.0 - 1.0)
pub fn set_hit_rate(rate: f64) {
    gauge!("evict_engine_hit_rate").set(rate);
}

/// Record eviction log write failure
pub fn record_log_error() {
    counter!("evict_engine_eviction_log_errors_total").increment(1);
}

/// Record engine operation latency
pub fn record_latency(operation: &'static str, duration: Duration) {
    histogram!("evict_engine_operation_seconds", "operation" => operation)
        .record(duration.as_secs_f64());
}

/// A timing guard that records operation latency on drop
pub struct LatencyTimer {
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.operation, self.start.elapsed());
    }
}
