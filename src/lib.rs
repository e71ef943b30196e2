//! # Evict Engine
//!
//! A two-tier, watermark-driven eviction engine for file caches.
//!
//! Callers report file **open** and **read** events; the engine tracks each
//! file's size and access history and decides which files to drop once the
//! cache fills up.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    open(path) / read(path, size)            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌───────────────────────────┐      ┌───────────────────────────┐
//! │   Single-access tier      │ 2nd  │   Multi-access tier       │
//! │  • opened once            │ open │  • opened again           │
//! │  • LRU victim order       │ ───▶ │  • LFU victim order       │
//! │  • 25% target share       │      │  • 75% target share       │
//! └───────────────────────────┘      └───────────────────────────┘
//!                              │
//!                 (occupancy > hard watermark)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │   Sweep: reclaim down to the soft watermark, split so the   │
//! │   tiers keep their ratio, never touching the in-flight path │
//! └─────────────────────────────────────────────────────────────┘
//!                              ▲
//!                    (periodic / woken)
//! ┌─────────────────────────────────────────────────────────────┐
//! │               Background evictor (tokio task)               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use evict_engine::{CacheEngine, EngineConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = EngineConfig {
//!         cache_size: 64 * 1024 * 1024,
//!         ..Default::default()
//!     };
//!     let engine = Arc::new(CacheEngine::new(config).expect("valid config"));
//!     let evictor = engine.start_background_evictor();
//!
//!     engine.open("/data/a.bin").expect("open");
//!     engine.read("/data/a.bin", 4096).expect("read");
//!
//!     println!("hit rate: {:?}", engine.hit_rate());
//!
//!     if let Some(evictor) = evictor {
//!         evictor.shutdown().await;
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: The [`CacheEngine`] owning both tiers
//! - [`bucket`]: A size-accounted tier with one victim ordering
//! - [`eviction`]: LRU and LFU victim selectors
//! - [`evictor`]: Periodic background sweep
//! - [`trace`]: Trace file replay
//! - [`eviction_log`]: Optional plain-text eviction log

pub mod config;
pub mod entry;
pub mod eviction;
pub mod bucket;
pub mod coordinator;
pub mod evictor;
pub mod eviction_log;
pub mod metrics;
pub mod trace;

pub use config::{ConfigError, EngineConfig};
pub use entry::{Entry, Extent};
pub use eviction::{FrequencyOrder, OrderPolicy, RecencyOrder, VictimSelector};
pub use bucket::{Bucket, BucketError, Reclaimed, Tier};
pub use coordinator::{Access, CacheEngine, CacheStats, EngineError, ReclaimPlan, SweepTrigger};
pub use evictor::BackgroundEvictor;
pub use eviction_log::EvictionLog;
pub use trace::{ReplayStats, TraceError, TraceEvent};
