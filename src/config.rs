//! Configuration for the eviction engine.
//!
//! # Example
//!
//! ```
//! use evict_engine::EngineConfig;
//!
//! // Defaults (1 GiB, 25/75 tier split, 80%/90% watermarks)
//! let config = EngineConfig::default();
//! assert_eq!(config.cache_size, 1024 * 1024 * 1024);
//! assert!(config.validate().is_ok());
//!
//! // Small cache with the background evictor off
//! let config = EngineConfig {
//!     cache_size: 100,
//!     background_evictor: false,
//!     ..Default::default()
//! };
//! assert_eq!(config.hard_max_bytes(), 90);
//! assert_eq!(config.soft_max_bytes(), 80);
//! ```

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Tolerance for `single_factor + multi_factor == 1.0`.
const FACTOR_SUM_EPSILON: f64 = 1e-6;

/// Rejected configuration. No engine is built from a config that fails
/// [`EngineConfig::validate`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("tier factors must sum to 1.0, got {single} + {multi}")]
    FactorSum { single: f64, multi: f64 },
    #[error("{name} must be within [0, 1], got {value}")]
    OutOfRange { name: &'static str, value: f64 },
    #[error("min_fill_rate must be within [0, 1), got {0}")]
    MinFillRate(f64),
    #[error("evictor_interval_ms must be positive when the background evictor is enabled")]
    ZeroInterval,
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Configuration for the eviction engine.
///
/// All fields have defaults, so a partial JSON document is enough.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Total byte budget (default: 1 GiB)
    #[serde(default = "default_cache_size")]
    pub cache_size: u64,

    /// Target share of `cache_size` for the single-access tier
    #[serde(default = "default_single_factor")]
    pub single_factor: f64,
    /// Target share of `cache_size` for the multi-access tier
    #[serde(default = "default_multi_factor")]
    pub multi_factor: f64,

    /// Fill watermarks, as fractions of `cache_size`.
    /// Crossing `hard_fill_rate` reclaims down to `soft_fill_rate`.
    #[serde(default = "default_min_fill_rate")]
    pub min_fill_rate: f64,
    #[serde(default = "default_soft_fill_rate")]
    pub soft_fill_rate: f64,
    #[serde(default = "default_hard_fill_rate")]
    pub hard_fill_rate: f64,

    /// Run the periodic background sweep
    #[serde(default = "default_background_evictor")]
    pub background_evictor: bool,
    #[serde(default = "default_evictor_interval_ms")]
    pub evictor_interval_ms: u64,

    /// Plain-text eviction log file (disabled when unset)
    #[serde(default)]
    pub eviction_log: Option<String>,
}

fn default_cache_size() -> u64 { 1024 * 1024 * 1024 } // 1 GiB
fn default_single_factor() -> f64 { 0.25 }
fn default_multi_factor() -> f64 { 0.75 }
fn default_min_fill_rate() -> f64 { 0.1 }
fn default_soft_fill_rate() -> f64 { 0.8 }
fn default_hard_fill_rate() -> f64 { 0.9 }
fn default_background_evictor() -> bool { true }
fn default_evictor_interval_ms() -> u64 { 10_000 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_size: default_cache_size(),
            single_factor: default_single_factor(),
            multi_factor: default_multi_factor(),
            min_fill_rate: default_min_fill_rate(),
            soft_fill_rate: default_soft_fill_rate(),
            hard_fill_rate: default_hard_fill_rate(),
            background_evictor: default_background_evictor(),
            evictor_interval_ms: default_evictor_interval_ms(),
            eviction_log: None,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_range("single_factor", self.single_factor)?;
        unit_range("multi_factor", self.multi_factor)?;
        if (self.single_factor + self.multi_factor - 1.0).abs() > FACTOR_SUM_EPSILON {
            return Err(ConfigError::FactorSum {
                single: self.single_factor,
                multi: self.multi_factor,
            });
        }
        unit_range("soft_fill_rate", self.soft_fill_rate)?;
        unit_range("hard_fill_rate", self.hard_fill_rate)?;
        if !(0.0..1.0).contains(&self.min_fill_rate) {
            return Err(ConfigError::MinFillRate(self.min_fill_rate));
        }
        if self.background_evictor && self.evictor_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }

    #[must_use]
    pub fn single_capacity(&self) -> u64 {
        fraction_of(self.cache_size, self.single_factor)
    }

    #[must_use]
    pub fn multi_capacity(&self) -> u64 {
        fraction_of(self.cache_size, self.multi_factor)
    }

    /// Occupancy above which a sweep is triggered.
    #[must_use]
    pub fn hard_max_bytes(&self) -> u64 {
        fraction_of(self.cache_size, self.hard_fill_rate)
    }

    /// Occupancy a triggered sweep reclaims down to.
    #[must_use]
    pub fn soft_max_bytes(&self) -> u64 {
        fraction_of(self.cache_size, self.soft_fill_rate)
    }

    #[must_use]
    pub fn min_fill_bytes(&self) -> u64 {
        fraction_of(self.cache_size, self.min_fill_rate)
    }

    /// Bytes to reclaim at `occupancy`: nothing up to the hard watermark,
    /// everything above the soft watermark once it is crossed.
    #[must_use]
    pub fn overflow_at(&self, occupancy: u64) -> u64 {
        if occupancy > self.hard_max_bytes() {
            occupancy.saturating_sub(self.soft_max_bytes())
        } else {
            0
        }
    }

    #[must_use]
    pub fn evictor_interval(&self) -> Duration {
        Duration::from_millis(self.evictor_interval_ms)
    }
}

fn unit_range(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { name, value })
    }
}

/// `⌊bytes × fraction⌋`
fn fraction_of(bytes: u64, fraction: f64) -> u64 {
    (bytes as f64 * fraction) as u64
}
