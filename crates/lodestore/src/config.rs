//! Store construction parameters.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Default maximum number of tracked entries before eviction triggers.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Default share of `capacity` reclaimed by one eviction sweep.
pub const DEFAULT_EVICTION_FRACTION: f64 = 0.2;

/// Configuration for a [`CacheStore`](crate::CacheStore).
///
/// All fields other than `name` carry defaults;
/// [`StoreConfig::validate`] is called by the store constructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store name, used for registry lookup and as a log field. Must be
    /// unique per process if the store is registered.
    pub name: String,

    /// Maximum tracked entries (every state counts, including pending and
    /// errored) before a completed fetch triggers eviction.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Share of `capacity` removed by one eviction sweep, in `(0, 1]`.
    #[serde(default = "default_eviction_fraction")]
    pub eviction_fraction: f64,

    /// Reserved for entry expiry. Accepted but currently has no effect:
    /// entries never expire by age.
    #[serde(default)]
    pub value_timeout: Option<Duration>,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_eviction_fraction() -> f64 {
    DEFAULT_EVICTION_FRACTION
}

impl StoreConfig {
    /// Configuration with default capacity and eviction fraction.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity: DEFAULT_CAPACITY,
            eviction_fraction: DEFAULT_EVICTION_FRACTION,
            value_timeout: None,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_eviction_fraction(mut self, fraction: f64) -> Self {
        self.eviction_fraction = fraction;
        self
    }

    pub fn with_value_timeout(mut self, timeout: Duration) -> Self {
        self.value_timeout = Some(timeout);
        self
    }

    /// Check the configuration for out-of-range values.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CacheError::configuration("store name must not be empty"));
        }
        if self.capacity == 0 {
            return Err(CacheError::configuration("capacity must be at least 1"));
        }
        if !(self.eviction_fraction > 0.0 && self.eviction_fraction <= 1.0) {
            return Err(CacheError::configuration(format!(
                "eviction_fraction must be in (0, 1], got {}",
                self.eviction_fraction
            )));
        }
        Ok(())
    }

    /// Number of entries one eviction sweep removes:
    /// `ceil(capacity * eviction_fraction)`.
    pub fn eviction_quota(&self) -> usize {
        (self.capacity as f64 * self.eviction_fraction).ceil() as usize
    }
}
