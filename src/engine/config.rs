//! Engine configuration.
//!
//! Two knobs govern the kernel: the trampoline depth bound and the
//! capacity of bounded buffers (atomic waiter queues, generator burst
//! budgets). Values come from `Default`, builder methods, a deserialized
//! config file section, or environment overrides.

use serde::Deserialize;

/// Environment variable overriding the trampoline depth bound.
pub const ENV_MAX_DEPTH: &str = "STRAND_MAX_DEPTH";
/// Environment variable overriding the buffer capacity.
pub const ENV_BUFFER_CAPACITY: &str = "STRAND_BUFFER_CAPACITY";

/// Error loading engine configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held a value that did not parse.
    #[error("invalid value {value:?} for {var}")]
    InvalidValue {
        /// The environment variable name.
        var: &'static str,
        /// The offending value.
        value: String,
        /// The underlying parse failure.
        #[source]
        source: std::num::ParseIntError,
    },
    /// A parsed value was outside the accepted range.
    #[error("{var} must be at least {min}, got {got}")]
    OutOfRange {
        /// The environment variable name.
        var: &'static str,
        /// The minimum accepted value.
        min: u64,
        /// The rejected value.
        got: u64,
    },
}

/// Tunable parameters for an [`Engine`](super::Engine).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Maximum synchronous call depth before the trampoline defers to the
    /// next tick.
    pub max_depth: u32,
    /// Capacity of bounded waiter queues and the generator burst budget.
    pub buffer_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 50,
            buffer_capacity: 16,
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the trampoline depth bound.
    ///
    /// # Panics
    ///
    /// Panics if `max_depth` is zero: a zero bound would defer every call
    /// forever.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        assert!(max_depth > 0, "max_depth must be non-zero");
        self.max_depth = max_depth;
        self
    }

    /// Sets the bounded-buffer capacity.
    ///
    /// # Panics
    ///
    /// Panics if `buffer_capacity` is less than two: a single-slot buffer
    /// cannot distinguish "busy" from "full".
    #[must_use]
    pub fn with_buffer_capacity(mut self, buffer_capacity: usize) -> Self {
        assert!(buffer_capacity >= 2, "buffer_capacity must be at least 2");
        self.buffer_capacity = buffer_capacity;
        self
    }

    /// Applies environment overrides on top of this configuration.
    pub fn from_env(mut self) -> Result<Self, ConfigError> {
        if let Some(depth) = read_env(ENV_MAX_DEPTH)? {
            if depth == 0 {
                return Err(ConfigError::OutOfRange {
                    var: ENV_MAX_DEPTH,
                    min: 1,
                    got: 0,
                });
            }
            self.max_depth = u32::try_from(depth).unwrap_or(u32::MAX);
        }
        if let Some(capacity) = read_env(ENV_BUFFER_CAPACITY)? {
            if capacity < 2 {
                return Err(ConfigError::OutOfRange {
                    var: ENV_BUFFER_CAPACITY,
                    min: 2,
                    got: capacity,
                });
            }
            self.buffer_capacity = usize::try_from(capacity).unwrap_or(usize::MAX);
        }
        Ok(self)
    }
}

fn read_env(var: &'static str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|source| ConfigError::InvalidValue {
                var,
                value: raw,
                source,
            }),
        Err(_) => Ok(None),
    }
}
