/*!
 * Runtime Configuration
 *
 * Worker and memory sizing for a loading session. Defaults come from
 * `core::limits`; the worker count defaults to the logical core count.
 * Environment overrides:
 * - ASSET_RUNTIME_WORKERS: worker threads per task pool
 * - ASSET_RUNTIME_POOL_CAPACITY: allocator pool slots
 * - ASSET_RUNTIME_ARENA_SIZE: starting capacity of per-asset arenas, in bytes
 */

use super::errors::ConfigError;
use super::limits::{
    DEFAULT_ARENA_SIZE, DEFAULT_POOL_CAPACITY, DEFAULT_SCRATCH_SIZE, MAX_BLOCK_SIZE,
    MAX_WORKER_THREADS, SIZE_1K, SIZE_8K,
};
use serde::{Deserialize, Serialize};

pub const ENV_WORKERS: &str = "ASSET_RUNTIME_WORKERS";
pub const ENV_POOL_CAPACITY: &str = "ASSET_RUNTIME_POOL_CAPACITY";
pub const ENV_ARENA_SIZE: &str = "ASSET_RUNTIME_ARENA_SIZE";

/// Runtime sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Worker threads per task pool
    pub workers: usize,
    /// Allocator pool slots (one per loaded asset)
    pub pool_capacity: usize,
    /// Starting capacity of a per-asset arena
    pub arena_size: usize,
    /// Starting capacity of the scratch arena used to tally glTF sections
    pub scratch_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().clamp(1, MAX_WORKER_THREADS),
            pool_capacity: DEFAULT_POOL_CAPACITY,
            arena_size: DEFAULT_ARENA_SIZE,
            scratch_size: DEFAULT_SCRATCH_SIZE,
        }
    }
}

impl RuntimeConfig {
    /// One worker; deterministic ordering for debugging
    pub fn single_threaded() -> Self {
        Self {
            workers: 1,
            ..Self::default()
        }
    }

    /// Small arenas and pool for constrained hosts and tests
    pub fn low_memory() -> Self {
        Self {
            workers: 2,
            pool_capacity: 16,
            arena_size: SIZE_8K,
            scratch_size: SIZE_1K,
        }
    }

    /// Defaults overridden by the environment, validated
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(workers) = env_usize(ENV_WORKERS)? {
            config.workers = workers;
        }
        if let Some(capacity) = env_usize(ENV_POOL_CAPACITY)? {
            config.pool_capacity = capacity;
        }
        if let Some(size) = env_usize(ENV_ARENA_SIZE)? {
            config.arena_size = size;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    pub fn with_arena_size(mut self, size: usize) -> Self {
        self.arena_size = size;
        self
    }

    pub fn with_scratch_size(mut self, size: usize) -> Self {
        self.scratch_size = size;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("workers", self.workers, 1, MAX_WORKER_THREADS)?;
        check_range("pool_capacity", self.pool_capacity, 1, usize::MAX)?;
        check_range("arena_size", self.arena_size, 0, MAX_BLOCK_SIZE)?;
        check_range("scratch_size", self.scratch_size, 0, MAX_BLOCK_SIZE)?;
        Ok(())
    }
}

fn check_range(field: &'static str, value: usize, min: usize, max: usize) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn env_usize(key: &str) -> Result<Option<usize>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}
