// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shard configuration surface (§4.9 / §6).
//!
//! Loaded once from a TOML file with environment-variable overrides,
//! following the `std::env::var(..).ok().and_then(|s| s.parse().ok())`
//! fallback-chain convention this codebase uses for its daemon config.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, #[source] source: toml::de::Error },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Per-domain overridable knobs from §6, plus the engine-wide
/// `conditional_retry_count`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardConfig {
    pub max_id_length_limit: usize,
    pub blob_size_limit_warn: usize,
    pub blob_size_limit_error: usize,
    pub maximum_signals_per_execution: usize,
    pub max_auto_reset_points: usize,
    pub long_poll_expiration_interval_ms: u64,
    pub enable_events_v2: bool,
    pub num_archive_system_workflows: usize,
    pub archive_request_rps: u32,
    pub conditional_retry_count: u32,
    pub execution_cache_capacity: usize,
    pub execution_lease_timeout_ms: u64,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            max_id_length_limit: 1000,
            blob_size_limit_warn: 256 * 1024,
            blob_size_limit_error: 2 * 1024 * 1024,
            maximum_signals_per_execution: 10_000,
            max_auto_reset_points: 20,
            long_poll_expiration_interval_ms: 20_000,
            enable_events_v2: true,
            num_archive_system_workflows: 1000,
            archive_request_rps: 300,
            conditional_retry_count: 5,
            execution_cache_capacity: 10_000,
            execution_lease_timeout_ms: 5_000,
        }
    }
}

impl ShardConfig {
    /// Load from a TOML file, then apply `WFH_*` environment overrides.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        let mut config: ShardConfig = toml::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus `WFH_*` environment overrides, with no file on disk.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parsed::<usize>("WFH_MAX_ID_LENGTH_LIMIT") {
            self.max_id_length_limit = v;
        }
        if let Some(v) = env_parsed::<usize>("WFH_BLOB_SIZE_LIMIT_WARN") {
            self.blob_size_limit_warn = v;
        }
        if let Some(v) = env_parsed::<usize>("WFH_BLOB_SIZE_LIMIT_ERROR") {
            self.blob_size_limit_error = v;
        }
        if let Some(v) = env_parsed::<usize>("WFH_MAXIMUM_SIGNALS_PER_EXECUTION") {
            self.maximum_signals_per_execution = v;
        }
        if let Some(v) = env_parsed::<usize>("WFH_MAX_AUTO_RESET_POINTS") {
            self.max_auto_reset_points = v;
        }
        if let Some(v) = env_parsed::<u64>("WFH_LONG_POLL_EXPIRATION_INTERVAL_MS") {
            self.long_poll_expiration_interval_ms = v;
        }
        if let Some(v) = env_parsed::<bool>("WFH_ENABLE_EVENTS_V2") {
            self.enable_events_v2 = v;
        }
        if let Some(v) = env_parsed::<u32>("WFH_CONDITIONAL_RETRY_COUNT") {
            self.conditional_retry_count = v;
        }
        if let Some(v) = env_parsed::<usize>("WFH_EXECUTION_CACHE_CAPACITY") {
            self.execution_cache_capacity = v;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.conditional_retry_count == 0 {
            return Err(ConfigError::Invalid("conditional_retry_count must be > 0".into()));
        }
        if self.blob_size_limit_warn > self.blob_size_limit_error {
            return Err(ConfigError::Invalid(
                "blob_size_limit_warn must be <= blob_size_limit_error".into(),
            ));
        }
        if self.execution_cache_capacity == 0 {
            return Err(ConfigError::Invalid("execution_cache_capacity must be > 0".into()));
        }
        Ok(())
    }

    pub fn long_poll_expiration_interval(&self) -> Duration {
        Duration::from_millis(self.long_poll_expiration_interval_ms)
    }

    pub fn execution_lease_timeout(&self) -> Duration {
        Duration::from_millis(self.execution_lease_timeout_ms)
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
