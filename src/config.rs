//! Engine-wide execution settings
//!
//! Grouped and windowed calls read the process-wide [`EngineConfig`] to decide
//! whether to fan work out over rayon's pool.

use std::env;
use std::sync::RwLock;

use lazy_static::lazy_static;
use log::warn;
use serde::Deserialize;

use crate::error::Result;

const ENV_PARALLEL_THRESHOLD: &str = "TABRS_PARALLEL_THRESHOLD";
const ENV_MAX_THREADS: &str = "TABRS_MAX_THREADS";

/// Parallel execution settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum group count before group evaluation runs in parallel
    pub parallel_group_threshold: usize,
    /// Upper bound on worker threads
    pub max_threads: usize,
    /// Whether per-column window scans may run in parallel
    pub parallel_columns: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel_group_threshold: 64,
            max_threads: num_cpus::get(),
            parallel_columns: true,
        }
    }
}

lazy_static! {
    static ref GLOBAL_CONFIG: RwLock<EngineConfig> = RwLock::new(EngineConfig::default());
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the group count at which evaluation goes parallel
    pub fn with_parallel_group_threshold(mut self, threshold: usize) -> Self {
        self.parallel_group_threshold = threshold;
        self
    }

    /// Set the maximum number of threads
    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads.max(1);
        self
    }

    /// Enable or disable parallel column scans
    pub fn with_parallel_columns(mut self, enabled: bool) -> Self {
        self.parallel_columns = enabled;
        self
    }

    /// Parse settings from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        Ok(config.normalized())
    }

    /// Apply `TABRS_*` environment overrides on top of `self`
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(raw) = env::var(ENV_PARALLEL_THRESHOLD) {
            match raw.trim().parse::<usize>() {
                Ok(v) => self.parallel_group_threshold = v,
                Err(_) => warn!(
                    "ignoring {}={:?}: not a non-negative integer",
                    ENV_PARALLEL_THRESHOLD, raw
                ),
            }
        }
        if let Ok(raw) = env::var(ENV_MAX_THREADS) {
            match raw.trim().parse::<usize>() {
                Ok(v) if v > 0 => self.max_threads = v,
                _ => warn!(
                    "ignoring {}={:?}: expected a positive integer",
                    ENV_MAX_THREADS, raw
                ),
            }
        }
        self
    }

    /// Whether `groups` groups should be evaluated on the thread pool
    pub fn parallel_for(&self, groups: usize) -> bool {
        self.max_threads > 1 && groups >= self.parallel_group_threshold
    }

    fn normalized(mut self) -> Self {
        if self.max_threads == 0 {
            warn!("max_threads = 0 is invalid, falling back to {}", num_cpus::get());
            self.max_threads = num_cpus::get();
        }
        self
    }
}

/// Snapshot of the process-wide configuration
pub fn global() -> EngineConfig {
    match GLOBAL_CONFIG.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Replace the process-wide configuration
pub fn set_global(config: EngineConfig) {
    let config = config.normalized();
    match GLOBAL_CONFIG.write() {
        Ok(mut guard) => *guard = config,
        Err(poisoned) => *poisoned.into_inner() = config,
    }
}

/// Run `f` with at most `max_threads` rayon workers
pub(crate) fn install<R: Send>(config: &EngineConfig, f: impl FnOnce() -> R + Send) -> R {
    if config.max_threads >= rayon::current_num_threads() {
        return f();
    }
    match rayon::ThreadPoolBuilder::new()
        .num_threads(config.max_threads)
        .build()
    {
        Ok(pool) => pool.install(f),
        Err(err) => {
            warn!("could not build a {}-thread pool: {}", config.max_threads, err);
            f()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_keeps_defaults_for_missing_keys() {
        let config = EngineConfig::from_toml_str("parallel_group_threshold = 8").unwrap();
        assert_eq!(config.parallel_group_threshold, 8);
        assert_eq!(config.max_threads, num_cpus::get());
        assert!(config.parallel_columns);
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        let err = EngineConfig::from_toml_str("max_threads = \"many\"").unwrap_err();
        assert!(matches!(err, crate::error::Error::Config(_)));
    }

    #[test]
    fn single_thread_never_goes_parallel() {
        let config = EngineConfig::new()
            .with_max_threads(1)
            .with_parallel_group_threshold(0);
        assert!(!config.parallel_for(1000));
    }
}
