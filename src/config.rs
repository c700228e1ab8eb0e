//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// Thresholds that trigger a batch flush.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Flush once this many tasks are pending.
    pub size_threshold: usize,
    /// Flush once this much time has passed since the last flush.
    pub time_threshold_ms: u64,
}

impl BatchConfig {
    /// Time threshold as a [`Duration`].
    pub fn time_threshold(&self) -> Duration {
        Duration::from_millis(self.time_threshold_ms)
    }

    /// Sets the count threshold.
    pub fn with_size_threshold(mut self, size: usize) -> Self {
        self.size_threshold = size;
        self
    }

    /// Sets the time threshold.
    pub fn with_time_threshold(mut self, threshold: Duration) -> Self {
        self.time_threshold_ms = threshold.as_millis() as u64;
        self
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size_threshold: 5,
            time_threshold_ms: 30_000,
        }
    }
}

/// Dispatcher configuration.
///
/// # Examples
///
/// ```
/// use u_dispatch::config::DispatchConfig;
///
/// let config = DispatchConfig::from_json(r#"{"batch": {"size_threshold": 3}}"#).unwrap();
/// assert_eq!(config.batch.size_threshold, 3);
/// assert_eq!(config.max_commit_retries, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Batch flush thresholds.
    pub batch: BatchConfig,
    /// How many times a commit is retried against a fresh snapshot.
    pub max_commit_retries: u32,
    /// Never insert before a vehicle's current (anchor) stop.
    pub protect_anchor: bool,
    /// Evaluate vehicles on the rayon pool during insertion search.
    pub parallel_search: bool,
    /// A vehicle advances when the ETA to its next stop is below this.
    pub eta_advance_threshold: f64,
    /// ETA assumed when the matrix has no duration for the next leg.
    pub default_eta: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch: BatchConfig::default(),
            max_commit_retries: 3,
            protect_anchor: true,
            parallel_search: true,
            eta_advance_threshold: 15.0,
            default_eta: 10.0,
        }
    }
}

impl DispatchConfig {
    /// Parses and validates a JSON configuration; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, DispatchError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| DispatchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.batch.size_threshold == 0 {
            return Err(DispatchError::Config(
                "batch.size_threshold must be at least 1".into(),
            ));
        }
        if self.max_commit_retries == 0 {
            return Err(DispatchError::Config(
                "max_commit_retries must be at least 1".into(),
            ));
        }
        if !self.eta_advance_threshold.is_finite() || !self.default_eta.is_finite() {
            return Err(DispatchError::Config("ETA settings must be finite".into()));
        }
        Ok(())
    }

    /// Sets batch thresholds.
    pub fn with_batch(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    /// Sets the commit retry bound.
    pub fn with_max_commit_retries(mut self, retries: u32) -> Self {
        self.max_commit_retries = retries;
        self
    }

    /// Allows or forbids insertion before the current stop.
    pub fn with_protect_anchor(mut self, protect: bool) -> Self {
        self.protect_anchor = protect;
        self
    }

    /// Enables or disables parallel vehicle evaluation.
    pub fn with_parallel_search(mut self, parallel: bool) -> Self {
        self.parallel_search = parallel;
        self
    }

    /// Sets the ETA threshold used when advancing vehicles.
    pub fn with_eta_advance_threshold(mut self, threshold: f64) -> Self {
        self.eta_advance_threshold = threshold;
        self
    }
}
