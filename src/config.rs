use std::time::Duration;

use crate::error::{EngineError, Result};

/// Window length used when none (or zero) is configured.
pub const DEFAULT_DURATION_MS: u64 = 60_000;

/// Number of summarized epochs retained when none (or zero) is configured.
pub const DEFAULT_SAMPLE_COUNT: usize = 1;

/// Worker wake-up granularity. Bounds rotation staleness under idle traffic
/// and shutdown latency.
pub const POLL_INTERVAL_MS: u64 = 10;

/// Slots reserved for a metric's first window in an epoch.
pub const INITIAL_WINDOW_CAPACITY: usize = 256;

/// Successor windows reserve `predecessor_len * NUM / DEN` slots.
pub const SUCCESSOR_RESERVE_NUM: usize = 6;
pub const SUCCESSOR_RESERVE_DEN: usize = 5;

/// Engine configuration. Fixed once the engine is initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    duration_ms: u64,
    sample_count: usize,
    poll_interval: Duration,
}

impl EngineConfig {
    /// Zero values fall back to the defaults.
    pub fn new(duration_ms: u64, sample_count: usize) -> Self {
        Self {
            duration_ms: if duration_ms == 0 { DEFAULT_DURATION_MS } else { duration_ms },
            sample_count: if sample_count == 0 { DEFAULT_SAMPLE_COUNT } else { sample_count },
            poll_interval: Duration::from_millis(POLL_INTERVAL_MS),
        }
    }

    /// Whole-second window length, scaled to milliseconds.
    pub fn from_secs(duration_secs: u32, sample_count: u32) -> Self {
        Self::new(u64::from(duration_secs) * 1000, sample_count as usize)
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        if !poll_interval.is_zero() {
            self.poll_interval = poll_interval;
        }
        self
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DURATION_MS, DEFAULT_SAMPLE_COUNT)
    }
}

/// Demo driver settings, read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    /// Window length in whole seconds (EPOCHSTAT_WINDOW_SECS)
    pub window_secs: u32,
    /// Retained summaries (EPOCHSTAT_SAMPLES)
    pub samples: u32,
    /// Submitter threads (EPOCHSTAT_PRODUCERS)
    pub producers: usize,
    /// Periodic report interval; None disables it (EPOCHSTAT_REPORT_SECS)
    pub report_secs: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            window_secs: parse_var("EPOCHSTAT_WINDOW_SECS", 20)?,
            samples: parse_var("EPOCHSTAT_SAMPLES", 2)?,
            producers: parse_var::<usize>("EPOCHSTAT_PRODUCERS", 1)?.max(1),
            report_secs: match std::env::var("EPOCHSTAT_REPORT_SECS") {
                Ok(raw) => Some(parse_value("EPOCHSTAT_REPORT_SECS", &raw)?)
                    .filter(|secs: &u64| *secs > 0),
                Err(_) => None,
            },
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::from_secs(self.window_secs, self.samples)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => parse_value(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| EngineError::Config(format!("{name} must be a non-negative integer, got {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_inputs_normalize_to_defaults() {
        let cfg = EngineConfig::new(0, 0);
        assert_eq!(cfg.duration_ms(), DEFAULT_DURATION_MS);
        assert_eq!(cfg.sample_count(), DEFAULT_SAMPLE_COUNT);
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn seconds_scale_to_millis() {
        let cfg = EngineConfig::from_secs(20, 2);
        assert_eq!(cfg.duration_ms(), 20_000);
        assert_eq!(cfg.sample_count(), 2);
        assert_eq!(EngineConfig::from_secs(0, 3).duration_ms(), DEFAULT_DURATION_MS);
    }

    #[test]
    fn zero_poll_interval_keeps_default() {
        let cfg = EngineConfig::new(100, 1).with_poll_interval(Duration::ZERO);
        assert_eq!(cfg.poll_interval(), Duration::from_millis(POLL_INTERVAL_MS));
        let cfg = cfg.with_poll_interval(Duration::from_millis(2));
        assert_eq!(cfg.poll_interval(), Duration::from_millis(2));
    }

    #[test]
    fn parse_value_rejects_garbage() {
        assert_eq!(parse_value::<u32>("X", " 7 ").unwrap(), 7);
        assert!(matches!(parse_value::<u32>("X", "-1"), Err(EngineError::Config(_))));
    }
}
