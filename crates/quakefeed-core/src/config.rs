use std::time::Duration;

use crate::error::AppError;

/// Limits that decide when a pipeline run stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Hard cap on capture/scroll iterations.
    pub max_iterations: u32,
    /// Consecutive stalled iterations tolerated before stopping.
    pub stall_tolerance: u32,
    /// Bound on each scroll/render wait; expiry counts as "no further content".
    pub settle_timeout: Duration,
    /// Stop once this many records have been accepted.
    pub max_records: Option<usize>,
    /// Reload the page every N iterations while under half of `max_records`.
    pub refresh_every: Option<u32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 300,
            stall_tolerance: 15,
            settle_timeout: Duration::from_secs(10),
            max_records: Some(40),
            refresh_every: Some(30),
        }
    }
}

impl PipelineConfig {
    /// Read configuration from environment variables, falling back to defaults.
    ///
    /// - `QUAKEFEED_MAX_ITERATIONS`
    /// - `QUAKEFEED_STALL_TOLERANCE`
    /// - `QUAKEFEED_SETTLE_TIMEOUT_SECS`
    /// - `QUAKEFEED_MAX_RECORDS` (`0` means unlimited)
    /// - `QUAKEFEED_REFRESH_EVERY` (`0` disables)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<L>(lookup: L) -> Result<Self, AppError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_iterations = match lookup("QUAKEFEED_MAX_ITERATIONS") {
            None => defaults.max_iterations,
            Some(raw) => positive("QUAKEFEED_MAX_ITERATIONS", &raw)?,
        };
        let stall_tolerance = match lookup("QUAKEFEED_STALL_TOLERANCE") {
            None => defaults.stall_tolerance,
            Some(raw) => positive("QUAKEFEED_STALL_TOLERANCE", &raw)?,
        };
        let settle_timeout = match lookup("QUAKEFEED_SETTLE_TIMEOUT_SECS") {
            None => defaults.settle_timeout,
            Some(raw) => {
                Duration::from_secs(positive("QUAKEFEED_SETTLE_TIMEOUT_SECS", &raw)?.into())
            }
        };
        let max_records = match lookup("QUAKEFEED_MAX_RECORDS") {
            None => defaults.max_records,
            Some(raw) => match non_negative("QUAKEFEED_MAX_RECORDS", &raw)? {
                0 => None,
                n => Some(n as usize),
            },
        };
        let refresh_every = match lookup("QUAKEFEED_REFRESH_EVERY") {
            None => defaults.refresh_every,
            Some(raw) => match non_negative("QUAKEFEED_REFRESH_EVERY", &raw)? {
                0 => None,
                n => Some(n),
            },
        };

        Ok(Self {
            max_iterations,
            stall_tolerance,
            settle_timeout,
            max_records,
            refresh_every,
        })
    }
}

fn non_negative(name: &str, raw: &str) -> Result<u32, AppError> {
    raw.trim().parse::<u32>().map_err(|_| {
        AppError::ConfigError(format!(
            "Invalid {name} '{raw}': must be a non-negative integer"
        ))
    })
}

fn positive(name: &str, raw: &str) -> Result<u32, AppError> {
    let parsed = non_negative(name, raw)?;
    if parsed == 0 {
        return Err(AppError::ConfigError(format!("{name} must be at least 1")));
    }
    Ok(parsed)
}
