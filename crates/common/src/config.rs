//! Order book runtime configuration.
//!
//! Values come from environment variables with defaults for anything unset:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `BOOK_SYMBOL` | `XBT/USD` |
//! | `BOOK_MAX_DEPTH` | `100` |
//! | `BOOK_CHANNEL_CAPACITY` | `1024` |
//! | `BOOK_REPORT_INTERVAL_SECS` | `10` |

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

const SYMBOL_VAR: &str = "BOOK_SYMBOL";
const MAX_DEPTH_VAR: &str = "BOOK_MAX_DEPTH";
const CHANNEL_CAPACITY_VAR: &str = "BOOK_CHANNEL_CAPACITY";
const REPORT_INTERVAL_VAR: &str = "BOOK_REPORT_INTERVAL_SECS";

/// Errors from validating a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max depth must be at least 1")]
    ZeroDepth,

    #[error("channel capacity must be at least 1")]
    ZeroCapacity,

    #[error("report interval must be non-zero")]
    ZeroReportInterval,

    #[error("symbol must not be empty")]
    EmptySymbol,
}

/// Settings for one book and the task that feeds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookConfig {
    /// Instrument the book tracks, used in logs and output.
    pub symbol: String,
    /// Maximum number of levels kept per side.
    pub max_depth: usize,
    /// Bound on queued, not yet merged payloads.
    pub channel_capacity: usize,
    /// How often the reporter logs top-of-book.
    pub report_interval: Duration,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            symbol: "XBT/USD".to_string(),
            max_depth: 100,
            channel_capacity: 1024,
            report_interval: Duration::from_secs(10),
        }
    }
}

impl BookConfig {
    /// Load from the process environment.
    ///
    /// Unparsable values are logged and replaced by their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let symbol = lookup(SYMBOL_VAR)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.symbol);
        let max_depth = parse_or(&lookup, MAX_DEPTH_VAR, defaults.max_depth);
        let channel_capacity = parse_or(&lookup, CHANNEL_CAPACITY_VAR, defaults.channel_capacity);
        let report_interval = parse_or(
            &lookup,
            REPORT_INTERVAL_VAR,
            defaults.report_interval.as_secs(),
        );

        Self {
            symbol,
            max_depth,
            channel_capacity,
            report_interval: Duration::from_secs(report_interval),
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.is_empty() {
            return Err(ConfigError::EmptySymbol);
        }
        if self.max_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.report_interval.is_zero() {
            return Err(ConfigError::ZeroReportInterval);
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key = %key, value = %raw, "invalid config value, using default");
            default
        }),
    }
}
