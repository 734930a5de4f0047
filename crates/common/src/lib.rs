//! Shared configuration and logging for the order book workspace.

mod config;
mod logging;

pub use config::{BookConfig, ConfigError};
pub use logging::init_logging;
