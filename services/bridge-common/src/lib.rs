//! Bridge Common - Shared configuration, errors and logging for the market bridge.
//!
//! This crate provides:
//! - Configuration types and loading (file + `BRIDGE_*` environment overrides)
//! - The unified error type used at startup and in configuration handling
//! - Logging setup with noise filtering

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    CliOverrides, Config, EastmoneyConfig, LoadedConfig, MarketConfig, ObservabilityConfig,
    RetryConfig, ServerConfig, YahooConfig,
};
pub use error::{Error, Result};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::{Config, MarketConfig, ObservabilityConfig};
    pub use crate::error::{Error, Result};
    pub use crate::logging::init_logging;
}
