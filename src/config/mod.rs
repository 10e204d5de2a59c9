//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions (Config, DispatcherConfig, PromptConfig, LoggingConfig)
//! - [`defaults`]: serde default functions
//! - [`validation`]: startup validation collecting every problem at once

mod defaults;
mod types;
pub mod validation;

pub use types::{
    Config, ConfigError, DispatcherConfig, LoggingConfig, PromptConfig, SplitStrategy,
};
pub use validation::{ValidationError, validate};
