//! Configuration management for SensorBox
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `SENSORBOX__<section>__<key>`
//!
//! Examples:
//! - `SENSORBOX__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `SENSORBOX__MESSAGING__PREFETCH=4`
//! - `SENSORBOX__TELEMETRY__LOG_FILTER=sensorbox=debug`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/sensorbox.toml`.
//! This can be overridden using the `SENSORBOX_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{Config, MessagingConfig, ServerConfig, TelemetryConfig};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Failed to render configuration: {0}")]
    RenderError(#[from] toml::ser::Error),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
