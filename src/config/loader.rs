//! # Configuration Loader
//!
//! Loads [`ResilienceConfig`] from TOML through the `config` crate. Configuration is
//! always handed in programmatically by the owning pipeline stage: either an explicit
//! file path or an in-memory TOML document. Loading fails fast on any error.

use std::path::Path;
use std::sync::Arc;

use ::config::{Config, File, FileFormat};
use tracing::{debug, info};

use super::error::{ConfigResult, ConfigurationError};
use super::ResilienceConfig;

/// Loaded and validated resilience configuration
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: ResilienceConfig,
    source: String,
}

impl ConfigManager {
    /// Wrap an already-built configuration after validating it
    pub fn from_config(config: ResilienceConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            source: "programmatic".to_string(),
        }))
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Arc<ConfigManager>> {
        let path = path.as_ref();
        let source = path.display().to_string();

        if !path.exists() {
            return Err(ConfigurationError::ConfigFileNotFound { path: source });
        }

        debug!(path = %source, "Loading resilience configuration file");

        let built = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(true))
            .build()
            .map_err(|e| ConfigurationError::LoadError {
                source_name: source.clone(),
                error: e.to_string(),
            })?;

        Self::finish(built, source)
    }

    /// Load configuration from an in-memory TOML document
    pub fn from_toml_str(toml: &str) -> ConfigResult<Arc<ConfigManager>> {
        let source = "inline".to_string();
        let built = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .map_err(|e| ConfigurationError::LoadError {
                source_name: source.clone(),
                error: e.to_string(),
            })?;

        Self::finish(built, source)
    }

    fn finish(built: Config, source: String) -> ConfigResult<Arc<ConfigManager>> {
        let config: ResilienceConfig =
            built
                .try_deserialize()
                .map_err(|e| ConfigurationError::LoadError {
                    source_name: source.clone(),
                    error: e.to_string(),
                })?;

        config.validate()?;

        info!(
            source = %source,
            max_workers = config.work_queue.max_workers,
            max_queue_size = config.work_queue.max_queue_size,
            circuit_breaker_configured = config.circuit_breaker.is_some(),
            "⚙️ Resilience configuration loaded"
        );

        Ok(Arc::new(ConfigManager { config, source }))
    }

    /// Get reference to the loaded configuration
    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    /// Where the configuration came from (file path, `inline`, or `programmatic`)
    pub fn source(&self) -> &str {
        &self.source
    }
}
