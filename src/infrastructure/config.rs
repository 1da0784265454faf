//! Configuration loading with hierarchical merging.
//!
//! Precedence (lowest to highest): programmatic defaults, a project-local
//! `entrain.yaml`, then `ENTRAIN_*` environment variables with `__`
//! separating nesting levels (`ENTRAIN_STRATEGY__UPDATE_INTERVAL_MS=10`).
//! Validation runs after the merge and reports every violation at once.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::SwarmConfig;

/// Default project-local configuration file.
const CONFIG_FILE: &str = "entrain.yaml";

/// Environment variable prefix.
const ENV_PREFIX: &str = "ENTRAIN_";

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// The merged configuration failed range validation.
    #[error("configuration validation failed: {}", violations.join("; "))]
    Invalid {
        /// One entry per out-of-range field.
        violations: Vec<String>,
    },
}

/// Loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from defaults, `entrain.yaml`, and the
    /// environment.
    pub fn load() -> Result<SwarmConfig> {
        let config: SwarmConfig = Figment::new()
            .merge(Serialized::defaults(SwarmConfig::default()))
            .merge(Yaml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file (plus defaults beneath).
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<SwarmConfig> {
        let config: SwarmConfig = Figment::new()
            .merge(Serialized::defaults(SwarmConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Run range validation, reporting every violation.
    pub fn validate(config: &SwarmConfig) -> Result<(), ConfigLoadError> {
        let violations = config.validate();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ConfigLoadError::Invalid { violations })
        }
    }
}
