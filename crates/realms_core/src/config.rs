//! # Memory Configuration
//!
//! Pool sizes and placement policies, read once at startup from TOML:
//!
//! ```toml
//! diagnostic_history = 64
//!
//! [components]
//! pool_size = 1048576
//! fit_policy = "first_fit"
//!
//! [meshes]
//! pool_size = 4194304
//! fit_policy = "best_fit"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::memory::{FitPolicy, MIN_ARENA_SIZE};
use crate::registry::Diagnostics;

/// Errors raised while loading a [`MemoryConfig`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {message}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        message: String,
    },

    /// The TOML did not match the expected shape.
    #[error("malformed memory config: {0}")]
    Parse(String),

    /// Well-formed but unusable values.
    #[error("invalid memory config: {0}")]
    Invalid(String),
}

/// Pool for a single registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Bytes requested from the parent allocator at `start`.
    pub pool_size: usize,
    /// Placement policy of the registry's arena.
    #[serde(default)]
    pub fit_policy: FitPolicy,
}

impl RegistryConfig {
    /// First-fit pool of `pool_size` bytes.
    #[must_use]
    pub const fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            fit_policy: FitPolicy::FirstFit,
        }
    }

    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if self.pool_size < MIN_ARENA_SIZE {
            return Err(ConfigError::Invalid(format!(
                "[{section}] pool_size {} is below the minimum of {MIN_ARENA_SIZE} bytes",
                self.pool_size
            )));
        }
        Ok(())
    }
}

/// Memory layout of the engine's registries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Events retained by the shared [`Diagnostics`] sink.
    pub diagnostic_history: usize,
    /// Component manager pool.
    pub components: RegistryConfig,
    /// Mesh register pool.
    pub meshes: RegistryConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            diagnostic_history: Diagnostics::DEFAULT_HISTORY,
            components: RegistryConfig::new(1024 * 1024),
            meshes: RegistryConfig::new(4 * 1024 * 1024),
        }
    }
}

impl MemoryConfig {
    /// Parses and validates a config from TOML text. Missing sections fall
    /// back to [`MemoryConfig::default`].
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed TOML, [`ConfigError::Invalid`]
    /// when validation fails.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a config file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] when the file cannot be read, otherwise as for
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), ?config, "memory config loaded");
        Ok(config)
    }

    /// Checks every pool can hold an arena and the diagnostic history is non-empty.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.diagnostic_history == 0 {
            return Err(ConfigError::Invalid(
                "diagnostic_history must be at least 1".to_string(),
            ));
        }
        self.components.validate("components")?;
        self.meshes.validate("meshes")
    }
}
