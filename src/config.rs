//! TOML configuration loading, overridable by environment variables.
//!
//! Mirrors the teacher's `genesis::config::GenesisConfigToml` pattern: a
//! `serde`-default struct that loads from a partial TOML file, plus a thin
//! environment overlay for the handful of fields worth overriding per
//! deployment without editing a file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The config file's contents were not valid TOML / did not match the schema.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Store backend selection (spec.md §4.3.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// `DashMap`-backed, non-durable. Default for tests and demos.
    Memory,
    /// `sled`-backed, durable.
    Sled,
}

impl Default for StoreBackend {
    fn default() -> Self {
        Self::Memory
    }
}

/// `[store]` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Which `ContractStore` implementation to construct.
    pub backend: StoreBackend,
    /// Directory the `sled` backend opens its database under. Unused for
    /// the in-memory backend.
    pub data_dir: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            data_dir: "./data".to_owned(),
        }
    }
}

/// `[sandbox]` table — defaults for the code-execution strategy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Interpreter invoked by [`crate::adapters::ProcessSandbox`].
    pub interpreter: String,
    /// Timeout used when a descriptor does not specify its own.
    pub default_timeout_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_owned(),
            default_timeout_secs: 30,
        }
    }
}

/// `[semantic]` table — defaults for the semantic (LLM judge) strategy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    /// Model identifier; `"simulated"` selects the offline [`crate::adapters::SimulatedJudge`].
    pub model: String,
    /// Upper bound passed to the judge client.
    pub max_tokens: u32,
    /// Fixed at 0.0 per spec.md §4.4.2; kept configurable for the judge client call.
    pub temperature: f64,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            model: "simulated".to_owned(),
            max_tokens: 1024,
            temperature: 0.0,
        }
    }
}

/// `[escrow]` table — defaults applied by the escrow/verification services.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EscrowConfig {
    /// `max_retries` used for contracts that don't specify their own.
    pub default_max_retries: u32,
    /// Ceiling on `Submission.payload` size, in bytes.
    pub max_payload_bytes: usize,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            default_max_retries: 3,
            max_payload_bytes: 1_048_576,
        }
    }
}

/// Top-level configuration, loaded from TOML with `serde` defaults for
/// every field so a partial (or absent) file is always valid.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Contract/submission/event persistence backend.
    pub store: StoreConfig,
    /// Code-execution strategy defaults.
    pub sandbox: SandboxConfig,
    /// Semantic strategy defaults.
    pub semantic: SemanticConfig,
    /// Escrow lifecycle defaults.
    pub escrow: EscrowConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Apply the handful of environment variable overrides worth
    /// supporting per-deployment without editing the TOML file.
    #[must_use]
    pub fn with_env_overlay(mut self) -> Self {
        if let Ok(backend) = std::env::var("CLEARINGHOUSE_STORE_BACKEND") {
            match backend.to_lowercase().as_str() {
                "sled" => self.store.backend = StoreBackend::Sled,
                "memory" => self.store.backend = StoreBackend::Memory,
                _ => {}
            }
        }
        if let Ok(data_dir) = std::env::var("CLEARINGHOUSE_DATA_DIR") {
            self.store.data_dir = data_dir;
        }
        self
    }
}
