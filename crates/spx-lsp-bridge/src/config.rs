//! Bridge configuration
//!
//! Loaded from JSON. Every field has a default, so an empty object is a valid
//! configuration.

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use spx_lsp_core::CANCEL_REQUEST_METHOD;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BridgeConfig {
    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub documents: DocumentConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Worker thread settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WorkerConfig {
    /// Name given to the OS thread that hosts the language server
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

fn default_thread_name() -> String {
    "spxls-worker".to_string()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thread_name: default_thread_name(),
        }
    }
}

/// Document synchronization settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DocumentConfig {
    /// Only files with these extensions are sent to the language server.
    /// Each entry includes the leading dot.
    #[serde(default = "default_synced_extensions")]
    pub synced_extensions: Vec<String>,
}

fn default_synced_extensions() -> Vec<String> {
    vec![".spx".to_string(), ".json".to_string()]
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            synced_extensions: default_synced_extensions(),
        }
    }
}

/// Request correlation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClientConfig {
    /// Notification method sent to the engine when a request is abandoned
    #[serde(default = "default_cancel_method")]
    pub cancel_method: String,

    /// Wrap each request in a tracing span with method, duration and outcome
    #[serde(default = "default_true")]
    pub trace_requests: bool,
}

fn default_cancel_method() -> String {
    CANCEL_REQUEST_METHOD.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cancel_method: default_cancel_method(),
            trace_requests: true,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LoggingConfig {
    /// Level used when RUST_LOG is not set (trace, debug, info, warn, error)
    #[serde(default = "default_level")]
    pub default_level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_level: default_level(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_json_str(&contents)
    }

    /// Parse and validate configuration from JSON text
    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig =
            serde_json::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path.as_ref(), contents).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.thread_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "worker.thread_name cannot be empty".to_string(),
            ));
        }

        if self.client.cancel_method.is_empty() {
            return Err(ConfigError::ValidationError(
                "client.cancel_method cannot be empty".to_string(),
            ));
        }

        for ext in &self.documents.synced_extensions {
            if !ext.starts_with('.') || ext.len() < 2 {
                return Err(ConfigError::ValidationError(format!(
                    "synced extension {ext:?} must start with '.'"
                )));
            }
        }

        if self
            .logging
            .default_level
            .parse::<tracing::Level>()
            .is_err()
        {
            return Err(ConfigError::ValidationError(format!(
                "unknown log level {:?}",
                self.logging.default_level
            )));
        }

        Ok(())
    }

    /// JSON schema of the configuration, for editor tooling
    pub fn json_schema() -> serde_json::Value {
        serde_json::to_value(schema_for!(BridgeConfig)).unwrap_or(serde_json::Value::Null)
    }
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(msg) => write!(f, "IO error: {msg}"),
            ConfigError::ParseError(msg) => write!(f, "Parse error: {msg}"),
            ConfigError::SerializeError(msg) => write!(f, "Serialize error: {msg}"),
            ConfigError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}
