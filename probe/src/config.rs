use crate::models::{Endpoint, LatencyTargets};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Complete configuration for the probe
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProberConfig {
    /// Target network and its RPC endpoints
    #[serde(default)]
    pub network: NetworkConfig,

    /// Probing configuration
    #[serde(default)]
    pub probing: ProbingConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Human readable network name, used in the report header
    #[serde(default = "default_network_name")]
    pub name: String,

    /// RPC endpoints, in fallback priority order
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbingConfig {
    /// Timeout applied to every RPC request (milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,

    /// Informal target for a single query round trip (milliseconds)
    #[serde(default = "default_query_target_ms")]
    pub query_target_ms: u64,

    /// Informal target for estimated transaction finality (milliseconds)
    #[serde(default = "default_finality_target_ms")]
    pub finality_target_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Write Prometheus metrics after the probe completes
    #[serde(default)]
    pub enabled: bool,

    /// Textfile collector output path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}

// Default value functions
fn default_network_name() -> String {
    "sei-testnet".to_string()
}

fn default_endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::from("https://rpc.sei-testnet.com"),
        Endpoint::from("https://sei-testnet-rpc.polkachu.com"),
        Endpoint::from("https://sei-testnet.rpc.kjnodes.com"),
    ]
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_query_target_ms() -> u64 {
    100
}

fn default_finality_target_ms() -> u64 {
    400
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: default_network_name(),
            endpoints: default_endpoints(),
        }
    }
}

impl Default for ProbingConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_request_timeout_ms(),
            query_target_ms: default_query_target_ms(),
            finality_target_ms: default_finality_target_ms(),
        }
    }
}

impl ProbingConfig {
    /// Latency targets the report grades the probe against
    pub fn targets(&self) -> LatencyTargets {
        LatencyTargets {
            query_ms: self.query_target_ms,
            finality_ms: self.finality_target_ms,
        }
    }
}

impl ProberConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: ProberConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.name.trim().is_empty() {
            return Err(ConfigError::ValidationError("network name cannot be empty".to_string()));
        }

        if self.network.endpoints.is_empty() {
            return Err(ConfigError::ValidationError("at least one endpoint is required".to_string()));
        }

        for endpoint in &self.network.endpoints {
            endpoint
                .validate()
                .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        }

        if self.probing.timeout_ms == 0 {
            return Err(ConfigError::ValidationError("request timeout must be > 0".to_string()));
        }

        if self.metrics.enabled && self.metrics.output_path.is_none() {
            return Err(ConfigError::ValidationError("metrics output_path required when metrics are enabled".to_string()));
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ValidationError(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Create a default configuration file
    pub fn create_default_config_file(path: &Path) -> Result<(), ConfigError> {
        let default = Self::default();
        default.save_to_file(path)
    }
}
