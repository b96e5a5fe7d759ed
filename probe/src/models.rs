use crate::prober::ProbeError;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Query latency to estimated finality. An approximation, not a measurement.
pub const FINALITY_LATENCY_MULTIPLIER: u64 = 4;

/// RPC endpoint of a node. Position in a list is its fallback priority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(String);

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check that the endpoint is an absolute http(s) URL
    pub fn validate(&self) -> Result<Url, ProbeError> {
        let url = Url::parse(&self.0).map_err(|e| ProbeError::InvalidEndpoint(format!("{}: {}", self.0, e)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ProbeError::InvalidEndpoint(format!("{}: unsupported scheme '{}'", self.0, other))),
        }
    }

    /// URL of an RPC route served by this endpoint
    pub fn route(&self, path: &str) -> Result<Url, ProbeError> {
        self.validate()?;
        let joined = format!("{}/{}", self.0.trim_end_matches('/'), path.trim_start_matches('/'));
        Url::parse(&joined).map_err(|e| ProbeError::InvalidEndpoint(format!("{}: {}", joined, e)))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Endpoint {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for Endpoint {
    fn from(url: String) -> Self {
        Self(url)
    }
}

/// A failed connection attempt against one endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointAttempt {
    pub endpoint: Endpoint,
    pub error: String,
}

impl EndpointAttempt {
    pub fn new(endpoint: Endpoint, error: impl Into<String>) -> Self {
        Self { endpoint, error: error.into() }
    }
}

/// Data read from the node that accepted the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSample {
    pub chain_id: String,
    pub block_height: u64,
    pub query_latency_ms: u64,
}

/// Informal latency targets. Reported on, never enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyTargets {
    pub query_ms: u64,
    pub finality_ms: u64,
}

impl Default for LatencyTargets {
    fn default() -> Self {
        Self { query_ms: 100, finality_ms: 400 }
    }
}

/// How a successful probe compares to the latency targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TargetAssessment {
    pub query_within_target: bool,
    pub finality_within_target: bool,
}

impl TargetAssessment {
    pub fn meets_targets(&self) -> bool {
        self.query_within_target && self.finality_within_target
    }
}

/// Outcome of a single probe run.
///
/// A successful result always carries the chain ID, block height and latency
/// figures; a failed one always carries a non-empty error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProbeResultRecord")]
pub struct ProbeResult {
    success: bool,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint: Option<Endpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chain_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    block_height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    estimated_finality_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    failed_attempts: Vec<EndpointAttempt>,
}

/// Wire form of `ProbeResult`, checked before it becomes one
#[derive(Deserialize)]
struct ProbeResultRecord {
    success: bool,
    timestamp: DateTime<Utc>,
    endpoint: Option<Endpoint>,
    chain_id: Option<String>,
    block_height: Option<u64>,
    query_latency_ms: Option<u64>,
    estimated_finality_ms: Option<u64>,
    error_message: Option<String>,
    #[serde(default)]
    failed_attempts: Vec<EndpointAttempt>,
}

impl TryFrom<ProbeResultRecord> for ProbeResult {
    type Error = String;

    fn try_from(record: ProbeResultRecord) -> Result<Self, Self::Error> {
        let mut result = if record.success {
            if record.error_message.is_some() {
                return Err("successful result carries an error_message".to_string());
            }
            let (Some(endpoint), Some(chain_id), Some(block_height), Some(query_latency_ms)) =
                (record.endpoint, record.chain_id, record.block_height, record.query_latency_ms)
            else {
                return Err("successful result requires endpoint, chain_id, block_height and query_latency_ms".to_string());
            };
            let sample = ChainSample { chain_id, block_height, query_latency_ms };
            let result = Self::connected(endpoint, sample, record.failed_attempts);
            if record.estimated_finality_ms != result.estimated_finality_ms {
                return Err(format!(
                    "estimated_finality_ms must be {} times query_latency_ms",
                    FINALITY_LATENCY_MULTIPLIER
                ));
            }
            result
        } else {
            let has_chain_data = record.endpoint.is_some()
                || record.chain_id.is_some()
                || record.block_height.is_some()
                || record.query_latency_ms.is_some()
                || record.estimated_finality_ms.is_some();
            if has_chain_data {
                return Err("failed result carries chain data".to_string());
            }
            match record.error_message {
                Some(message) if !message.trim().is_empty() => Self::failed(message, record.failed_attempts),
                _ => return Err("failed result requires a non-empty error_message".to_string()),
            }
        };

        result.timestamp = record.timestamp;
        Ok(result)
    }
}

impl ProbeResult {
    /// Result for a node that answered every query
    pub fn connected(endpoint: Endpoint, sample: ChainSample, failed_attempts: Vec<EndpointAttempt>) -> Self {
        Self {
            success: true,
            timestamp: Utc::now(),
            endpoint: Some(endpoint),
            chain_id: Some(sample.chain_id),
            block_height: Some(sample.block_height),
            query_latency_ms: Some(sample.query_latency_ms),
            estimated_finality_ms: Some(sample.query_latency_ms.saturating_mul(FINALITY_LATENCY_MULTIPLIER)),
            error_message: None,
            failed_attempts,
        }
    }

    /// Result for a probe that could not complete
    pub fn failed(error_message: impl Into<String>, failed_attempts: Vec<EndpointAttempt>) -> Self {
        let mut error_message = error_message.into();
        if error_message.trim().is_empty() {
            error_message = "unknown error".to_string();
        }

        Self {
            success: false,
            timestamp: Utc::now(),
            endpoint: None,
            chain_id: None,
            block_height: None,
            query_latency_ms: None,
            estimated_finality_ms: None,
            error_message: Some(error_message),
            failed_attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    pub fn chain_id(&self) -> Option<&str> {
        self.chain_id.as_deref()
    }

    pub fn block_height(&self) -> Option<u64> {
        self.block_height
    }

    pub fn query_latency_ms(&self) -> Option<u64> {
        self.query_latency_ms
    }

    pub fn estimated_finality_ms(&self) -> Option<u64> {
        self.estimated_finality_ms
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Endpoints that refused the connection, in the order they were tried
    pub fn failed_attempts(&self) -> &[EndpointAttempt] {
        &self.failed_attempts
    }

    /// Grade the measured latency against the targets. `None` for failed probes.
    pub fn assess(&self, targets: &LatencyTargets) -> Option<TargetAssessment> {
        let query_latency_ms = self.query_latency_ms?;
        let estimated_finality_ms = self.estimated_finality_ms?;
        Some(TargetAssessment {
            query_within_target: query_latency_ms < targets.query_ms,
            finality_within_target: estimated_finality_ms < targets.finality_ms,
        })
    }
}
