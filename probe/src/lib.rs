// Sei Network Probe - RPC connectivity and latency check
//
// This library provides the components of the Sei connectivity probe, which
// verifies that a Sei node is reachable over its CometBFT RPC interface by:
// 1. Trying each configured RPC endpoint in priority order
// 2. Querying the chain ID and current block height from the first one that answers
// 3. Timing one extra height query to estimate latency and transaction finality
// 4. Rendering a pass/fail report and optional Prometheus metrics

pub mod client;
pub mod config;
pub mod metrics;
pub mod models;
pub mod prober;
pub mod report;

// Re-export commonly used types
pub use client::{ChainClient, CometRpcConnector, Connector};
pub use config::{ConfigError, MetricsConfig, NetworkConfig, ProberConfig, ProbingConfig};
pub use metrics::ProbeMetrics;
pub use models::{Endpoint, EndpointAttempt, LatencyTargets, ProbeResult, TargetAssessment};
pub use prober::{ConnectivityProber, ProbeError};
pub use report::Report;
