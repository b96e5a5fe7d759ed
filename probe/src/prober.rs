use crate::client::{ChainClient, Connector};
use crate::metrics::ProbeMetrics;
use crate::models::{ChainSample, Endpoint, EndpointAttempt, ProbeResult};
use log::{debug, info, warn};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Connection timeout")]
    Timeout,

    #[error("Connection refused")]
    ConnectionRefused,

    #[error("DNS resolution failed: {0}")]
    Dns(String),

    #[error("Unexpected HTTP status {0}")]
    Http(u16),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("no endpoints configured")]
    NoEndpoints,
}

impl ProbeError {
    /// Stable label for metrics
    pub fn error_type(&self) -> &'static str {
        match self {
            ProbeError::Timeout => "timeout",
            ProbeError::ConnectionRefused => "connection_refused",
            ProbeError::Dns(_) => "dns",
            ProbeError::Http(_) => "http_status",
            ProbeError::Transport(_) => "transport",
            ProbeError::Protocol(_) => "protocol",
            ProbeError::InvalidEndpoint(_) => "invalid_endpoint",
            ProbeError::NoEndpoints => "no_endpoints",
        }
    }
}

/// Walks an endpoint list until one node answers, then samples chain data from it
pub struct ConnectivityProber<C> {
    connector: C,
    metrics: Option<Arc<ProbeMetrics>>,
}

impl<C: Connector> ConnectivityProber<C> {
    /// Create a new prober over a connector
    pub fn new(connector: C) -> Self {
        Self { connector, metrics: None }
    }

    /// Create prober with metrics
    pub fn with_metrics(connector: C, metrics: Arc<ProbeMetrics>) -> Self {
        Self { connector, metrics: Some(metrics) }
    }

    /// Probe the endpoints in priority order.
    ///
    /// Only connection failures fall through to the next endpoint. Once a node
    /// accepts the connection, any query error ends the probe as a failure.
    pub async fn probe(&self, endpoints: &[Endpoint]) -> ProbeResult {
        let result = self.run(endpoints).await;

        if let Some(ref metrics) = self.metrics {
            metrics.record_outcome(&result);
        }

        result
    }

    async fn run(&self, endpoints: &[Endpoint]) -> ProbeResult {
        if endpoints.is_empty() {
            return ProbeResult::failed(ProbeError::NoEndpoints.to_string(), Vec::new());
        }

        let mut failed_attempts = Vec::new();
        let mut connected = None;

        for endpoint in endpoints {
            info!("Trying endpoint: {}", endpoint);

            match self.connector.connect(endpoint).await {
                Ok(client) => {
                    info!("Connected successfully to: {}", endpoint);
                    self.record_attempt(None);
                    connected = Some((endpoint, client));
                    break;
                }
                Err(e) => {
                    warn!("Failed to connect to: {} - {}", endpoint, e);
                    self.record_attempt(Some(&e));
                    failed_attempts.push(EndpointAttempt::new(endpoint.clone(), e.to_string()));
                }
            }
        }

        let Some((endpoint, client)) = connected else {
            let last_error = failed_attempts.last().map(|a| a.error.as_str()).unwrap_or_default();
            let message = format!("all {} endpoints failed; last error: {}", endpoints.len(), last_error);
            return ProbeResult::failed(message, failed_attempts);
        };

        match self.sample(client.as_ref()).await {
            Ok(sample) => {
                info!(
                    "Chain {} at height {} via {} ({}ms query)",
                    sample.chain_id, sample.block_height, endpoint, sample.query_latency_ms
                );
                ProbeResult::connected(endpoint.clone(), sample, failed_attempts)
            }
            Err(e) => {
                warn!("Query against {} failed: {}", endpoint, e);
                ProbeResult::failed(e.to_string(), failed_attempts)
            }
        }
    }

    /// Read chain ID and height, then time one more height query
    async fn sample(&self, client: &dyn ChainClient) -> Result<ChainSample, ProbeError> {
        let chain_id = client.chain_id().await?;
        let block_height = client.height().await?;
        debug!("Chain ID {} reported height {}", chain_id, block_height);

        let start = Instant::now();
        client.height().await?;
        let query_latency_ms = start.elapsed().as_millis() as u64;

        if let Some(ref metrics) = self.metrics {
            metrics.record_query_latency(query_latency_ms as f64 / 1000.0);
        }

        Ok(ChainSample {
            chain_id,
            block_height,
            query_latency_ms,
        })
    }

    fn record_attempt(&self, error: Option<&ProbeError>) {
        if let Some(ref metrics) = self.metrics {
            metrics.record_attempt(error.map(ProbeError::error_type));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Clone)]
    struct FakeNode {
        chain_id: String,
        height: u64,
        latency: Duration,
        fail_queries: bool,
    }

    impl FakeNode {
        fn new(chain_id: &str, height: u64, latency_ms: u64) -> Self {
            Self {
                chain_id: chain_id.to_string(),
                height,
                latency: Duration::from_millis(latency_ms),
                fail_queries: false,
            }
        }
    }

    struct FakeClient {
        node: FakeNode,
    }

    #[async_trait]
    impl ChainClient for FakeClient {
        async fn chain_id(&self) -> Result<String, ProbeError> {
            tokio::time::sleep(self.node.latency).await;
            Ok(self.node.chain_id.clone())
        }

        async fn height(&self) -> Result<u64, ProbeError> {
            tokio::time::sleep(self.node.latency).await;
            if self.node.fail_queries {
                return Err(ProbeError::Protocol("status response missing result".to_string()));
            }
            Ok(self.node.height)
        }
    }

    /// Nodes not registered behave like hosts that do not resolve
    #[derive(Default)]
    struct FakeConnector {
        nodes: HashMap<String, FakeNode>,
        attempted: Mutex<Vec<String>>,
    }

    impl FakeConnector {
        fn with_node(mut self, endpoint: &str, node: FakeNode) -> Self {
            self.nodes.insert(endpoint.to_string(), node);
            self
        }

        fn attempted(&self) -> Vec<String> {
            self.attempted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn ChainClient>, ProbeError> {
            self.attempted.lock().unwrap().push(endpoint.to_string());
            match self.nodes.get(endpoint.as_str()) {
                Some(node) => Ok(Box::new(FakeClient { node: node.clone() })),
                None => Err(ProbeError::Dns(format!("failed to lookup address information for {}", endpoint))),
            }
        }
    }

    fn endpoints(urls: &[&str]) -> Vec<Endpoint> {
        urls.iter().map(|url| Endpoint::from(*url)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_good_host() {
        let connector = FakeConnector::default().with_node("good-host", FakeNode::new("test-1", 100, 50));
        let prober = ConnectivityProber::new(connector);

        let result = prober.probe(&endpoints(&["good-host"])).await;

        assert!(result.is_success());
        assert_eq!(result.chain_id(), Some("test-1"));
        assert_eq!(result.block_height(), Some(100));
        assert_eq!(result.query_latency_ms(), Some(50));
        assert_eq!(result.estimated_finality_ms(), Some(200));
        assert_eq!(result.error_message(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_reachable_endpoint_wins() {
        let connector = FakeConnector::default()
            .with_node("first", FakeNode::new("chain-a", 10, 5))
            .with_node("second", FakeNode::new("chain-b", 20, 5));
        let prober = ConnectivityProber::new(connector);

        let result = prober.probe(&endpoints(&["first", "second"])).await;

        assert!(result.is_success());
        assert_eq!(result.chain_id(), Some("chain-a"));
        assert_eq!(prober.connector.attempted(), vec!["first".to_string()]);
        assert!(result.failed_attempts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_back_to_second_endpoint() {
        let connector = FakeConnector::default().with_node("good-host", FakeNode::new("atlantic-2", 777, 20));
        let prober = ConnectivityProber::new(connector);

        let result = prober.probe(&endpoints(&["bad-host-1", "good-host"])).await;

        assert!(result.is_success());
        assert_eq!(result.chain_id(), Some("atlantic-2"));
        assert_eq!(result.block_height(), Some(777));
        assert_eq!(result.endpoint().map(Endpoint::as_str), Some("good-host"));
        assert_eq!(result.failed_attempts().len(), 1);
        assert_eq!(result.failed_attempts()[0].endpoint.as_str(), "bad-host-1");
        assert_eq!(prober.connector.attempted(), vec!["bad-host-1".to_string(), "good-host".to_string()]);
    }

    #[tokio::test]
    async fn test_all_endpoints_unreachable() {
        let prober = ConnectivityProber::new(FakeConnector::default());

        let result = prober.probe(&endpoints(&["bad-host-1", "bad-host-2"])).await;

        assert!(!result.is_success());
        let message = result.error_message().unwrap();
        assert!(message.starts_with("all 2 endpoints failed"));
        assert!(message.contains("bad-host-2"));
        assert_eq!(result.failed_attempts().len(), 2);
        assert_eq!(result.chain_id(), None);
        assert_eq!(prober.connector.attempted().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_failure_after_connect_is_fatal() {
        let mut broken = FakeNode::new("chain-a", 10, 5);
        broken.fail_queries = true;
        let connector = FakeConnector::default()
            .with_node("broken", broken)
            .with_node("healthy", FakeNode::new("chain-b", 20, 5));
        let prober = ConnectivityProber::new(connector);

        let result = prober.probe(&endpoints(&["broken", "healthy"])).await;

        assert!(!result.is_success());
        assert_eq!(result.error_message(), Some("Protocol error: status response missing result"));
        assert_eq!(prober.connector.attempted(), vec!["broken".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_endpoint_list() {
        let prober = ConnectivityProber::new(FakeConnector::default());

        let result = prober.probe(&[]).await;

        assert!(!result.is_success());
        assert_eq!(result.error_message(), Some("no endpoints configured"));
        assert!(prober.connector.attempted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_metrics_recorded() {
        let metrics = Arc::new(ProbeMetrics::new().unwrap());
        let connector = FakeConnector::default().with_node("good-host", FakeNode::new("test-1", 100, 50));
        let prober = ConnectivityProber::with_metrics(connector, metrics.clone());

        let result = prober.probe(&endpoints(&["bad-host-1", "good-host"])).await;
        assert!(result.is_success());

        assert_eq!(metrics.endpoint_attempts_total.with_label_values(&["success"]).get(), 1);
        assert_eq!(metrics.endpoint_attempts_total.with_label_values(&["failure"]).get(), 1);
        assert_eq!(metrics.connection_errors_total.with_label_values(&["dns"]).get(), 1);
        assert_eq!(metrics.probe_success.get(), 1);
        assert_eq!(metrics.block_height.get(), 100);
        assert_eq!(metrics.estimated_finality_ms.get(), 200);
        assert_eq!(metrics.query_latency.get_sample_count(), 1);
    }

    #[test]
    fn test_error_types() {
        assert_eq!(ProbeError::Timeout.error_type(), "timeout");
        assert_eq!(ProbeError::ConnectionRefused.error_type(), "connection_refused");
        assert_eq!(ProbeError::Http(503).error_type(), "http_status");
        assert_eq!(ProbeError::Http(503).to_string(), "Unexpected HTTP status 503");
        assert_eq!(ProbeError::NoEndpoints.error_type(), "no_endpoints");
    }
}
