//! RPC client for CometBFT nodes.
//!
//! Sei exposes the standard CometBFT JSON-RPC interface. Chain ID and height are both read
//! from the `/status` route, the same call used to establish that a node is reachable.

use crate::config::ProbingConfig;
use crate::models::Endpoint;
use crate::prober::ProbeError;
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::error::Error as StdError;
use std::time::Duration;

const STATUS_ROUTE: &str = "status";

/// Read-only queries against a connected node
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Identifier of the network the node serves
    async fn chain_id(&self) -> Result<String, ProbeError>;

    /// Latest committed block height
    async fn height(&self) -> Result<u64, ProbeError>;
}

/// Opens client connections to endpoints
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn ChainClient>, ProbeError>;
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResult {
    node_info: NodeInfo,
    sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
struct NodeInfo {
    network: String,
}

#[derive(Debug, Deserialize)]
struct SyncInfo {
    latest_block_height: String,
}

impl<T> RpcEnvelope<T> {
    fn into_result(self) -> Result<T, ProbeError> {
        if let Some(err) = self.error {
            let detail = err.data.map(|d| format!(" ({})", d)).unwrap_or_default();
            return Err(ProbeError::Protocol(format!("rpc error {}: {}{}", err.code, err.message, detail)));
        }
        self.result
            .ok_or_else(|| ProbeError::Protocol("status response missing result".to_string()))
    }
}

impl StatusResult {
    fn height(&self) -> Result<u64, ProbeError> {
        self.sync_info
            .latest_block_height
            .parse()
            .map_err(|_| ProbeError::Protocol(format!("invalid block height '{}'", self.sync_info.latest_block_height)))
    }
}

/// Map a reqwest failure onto the probe's error kinds
fn classify_transport_error(err: reqwest::Error) -> ProbeError {
    if err.is_timeout() {
        return ProbeError::Timeout;
    }

    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::ConnectionRefused => return ProbeError::ConnectionRefused,
                std::io::ErrorKind::TimedOut => return ProbeError::Timeout,
                _ => {}
            }
        }

        let text = cause.to_string();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return ProbeError::Dns(root_cause(cause));
        }

        source = cause.source();
    }

    ProbeError::Transport(err.to_string())
}

/// Message of the deepest error in a source chain
fn root_cause(err: &(dyn StdError + 'static)) -> String {
    let mut cause = err;
    while let Some(inner) = cause.source() {
        cause = inner;
    }
    cause.to_string()
}

async fn fetch_status(http: &Client, url: &Url) -> Result<StatusResult, ProbeError> {
    let response = http
        .get(url.clone())
        .send()
        .await
        .map_err(classify_transport_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProbeError::Http(status.as_u16()));
    }

    let body = response.bytes().await.map_err(classify_transport_error)?;
    let envelope: RpcEnvelope<StatusResult> = serde_json::from_slice(&body)
        .map_err(|e| ProbeError::Protocol(format!("invalid status response: {}", e)))?;
    envelope.into_result()
}

/// Client bound to one CometBFT RPC endpoint
pub struct CometRpcClient {
    http: Client,
    status_url: Url,
}

#[async_trait]
impl ChainClient for CometRpcClient {
    async fn chain_id(&self) -> Result<String, ProbeError> {
        let status = fetch_status(&self.http, &self.status_url).await?;
        Ok(status.node_info.network)
    }

    async fn height(&self) -> Result<u64, ProbeError> {
        fetch_status(&self.http, &self.status_url).await?.height()
    }
}

/// Connects to CometBFT endpoints over HTTP(S)
#[derive(Clone)]
pub struct CometRpcConnector {
    http: Client,
}

impl CometRpcConnector {
    /// Create a connector whose requests time out per the probing config
    pub fn new(config: &ProbingConfig) -> Result<Self, ProbeError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(concat!("sei-probe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        Ok(Self { http })
    }
}

#[async_trait]
impl Connector for CometRpcConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn ChainClient>, ProbeError> {
        let status_url = endpoint.route(STATUS_ROUTE)?;

        // A node counts as connected once it answers a status query
        let status = fetch_status(&self.http, &status_url).await?;
        debug!("{} serves {} (height {})", endpoint, status.node_info.network, status.sync_info.latest_block_height);

        Ok(Box::new(CometRpcClient {
            http: self.http.clone(),
            status_url,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS_BODY: &str = r#"{
        "jsonrpc": "2.0",
        "id": -1,
        "result": {
            "node_info": {"network": "atlantic-2", "version": "0.38.6", "moniker": "polkachu"},
            "sync_info": {"latest_block_height": "187654321", "catching_up": false}
        }
    }"#;

    #[test]
    fn test_parse_status_response() {
        let envelope: RpcEnvelope<StatusResult> = serde_json::from_str(STATUS_BODY).unwrap();
        let status = envelope.into_result().unwrap();
        assert_eq!(status.node_info.network, "atlantic-2");
        assert_eq!(status.height().unwrap(), 187_654_321);
    }

    #[test]
    fn test_rpc_error_is_protocol_error() {
        let body = r#"{"jsonrpc":"2.0","id":-1,"error":{"code":-32601,"message":"Method not found","data":"status"}}"#;
        let envelope: RpcEnvelope<StatusResult> = serde_json::from_str(body).unwrap();
        match envelope.into_result() {
            Err(ProbeError::Protocol(msg)) => assert_eq!(msg, "rpc error -32601: Method not found (status)"),
            other => panic!("unexpected result: {:?}", other.map(|s| s.node_info.network)),
        }
    }

    #[test]
    fn test_missing_result() {
        let envelope: RpcEnvelope<StatusResult> = serde_json::from_str(r#"{"jsonrpc":"2.0","id":-1}"#).unwrap();
        assert!(matches!(envelope.into_result(), Err(ProbeError::Protocol(_))));
    }

    #[test]
    fn test_invalid_height() {
        let body = STATUS_BODY.replace("187654321", "not-a-number");
        let envelope: RpcEnvelope<StatusResult> = serde_json::from_str(&body).unwrap();
        let status = envelope.into_result().unwrap();
        assert!(matches!(status.height(), Err(ProbeError::Protocol(_))));
    }

    #[derive(Debug, thiserror::Error)]
    #[error("dns error")]
    struct ResolveError(#[source] std::io::Error);

    #[test]
    fn test_root_cause_keeps_resolver_detail() {
        let err = ResolveError(std::io::Error::new(
            std::io::ErrorKind::Other,
            "failed to lookup address information: Name or service not known",
        ));
        assert_eq!(root_cause(&err), "failed to lookup address information: Name or service not known");

        let plain = std::io::Error::new(std::io::ErrorKind::Other, "dns error");
        assert_eq!(root_cause(&plain), "dns error");
    }

    #[tokio::test]
    async fn test_invalid_endpoint_fails_without_network() {
        let connector = CometRpcConnector::new(&ProbingConfig::default()).unwrap();
        let result = connector.connect(&Endpoint::from("bad-host-1")).await;
        assert!(matches!(result, Err(ProbeError::InvalidEndpoint(_))));
    }
}
