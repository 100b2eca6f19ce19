//! # Transports
//!
//! Two wire strategies implement the same [`Transport`] trait:
//!
//! - [`grpc::GrpcTransport`]: gRPC+JSON over HTTP/2, one length-prefixed frame per direction,
//!   status in trailers
//! - [`connect::ConnectTransport`]: Connect+JSON, a plain JSON body and an `error` envelope
//!
//! A transport only moves bytes and maps wire-level failures to [`RpcError`]. Schema
//! validation happens above it, in the client.
//!
//! Every call opens its own [`session::Session`] and wraps it in a [`call::Call`] guard that
//! closes the session exactly once however the call ends.

use crate::error::{Result, RpcError};
use async_trait::async_trait;
use http::{HeaderMap, Uri};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub mod call;
pub mod connect;
pub mod grpc;
pub mod session;

pub const USER_AGENT: &str = concat!("rebec-rpc/", env!("CARGO_PKG_VERSION"));

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Grpc,
    Connect,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Grpc => write!(f, "grpc"),
            Protocol::Connect => write!(f, "connect"),
        }
    }
}

impl FromStr for Protocol {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grpc" => Ok(Protocol::Grpc),
            "connect" => Ok(Protocol::Connect),
            other => Err(RpcError::Config(format!(
                "unknown protocol '{}' (expected grpc or connect)",
                other
            ))),
        }
    }
}

/// A parsed base URL: `http://host[:port][/prefix]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
    authority: String,
    path_prefix: String,
}

impl Endpoint {
    pub fn parse(base_url: &str) -> Result<Self> {
        let base_url = base_url.trim();
        if base_url.is_empty() {
            return Err(RpcError::Config("base URL is required".to_string()));
        }
        let uri: Uri = base_url
            .parse()
            .map_err(|e| RpcError::Config(format!("invalid base URL '{}': {}", base_url, e)))?;
        match uri.scheme_str() {
            Some("http") => {}
            Some("https") => {
                return Err(RpcError::Config(
                    "https base URLs are not supported; use http:// (h2c)".to_string(),
                ))
            }
            _ => {
                return Err(RpcError::Config(format!(
                    "base URL '{}' must start with http://",
                    base_url
                )))
            }
        }
        let authority = uri
            .authority()
            .ok_or_else(|| RpcError::Config(format!("base URL '{}' has no host", base_url)))?;
        if uri.query().is_some() {
            return Err(RpcError::Config(format!(
                "base URL '{}' must not carry a query string",
                base_url
            )));
        }
        Ok(Self {
            host: authority.host().to_string(),
            port: authority.port_u16().unwrap_or(80),
            authority: authority.as_str().to_string(),
            path_prefix: uri.path().trim_end_matches('/').to_string(),
        })
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn socket_addr(&self) -> String {
        let host = self.host.trim_start_matches('[').trim_end_matches(']');
        if host.contains(':') {
            format!("[{}]:{}", host, self.port)
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    /// The absolute URI for a method path such as `/prompt.v1.PromptService/Run`.
    pub fn uri(&self, method_path: &str) -> Result<Uri> {
        format!("http://{}{}{}", self.authority, self.path_prefix, method_path)
            .parse()
            .map_err(|e| RpcError::Config(format!("invalid method path '{}': {}", method_path, e)))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}{}", self.authority, self.path_prefix)
    }
}

/// Settings shared by every call a transport makes.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub endpoint: Endpoint,
    pub headers: HeaderMap,
    pub allow_unframed_responses: bool,
    pub http2_prior_knowledge: bool,
}

impl TransportConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            headers: HeaderMap::new(),
            allow_unframed_responses: true,
            http2_prior_knowledge: false,
        }
    }
}

/// One unary exchange, already validated and normalized.
#[derive(Debug, Clone)]
pub struct UnaryRequest {
    /// `/<package>.<Service>/<Method>`
    pub path: String,
    pub body: Value,
    pub timeout: Option<Duration>,
    /// Per-call headers, applied after the transport's own.
    pub headers: HeaderMap,
}

#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    fn protocol(&self) -> Protocol;

    /// Performs the call and returns the response body as raw JSON.
    async fn unary(&self, request: UnaryRequest) -> Result<Value>;
}

pub fn for_protocol(protocol: Protocol, config: TransportConfig) -> Box<dyn Transport> {
    match protocol {
        Protocol::Grpc => Box::new(grpc::GrpcTransport::new(config)),
        Protocol::Connect => Box::new(connect::ConnectTransport::new(config)),
    }
}

/// Whole milliseconds in a deadline, rounded up so a tiny deadline never reads as 0.
pub(crate) fn deadline_millis(timeout: Duration) -> u128 {
    timeout.as_nanos().div_ceil(1_000_000).max(1)
}
