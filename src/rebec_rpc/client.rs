//! # Client Factory
//!
//! [`ClientBuilder`] turns a base URL and a service name into an [`RpcClient`] with one
//! [`MethodHandle`] per RPC. Construction resolves the service against the descriptor pool and
//! picks a transport; it never touches the network.
//!
//! ```no_run
//! # async fn demo() -> rebec_rpc::Result<()> {
//! use rebec_rpc::{CallOptions, ClientBuilder};
//! use serde_json::json;
//!
//! let client = ClientBuilder::new("http://localhost:8080")
//!     .service("prompt.v1.PromptService")
//!     .build()?;
//! let run = client.method("Run")?;
//! let out = run.invoke(&json!({"tool_name": "x", "input": "hi"}), CallOptions::default()).await?;
//! # let _ = out;
//! # Ok(())
//! # }
//! ```

use crate::descriptor::builtin::PROMPT_SERVICE;
use crate::descriptor::{DescriptorPool, MethodDescriptor, ServiceDescriptor};
use crate::error::{Result, RpcError};
use crate::message::{self, DecodeOptions};
use crate::transport::{self, Endpoint, Protocol, Transport, TransportConfig, UnaryRequest};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Per-call settings. Anything left unset falls back to the client's defaults.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    timeout: Option<Duration>,
    headers: HeaderMap,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the client's timeout for this call. `Duration::ZERO` disables it.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout_ms(self, millis: u64) -> Self {
        self.timeout(Duration::from_millis(millis))
    }

    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let (name, value) = header_pair(name, value)?;
        self.headers.insert(name, value);
        Ok(self)
    }
}

fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|_| RpcError::Config(format!("invalid header name '{}'", name)))?;
    let header_value = HeaderValue::from_str(value.trim())
        .map_err(|_| RpcError::Config(format!("invalid value for header '{}'", name)))?;
    Ok((header_name, header_value))
}

fn non_zero(timeout: Duration) -> Option<Duration> {
    (!timeout.is_zero()).then_some(timeout)
}

#[derive(Debug, Clone)]
pub struct ClientBuilder {
    base_url: String,
    service: String,
    pool: Option<Arc<DescriptorPool>>,
    protocol: Protocol,
    timeout_ms: u64,
    headers: Vec<(String, String)>,
    allow_unframed_responses: bool,
    http2_prior_knowledge: bool,
    emit_default_values: Option<bool>,
    ignore_unknown_fields: bool,
}

impl ClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            service: PROMPT_SERVICE.to_string(),
            pool: None,
            protocol: Protocol::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            headers: Vec::new(),
            allow_unframed_responses: true,
            http2_prior_knowledge: false,
            emit_default_values: None,
            ignore_unknown_fields: false,
        }
    }

    /// Fully-qualified service name, e.g. `testcase.v1.TestcaseService`.
    pub fn service(mut self, name: impl Into<String>) -> Self {
        self.service = name.into();
        self
    }

    /// Descriptor registry to resolve the service in. Defaults to the built-ins.
    pub fn pool(mut self, pool: Arc<DescriptorPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Default deadline for every call; 0 disables it.
    pub fn timeout_ms(mut self, millis: u64) -> Self {
        self.timeout_ms = millis;
        self
    }

    /// A header sent on every call.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn allow_unframed_responses(mut self, allow: bool) -> Self {
        self.allow_unframed_responses = allow;
        self
    }

    /// Speak HTTP/2 without upgrade for Connect calls. gRPC always does.
    pub fn http2_prior_knowledge(mut self, enabled: bool) -> Self {
        self.http2_prior_knowledge = enabled;
        self
    }

    /// Defaults to `false` for Connect and `true` for gRPC.
    pub fn emit_default_values(mut self, emit: bool) -> Self {
        self.emit_default_values = Some(emit);
        self
    }

    pub fn ignore_unknown_fields(mut self, ignore: bool) -> Self {
        self.ignore_unknown_fields = ignore;
        self
    }

    pub fn build(self) -> Result<RpcClient> {
        let endpoint = Endpoint::parse(&self.base_url)?;
        let pool = match self.pool {
            Some(pool) => pool,
            None => Arc::new(DescriptorPool::builder().with_builtins().build()?),
        };
        let service = pool.service(&self.service)?;

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let (name, value) = header_pair(name, value)?;
            headers.insert(name, value);
        }

        let mut config = TransportConfig::new(endpoint);
        config.headers = headers;
        config.allow_unframed_responses = self.allow_unframed_responses;
        config.http2_prior_knowledge = self.http2_prior_knowledge;

        let decode = DecodeOptions {
            emit_default_values: self
                .emit_default_values
                .unwrap_or(self.protocol == Protocol::Grpc),
            ignore_unknown_fields: self.ignore_unknown_fields,
        };

        debug!(
            service = %service.full_name,
            protocol = %self.protocol,
            base_url = %config.endpoint,
            "client ready"
        );

        Ok(RpcClient {
            inner: Arc::new(ClientInner {
                transport: transport::for_protocol(self.protocol, config),
                service,
                pool,
                default_timeout: non_zero(Duration::from_millis(self.timeout_ms)),
                decode,
            }),
        })
    }
}

#[derive(Debug)]
struct ClientInner {
    service: Arc<ServiceDescriptor>,
    pool: Arc<DescriptorPool>,
    transport: Box<dyn Transport>,
    default_timeout: Option<Duration>,
    decode: DecodeOptions,
}

/// A client bound to one service. Cheap to clone; clones share the transport and descriptors.
#[derive(Debug, Clone)]
pub struct RpcClient {
    inner: Arc<ClientInner>,
}

impl RpcClient {
    pub fn builder(base_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }

    pub fn service(&self) -> &ServiceDescriptor {
        &self.inner.service
    }

    pub fn protocol(&self) -> Protocol {
        self.inner.transport.protocol()
    }

    pub fn pool(&self) -> &Arc<DescriptorPool> {
        &self.inner.pool
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.inner.default_timeout
    }

    pub fn method(&self, name: &str) -> Result<MethodHandle> {
        let descriptor = self
            .inner
            .service
            .find_method(name)
            .cloned()
            .ok_or_else(|| {
                RpcError::UnknownMethod(format!("{}/{}", self.inner.service.full_name, name))
            })?;
        Ok(MethodHandle {
            path: self.inner.service.method_path(&descriptor.name),
            client: self.clone(),
            descriptor,
        })
    }

    /// One handle per RPC the service declares, in declaration order.
    pub fn methods(&self) -> Vec<MethodHandle> {
        self.inner
            .service
            .methods
            .iter()
            .map(|m| MethodHandle {
                path: self.inner.service.method_path(&m.name),
                client: self.clone(),
                descriptor: m.clone(),
            })
            .collect()
    }

    /// Calls a method by name.
    pub async fn call(&self, method: &str, request: &Value, options: CallOptions) -> Result<Value> {
        self.method(method)?.invoke(request, options).await
    }
}

/// The callable for one RPC.
#[derive(Debug, Clone)]
pub struct MethodHandle {
    client: RpcClient,
    descriptor: MethodDescriptor,
    path: String,
}

impl MethodHandle {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    /// Validates `request`, sends it, and returns the validated, normalized response.
    pub async fn invoke(&self, request: &Value, options: CallOptions) -> Result<Value> {
        let inner = &self.client.inner;
        let body = message::encode_request(&inner.pool, &self.descriptor.input_type, request)?;
        let timeout = match options.timeout {
            Some(t) => non_zero(t),
            None => inner.default_timeout,
        };

        debug!(path = %self.path, ?timeout, "dispatching");
        let raw = inner
            .transport
            .unary(UnaryRequest {
                path: self.path.clone(),
                body,
                timeout,
                headers: options.headers,
            })
            .await?;
        let response =
            message::decode_response(&inner.pool, &self.descriptor.output_type, &raw, inner.decode)?;
        debug!(path = %self.path, "completed");
        Ok(response)
    }

    /// [`invoke`](Self::invoke) with serde types on both sides.
    pub async fn invoke_as<Req, Resp>(&self, request: &Req, options: CallOptions) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let request = serde_json::to_value(request)?;
        let response = self.invoke(&request, options).await?;
        Ok(serde_json::from_value(response)?)
    }
}
