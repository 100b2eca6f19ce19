//! Connect+JSON.
//!
//! The body is the bare JSON message. Failures come back as an envelope,
//! `{"error": {"code": "not_found", "message": "..."}}`, which is turned into
//! [`RpcError::Connect`] before anything tries to decode the body as a response message.

use super::call::Call;
use super::session::{HttpVersion, Session};
use super::{deadline_millis, Protocol, Transport, TransportConfig, UnaryRequest, USER_AGENT};
use crate::error::{Result, RpcError};
use crate::message;
use crate::status::{Code, CONNECT_ERROR_CODE};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, USER_AGENT as USER_AGENT_HEADER};
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use serde_json::Value;
use tracing::{debug, trace};

pub const CONTENT_TYPE_CONNECT_JSON: &str = "application/connect+json";
const CONNECT_PROTOCOL_VERSION: &str = "connect-protocol-version";
const CONNECT_TIMEOUT_MS: &str = "connect-timeout-ms";

#[derive(Debug)]
pub struct ConnectTransport {
    config: TransportConfig,
}

impl ConnectTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    fn http_version(&self) -> HttpVersion {
        if self.config.http2_prior_knowledge {
            HttpVersion::Http2
        } else {
            HttpVersion::Http1
        }
    }

    async fn exchange(&self, call: &Call, request: &UnaryRequest) -> Result<Value> {
        let payload = serde_json::to_vec(&request.body)?;

        let mut session = Session::connect(&self.config.endpoint, self.http_version()).await?;
        call.attach(session.closer());

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(self.config.endpoint.uri(&request.path)?)
            .header(CONTENT_TYPE, CONTENT_TYPE_CONNECT_JSON)
            .header(CONNECT_PROTOCOL_VERSION, "1")
            .header(USER_AGENT_HEADER, USER_AGENT);
        if let Some(timeout) = request.timeout {
            builder = builder.header(CONNECT_TIMEOUT_MS, deadline_millis(timeout).to_string());
        }
        let mut http_request = builder.body(Full::new(Bytes::from(payload)))?;
        http_request.headers_mut().extend(self.config.headers.clone());
        http_request.headers_mut().extend(request.headers.clone());

        let response = session.send(http_request).await?;
        let (parts, body) = response.into_parts();
        let bytes = body.collect().await?.to_bytes();
        trace!(path = call.path(), status = %parts.status, bytes = bytes.len(), "response body");

        if !parts.status.is_success() {
            return Err(error_without_success(parts.status, &parts.headers, &bytes));
        }

        let value = message::parse_body(&bytes)?;
        if let Some(envelope) = error_field(&value) {
            return Err(envelope_error(envelope, &parts.headers));
        }
        Ok(value)
    }
}

#[async_trait]
impl Transport for ConnectTransport {
    fn protocol(&self) -> Protocol {
        Protocol::Connect
    }

    async fn unary(&self, request: UnaryRequest) -> Result<Value> {
        debug!(path = %request.path, endpoint = %self.config.endpoint, "connect call");
        let call = Call::new(request.path.clone());
        call.drive(request.timeout, self.exchange(&call, &request))
            .await
    }
}

/// The `error` envelope of a body, if any. `"error": null` is no error.
fn error_field(value: &Value) -> Option<&Value> {
    value.get("error").filter(|e| !e.is_null())
}

fn header_code(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONNECT_ERROR_CODE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn envelope_error(envelope: &Value, headers: &HeaderMap) -> RpcError {
    let code = envelope
        .get("code")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| header_code(headers))
        .unwrap_or_else(|| Code::Unknown.connect_name().to_string());
    let message = envelope
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            if envelope.is_string() {
                envelope.as_str().unwrap_or_default().to_string()
            } else {
                envelope.to_string()
            }
        });
    RpcError::Connect { code, message }
}

/// Non-2xx responses: the `error` envelope if there is one, the bare Connect error object
/// otherwise, and finally the HTTP status mapping.
fn error_without_success(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> RpcError {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        if let Some(envelope) = error_field(&value) {
            return envelope_error(envelope, headers);
        }
        if value.get("code").is_some_and(Value::is_string) {
            return envelope_error(&value, headers);
        }
    }
    let code = header_code(headers)
        .unwrap_or_else(|| Code::from_http_status(status.as_u16()).connect_name().to_string());
    let text = message::snippet(body);
    let message = if text.trim().is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, text)
    };
    RpcError::Connect { code, message }
}
