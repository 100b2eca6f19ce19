//! gRPC+JSON over HTTP/2.
//!
//! The request body is one frame holding the JSON payload. The response body is read to the
//! end of the stream; the call outcome comes from `grpc-status` in the trailers, or in the
//! response headers when the server sent a trailers-only response.

use super::call::Call;
use super::session::{HttpVersion, Session};
use super::{deadline_millis, Protocol, Transport, TransportConfig, UnaryRequest, USER_AGENT};
use crate::error::{Result, RpcError};
use crate::frame::{self, ResponsePayload};
use crate::message;
use crate::status::{decode_grpc_message, Code, GRPC_MESSAGE, GRPC_STATUS};
use async_trait::async_trait;
use bytes::BytesMut;
use http::header::{CONTENT_TYPE, TE, USER_AGENT as USER_AGENT_HEADER};
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace, warn};

pub const CONTENT_TYPE_GRPC_JSON: &str = "application/grpc+json";
const GRPC_TIMEOUT: &str = "grpc-timeout";
const GRPC_ENCODING: &str = "grpc-encoding";
const GRPC_ACCEPT_ENCODING: &str = "grpc-accept-encoding";

#[derive(Debug)]
pub struct GrpcTransport {
    config: TransportConfig,
}

impl GrpcTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    async fn exchange(&self, call: &Call, request: &UnaryRequest) -> Result<Value> {
        let payload = serde_json::to_vec(&request.body)?;
        let framed = frame::encode(&payload)?;
        trace!(path = call.path(), bytes = framed.len(), "request frame");

        let mut session = Session::connect(&self.config.endpoint, HttpVersion::Http2).await?;
        call.attach(session.closer());

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(self.config.endpoint.uri(&request.path)?)
            .header(CONTENT_TYPE, CONTENT_TYPE_GRPC_JSON)
            .header(TE, "trailers")
            .header(GRPC_ENCODING, "identity")
            .header(GRPC_ACCEPT_ENCODING, "identity")
            .header(USER_AGENT_HEADER, USER_AGENT);
        if let Some(timeout) = request.timeout {
            builder = builder.header(GRPC_TIMEOUT, grpc_timeout(timeout));
        }
        let mut http_request = builder.body(Full::new(framed))?;
        http_request.headers_mut().extend(self.config.headers.clone());
        http_request.headers_mut().extend(request.headers.clone());

        let response = session.send(http_request).await?;
        let (parts, mut body) = response.into_parts();
        if parts.status != StatusCode::OK {
            return Err(RpcError::Transport(format!(
                "unexpected HTTP status {} for {}",
                parts.status,
                call.path()
            )));
        }

        let mut buf = BytesMut::new();
        let mut trailers: Option<HeaderMap> = None;
        while let Some(frame) = body.frame().await {
            match frame?.into_data() {
                Ok(data) => buf.extend_from_slice(&data),
                Err(frame) => {
                    if let Ok(t) = frame.into_trailers() {
                        trailers = Some(t);
                    }
                }
            }
        }
        trace!(path = call.path(), bytes = buf.len(), "response body");

        check_status(trailers.as_ref().unwrap_or(&parts.headers))?;

        let payload = frame::split_response(&buf, self.config.allow_unframed_responses)?;
        if let ResponsePayload::Unframed(_) = payload {
            warn!(path = call.path(), "server replied with unframed JSON");
        }
        message::parse_body(payload.bytes())
    }
}

#[async_trait]
impl Transport for GrpcTransport {
    fn protocol(&self) -> Protocol {
        Protocol::Grpc
    }

    async fn unary(&self, request: UnaryRequest) -> Result<Value> {
        debug!(path = %request.path, endpoint = %self.config.endpoint, "grpc call");
        let call = Call::new(request.path.clone());
        call.drive(request.timeout, self.exchange(&call, &request))
            .await
    }
}

/// A missing `grpc-status` is treated as OK.
fn check_status(headers: &HeaderMap) -> Result<()> {
    let Some(status) = headers.get(GRPC_STATUS) else {
        return Ok(());
    };
    let code = Code::from_header(status.to_str().unwrap_or_default());
    if code.is_ok() {
        return Ok(());
    }
    let message = headers
        .get(GRPC_MESSAGE)
        .and_then(|v| v.to_str().ok())
        .map(decode_grpc_message)
        .unwrap_or_default();
    Err(RpcError::Grpc { code, message })
}

fn grpc_timeout(timeout: Duration) -> String {
    // At most 8 digits are allowed.
    let millis = deadline_millis(timeout);
    if millis < 100_000_000 {
        format!("{}m", millis)
    } else {
        format!("{}S", millis.div_ceil(1000).min(99_999_999))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn status_from_headers() {
        let mut headers = HeaderMap::new();
        assert!(check_status(&headers).is_ok());

        headers.insert(GRPC_STATUS, HeaderValue::from_static("0"));
        assert!(check_status(&headers).is_ok());

        headers.insert(GRPC_STATUS, HeaderValue::from_static("5"));
        headers.insert(GRPC_MESSAGE, HeaderValue::from_static("tool%20not%20found"));
        match check_status(&headers).unwrap_err() {
            RpcError::Grpc { code, message } => {
                assert_eq!(code, Code::NotFound);
                assert_eq!(message, "tool not found");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn timeout_header_format() {
        assert_eq!(grpc_timeout(Duration::from_millis(250)), "250m");
        assert_eq!(grpc_timeout(Duration::from_micros(300)), "1m");
        assert_eq!(grpc_timeout(Duration::from_secs(200_000)), "200000S");
    }
}
