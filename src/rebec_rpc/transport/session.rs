//! One TCP connection per call.
//!
//! A session performs the HTTP handshake, hands the connection future to a spawned task that
//! drives it, and keeps the request sender. Closing a session aborts the driver task, which
//! tears down the socket and fails any request still using it.

use super::Endpoint;
use crate::error::{Result, RpcError};
use bytes::Bytes;
use http::header::HOST;
use http::{HeaderValue, Request, Response, Uri};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::client::conn::{http1, http2};
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http1,
    /// HTTP/2 with prior knowledge (h2c), no upgrade dance.
    Http2,
}

enum Sender {
    Http1(http1::SendRequest<Full<Bytes>>),
    Http2(http2::SendRequest<Full<Bytes>>),
}

pub struct Session {
    sender: Sender,
    driver: JoinHandle<()>,
    authority: String,
}

impl Session {
    pub async fn connect(endpoint: &Endpoint, version: HttpVersion) -> Result<Self> {
        let addr = endpoint.socket_addr();
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| RpcError::Transport(format!("cannot connect to {}: {}", addr, e)))?;
        let _ = stream.set_nodelay(true);
        let io = TokioIo::new(stream);
        trace!(%addr, ?version, "connected");

        let (sender, driver) = match version {
            HttpVersion::Http1 => {
                let (sender, conn) = http1::handshake(io).await?;
                let driver = tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        debug!(error = %e, "http/1.1 connection ended with error");
                    }
                });
                (Sender::Http1(sender), driver)
            }
            HttpVersion::Http2 => {
                let (sender, conn) = http2::handshake(TokioExecutor::new(), io).await?;
                let driver = tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        debug!(error = %e, "http/2 connection ended with error");
                    }
                });
                (Sender::Http2(sender), driver)
            }
        };

        Ok(Self {
            sender,
            driver,
            authority: endpoint.authority().to_string(),
        })
    }

    /// Sends a request whose URI is absolute. HTTP/1.1 requests are rewritten to origin-form.
    pub async fn send(&mut self, mut request: Request<Full<Bytes>>) -> Result<Response<Incoming>> {
        match &mut self.sender {
            Sender::Http1(sender) => {
                let origin: Uri = request
                    .uri()
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/")
                    .parse()
                    .map_err(|e| RpcError::Transport(format!("invalid request path: {}", e)))?;
                *request.uri_mut() = origin;
                let host = HeaderValue::from_str(&self.authority)
                    .map_err(|e| RpcError::Transport(format!("invalid host: {}", e)))?;
                request.headers_mut().insert(HOST, host);
                sender.ready().await?;
                Ok(sender.send_request(request).await?)
            }
            Sender::Http2(sender) => {
                sender.ready().await?;
                Ok(sender.send_request(request).await?)
            }
        }
    }

    /// A closure that shuts the connection down. Safe to run after the driver already exited.
    pub fn closer(&self) -> impl FnOnce() + Send + 'static {
        let handle = self.driver.abort_handle();
        move || handle.abort()
    }
}
