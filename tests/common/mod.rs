//! In-process servers for transport tests.

#![allow(dead_code)]

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Request, Response, StatusCode};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

pub type Body = BoxBody<Bytes, Infallible>;

/// A request as the server saw it.
#[derive(Debug, Clone)]
pub struct Seen {
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Wire {
    Http1,
    Http2,
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub seen: Arc<Mutex<Vec<Seen>>>,
    /// Connections whose serving task has ended.
    pub closed: Arc<AtomicUsize>,
}

impl TestServer {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    /// Waits until `n` connections have been torn down, or gives up after two seconds.
    pub async fn wait_closed(&self, n: usize) -> usize {
        for _ in 0..200 {
            if self.closed.load(Ordering::SeqCst) >= n {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.closed.load(Ordering::SeqCst)
    }
}

/// Serves every connection with `handler`. The handler gets the path, headers and full body.
pub async fn serve<F, Fut>(wire: Wire, handler: F) -> TestServer
where
    F: Fn(Seen) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response<Body>> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let closed = Arc::new(AtomicUsize::new(0));

    let (seen_c, closed_c) = (seen.clone(), closed.clone());
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let handler = handler.clone();
            let seen = seen_c.clone();
            let closed = closed_c.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let handler = handler.clone();
                    let seen = seen.clone();
                    async move {
                        let (parts, body) = req.into_parts();
                        let body = body.collect().await.map(|c| c.to_bytes()).unwrap_or_default();
                        let request = Seen {
                            path: parts.uri.path().to_string(),
                            headers: parts.headers,
                            body,
                        };
                        seen.lock().unwrap().push(request.clone());
                        Ok::<_, Infallible>(handler(request).await)
                    }
                });
                let io = TokioIo::new(stream);
                match wire {
                    Wire::Http1 => {
                        let _ = hyper::server::conn::http1::Builder::new()
                            .serve_connection(io, service)
                            .await;
                    }
                    Wire::Http2 => {
                        let _ = hyper::server::conn::http2::Builder::new(TokioExecutor::new())
                            .serve_connection(io, service)
                            .await;
                    }
                }
                closed.fetch_add(1, Ordering::SeqCst);
            });
        }
    });

    TestServer { addr, seen, closed }
}

/// An address nothing listens on.
pub async fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn full(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("content-type", content_type)
        .body(Full::new(body.into()).boxed())
        .unwrap()
}

/// A gRPC response: the body bytes as given, then trailers with the status.
pub fn grpc_reply(body: impl Into<Bytes>, status: &str, message: Option<&str>) -> Response<Body> {
    let mut trailers = HeaderMap::new();
    trailers.insert("grpc-status", HeaderValue::from_str(status).unwrap());
    if let Some(message) = message {
        trailers.insert("grpc-message", HeaderValue::from_str(message).unwrap());
    }
    let frames = vec![
        Ok::<_, Infallible>(Frame::data(body.into())),
        Ok(Frame::trailers(trailers)),
    ];
    Response::builder()
        .header("content-type", "application/grpc+json")
        .body(StreamBody::new(futures::stream::iter(frames)).boxed())
        .unwrap()
}

/// A gRPC response carrying one framed JSON message and status 0.
pub fn grpc_ok(json: &serde_json::Value) -> Response<Body> {
    let payload = serde_json::to_vec(json).unwrap();
    let framed = rebec_rpc::frame::encode(&payload).unwrap();
    grpc_reply(framed, "0", None)
}

/// Status in the response headers and no body at all.
pub fn grpc_trailers_only(status: &str, message: &str) -> Response<Body> {
    Response::builder()
        .header("content-type", "application/grpc+json")
        .header("grpc-status", status)
        .header("grpc-message", message)
        .body(Full::new(Bytes::new()).boxed())
        .unwrap()
}

pub fn connect_json(status: StatusCode, json: &serde_json::Value) -> Response<Body> {
    full(
        status,
        "application/connect+json",
        serde_json::to_vec(json).unwrap(),
    )
}

/// A handler that never answers.
pub async fn hang(_: Seen) -> Response<Body> {
    tokio::time::sleep(Duration::from_secs(3600)).await;
    full(StatusCode::OK, "text/plain", "late")
}
