mod common;

use common::{dead_address, grpc_ok, grpc_reply, grpc_trailers_only, hang, serve, Wire};
use http::StatusCode;
use rebec_rpc::error::Direction;
use rebec_rpc::frame;
use rebec_rpc::services::{PromptRunRequest, PromptServiceClient};
use rebec_rpc::status::Code;
use rebec_rpc::{CallOptions, ClientBuilder, RpcError};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

#[tokio::test]
async fn run_returns_exactly_the_server_fields() {
    let server = serve(Wire::Http2, |_| async {
        grpc_ok(&json!({"object": "response", "model": "m", "output": []}))
    })
    .await;

    let client = ClientBuilder::new(server.base_url()).build().unwrap();
    let out = client
        .call("Run", &json!({"tool_name": "x", "input": "hi"}), CallOptions::default())
        .await
        .unwrap();
    assert_eq!(out, json!({"object": "response", "model": "m", "output": []}));

    let seen = server.requests();
    assert_eq!(seen.len(), 1);
    let req = &seen[0];
    assert_eq!(req.path, "/prompt.v1.PromptService/Run");
    assert_eq!(req.headers["content-type"], "application/grpc+json");
    assert_eq!(req.headers["te"], "trailers");
    assert_eq!(req.headers["grpc-timeout"], "30000m");
    let payload = frame::decode_unary(&req.body).unwrap();
    let sent: Value = serde_json::from_slice(payload).unwrap();
    assert_eq!(sent, json!({"tool_name": "x", "input": "hi"}));
}

#[tokio::test]
async fn non_zero_status_becomes_grpc_error() {
    let server = serve(Wire::Http2, |_| async {
        grpc_reply(bytes::Bytes::new(), "5", Some("tool%20x%20not%20found"))
    })
    .await;

    let client = ClientBuilder::new(server.base_url()).build().unwrap();
    let err = client
        .call("Run", &json!({"tool_name": "x"}), CallOptions::default())
        .await
        .unwrap_err();
    match err {
        RpcError::Grpc { code, message } => {
            assert_eq!(code, Code::NotFound);
            assert_eq!(message, "tool x not found");
        }
        other => panic!("unexpected error {other}"),
    }
}

#[tokio::test]
async fn trailers_only_response_carries_status_in_headers() {
    let server = serve(Wire::Http2, |_| async {
        grpc_trailers_only("3", "bad%20input")
    })
    .await;

    let client = ClientBuilder::new(server.base_url()).build().unwrap();
    let err = client
        .call("Run", &json!({"tool_name": "x"}), CallOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "grpc error 3: bad input");
}

#[tokio::test]
async fn compressed_frame_is_rejected() {
    let server = serve(Wire::Http2, |_| async {
        let mut framed = frame::encode(br#"{"object":"response"}"#).unwrap().to_vec();
        framed[0] = frame::FLAG_COMPRESSED;
        grpc_reply(framed, "0", None)
    })
    .await;

    let client = ClientBuilder::new(server.base_url()).build().unwrap();
    let err = client
        .call("Run", &json!({"tool_name": "x"}), CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Decode(_)), "{err}");
    assert!(err.to_string().contains("compression not supported"));
}

#[tokio::test]
async fn unframed_json_is_accepted_only_when_allowed() {
    let server = serve(Wire::Http2, |_| async {
        grpc_reply(&br#"{"object":"response"}"#[..], "0", None)
    })
    .await;

    let lenient = ClientBuilder::new(server.base_url()).build().unwrap();
    let out = lenient
        .call("Run", &json!({"tool_name": "x"}), CallOptions::default())
        .await
        .unwrap();
    assert_eq!(out, json!({"object": "response"}));

    let strict = ClientBuilder::new(server.base_url())
        .allow_unframed_responses(false)
        .build()
        .unwrap();
    let err = strict
        .call("Run", &json!({"tool_name": "x"}), CallOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("invalid frame flag"));
}

#[tokio::test]
async fn empty_payload_is_the_empty_message() {
    let server = serve(Wire::Http2, |_| async { grpc_reply(bytes::Bytes::new(), "0", None) }).await;

    let client = ClientBuilder::new(server.base_url()).build().unwrap();
    let out = client
        .call("Run", &json!({"tool_name": "x"}), CallOptions::default())
        .await
        .unwrap();
    assert_eq!(out, json!({}));
}

#[tokio::test]
async fn non_json_payload_reports_a_snippet() {
    let server = serve(Wire::Http2, |_| async {
        let framed = frame::encode("not json at all ".repeat(40).as_bytes()).unwrap();
        grpc_reply(framed, "0", None)
    })
    .await;

    let client = ClientBuilder::new(server.base_url()).build().unwrap();
    let err = client
        .call("Run", &json!({"tool_name": "x"}), CallOptions::default())
        .await
        .unwrap_err();
    let text = err.to_string();
    assert!(matches!(err, RpcError::Decode(_)));
    assert!(text.contains("not json at all"));
    assert!(text.ends_with("..."));
}

#[tokio::test]
async fn response_is_validated_against_its_descriptor() {
    let server = serve(Wire::Http2, |_| async { grpc_ok(&json!({"object": 5})) }).await;

    let client = ClientBuilder::new(server.base_url()).build().unwrap();
    let err = client
        .call("Run", &json!({"tool_name": "x"}), CallOptions::default())
        .await
        .unwrap_err();
    match err {
        RpcError::Validation { direction, message } => {
            assert_eq!(direction, Direction::Response);
            assert!(message.contains("object: expected string, got number"));
        }
        other => panic!("unexpected error {other}"),
    }
}

#[tokio::test]
async fn non_200_http_status_is_a_transport_error() {
    let server = serve(Wire::Http2, |_| async {
        common::full(StatusCode::NOT_FOUND, "text/plain", "no route")
    })
    .await;

    let client = ClientBuilder::new(server.base_url()).build().unwrap();
    let err = client
        .call("Run", &json!({"tool_name": "x"}), CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Transport(_)), "{err}");
}

#[tokio::test]
async fn timeout_fails_fast_and_closes_the_session_once() {
    let server = serve(Wire::Http2, hang).await;

    let client = ClientBuilder::new(server.base_url()).build().unwrap();
    let started = Instant::now();
    let err = client
        .call(
            "Run",
            &json!({"tool_name": "x"}),
            CallOptions::new().timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Timeout(d) if d == Duration::from_millis(100)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(server.requests()[0].headers["grpc-timeout"], "100m");

    assert_eq!(server.wait_closed(1).await, 1);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.closed.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn dropping_the_call_future_closes_the_session() {
    let server = serve(Wire::Http2, hang).await;

    let client = ClientBuilder::new(server.base_url()).timeout_ms(0).build().unwrap();
    let request = json!({"tool_name": "x"});
    let call = client.call("Run", &request, CallOptions::default());
    let raced = tokio::time::timeout(Duration::from_millis(100), call).await;
    assert!(raced.is_err());

    assert_eq!(server.wait_closed(1).await, 1);
    assert!(!server.requests()[0].headers.contains_key("grpc-timeout"));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let client = ClientBuilder::new(dead_address().await).build().unwrap();
    let err = client
        .call("Run", &json!({"tool_name": "x"}), CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Transport(_)), "{err}");
}

#[tokio::test]
async fn typed_prompt_client_round_trip() {
    let server = serve(Wire::Http2, |_| async {
        grpc_ok(&json!({
            "id": "resp_1",
            "object": "response",
            "model": "m",
            "created": "1700000000",
            "output": [{"type": "output_text", "text": "hello"}],
            "usage": {"input_tokens": 3, "output_tokens": 1, "total_tokens": 4}
        }))
    })
    .await;

    let prompt = PromptServiceClient::connect(ClientBuilder::new(server.base_url())).unwrap();
    let resp = prompt
        .run(&PromptRunRequest::new("x").input("hi"), CallOptions::default())
        .await
        .unwrap();
    assert_eq!(resp.id, "resp_1");
    assert_eq!(resp.created, 1_700_000_000);
    assert_eq!(resp.text(), "hello");
    assert_eq!(resp.usage.unwrap().total_tokens, 4);
}

#[tokio::test]
async fn concurrent_calls_are_independent() {
    let server = serve(Wire::Http2, |seen| async move {
        let payload = frame::decode_unary(&seen.body).unwrap();
        let req: Value = serde_json::from_slice(payload).unwrap();
        grpc_ok(&json!({"model": req["tool_name"]}))
    })
    .await;

    let client = ClientBuilder::new(server.base_url()).build().unwrap();
    let calls = (0..8).map(|i| {
        let client = client.clone();
        async move {
            client
                .call("Run", &json!({"tool_name": format!("t{i}")}), CallOptions::default())
                .await
        }
    });
    let results = futures::future::join_all(calls).await;
    for (i, r) in results.into_iter().enumerate() {
        assert_eq!(r.unwrap(), json!({"model": format!("t{i}")}));
    }
    assert_eq!(server.wait_closed(8).await, 8);
}
