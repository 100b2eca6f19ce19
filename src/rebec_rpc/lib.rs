//! # rebec-rpc Architecture
//!
//! rebec-rpc is a **unary JSON RPC client library**. It talks to services that accept JSON
//! payloads over either gRPC (HTTP/2, length-prefixed frames, status in trailers) or the
//! Connect protocol (plain JSON body, error envelope). The `rebec-rpc` binary is a thin client
//! of the library.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (args.rs, wired by main.rs)                      │
//! │  - Parses arguments, reads request documents, prints JSON   │
//! │  - The ONLY place that knows about stdout/stderr/exit codes │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Command Layer (commands/*.rs)                              │
//! │  - call, check, methods, describe, config, init             │
//! │  - Returns structured CmdResult values                      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Client Layer (client.rs, services/)                        │
//! │  - RpcClient: one MethodHandle per RPC                      │
//! │  - Validates requests before any I/O, responses after       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Transport Layer (transport/)                               │
//! │  - Transport trait: GrpcTransport, ConnectTransport         │
//! │  - One Session per call, closed exactly once by a Call      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Underneath sit the pieces both directions share: [`descriptor`] (the immutable schema
//! registry), [`message`] (protobuf JSON validation and normalization), [`frame`] (gRPC
//! framing) and [`status`] (status codes).
//!
//! ## Calls
//!
//! Calls are independent. The only state they share is the descriptor pool and the transport
//! settings, both immutable and behind an `Arc`. Nothing is retried, pooled or compressed: each
//! call opens its own connection and releases it when the call ends, whether it succeeded,
//! failed, timed out, or was dropped by the caller.
//!
//! ## Module Overview
//!
//! - [`client`]: `ClientBuilder`, `RpcClient`, `MethodHandle`, `CallOptions`
//! - [`services`]: typed clients for `prompt.v1.PromptService` and `testcase.v1.TestcaseService`
//! - [`transport`]: wire strategies, sessions, the call guard
//! - [`config`]: `config.json` per scope, environment overrides
//! - [`commands`]: what the CLI runs
//! - [`error`]: the `RpcError` taxonomy

pub mod client;
pub mod commands;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod frame;
pub mod message;
pub mod services;
pub mod status;
pub mod transport;

pub use client::{CallOptions, ClientBuilder, MethodHandle, RpcClient};
pub use error::{Direction, Result, RpcError};
pub use transport::Protocol;
