use crate::status::Code;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Which side of a call failed schema conformance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Request,
    Response,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Request => write!(f, "request"),
            Direction::Response => write!(f, "response"),
        }
    }
}

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("{direction} validation failed: {message}")]
    Validation {
        direction: Direction,
        message: String,
    },

    #[error("grpc error {}: {message}", .code.as_i32())]
    Grpc { code: Code, message: String },

    #[error("connect error {code}: {message}")]
    Connect { code: String, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RpcError {
    pub fn validation(direction: Direction, message: impl Into<String>) -> Self {
        RpcError::Validation {
            direction,
            message: message.into(),
        }
    }

    /// True for failures reported by the remote peer rather than detected locally.
    pub fn is_remote(&self) -> bool {
        matches!(self, RpcError::Grpc { .. } | RpcError::Connect { .. })
    }
}

impl From<hyper::Error> for RpcError {
    fn from(e: hyper::Error) -> Self {
        RpcError::Transport(e.to_string())
    }
}

impl From<http::Error> for RpcError {
    fn from(e: http::Error) -> Self {
        RpcError::Transport(format!("invalid request: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
