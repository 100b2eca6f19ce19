//! gRPC status codes and their Connect protocol spellings.
//!
//! gRPC carries the code as a decimal string in the `grpc-status` trailer; Connect carries the
//! snake_case name in the `error.code` field of its JSON envelope (and in the
//! `connect-error-code` header). Both map onto the same [`Code`] set.

use std::fmt;

pub const GRPC_STATUS: &str = "grpc-status";
pub const GRPC_MESSAGE: &str = "grpc-message";
pub const CONNECT_ERROR_CODE: &str = "connect-error-code";

/// Canonical status codes, numbered per the gRPC status code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

const ALL_CODES: [Code; 17] = [
    Code::Ok,
    Code::Cancelled,
    Code::Unknown,
    Code::InvalidArgument,
    Code::DeadlineExceeded,
    Code::NotFound,
    Code::AlreadyExists,
    Code::PermissionDenied,
    Code::ResourceExhausted,
    Code::FailedPrecondition,
    Code::Aborted,
    Code::OutOfRange,
    Code::Unimplemented,
    Code::Internal,
    Code::Unavailable,
    Code::DataLoss,
    Code::Unauthenticated,
];

impl Code {
    pub const fn as_i32(&self) -> i32 {
        match self {
            Code::Ok => 0,
            Code::Cancelled => 1,
            Code::Unknown => 2,
            Code::InvalidArgument => 3,
            Code::DeadlineExceeded => 4,
            Code::NotFound => 5,
            Code::AlreadyExists => 6,
            Code::PermissionDenied => 7,
            Code::ResourceExhausted => 8,
            Code::FailedPrecondition => 9,
            Code::Aborted => 10,
            Code::OutOfRange => 11,
            Code::Unimplemented => 12,
            Code::Internal => 13,
            Code::Unavailable => 14,
            Code::DataLoss => 15,
            Code::Unauthenticated => 16,
        }
    }

    /// Out-of-range values map to `Unknown`, as gRPC clients are required to do.
    pub fn from_i32(value: i32) -> Self {
        ALL_CODES
            .iter()
            .copied()
            .find(|c| c.as_i32() == value)
            .unwrap_or(Code::Unknown)
    }

    /// Parses a `grpc-status` header value. Anything that is not a number is `Unknown`.
    pub fn from_header(value: &str) -> Self {
        value
            .trim()
            .parse::<i32>()
            .map(Code::from_i32)
            .unwrap_or(Code::Unknown)
    }

    /// The Connect protocol name (`not_found`, `invalid_argument`, ...).
    pub const fn connect_name(&self) -> &'static str {
        match self {
            Code::Ok => "ok",
            Code::Cancelled => "canceled",
            Code::Unknown => "unknown",
            Code::InvalidArgument => "invalid_argument",
            Code::DeadlineExceeded => "deadline_exceeded",
            Code::NotFound => "not_found",
            Code::AlreadyExists => "already_exists",
            Code::PermissionDenied => "permission_denied",
            Code::ResourceExhausted => "resource_exhausted",
            Code::FailedPrecondition => "failed_precondition",
            Code::Aborted => "aborted",
            Code::OutOfRange => "out_of_range",
            Code::Unimplemented => "unimplemented",
            Code::Internal => "internal",
            Code::Unavailable => "unavailable",
            Code::DataLoss => "data_loss",
            Code::Unauthenticated => "unauthenticated",
        }
    }

    pub fn from_connect_name(name: &str) -> Option<Self> {
        ALL_CODES
            .iter()
            .copied()
            .find(|c| c.connect_name() == name)
    }

    /// Code a Connect client assumes when a non-2xx response carries no error envelope.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => Code::Internal,
            401 => Code::Unauthenticated,
            403 => Code::PermissionDenied,
            404 => Code::Unimplemented,
            429 | 502 | 503 | 504 => Code::Unavailable,
            _ => Code::Unknown,
        }
    }

    pub fn is_ok(&self) -> bool {
        *self == Code::Ok
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.connect_name())
    }
}

/// Decodes a `grpc-message` value, which servers percent-encode.
pub fn decode_grpc_message(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_round_trip_for_every_code() {
        for code in ALL_CODES {
            assert_eq!(Code::from_i32(code.as_i32()), code);
        }
    }

    #[test]
    fn unknown_numbers_and_garbage_map_to_unknown() {
        assert_eq!(Code::from_i32(42), Code::Unknown);
        assert_eq!(Code::from_i32(-1), Code::Unknown);
        assert_eq!(Code::from_header("nope"), Code::Unknown);
        assert_eq!(Code::from_header(" 5 "), Code::NotFound);
    }

    #[test]
    fn connect_names() {
        assert_eq!(Code::from_connect_name("not_found"), Some(Code::NotFound));
        assert_eq!(Code::from_connect_name("canceled"), Some(Code::Cancelled));
        assert_eq!(Code::from_connect_name("bogus"), None);
        assert_eq!(Code::Internal.to_string(), "internal");
    }

    #[test]
    fn http_status_fallback() {
        assert_eq!(Code::from_http_status(404), Code::Unimplemented);
        assert_eq!(Code::from_http_status(503), Code::Unavailable);
        assert_eq!(Code::from_http_status(500), Code::Unknown);
    }

    #[test]
    fn grpc_message_is_percent_decoded() {
        assert_eq!(decode_grpc_message("tool%20not%20found"), "tool not found");
        assert_eq!(decode_grpc_message("plain"), "plain");
    }
}
