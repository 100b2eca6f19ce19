//! # gRPC Message Framing
//!
//! Every gRPC message on an HTTP/2 stream is wrapped in a five byte prefix:
//!
//! ```text
//! ┌────────┬──────────────────────┬───────────────────┐
//! │ flag:1 │ length:4 (big-endian)│ payload: length   │
//! └────────┴──────────────────────┴───────────────────┘
//! ```
//!
//! The flag is the compression bit. This client never negotiates compression, so it always
//! writes `0` and refuses any frame that arrives with the bit set.
//!
//! Unary responses must carry exactly one frame. Some servers reply with bare JSON instead;
//! [`split_response`] accepts that when the caller opts in, but only when the first byte
//! cannot be a frame flag at all.

use crate::error::{RpcError, Result};
use bytes::{BufMut, Bytes, BytesMut};

pub const HEADER_LEN: usize = 5;
pub const FLAG_UNCOMPRESSED: u8 = 0;
pub const FLAG_COMPRESSED: u8 = 1;

/// The parsed five byte prefix of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub flag: u8,
    pub length: u32,
}

impl FrameHeader {
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_LEN {
            return None;
        }
        Some(Self {
            flag: buf[0],
            length: u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]),
        })
    }

    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.length as usize
    }
}

/// Wraps a payload into a single uncompressed frame.
pub fn encode(payload: &[u8]) -> Result<Bytes> {
    let length = u32::try_from(payload.len()).map_err(|_| {
        RpcError::Decode(format!(
            "grpc: message of {} bytes exceeds frame limit",
            payload.len()
        ))
    })?;
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u8(FLAG_UNCOMPRESSED);
    buf.put_u32(length);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Extracts the payload of a unary response that must consist of exactly one frame.
pub fn decode_unary(buf: &[u8]) -> Result<&[u8]> {
    let header = FrameHeader::parse(buf)
        .ok_or_else(|| RpcError::Decode("grpc: short response".to_string()))?;
    if header.flag != FLAG_UNCOMPRESSED {
        return Err(RpcError::Decode(format!(
            "grpc: compression not supported (flag {:#04x})",
            header.flag
        )));
    }
    if buf.len() < header.frame_len() {
        return Err(RpcError::Decode(format!(
            "grpc: incomplete message ({} of {} bytes)",
            buf.len() - HEADER_LEN,
            header.length
        )));
    }
    if buf.len() > header.frame_len() {
        return Err(RpcError::Decode(format!(
            "grpc: expected one message, found {} trailing bytes",
            buf.len() - header.frame_len()
        )));
    }
    Ok(&buf[HEADER_LEN..header.frame_len()])
}

/// A response body after framing has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponsePayload<'a> {
    Framed(&'a [u8]),
    Unframed(&'a [u8]),
}

impl<'a> ResponsePayload<'a> {
    pub fn bytes(&self) -> &'a [u8] {
        match self {
            ResponsePayload::Framed(b) | ResponsePayload::Unframed(b) => b,
        }
    }
}

/// Resolves a unary response body into its JSON payload.
///
/// An empty body is an empty framed message. A body whose first byte is a valid flag value
/// (0 or 1) is always decoded strictly, so a compressed frame is rejected whatever follows it.
/// Any other leading byte is treated as bare JSON when `allow_unframed` is set.
pub fn split_response(buf: &[u8], allow_unframed: bool) -> Result<ResponsePayload<'_>> {
    match buf.first() {
        None => Ok(ResponsePayload::Framed(buf)),
        Some(&FLAG_UNCOMPRESSED) | Some(&FLAG_COMPRESSED) => {
            decode_unary(buf).map(ResponsePayload::Framed)
        }
        Some(_) if allow_unframed => Ok(ResponsePayload::Unframed(buf)),
        Some(flag) => Err(RpcError::Decode(format!(
            "grpc: invalid frame flag {:#04x}",
            flag
        ))),
    }
}
