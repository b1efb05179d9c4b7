//! Field encoding and framing primitives for the worker wire protocol.
//!
//! A frame is a 4-byte big-endian length prefix followed by that many bytes
//! of payload. The payload is a sequence of NUL (`0x00`) separated fields,
//! optionally wrapped in an `AES\0<ciphertext>` envelope once a session key
//! has been established (see [`crate::crypto`]).

use std::fmt;

pub const SEPARATOR: u8 = 0x00;
pub const MSG_LEN_SIZE: usize = 4;
pub const AES_MARKER: &[u8] = b"AES";

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("connection closed while reading frame")]
    ConnectionClosed,
    #[error("frame length {0} exceeds maximum of {1}")]
    FrameTooLarge(u32, u32),
    #[error("expected {expected} fields, found {found}")]
    FieldCountMismatch { expected: usize, found: usize },
    #[error("unknown message tag {0:?}")]
    UnknownMessageTag(String),
    #[error("field was not valid utf-8")]
    InvalidUtf8,
    #[error("field was not 4 bytes wide, cannot decode as integer")]
    InvalidIntWidth,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Caps a single frame's payload so a corrupt length prefix cannot make the
/// reader allocate unbounded memory.
pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// One field in a worker-protocol message.
///
/// Fields are positional and untyped on the wire: the receiver already
/// knows, from the message's first field, what shape the rest of the
/// message takes.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Str(String),
    I32(i32),
    F32(f32),
    Bool(bool),
    /// Raw bytes, passed through unencoded (used for the JSON-encoded task
    /// payload, which itself may contain separator bytes and must only be
    /// split off by position, never by further NUL-splitting).
    Bytes(Vec<u8>),
}

impl Field {
    pub fn str(s: impl Into<String>) -> Self {
        Field::Str(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Field::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Field::Str(s) => s.as_bytes().to_vec(),
            Field::I32(n) => n.to_be_bytes().to_vec(),
            Field::F32(f) => f.to_be_bytes().to_vec(),
            Field::Bool(b) => if *b { b"True".to_vec() } else { b"False".to_vec() },
            Field::Bytes(b) => b.clone(),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Str(s) => write!(f, "{s}"),
            Field::I32(n) => write!(f, "{n}"),
            Field::F32(x) => write!(f, "{x}"),
            Field::Bool(b) => write!(f, "{b}"),
            Field::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Joins fields with [`SEPARATOR`] into a single payload, ready to be framed
/// or encrypted.
pub fn encode_fields(fields: &[Field]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(SEPARATOR);
        }
        out.extend_from_slice(&field.encode());
    }
    out
}

/// Splits `data` into exactly `count` fields on the NUL separator. The last
/// field absorbs any remaining separators in the payload, so a trailing
/// opaque blob (e.g. a JSON task body) never gets corrupted by incidental
/// NUL bytes it may contain.
pub fn split_fields(data: &[u8], count: usize) -> Result<Vec<&[u8]>, WireError> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let mut parts = Vec::with_capacity(count);
    let mut rest = data;
    for _ in 0..count - 1 {
        match rest.iter().position(|&b| b == SEPARATOR) {
            Some(idx) => {
                parts.push(&rest[..idx]);
                rest = &rest[idx + 1..];
            }
            None => {
                return Err(WireError::FieldCountMismatch {
                    expected: count,
                    found: parts.len() + 1,
                })
            }
        }
    }
    parts.push(rest);
    Ok(parts)
}

pub fn decode_str(field: &[u8]) -> Result<String, WireError> {
    std::str::from_utf8(field)
        .map(str::to_owned)
        .map_err(|_| WireError::InvalidUtf8)
}

pub fn decode_i32(field: &[u8]) -> Result<i32, WireError> {
    let arr: [u8; 4] = field.try_into().map_err(|_| WireError::InvalidIntWidth)?;
    Ok(i32::from_be_bytes(arr))
}
