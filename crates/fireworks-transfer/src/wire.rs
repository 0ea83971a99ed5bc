//! Datagram codec.
//!
//! ```text
//! +-------+---------+------+----------------------+
//! | "FW"  | version | kind | bincode body         |
//! | 2 B   | 1 B     | 1 B  | 25 B token / 16 B    |
//! +-------+---------+------+----------------------+
//! ```
//!
//! Both bodies are fixed size, so every frame has an exact expected length.

use fireworks_protocol::{EventNotice, Token};

use crate::error::WireError;

pub const MAGIC: [u8; 2] = *b"FW";
pub const WIRE_VERSION: u8 = 1;

const KIND_TOKEN: u8 = 1;
const KIND_NOTICE: u8 = 2;

pub const HEADER_LEN: usize = 4;
/// `u64 + u64 + f64 + bool`
pub const TOKEN_FRAME_LEN: usize = HEADER_LEN + 25;
/// `u64 + u64`
pub const NOTICE_FRAME_LEN: usize = HEADER_LEN + 16;

/// A decoded datagram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Frame {
    Token(Token),
    Notice(EventNotice),
}

impl Frame {
    fn kind(&self) -> u8 {
        match self {
            Self::Token(_) => KIND_TOKEN,
            Self::Notice(_) => KIND_NOTICE,
        }
    }
}

pub fn encode_token(token: &Token) -> Result<Vec<u8>, WireError> {
    encode(&Frame::Token(*token))
}

pub fn encode_notice(notice: &EventNotice) -> Result<Vec<u8>, WireError> {
    encode(&Frame::Notice(*notice))
}

pub fn encode(frame: &Frame) -> Result<Vec<u8>, WireError> {
    let mut buf = Vec::with_capacity(TOKEN_FRAME_LEN);
    buf.extend_from_slice(&MAGIC);
    buf.push(WIRE_VERSION);
    buf.push(frame.kind());
    match frame {
        Frame::Token(token) => bincode::serialize_into(&mut buf, token)?,
        Frame::Notice(notice) => bincode::serialize_into(&mut buf, notice)?,
    }
    Ok(buf)
}

/// Decode and validate one datagram.
pub fn decode(data: &[u8]) -> Result<Frame, WireError> {
    if data.len() < HEADER_LEN {
        return Err(WireError::Truncated {
            expected: HEADER_LEN,
            actual: data.len(),
        });
    }
    if data[..2] != MAGIC {
        return Err(WireError::BadMagic);
    }
    if data[2] != WIRE_VERSION {
        return Err(WireError::UnsupportedVersion(data[2]));
    }

    let kind = data[3];
    let expected = match kind {
        KIND_TOKEN => TOKEN_FRAME_LEN,
        KIND_NOTICE => NOTICE_FRAME_LEN,
        other => return Err(WireError::UnknownKind(other)),
    };
    if data.len() != expected {
        return Err(WireError::Truncated {
            expected,
            actual: data.len(),
        });
    }

    let body = &data[HEADER_LEN..];
    if kind == KIND_NOTICE {
        return Ok(Frame::Notice(bincode::deserialize(body)?));
    }

    let token: Token = bincode::deserialize(body)?;
    let p = token.probability;
    if !p.is_finite() || p <= 0.0 || p > 1.0 {
        return Err(WireError::InvalidField("probability"));
    }
    Ok(Frame::Token(token))
}
