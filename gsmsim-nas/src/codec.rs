//! MM message encoding/decoding trait and shared helpers
//!
//! Every MM message implements [`MmMessage`]: the body codec is message
//! specific, header handling is shared.
//!
//! # Example
//!
//! ```rust
//! use gsmsim_nas::codec::MmMessage;
//! use gsmsim_nas::enums::RejectCause;
//! use gsmsim_nas::messages::mm::MmStatus;
//!
//! let status = MmStatus::new(RejectCause::MSG_TYPE_NOT_IMPLEMENTED);
//! let bytes = status.to_bytes().unwrap();
//! assert_eq!(bytes, vec![0x05, 0x31, 0x61]);
//!
//! let decoded = MmStatus::from_bytes(&bytes).unwrap();
//! assert_eq!(decoded.cause, RejectCause::MSG_TYPE_NOT_IMPLEMENTED);
//! ```

use bytes::{Buf, BufMut};
use thiserror::Error;

use crate::enums::MmMessageType;
use crate::header::{HeaderError, MmHeader};
use crate::ies::IeError;

/// Errors that can occur while encoding or decoding an MM message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Message body shorter than its mandatory part
    #[error("Buffer too short: expected at least {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    /// Header decoding error
    #[error("Header error: {0}")]
    Header(#[from] HeaderError),

    /// Information element error
    #[error("IE error: {0}")]
    Ie(#[from] IeError),

    /// Field value outside its defined range
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Header announced a different message
    #[error("Unexpected message type: expected {expected}, got {actual}")]
    UnexpectedMessageType {
        expected: MmMessageType,
        actual: MmMessageType,
    },
}

/// Result type for MM codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// An MM peer message.
pub trait MmMessage: Sized {
    /// Message type carried in the header.
    const MESSAGE_TYPE: MmMessageType;

    /// Encode the information elements (no header).
    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()>;

    /// Decode the information elements (header already consumed).
    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self>;

    /// Encode header and body.
    fn encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        MmHeader::new(Self::MESSAGE_TYPE).encode(buf);
        self.encode_body(buf)
    }

    /// Encode into a fresh buffer.
    fn to_bytes(&self) -> CodecResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Decode a complete message, checking the header.
    fn from_bytes(data: &[u8]) -> CodecResult<Self> {
        let mut buf = data;
        let header = MmHeader::decode(&mut buf)?;
        if header.message_type != Self::MESSAGE_TYPE {
            return Err(CodecError::UnexpectedMessageType {
                expected: Self::MESSAGE_TYPE,
                actual: header.message_type,
            });
        }
        Self::decode_body(&mut buf)
    }
}

/// Checks that `buf` still holds `expected` bytes.
pub fn ensure_remaining<B: Buf>(buf: &B, expected: usize) -> CodecResult<()> {
    if buf.remaining() < expected {
        return Err(CodecError::BufferTooShort {
            expected,
            actual: buf.remaining(),
        });
    }
    Ok(())
}

/// Reads the remaining bytes of `buf`.
pub fn take_rest<B: Buf>(buf: &mut B) -> Vec<u8> {
    let mut rest = vec![0u8; buf.remaining()];
    buf.copy_to_slice(&mut rest);
    rest
}
