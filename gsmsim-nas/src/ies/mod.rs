//! Information Elements used by MM messages
//!
//! - [`MobileIdentity`] - TS 04.08 10.5.1.4, LV encoded
//! - [`Classmark1`] / [`Classmark2`] - TS 04.08 10.5.1.5 / 10.5.1.6
//! - [`NetworkName`] - TS 04.08 10.5.3.5a, GSM 7-bit default alphabet
//! - [`TlvParser`] - scanner for the optional part of a message

mod classmark;
mod mobile_identity;
mod network_name;
mod tlv;

pub use classmark::{Classmark1, Classmark2};
pub use mobile_identity::MobileIdentity;
pub use network_name::NetworkName;
pub use tlv::{IeFormat, TlvParser, TlvValues};

use thiserror::Error;

/// Information element decoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IeError {
    #[error("Buffer too short: expected at least {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Invalid identity type: {0}")]
    InvalidIdentityType(u8),

    #[error("Invalid digit string '{0}'")]
    InvalidDigits(String),

    #[error("Length exceeds buffer: length field is {length}, but only {remaining} bytes remain")]
    LengthExceedsBuffer { length: usize, remaining: usize },

    #[error("Unsupported coding scheme: 0x{0:02X}")]
    UnsupportedCoding(u8),
}

/// Checks that `buf` holds at least `expected` bytes.
pub(crate) fn ensure_len(actual: usize, expected: usize) -> Result<(), IeError> {
    if actual < expected {
        return Err(IeError::BufferTooShort { expected, actual });
    }
    Ok(())
}
