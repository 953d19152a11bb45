//! Layer 3 message header
//!
//! Every TS 04.08 message starts with a two octet header:
//!
//! ```text
//! +------------------------------+------------------------------+
//! | Skip indicator / TI (4 bits) | Protocol discriminator (4)   |
//! +------------------------------+------------------------------+
//! |                  Message type (1 byte)                      |
//! +-------------------------------------------------------------+
//! ```
//!
//! For MM the high nibble is the skip indicator and must be zero. For the CM
//! protocols it carries the transaction identifier and its flag bit.

use bytes::{Buf, BufMut};
use thiserror::Error;

use crate::enums::{MmMessageType, ProtocolDiscriminator};

/// Header decoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("Buffer too short: expected at least {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Invalid message type: 0x{0:02X}")]
    InvalidMessageType(u8),

    #[error("Protocol discriminator mismatch: expected 0x{expected:X}, got 0x{actual:X}")]
    PdMismatch { expected: u8, actual: u8 },
}

/// Raw layer 3 header, decoded without interpreting the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L3Header {
    /// First octet as received
    pub pd_octet: u8,
    /// Message type octet as received
    pub message_type: u8,
}

impl L3Header {
    /// Size of the header in bytes
    pub const SIZE: usize = 2;

    /// Decode the header, leaving the information elements in `buf`.
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, HeaderError> {
        if buf.remaining() < Self::SIZE {
            return Err(HeaderError::BufferTooShort {
                expected: Self::SIZE,
                actual: buf.remaining(),
            });
        }
        let pd_octet = buf.get_u8();
        let message_type = buf.get_u8();
        Ok(Self {
            pd_octet,
            message_type,
        })
    }

    /// Raw protocol discriminator nibble.
    pub fn pd(&self) -> u8 {
        self.pd_octet & 0x0F
    }

    /// Protocol discriminator, `None` when not one MM knows about.
    pub fn protocol(&self) -> Option<ProtocolDiscriminator> {
        ProtocolDiscriminator::try_from(self.pd()).ok()
    }

    /// Skip indicator (MM) or transaction identifier octet nibble (CM).
    pub fn skip_indicator(&self) -> u8 {
        self.pd_octet >> 4
    }

    /// Transaction identifier as seen from the mobile side: the TI flag is
    /// inverted relative to the sender.
    pub fn transaction_id(&self) -> u8 {
        ((self.pd_octet & 0xF0) ^ 0x80) >> 4
    }

    /// MM message type with the sequence number bit masked out.
    pub fn mm_message_type(&self) -> Result<MmMessageType, HeaderError> {
        let raw = self.message_type & MmMessageType::TYPE_MASK;
        MmMessageType::try_from(raw).map_err(|_| HeaderError::InvalidMessageType(raw))
    }
}

/// Header of an MM message (skip indicator 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmHeader {
    pub message_type: MmMessageType,
}

impl MmHeader {
    pub const SIZE: usize = L3Header::SIZE;

    pub fn new(message_type: MmMessageType) -> Self {
        Self { message_type }
    }

    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, HeaderError> {
        let raw = L3Header::decode(buf)?;
        let pd = u8::from(ProtocolDiscriminator::MobilityManagement);
        if raw.pd() != pd {
            return Err(HeaderError::PdMismatch {
                expected: pd,
                actual: raw.pd(),
            });
        }
        Ok(Self {
            message_type: raw.mm_message_type()?,
        })
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(ProtocolDiscriminator::MobilityManagement.into());
        buf.put_u8(self.message_type.into());
    }
}
