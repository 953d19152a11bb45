//! Identity messages (TS 04.08 9.2.10, 9.2.11)

use bytes::{Buf, BufMut};

use crate::codec::{ensure_remaining, CodecResult, MmMessage};
use crate::enums::{IdentityType, MmMessageType};
use crate::ies::MobileIdentity;

/// IDENTITY REQUEST
///
/// The requested type is kept raw so an unknown value can still be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityRequest {
    pub identity_type: u8,
}

impl IdentityRequest {
    pub fn new(identity_type: IdentityType) -> Self {
        Self {
            identity_type: identity_type.into(),
        }
    }

    /// Requested identity type, `None` for reserved values.
    pub fn requested(&self) -> Option<IdentityType> {
        IdentityType::try_from(self.identity_type).ok()
    }
}

impl MmMessage for IdentityRequest {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::IdentityRequest;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        buf.put_u8(self.identity_type & 0x07);
        Ok(())
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        ensure_remaining(buf, 1)?;
        Ok(Self {
            identity_type: buf.get_u8() & 0x07,
        })
    }
}

/// IDENTITY RESPONSE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityResponse {
    pub identity: MobileIdentity,
}

impl IdentityResponse {
    pub fn new(identity: MobileIdentity) -> Self {
        Self { identity }
    }
}

impl MmMessage for IdentityResponse {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::IdentityResponse;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        self.identity.encode_lv(buf)?;
        Ok(())
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        Ok(Self::new(MobileIdentity::decode_lv(buf)?))
    }
}
