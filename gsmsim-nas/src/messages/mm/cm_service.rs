//! CM service messages (TS 04.08 9.2.5 to 9.2.9)

use bytes::{Buf, BufMut};

use crate::codec::{ensure_remaining, CodecError, CodecResult, MmMessage};
use crate::enums::{CmServiceType, MmMessageType, RejectCause};
use crate::ies::{Classmark2, MobileIdentity};

/// CM SERVICE REQUEST
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmServiceRequest {
    pub service_type: CmServiceType,
    pub key_seq: u8,
    pub classmark2: Classmark2,
    pub identity: MobileIdentity,
}

impl CmServiceRequest {
    pub fn new(
        service_type: CmServiceType,
        key_seq: u8,
        classmark2: Classmark2,
        identity: MobileIdentity,
    ) -> Self {
        Self {
            service_type,
            key_seq,
            classmark2,
            identity,
        }
    }
}

impl MmMessage for CmServiceRequest {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::CmServiceRequest;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        let service_type: u8 = self.service_type.into();
        buf.put_u8(((self.key_seq & 0x07) << 4) | service_type);
        self.classmark2.encode_lv(buf);
        self.identity.encode_lv(buf)?;
        Ok(())
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        ensure_remaining(buf, 1)?;
        let octet = buf.get_u8();
        let service_type = CmServiceType::try_from(octet & 0x0F).map_err(|_| {
            CodecError::InvalidValue(format!("CM service type {}", octet & 0x0F))
        })?;
        let classmark2 = Classmark2::decode_lv(buf)?;
        let identity = MobileIdentity::decode_lv(buf)?;
        Ok(Self {
            service_type,
            key_seq: (octet >> 4) & 0x07,
            classmark2,
            identity,
        })
    }
}

/// CM SERVICE ACCEPT (no IEs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CmServiceAccept;

impl MmMessage for CmServiceAccept {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::CmServiceAccept;

    fn encode_body<B: BufMut>(&self, _buf: &mut B) -> CodecResult<()> {
        Ok(())
    }

    fn decode_body<B: Buf>(_buf: &mut B) -> CodecResult<Self> {
        Ok(Self)
    }
}

/// CM SERVICE REJECT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmServiceReject {
    pub cause: RejectCause,
}

impl CmServiceReject {
    pub fn new(cause: RejectCause) -> Self {
        Self { cause }
    }
}

impl MmMessage for CmServiceReject {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::CmServiceReject;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        buf.put_u8(self.cause.0);
        Ok(())
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        ensure_remaining(buf, 1)?;
        Ok(Self::new(RejectCause(buf.get_u8())))
    }
}

/// CM SERVICE ABORT (no IEs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CmServiceAbort;

impl MmMessage for CmServiceAbort {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::CmServiceAbort;

    fn encode_body<B: BufMut>(&self, _buf: &mut B) -> CodecResult<()> {
        Ok(())
    }

    fn decode_body<B: Buf>(_buf: &mut B) -> CodecResult<Self> {
        Ok(Self)
    }
}
