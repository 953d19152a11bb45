//! Location updating messages (TS 04.08 9.2.13 to 9.2.15)

use bytes::{Buf, BufMut};
use gsmsim_common::Lai;

use super::decode_lai;
use crate::codec::{ensure_remaining, take_rest, CodecResult, MmMessage};
use crate::enums::{LocationUpdatingType, MmMessageType, RejectCause};
use crate::ies::{Classmark1, IeFormat, MobileIdentity, TlvParser};

pub const IEI_MOBILE_IDENTITY: u8 = 0x17;
pub const IEI_FOLLOW_ON_PROCEED: u8 = 0xA1;
pub const IEI_CTS_PERMISSION: u8 = 0xA2;
pub const IEI_EQUIVALENT_PLMNS: u8 = 0x4A;

const ACCEPT_IES: &[(u8, IeFormat)] = &[
    (IEI_MOBILE_IDENTITY, IeFormat::Tlv),
    (IEI_FOLLOW_ON_PROCEED, IeFormat::T),
    (IEI_CTS_PERMISSION, IeFormat::T),
    (IEI_EQUIVALENT_PLMNS, IeFormat::Tlv),
];

/// LOCATION UPDATING REQUEST
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationUpdatingRequest {
    pub update_type: LocationUpdatingType,
    /// Follow-on request pending
    pub follow_on: bool,
    pub key_seq: u8,
    pub lai: Lai,
    pub classmark1: Classmark1,
    pub identity: MobileIdentity,
}

impl LocationUpdatingRequest {
    pub fn new(
        update_type: LocationUpdatingType,
        key_seq: u8,
        lai: Lai,
        classmark1: Classmark1,
        identity: MobileIdentity,
    ) -> Self {
        Self {
            update_type,
            follow_on: false,
            key_seq,
            lai,
            classmark1,
            identity,
        }
    }
}

impl MmMessage for LocationUpdatingRequest {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::LocationUpdatingRequest;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        let update_type: u8 = self.update_type.into();
        buf.put_u8(((self.key_seq & 0x07) << 4) | (u8::from(self.follow_on) << 3) | update_type);
        buf.put_slice(&self.lai.encode());
        self.classmark1.encode(buf);
        self.identity.encode_lv(buf)?;
        Ok(())
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        ensure_remaining(buf, 1)?;
        let octet = buf.get_u8();
        let update_type = LocationUpdatingType::try_from(octet & 0x03)
            .unwrap_or(LocationUpdatingType::Normal);
        let lai = decode_lai(buf)?;
        let classmark1 = Classmark1::decode(buf)?;
        let identity = MobileIdentity::decode_lv(buf)?;
        Ok(Self {
            update_type,
            follow_on: octet & 0x08 != 0,
            key_seq: (octet >> 4) & 0x07,
            lai,
            classmark1,
            identity,
        })
    }
}

/// LOCATION UPDATING ACCEPT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationUpdatingAccept {
    pub lai: Lai,
    pub identity: Option<MobileIdentity>,
    pub follow_on_proceed: bool,
}

impl LocationUpdatingAccept {
    pub fn new(lai: Lai) -> Self {
        Self {
            lai,
            identity: None,
            follow_on_proceed: false,
        }
    }

    pub fn with_identity(mut self, identity: MobileIdentity) -> Self {
        self.identity = Some(identity);
        self
    }
}

impl MmMessage for LocationUpdatingAccept {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::LocationUpdatingAccept;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        buf.put_slice(&self.lai.encode());
        if let Some(identity) = &self.identity {
            buf.put_u8(IEI_MOBILE_IDENTITY);
            identity.encode_lv(buf)?;
        }
        if self.follow_on_proceed {
            buf.put_u8(IEI_FOLLOW_ON_PROCEED);
        }
        Ok(())
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        let lai = decode_lai(buf)?;
        let optional = TlvParser::new(ACCEPT_IES).parse(&take_rest(buf))?;
        let identity = optional
            .get(IEI_MOBILE_IDENTITY)
            .map(MobileIdentity::decode_value)
            .transpose()?;
        Ok(Self {
            lai,
            identity,
            follow_on_proceed: optional.contains(IEI_FOLLOW_ON_PROCEED),
        })
    }
}

/// LOCATION UPDATING REJECT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationUpdatingReject {
    pub cause: RejectCause,
}

impl LocationUpdatingReject {
    pub fn new(cause: RejectCause) -> Self {
        Self { cause }
    }
}

impl MmMessage for LocationUpdatingReject {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::LocationUpdatingReject;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        buf.put_u8(self.cause.0);
        Ok(())
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        ensure_remaining(buf, 1)?;
        Ok(Self::new(RejectCause(buf.get_u8())))
    }
}
