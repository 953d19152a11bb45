//! MM Information (TS 04.08 9.2.15a)

use bytes::{Buf, BufMut};

use crate::codec::{take_rest, CodecResult, MmMessage};
use crate::enums::MmMessageType;
use crate::ies::{IeFormat, NetworkName, TlvParser};

pub const IEI_FULL_NAME: u8 = 0x43;
pub const IEI_SHORT_NAME: u8 = 0x45;
pub const IEI_LOCAL_TIME_ZONE: u8 = 0x46;
pub const IEI_UNIVERSAL_TIME: u8 = 0x47;
pub const IEI_LSA_IDENTITY: u8 = 0x48;
pub const IEI_DAYLIGHT_SAVING: u8 = 0x49;

const INFO_IES: &[(u8, IeFormat)] = &[
    (IEI_FULL_NAME, IeFormat::Tlv),
    (IEI_SHORT_NAME, IeFormat::Tlv),
    (IEI_LOCAL_TIME_ZONE, IeFormat::Tv(1)),
    (IEI_UNIVERSAL_TIME, IeFormat::Tv(7)),
    (IEI_LSA_IDENTITY, IeFormat::Tlv),
    (IEI_DAYLIGHT_SAVING, IeFormat::Tlv),
];

/// MM INFORMATION, carrying the network names.
///
/// Names in an unsupported coding are dropped rather than failing the
/// whole message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MmInformation {
    pub full_name: Option<NetworkName>,
    pub short_name: Option<NetworkName>,
}

impl MmMessage for MmInformation {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::MmInformation;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        for (iei, name) in [
            (IEI_FULL_NAME, &self.full_name),
            (IEI_SHORT_NAME, &self.short_name),
        ] {
            if let Some(name) = name {
                let value = name.encode_value();
                buf.put_u8(iei);
                buf.put_u8(value.len() as u8);
                buf.put_slice(&value);
            }
        }
        Ok(())
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        let optional = TlvParser::new(INFO_IES).parse(&take_rest(buf))?;
        let name = |iei| {
            optional
                .get(iei)
                .and_then(|value| NetworkName::decode_value(value).ok())
        };
        Ok(Self {
            full_name: name(IEI_FULL_NAME),
            short_name: name(IEI_SHORT_NAME),
        })
    }
}
