//! IMSI Detach Indication (TS 04.08 9.2.12)

use bytes::{Buf, BufMut};

use crate::codec::{CodecResult, MmMessage};
use crate::enums::MmMessageType;
use crate::ies::{Classmark1, MobileIdentity};

/// IMSI DETACH INDICATION
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImsiDetachIndication {
    pub classmark1: Classmark1,
    pub identity: MobileIdentity,
}

impl ImsiDetachIndication {
    pub fn new(classmark1: Classmark1, identity: MobileIdentity) -> Self {
        Self {
            classmark1,
            identity,
        }
    }
}

impl MmMessage for ImsiDetachIndication {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::ImsiDetachIndication;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        self.classmark1.encode(buf);
        self.identity.encode_lv(buf)?;
        Ok(())
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        let classmark1 = Classmark1::decode(buf)?;
        let identity = MobileIdentity::decode_lv(buf)?;
        Ok(Self {
            classmark1,
            identity,
        })
    }
}
