//! TMSI reallocation messages (TS 04.08 9.2.17, 9.2.18)

use bytes::{Buf, BufMut};
use gsmsim_common::Lai;

use super::decode_lai;
use crate::codec::{CodecResult, MmMessage};
use crate::enums::MmMessageType;
use crate::ies::MobileIdentity;

/// TMSI REALLOCATION COMMAND
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmsiReallocationCommand {
    pub lai: Lai,
    pub identity: MobileIdentity,
}

impl TmsiReallocationCommand {
    pub fn new(lai: Lai, identity: MobileIdentity) -> Self {
        Self { lai, identity }
    }
}

impl MmMessage for TmsiReallocationCommand {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::TmsiReallocationCommand;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        buf.put_slice(&self.lai.encode());
        self.identity.encode_lv(buf)?;
        Ok(())
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        let lai = decode_lai(buf)?;
        let identity = MobileIdentity::decode_lv(buf)?;
        Ok(Self { lai, identity })
    }
}

/// TMSI REALLOCATION COMPLETE (no IEs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TmsiReallocationComplete;

impl MmMessage for TmsiReallocationComplete {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::TmsiReallocationComplete;

    fn encode_body<B: BufMut>(&self, _buf: &mut B) -> CodecResult<()> {
        Ok(())
    }

    fn decode_body<B: Buf>(_buf: &mut B) -> CodecResult<Self> {
        Ok(Self)
    }
}
