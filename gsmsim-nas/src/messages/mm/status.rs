//! MM Status (TS 04.08 9.2.16)

use bytes::{Buf, BufMut};

use crate::codec::{ensure_remaining, CodecResult, MmMessage};
use crate::enums::{MmMessageType, RejectCause};

/// MM STATUS, sent by either side to report an unexpected message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmStatus {
    pub cause: RejectCause,
}

impl MmStatus {
    pub fn new(cause: RejectCause) -> Self {
        Self { cause }
    }
}

impl MmMessage for MmStatus {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::MmStatus;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        buf.put_u8(self.cause.0);
        Ok(())
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        ensure_remaining(buf, 1)?;
        Ok(Self::new(RejectCause(buf.get_u8())))
    }
}
