//! Abort (TS 04.08 9.2.8)

use bytes::{Buf, BufMut};

use crate::codec::{ensure_remaining, CodecResult, MmMessage};
use crate::enums::{MmMessageType, RejectCause};

/// ABORT, sent by the network to abort all MM connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abort {
    pub cause: RejectCause,
}

impl Abort {
    pub fn new(cause: RejectCause) -> Self {
        Self { cause }
    }
}

impl MmMessage for Abort {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::Abort;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        buf.put_u8(self.cause.0);
        Ok(())
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        ensure_remaining(buf, 1)?;
        Ok(Self::new(RejectCause(buf.get_u8())))
    }
}
