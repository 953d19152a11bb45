//! Authentication messages (TS 04.08 9.2.1 to 9.2.3)

use bytes::{Buf, BufMut};

use crate::codec::{ensure_remaining, CodecResult, MmMessage};
use crate::enums::MmMessageType;

/// AUTHENTICATION REQUEST: ciphering key sequence number and RAND.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticationRequest {
    pub key_seq: u8,
    pub rand: [u8; 16],
}

impl AuthenticationRequest {
    pub fn new(key_seq: u8, rand: [u8; 16]) -> Self {
        Self { key_seq, rand }
    }
}

impl MmMessage for AuthenticationRequest {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::AuthenticationRequest;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        buf.put_u8(self.key_seq & 0x07);
        buf.put_slice(&self.rand);
        Ok(())
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        ensure_remaining(buf, 17)?;
        let key_seq = buf.get_u8() & 0x07;
        let mut rand = [0u8; 16];
        buf.copy_to_slice(&mut rand);
        Ok(Self { key_seq, rand })
    }
}

/// AUTHENTICATION RESPONSE: SRES computed by the SIM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticationResponse {
    pub sres: [u8; 4],
}

impl AuthenticationResponse {
    pub fn new(sres: [u8; 4]) -> Self {
        Self { sres }
    }
}

impl MmMessage for AuthenticationResponse {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::AuthenticationResponse;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        buf.put_slice(&self.sres);
        Ok(())
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        ensure_remaining(buf, 4)?;
        let mut sres = [0u8; 4];
        buf.copy_to_slice(&mut sres);
        Ok(Self { sres })
    }
}

/// AUTHENTICATION REJECT (no IEs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AuthenticationReject;

impl MmMessage for AuthenticationReject {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::AuthenticationReject;

    fn encode_body<B: BufMut>(&self, _buf: &mut B) -> CodecResult<()> {
        Ok(())
    }

    fn decode_body<B: Buf>(_buf: &mut B) -> CodecResult<Self> {
        Ok(Self)
    }
}
