use bytes::{Buf, BufMut};

use super::{ensure_len, IeError};

/// Mobile Station Classmark 1 (TS 04.08 10.5.1.5), type 3, one octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classmark1(pub u8);

impl Classmark1 {
    /// Builds the octet from its fields.
    pub fn new(rev_level: u8, early_send: bool, a5_1_unavailable: bool, power_level: u8) -> Self {
        Self(
            ((rev_level & 0x03) << 5)
                | (u8::from(early_send) << 4)
                | (u8::from(a5_1_unavailable) << 3)
                | (power_level & 0x07),
        )
    }

    pub fn rev_level(&self) -> u8 {
        (self.0 >> 5) & 0x03
    }

    pub fn power_level(&self) -> u8 {
        self.0 & 0x07
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.0);
    }

    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, IeError> {
        ensure_len(buf.remaining(), 1)?;
        Ok(Self(buf.get_u8()))
    }
}

/// Mobile Station Classmark 2 (TS 04.08 10.5.1.6), type 4, three octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classmark2(pub [u8; 3]);

impl Classmark2 {
    pub fn encode_lv<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.0.len() as u8);
        buf.put_slice(&self.0);
    }

    pub fn decode_lv<B: Buf>(buf: &mut B) -> Result<Self, IeError> {
        ensure_len(buf.remaining(), 1)?;
        let length = buf.get_u8() as usize;
        if length > buf.remaining() {
            return Err(IeError::LengthExceedsBuffer {
                length,
                remaining: buf.remaining(),
            });
        }
        ensure_len(length, 3)?;
        let mut value = [0u8; 3];
        buf.copy_to_slice(&mut value);
        buf.advance(length - 3);
        Ok(Self(value))
    }
}
