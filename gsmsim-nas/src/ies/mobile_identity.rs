use std::fmt;

use bytes::{Buf, BufMut};

use super::{ensure_len, IeError};
use crate::enums::IdentityType;

/// Mobile Identity (TS 04.08 10.5.1.4)
///
/// IMSI, IMEI and IMEISV are BCD coded with an odd/even flag; the TMSI is a
/// 32-bit value behind a filler nibble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MobileIdentity {
    NoIdentity,
    Imsi(String),
    Imei(String),
    Imeisv(String),
    Tmsi(u32),
}

impl MobileIdentity {
    /// Maximum length of the value part (IMEISV, 16 digits).
    pub const MAX_LEN: usize = 9;

    pub fn identity_type(&self) -> IdentityType {
        match self {
            MobileIdentity::NoIdentity => IdentityType::NoIdentity,
            MobileIdentity::Imsi(_) => IdentityType::Imsi,
            MobileIdentity::Imei(_) => IdentityType::Imei,
            MobileIdentity::Imeisv(_) => IdentityType::Imeisv,
            MobileIdentity::Tmsi(_) => IdentityType::Tmsi,
        }
    }

    /// Encodes the value part (without length octet).
    pub fn encode_value(&self) -> Result<Vec<u8>, IeError> {
        let type_bits: u8 = self.identity_type().into();
        match self {
            MobileIdentity::NoIdentity => Ok(vec![0xF0 | type_bits]),
            MobileIdentity::Tmsi(tmsi) => {
                let mut out = Vec::with_capacity(5);
                out.put_u8(0xF0 | type_bits);
                out.put_u32(*tmsi);
                Ok(out)
            }
            MobileIdentity::Imsi(digits)
            | MobileIdentity::Imei(digits)
            | MobileIdentity::Imeisv(digits) => encode_bcd(digits, type_bits),
        }
    }

    /// Encodes as LV (length octet followed by the value).
    pub fn encode_lv<B: BufMut>(&self, buf: &mut B) -> Result<(), IeError> {
        let value = self.encode_value()?;
        buf.put_u8(value.len() as u8);
        buf.put_slice(&value);
        Ok(())
    }

    /// Decodes the value part.
    pub fn decode_value(value: &[u8]) -> Result<Self, IeError> {
        ensure_len(value.len(), 1)?;
        let type_bits = value[0] & 0x07;
        let identity_type =
            IdentityType::try_from(type_bits).map_err(|_| IeError::InvalidIdentityType(type_bits))?;

        match identity_type {
            IdentityType::NoIdentity => Ok(MobileIdentity::NoIdentity),
            IdentityType::Tmsi => {
                ensure_len(value.len(), 5)?;
                let mut rest = &value[1..5];
                Ok(MobileIdentity::Tmsi(rest.get_u32()))
            }
            IdentityType::Imsi => Ok(MobileIdentity::Imsi(decode_bcd(value))),
            IdentityType::Imei => Ok(MobileIdentity::Imei(decode_bcd(value))),
            IdentityType::Imeisv => Ok(MobileIdentity::Imeisv(decode_bcd(value))),
        }
    }

    /// Decodes an LV encoded identity.
    pub fn decode_lv<B: Buf>(buf: &mut B) -> Result<Self, IeError> {
        ensure_len(buf.remaining(), 1)?;
        let length = buf.get_u8() as usize;
        if length > buf.remaining() {
            return Err(IeError::LengthExceedsBuffer {
                length,
                remaining: buf.remaining(),
            });
        }
        let mut value = vec![0u8; length];
        buf.copy_to_slice(&mut value);
        Self::decode_value(&value)
    }
}

fn encode_bcd(digits: &str, type_bits: u8) -> Result<Vec<u8>, IeError> {
    let nibbles = digits
        .chars()
        .map(|c| c.to_digit(10).map(|d| d as u8))
        .collect::<Option<Vec<u8>>>()
        .filter(|n| !n.is_empty() && n.len() <= 16)
        .ok_or_else(|| IeError::InvalidDigits(digits.to_string()))?;

    let odd = nibbles.len() % 2 == 1;
    let mut out = Vec::with_capacity(nibbles.len() / 2 + 1);
    out.push((nibbles[0] << 4) | if odd { 0x08 } else { 0x00 } | type_bits);
    for pair in nibbles[1..].chunks(2) {
        let high = pair.get(1).copied().unwrap_or(0x0F);
        out.push((high << 4) | pair[0]);
    }
    Ok(out)
}

fn decode_bcd(value: &[u8]) -> String {
    let odd = value[0] & 0x08 != 0;
    let mut digits = String::with_capacity(value.len() * 2);
    push_digit(&mut digits, value[0] >> 4);
    for (i, octet) in value[1..].iter().enumerate() {
        push_digit(&mut digits, octet & 0x0F);
        let last = i + 2 == value.len();
        if !(last && !odd) {
            push_digit(&mut digits, octet >> 4);
        }
    }
    digits
}

fn push_digit(out: &mut String, nibble: u8) {
    if nibble <= 9 {
        out.push(char::from(b'0' + nibble));
    }
}

impl fmt::Display for MobileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MobileIdentity::NoIdentity => write!(f, "none"),
            MobileIdentity::Imsi(d) => write!(f, "IMSI:{d}"),
            MobileIdentity::Imei(d) => write!(f, "IMEI:{d}"),
            MobileIdentity::Imeisv(d) => write!(f, "IMEISV:{d}"),
            MobileIdentity::Tmsi(t) => write!(f, "TMSI:0x{t:08x}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imsi_encode() {
        let mi = MobileIdentity::Imsi("262420000000001".into());
        let mut buf = Vec::new();
        mi.encode_lv(&mut buf).unwrap();
        assert_eq!(
            buf,
            vec![0x08, 0x29, 0x26, 0x24, 0x00, 0x00, 0x00, 0x00, 0x10]
        );
    }

    #[test]
    fn test_imeisv_even_digits_filler() {
        let mi = MobileIdentity::Imeisv("3569380356438091".into());
        let value = mi.encode_value().unwrap();
        assert_eq!(value.len(), 9);
        assert_eq!(value[0], 0x33);
        assert_eq!(value[8] & 0xF0, 0xF0);
        assert_eq!(MobileIdentity::decode_value(&value).unwrap(), mi);
    }

    #[test]
    fn test_tmsi_encode() {
        let mi = MobileIdentity::Tmsi(0x1234_5678);
        assert_eq!(
            mi.encode_value().unwrap(),
            vec![0xF4, 0x12, 0x34, 0x56, 0x78]
        );
        let decoded = MobileIdentity::decode_lv(&mut &[0x05, 0xF4, 0x12, 0x34, 0x56, 0x78][..]);
        assert_eq!(decoded.unwrap(), mi);
    }

    #[test]
    fn test_no_identity() {
        let mut buf = Vec::new();
        MobileIdentity::NoIdentity.encode_lv(&mut buf).unwrap();
        assert_eq!(buf, vec![0x01, 0xF0]);
    }

    #[test]
    fn test_decode_invalid_type() {
        assert_eq!(
            MobileIdentity::decode_value(&[0xF6]),
            Err(IeError::InvalidIdentityType(6))
        );
    }

    #[test]
    fn test_decode_short_tmsi() {
        assert!(matches!(
            MobileIdentity::decode_value(&[0xF4, 0x01]),
            Err(IeError::BufferTooShort { .. })
        ));
    }

    #[test]
    fn test_decode_length_exceeds() {
        let result = MobileIdentity::decode_lv(&mut &[0x08, 0x29, 0x26][..]);
        assert!(matches!(result, Err(IeError::LengthExceedsBuffer { .. })));
    }

    #[test]
    fn test_encode_rejects_non_digits() {
        let mi = MobileIdentity::Imsi("26242abc".into());
        assert!(matches!(mi.encode_value(), Err(IeError::InvalidDigits(_))));
    }
}
