use super::{ensure_len, IeError};

/// GSM 03.38 default alphabet, indexed by septet value.
const GSM_DEFAULT_ALPHABET: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å',
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\u{1b}', 'Æ', 'æ', 'ß', 'É',
    ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/',
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?',
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O',
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§',
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o',
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à',
];

/// Network Name (TS 04.08 10.5.3.5a)
///
/// The first value octet carries the coding scheme (bits 5-7, 0 = GSM
/// default alphabet) and the number of spare bits in the last octet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkName(pub String);

impl NetworkName {
    /// Decodes the value part of the IE.
    pub fn decode_value(value: &[u8]) -> Result<Self, IeError> {
        ensure_len(value.len(), 1)?;
        let coding = value[0] & 0x70;
        if coding != 0 {
            return Err(IeError::UnsupportedCoding(coding >> 4));
        }
        let spare_bits = (value[0] & 0x07) as usize;
        let total_bits = (value.len() - 1) * 8;
        let count = total_bits.saturating_sub(spare_bits) / 7;
        Ok(Self(unpack_septets(&value[1..], count)))
    }

    /// Encodes the value part with the default alphabet. Characters outside
    /// the alphabet are sent as '?'.
    pub fn encode_value(&self) -> Vec<u8> {
        let septets: Vec<u8> = self
            .0
            .chars()
            .map(|c| {
                GSM_DEFAULT_ALPHABET
                    .iter()
                    .position(|&a| a == c)
                    .unwrap_or(0x3F) as u8
            })
            .collect();
        let packed = pack_septets(&septets);
        let spare_bits = (packed.len() * 8 - septets.len() * 7) as u8;
        let mut out = Vec::with_capacity(packed.len() + 1);
        out.push(0x80 | spare_bits);
        out.extend_from_slice(&packed);
        out
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn unpack_septets(data: &[u8], count: usize) -> String {
    (0..count)
        .filter_map(|i| {
            let bit = i * 7;
            let byte = bit / 8;
            let shift = bit % 8;
            let low = *data.get(byte)? as u16;
            let high = data.get(byte + 1).copied().unwrap_or(0) as u16;
            let septet = (((high << 8) | low) >> shift) & 0x7F;
            Some(GSM_DEFAULT_ALPHABET[septet as usize])
        })
        .collect()
}

fn pack_septets(septets: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; (septets.len() * 7).div_ceil(8)];
    for (i, &septet) in septets.iter().enumerate() {
        let bit = i * 7;
        let byte = bit / 8;
        let shift = bit % 8;
        out[byte] |= septet << shift;
        if shift > 1 {
            if let Some(next) = out.get_mut(byte + 1) {
                *next |= septet >> (8 - shift);
            }
        }
    }
    out
}
