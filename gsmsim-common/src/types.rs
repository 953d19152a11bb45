//! Core GSM identifiers: PLMN and location area identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Public Land Mobile Network identifier.
///
/// A PLMN is an MCC (3 decimal digits) plus an MNC (2 or 3 decimal digits).
/// `long_mnc` records whether the MNC was coded with 3 digits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Plmn {
    /// Mobile Country Code (3 digits, range 0-999)
    pub mcc: u16,
    /// Mobile Network Code (2-3 digits, range 0-999)
    pub mnc: u16,
    /// True if MNC is 3 digits, false if 2 digits
    #[serde(default)]
    pub long_mnc: bool,
}

impl Plmn {
    /// Creates a new PLMN with the given MCC and MNC.
    pub const fn new(mcc: u16, mnc: u16, long_mnc: bool) -> Self {
        Self { mcc, mnc, long_mnc }
    }

    /// Returns true if this PLMN has valid values set.
    pub fn has_value(&self) -> bool {
        self.mcc > 0 || self.mnc > 0
    }

    /// Encodes the PLMN into the 3-octet layer 3 format (TS 04.08 10.5.1.3).
    ///
    /// - Octet 0: MCC digit 2 (high nibble) | MCC digit 1 (low nibble)
    /// - Octet 1: MNC digit 3 or 0xF (high nibble) | MCC digit 3 (low nibble)
    /// - Octet 2: MNC digit 2 (high nibble) | MNC digit 1 (low nibble)
    pub fn encode(&self) -> [u8; 3] {
        let mcc = self.mcc;
        let mcc3 = (mcc % 10) as u8;
        let mcc2 = ((mcc % 100) / 10) as u8;
        let mcc1 = ((mcc % 1000) / 100) as u8;

        let mnc = self.mnc;
        let (mnc1, mnc2, mnc3) = if self.long_mnc {
            (
                ((mnc % 1000) / 100) as u8,
                ((mnc % 100) / 10) as u8,
                (mnc % 10) as u8,
            )
        } else {
            (((mnc % 100) / 10) as u8, (mnc % 10) as u8, 0x0F)
        };

        [(mcc2 << 4) | mcc1, (mnc3 << 4) | mcc3, (mnc2 << 4) | mnc1]
    }

    /// Decodes a PLMN from the 3-octet layer 3 format.
    pub fn decode(bytes: [u8; 3]) -> Self {
        let [octet1, octet2, octet3] = bytes;

        let mcc1 = (octet1 & 0x0F) as u16;
        let mcc2 = ((octet1 >> 4) & 0x0F) as u16;
        let mcc3 = (octet2 & 0x0F) as u16;
        let mcc = 100 * mcc1 + 10 * mcc2 + mcc3;

        let mnc3 = (octet2 >> 4) & 0x0F;
        let mnc1 = (octet3 & 0x0F) as u16;
        let mnc2 = ((octet3 >> 4) & 0x0F) as u16;

        let (mnc, long_mnc) = if mnc3 != 0x0F {
            (10 * (10 * mnc1 + mnc2) + mnc3 as u16, true)
        } else {
            (10 * mnc1 + mnc2, false)
        };

        Self { mcc, mnc, long_mnc }
    }
}

impl fmt::Debug for Plmn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.long_mnc {
            write!(f, "Plmn({:03}-{:03})", self.mcc, self.mnc)
        } else {
            write!(f, "Plmn({:03}-{:02})", self.mcc, self.mnc)
        }
    }
}

impl fmt::Display for Plmn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.long_mnc {
            write!(f, "{:03}{:03}", self.mcc, self.mnc)
        } else {
            write!(f, "{:03}{:02}", self.mcc, self.mnc)
        }
    }
}

/// Location Area Identity: PLMN plus a 16-bit location area code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Lai {
    pub plmn: Plmn,
    pub lac: u16,
}

impl Lai {
    /// Encoded length of the LAI value part.
    pub const LENGTH: usize = 5;

    pub const fn new(plmn: Plmn, lac: u16) -> Self {
        Self { plmn, lac }
    }

    /// Encodes the LAI value part (PLMN followed by LAC, big endian).
    pub fn encode(&self) -> [u8; Self::LENGTH] {
        let plmn = self.plmn.encode();
        let lac = self.lac.to_be_bytes();
        [plmn[0], plmn[1], plmn[2], lac[0], lac[1]]
    }

    /// Decodes the LAI value part.
    pub fn decode(bytes: [u8; Self::LENGTH]) -> Self {
        Self {
            plmn: Plmn::decode([bytes[0], bytes[1], bytes[2]]),
            lac: u16::from_be_bytes([bytes[3], bytes[4]]),
        }
    }
}

impl fmt::Display for Lai {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:#06x}", self.plmn, self.lac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plmn_encode_2digit_mnc() {
        let plmn = Plmn::new(262, 42, false);
        assert_eq!(plmn.encode(), [0x62, 0xF2, 0x24]);
    }

    #[test]
    fn test_plmn_encode_3digit_mnc() {
        let plmn = Plmn::new(310, 410, true);
        assert_eq!(plmn.encode(), [0x13, 0x00, 0x14]);
    }

    #[test]
    fn test_plmn_decode() {
        assert_eq!(Plmn::decode([0x62, 0xF2, 0x24]), Plmn::new(262, 42, false));
        assert_eq!(Plmn::decode([0x13, 0x00, 0x14]), Plmn::new(310, 410, true));
    }

    #[test]
    fn test_plmn_display() {
        assert_eq!(Plmn::new(1, 1, false).to_string(), "00101");
        assert_eq!(format!("{:?}", Plmn::new(310, 410, true)), "Plmn(310-410)");
    }

    #[test]
    fn test_lai_encode() {
        let lai = Lai::new(Plmn::new(262, 42, false), 0x1234);
        assert_eq!(lai.encode(), [0x62, 0xF2, 0x24, 0x12, 0x34]);
        assert_eq!(Lai::decode(lai.encode()), lai);
    }

    #[test]
    fn test_lai_display() {
        let lai = Lai::new(Plmn::new(1, 1, false), 0x0017);
        assert_eq!(lai.to_string(), "00101/0x0017");
    }
}
