//! Layer 3 protocol enumerations
//!
//! Based on 3GPP TS 04.08 sections 10.2, 10.4 and 10.5.

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Protocol Discriminator (TS 04.08 10.2), low nibble of the first octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ProtocolDiscriminator {
    /// Call control
    CallControl = 0x03,
    /// Mobility management
    MobilityManagement = 0x05,
    /// Radio resource management
    RadioResource = 0x06,
    /// Short message service
    Sms = 0x09,
    /// Supplementary services (non call related)
    SupplementaryServices = 0x0B,
}

impl ProtocolDiscriminator {
    /// Returns true for the CM protocols multiplexed over MM connections.
    pub fn is_cm(&self) -> bool {
        matches!(
            self,
            ProtocolDiscriminator::CallControl
                | ProtocolDiscriminator::SupplementaryServices
                | ProtocolDiscriminator::Sms
        )
    }
}

/// MM Message Type (TS 04.08 10.4, table 10.2)
///
/// Bit 7 (N(SD)) is not part of the type; callers mask with `0xbf`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum MmMessageType {
    // Registration messages
    ImsiDetachIndication = 0x01,
    LocationUpdatingAccept = 0x02,
    LocationUpdatingReject = 0x04,
    LocationUpdatingRequest = 0x08,

    // Security messages
    AuthenticationReject = 0x11,
    AuthenticationRequest = 0x12,
    AuthenticationResponse = 0x14,
    IdentityRequest = 0x18,
    IdentityResponse = 0x19,
    TmsiReallocationCommand = 0x1A,
    TmsiReallocationComplete = 0x1B,

    // Connection management messages
    CmServiceAccept = 0x21,
    CmServiceReject = 0x22,
    CmServiceAbort = 0x23,
    CmServiceRequest = 0x24,
    CmServicePrompt = 0x25,
    CmReestablishmentRequest = 0x28,
    Abort = 0x29,

    // Miscellaneous messages
    MmNull = 0x30,
    MmStatus = 0x31,
    MmInformation = 0x32,
}

impl MmMessageType {
    /// Mask removing the send sequence number bit.
    pub const TYPE_MASK: u8 = 0xBF;

    /// Short uppercase name as used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            MmMessageType::ImsiDetachIndication => "IMSI_DETACH_IND",
            MmMessageType::LocationUpdatingAccept => "LOC_UPD_ACCEPT",
            MmMessageType::LocationUpdatingReject => "LOC_UPD_REJECT",
            MmMessageType::LocationUpdatingRequest => "LOC_UPD_REQUEST",
            MmMessageType::AuthenticationReject => "AUTH_REJ",
            MmMessageType::AuthenticationRequest => "AUTH_REQ",
            MmMessageType::AuthenticationResponse => "AUTH_RESP",
            MmMessageType::IdentityRequest => "ID_REQ",
            MmMessageType::IdentityResponse => "ID_RESP",
            MmMessageType::TmsiReallocationCommand => "TMSI_REALL_CMD",
            MmMessageType::TmsiReallocationComplete => "TMSI_REALL_COMPL",
            MmMessageType::CmServiceAccept => "CM_SERV_ACC",
            MmMessageType::CmServiceReject => "CM_SERV_REJ",
            MmMessageType::CmServiceAbort => "CM_SERV_ABORT",
            MmMessageType::CmServiceRequest => "CM_SERV_REQ",
            MmMessageType::CmServicePrompt => "CM_SERV_PROMPT",
            MmMessageType::CmReestablishmentRequest => "CM_REEST_REQ",
            MmMessageType::Abort => "ABORT",
            MmMessageType::MmNull => "MM_NULL",
            MmMessageType::MmStatus => "MM_STATUS",
            MmMessageType::MmInformation => "MM_INFO",
        }
    }
}

impl fmt::Display for MmMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reject cause value (TS 04.08 10.5.3.6).
///
/// Kept as a raw octet: the network may send values outside the named set
/// and MM has to carry them to the PLMN search process unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RejectCause(pub u8);

impl RejectCause {
    pub const IMSI_UNKNOWN_IN_HLR: Self = Self(2);
    pub const ILLEGAL_MS: Self = Self(3);
    pub const IMSI_UNKNOWN_IN_VLR: Self = Self(4);
    pub const IMEI_NOT_ACCEPTED: Self = Self(5);
    pub const ILLEGAL_ME: Self = Self(6);
    pub const PLMN_NOT_ALLOWED: Self = Self(11);
    pub const LA_NOT_ALLOWED: Self = Self(12);
    pub const ROAMING_NOT_ALLOWED: Self = Self(13);
    pub const NETWORK_FAILURE: Self = Self(17);
    pub const CONGESTION: Self = Self(22);
    pub const SERVICE_OPTION_NOT_SUPPORTED: Self = Self(32);
    pub const SERVICE_OPTION_NOT_SUBSCRIBED: Self = Self(33);
    pub const SERVICE_OPTION_OUT_OF_ORDER: Self = Self(34);
    pub const CALL_CANNOT_BE_IDENTIFIED: Self = Self(38);
    pub const SEMANTICALLY_INCORRECT: Self = Self(95);
    pub const INVALID_MANDATORY_INFO: Self = Self(96);
    pub const MSG_TYPE_NOT_IMPLEMENTED: Self = Self(97);
    pub const MSG_TYPE_NOT_COMPATIBLE: Self = Self(98);
    pub const IE_NOT_IMPLEMENTED: Self = Self(99);
    pub const CONDITIONAL_IE_ERROR: Self = Self(100);
    pub const MSG_NOT_COMPATIBLE: Self = Self(101);
    pub const PROTOCOL_ERROR: Self = Self(111);

    /// Causes that identify the subscriber or equipment as unusable.
    pub fn is_identity_reject(&self) -> bool {
        matches!(
            *self,
            Self::IMSI_UNKNOWN_IN_HLR | Self::ILLEGAL_MS | Self::ILLEGAL_ME
        )
    }
}

impl From<u8> for RejectCause {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<RejectCause> for u8 {
    fn from(cause: RejectCause) -> Self {
        cause.0
    }
}

impl fmt::Display for RejectCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Type of identity (TS 04.08 10.5.1.4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum IdentityType {
    NoIdentity = 0,
    Imsi = 1,
    Imei = 2,
    Imeisv = 3,
    Tmsi = 4,
}

/// CM service type (TS 04.08 10.5.3.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum CmServiceType {
    MobileOriginatingCall = 1,
    EmergencyCall = 2,
    ShortMessage = 4,
    SupplementaryService = 8,
    VoiceGroupCall = 9,
    VoiceBroadcastCall = 10,
    LocationService = 11,
}

/// Location updating type (TS 04.08 10.5.3.5)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum LocationUpdatingType {
    #[default]
    Normal = 0,
    Periodic = 1,
    ImsiAttach = 2,
}

impl fmt::Display for LocationUpdatingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationUpdatingType::Normal => write!(f, "normal"),
            LocationUpdatingType::Periodic => write!(f, "periodic"),
            LocationUpdatingType::ImsiAttach => write!(f, "IMSI attach"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_discriminator_values() {
        assert_eq!(u8::from(ProtocolDiscriminator::MobilityManagement), 0x05);
        assert_eq!(
            ProtocolDiscriminator::try_from(0x0B).unwrap(),
            ProtocolDiscriminator::SupplementaryServices
        );
        assert!(ProtocolDiscriminator::try_from(0x0E).is_err());
        assert!(ProtocolDiscriminator::Sms.is_cm());
        assert!(!ProtocolDiscriminator::MobilityManagement.is_cm());
    }

    #[test]
    fn test_message_type_mask() {
        // N(SD) bit set on an MM INFORMATION
        let raw = 0x72 & MmMessageType::TYPE_MASK;
        assert_eq!(MmMessageType::try_from(raw).unwrap(), MmMessageType::MmInformation);
        assert!(MmMessageType::try_from(0x3F).is_err());
    }

    #[test]
    fn test_reject_cause() {
        assert!(RejectCause::ILLEGAL_ME.is_identity_reject());
        assert!(!RejectCause::ROAMING_NOT_ALLOWED.is_identity_reject());
        assert_eq!(RejectCause::MSG_TYPE_NOT_COMPATIBLE, RejectCause(0x62));
        assert_eq!(RejectCause::from(13).to_string(), "#13");
    }
}
