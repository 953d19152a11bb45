//! Service access point primitives
//!
//! Messages exchanged between MM and its neighbours:
//!
//! - MMxx-SAP towards the CM sublayers (CC, SS, SMS)
//! - RR-SAP towards radio resource management
//! - MMR-SAP for SIM registration
//! - internal MM events (timer expiries, SIM responses, cell changes)
//! - outputs towards the PLMN search, cell selection and SIM processes

use std::fmt;

use gsmsim_nas::{ProtocolDiscriminator, RejectCause};

use crate::timer::MmTimerId;

// ============================================================================
// MMxx-SAP
// ============================================================================

/// CM protocol owning an MM connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmProtocol {
    Cc,
    Ss,
    Sms,
}

impl CmProtocol {
    pub fn pd(&self) -> ProtocolDiscriminator {
        match self {
            CmProtocol::Cc => ProtocolDiscriminator::CallControl,
            CmProtocol::Ss => ProtocolDiscriminator::SupplementaryServices,
            CmProtocol::Sms => ProtocolDiscriminator::Sms,
        }
    }

    pub fn from_pd(pd: ProtocolDiscriminator) -> Option<Self> {
        match pd {
            ProtocolDiscriminator::CallControl => Some(CmProtocol::Cc),
            ProtocolDiscriminator::SupplementaryServices => Some(CmProtocol::Ss),
            ProtocolDiscriminator::Sms => Some(CmProtocol::Sms),
            _ => None,
        }
    }

    /// Bit of this protocol in a protocol mask.
    pub const fn bit(self) -> u8 {
        match self {
            CmProtocol::Cc => 0x01,
            CmProtocol::Ss => 0x02,
            CmProtocol::Sms => 0x04,
        }
    }

    fn sap_name(&self) -> &'static str {
        match self {
            CmProtocol::Cc => "MMCC",
            CmProtocol::Ss => "MMSS",
            CmProtocol::Sms => "MMSMS",
        }
    }
}

impl fmt::Display for CmProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CmProtocol::Cc => write!(f, "CC"),
            CmProtocol::Ss => write!(f, "SS"),
            CmProtocol::Sms => write!(f, "SMS"),
        }
    }
}

/// MMxx primitive type, common to the three CM protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MmxxType {
    EstReq,
    EstInd,
    EstCnf,
    RelReq,
    RelInd,
    DataReq,
    DataInd,
    UnitDataReq,
    UnitDataInd,
    ErrInd,
    SyncInd,
}

impl MmxxType {
    fn name(&self) -> &'static str {
        match self {
            MmxxType::EstReq => "EST_REQ",
            MmxxType::EstInd => "EST_IND",
            MmxxType::EstCnf => "EST_CNF",
            MmxxType::RelReq => "REL_REQ",
            MmxxType::RelInd => "REL_IND",
            MmxxType::DataReq => "DATA_REQ",
            MmxxType::DataInd => "DATA_IND",
            MmxxType::UnitDataReq => "UNIT_DATA_REQ",
            MmxxType::UnitDataInd => "UNIT_DATA_IND",
            MmxxType::ErrInd => "ERR_IND",
            MmxxType::SyncInd => "SYNC_IND",
        }
    }
}

/// Primitive on the MMxx-SAP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmxxPrim {
    pub msg_type: MmxxType,
    pub protocol: CmProtocol,
    /// Connection reference
    pub reference: u32,
    pub transaction_id: u8,
    pub cause: u8,
    /// Emergency call establishment (MMCC-EST-REQ only)
    pub emergency: bool,
    /// Layer 3 message carried by data primitives
    pub payload: Vec<u8>,
}

impl MmxxPrim {
    pub fn new(msg_type: MmxxType, protocol: CmProtocol, reference: u32, transaction_id: u8) -> Self {
        Self {
            msg_type,
            protocol,
            reference,
            transaction_id,
            cause: 0,
            emergency: false,
            payload: Vec::new(),
        }
    }

    pub fn est_req(protocol: CmProtocol, reference: u32, transaction_id: u8) -> Self {
        Self::new(MmxxType::EstReq, protocol, reference, transaction_id)
    }

    pub fn rel_req(protocol: CmProtocol, reference: u32, transaction_id: u8) -> Self {
        Self::new(MmxxType::RelReq, protocol, reference, transaction_id)
    }

    pub fn data_req(
        protocol: CmProtocol,
        reference: u32,
        transaction_id: u8,
        payload: Vec<u8>,
    ) -> Self {
        Self::new(MmxxType::DataReq, protocol, reference, transaction_id).with_payload(payload)
    }

    pub fn with_cause(mut self, cause: u8) -> Self {
        self.cause = cause;
        self
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_emergency(mut self) -> Self {
        self.emergency = true;
        self
    }

    /// SAP name, e.g. `MMCC_EST_REQ`.
    pub fn name(&self) -> String {
        format!("{}_{}", self.protocol.sap_name(), self.msg_type.name())
    }
}

impl fmt::Display for MmxxPrim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ref={} ti={} cause={}",
            self.name(),
            self.reference,
            self.transaction_id,
            self.cause
        )
    }
}

// ============================================================================
// RR-SAP
// ============================================================================

/// RR primitive type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RrType {
    EstReq,
    EstInd,
    EstCnf,
    RelInd,
    AbortReq,
    AbortInd,
    DataReq,
    DataInd,
    SyncInd,
}

impl RrType {
    pub fn name(&self) -> &'static str {
        match self {
            RrType::EstReq => "RR_EST_REQ",
            RrType::EstInd => "RR_EST_IND",
            RrType::EstCnf => "RR_EST_CNF",
            RrType::RelInd => "RR_REL_IND",
            RrType::AbortReq => "RR_ABORT_REQ",
            RrType::AbortInd => "RR_ABORT_IND",
            RrType::DataReq => "RR_DATA_REQ",
            RrType::DataInd => "RR_DATA_IND",
            RrType::SyncInd => "RR_SYNC_IND",
        }
    }
}

/// RR connection establishment cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RrEstCause {
    Emergency = 1,
    AnswerPagingAny = 5,
    OrigTchF = 9,
    LocationUpdate = 12,
    OtherSdcch = 13,
}

/// RR release causes reported in RR-REL-IND / RR-ABORT-IND.
pub mod rr_rel_cause {
    pub const NORMAL: u8 = 1;
    pub const NOT_AUTHORIZED: u8 = 2;
    /// Random access failure
    pub const RA_FAILURE: u8 = 3;
    pub const T3122: u8 = 4;
    pub const TRY_LATER: u8 = 5;
    pub const LOST_SIGNAL: u8 = 7;
    pub const LINK_FAILURE: u8 = 8;
}

/// RR causes sent in RR-ABORT-REQ (TS 04.08 10.5.2.31).
pub mod rr_cause {
    pub const NORMAL: u8 = 0x00;
    pub const ABNORMAL_TIMER: u8 = 0x03;
}

/// Primitive on the RR-SAP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrPrim {
    pub msg_type: RrType,
    /// Establishment cause for RR-EST-REQ, release cause otherwise
    pub cause: u8,
    /// Layer 3 message
    pub payload: Vec<u8>,
}

impl RrPrim {
    pub fn new(msg_type: RrType) -> Self {
        Self {
            msg_type,
            cause: 0,
            payload: Vec::new(),
        }
    }

    pub fn est_req(cause: RrEstCause, payload: Vec<u8>) -> Self {
        Self {
            msg_type: RrType::EstReq,
            cause: cause as u8,
            payload,
        }
    }

    pub fn data_req(payload: Vec<u8>) -> Self {
        Self::new(RrType::DataReq).with_payload(payload)
    }

    pub fn data_ind(payload: Vec<u8>) -> Self {
        Self::new(RrType::DataInd).with_payload(payload)
    }

    pub fn abort_req(cause: u8) -> Self {
        Self::new(RrType::AbortReq).with_cause(cause)
    }

    pub fn with_cause(mut self, cause: u8) -> Self {
        self.cause = cause;
        self
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }
}

impl fmt::Display for RrPrim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cause={}", self.msg_type.name(), self.cause)?;
        if !self.payload.is_empty() {
            write!(f, " len={}", self.payload.len())?;
        }
        Ok(())
    }
}

// ============================================================================
// MMR-SAP
// ============================================================================

/// SIM registration primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmrPrim {
    /// SIM inserted, start registration
    RegReq,
    /// Registration done
    RegCnf,
    /// SIM removed, deregister
    NregReq,
    /// Deregistration done
    NregInd,
}

impl fmt::Display for MmrPrim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MmrPrim::RegReq => write!(f, "MMR_REG_REQ"),
            MmrPrim::RegCnf => write!(f, "MMR_REG_CNF"),
            MmrPrim::NregReq => write!(f, "MMR_NREG_REQ"),
            MmrPrim::NregInd => write!(f, "MMR_NREG_IND"),
        }
    }
}

// ============================================================================
// Internal Events
// ============================================================================

/// System information relevant to MM, as decoded by RR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SysInfo {
    /// Periodic location update interval in seconds (0 = no periodic update)
    pub t3212: u32,
    /// System information type 3 has been received
    pub si3: bool,
    /// IMSI attach/detach allowed (ATT flag)
    pub att_allowed: bool,
    /// Cell barred for access
    pub cell_barr: bool,
    /// Barred access classes, bit N = class N
    pub class_barr: u16,
}

/// MM internal event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MmEvent {
    /// Cell selection camped on a cell with a new location area
    NewLai,
    /// A timer expired
    Timeout(MmTimerId),
    /// Detach the IMSI (SIM removal or power down)
    ImsiDetach,
    PowerOff,
    Paging,
    /// SIM computed SRES for the last AUTHENTICATION REQUEST
    AuthResponse { sres: [u8; 4] },
    /// System information changed
    Sysinfo(SysInfo),
}

/// Dispatch tag of an [`MmEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTag {
    NewLai,
    TimeoutT3210,
    TimeoutT3211,
    TimeoutT3212,
    TimeoutT3213,
    TimeoutT3220,
    TimeoutT3230,
    TimeoutT3240,
    ImsiDetach,
    PowerOff,
    Paging,
    AuthResponse,
    Sysinfo,
}

impl MmEvent {
    pub fn tag(&self) -> EventTag {
        match self {
            MmEvent::NewLai => EventTag::NewLai,
            MmEvent::Timeout(timer) => match timer {
                MmTimerId::T3210 => EventTag::TimeoutT3210,
                MmTimerId::T3211 => EventTag::TimeoutT3211,
                MmTimerId::T3212 => EventTag::TimeoutT3212,
                MmTimerId::T3213 => EventTag::TimeoutT3213,
                MmTimerId::T3220 => EventTag::TimeoutT3220,
                MmTimerId::T3230 => EventTag::TimeoutT3230,
                MmTimerId::T3240 => EventTag::TimeoutT3240,
            },
            MmEvent::ImsiDetach => EventTag::ImsiDetach,
            MmEvent::PowerOff => EventTag::PowerOff,
            MmEvent::Paging => EventTag::Paging,
            MmEvent::AuthResponse { .. } => EventTag::AuthResponse,
            MmEvent::Sysinfo(_) => EventTag::Sysinfo,
        }
    }
}

impl fmt::Display for MmEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MmEvent::NewLai => write!(f, "MM_EVENT_NEW_LAI"),
            MmEvent::Timeout(timer) => write!(f, "MM_EVENT_TIMEOUT_{timer}"),
            MmEvent::ImsiDetach => write!(f, "MM_EVENT_IMSI_DETACH"),
            MmEvent::PowerOff => write!(f, "MM_EVENT_POWER_OFF"),
            MmEvent::Paging => write!(f, "MM_EVENT_PAGING"),
            MmEvent::AuthResponse { .. } => write!(f, "MM_EVENT_AUTH_RESPONSE"),
            MmEvent::Sysinfo(_) => write!(f, "MM_EVENT_SYSINFO"),
        }
    }
}

// ============================================================================
// Outputs
// ============================================================================

/// Events sent to the PLMN search process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlmnEvent {
    RegSuccess,
    RegFailed(RejectCause),
    RoamingNotAllowed,
    InvalidSim,
    SimInsert,
    SimRemove,
}

/// Events sent to the cell selection process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellSelEvent {
    SimRemove,
}

/// Requests sent to the SIM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimRequest {
    /// Run A3/A8 on RAND with the given key sequence
    RunGsmAlgo { key_seq: u8, rand: [u8; 16] },
}

/// Everything MM emits towards its neighbours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MmOutput {
    Rr(RrPrim),
    Upper(MmxxPrim),
    Mmr(MmrPrim),
    Plmn(PlmnEvent),
    CellSel(CellSelEvent),
    Sim(SimRequest),
}

impl fmt::Display for MmOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MmOutput::Rr(prim) => write!(f, "to RR: {prim}"),
            MmOutput::Upper(prim) => write!(f, "to CM: {prim}"),
            MmOutput::Mmr(prim) => write!(f, "to MMR: {prim}"),
            MmOutput::Plmn(event) => write!(f, "to PLMN search: {event:?}"),
            MmOutput::CellSel(event) => write!(f, "to cell selection: {event:?}"),
            MmOutput::Sim(request) => write!(f, "to SIM: {request:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_mapping() {
        for proto in [CmProtocol::Cc, CmProtocol::Ss, CmProtocol::Sms] {
            assert_eq!(CmProtocol::from_pd(proto.pd()), Some(proto));
        }
        assert_eq!(
            CmProtocol::from_pd(ProtocolDiscriminator::MobilityManagement),
            None
        );
    }

    #[test]
    fn test_mmxx_name() {
        let prim = MmxxPrim::est_req(CmProtocol::Sms, 4, 0).with_cause(17);
        assert_eq!(prim.name(), "MMSMS_EST_REQ");
        assert_eq!(prim.to_string(), "MMSMS_EST_REQ ref=4 ti=0 cause=17");
    }

    #[test]
    fn test_event_tags() {
        assert_eq!(
            MmEvent::Timeout(MmTimerId::T3213).tag(),
            EventTag::TimeoutT3213
        );
        assert_eq!(
            MmEvent::Timeout(MmTimerId::T3240).to_string(),
            "MM_EVENT_TIMEOUT_T3240"
        );
    }
}
