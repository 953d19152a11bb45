//! MM dispatch tables
//!
//! Four ordered rule tables route inbound traffic to handlers:
//!
//! - MMxx-SAP primitives from the CM sublayers, by (state, substate, type,
//!   protocol)
//! - RR-SAP primitives, by (state, type)
//! - MM peer messages, by (state, message type)
//! - internal events, by (state, substate, event)
//!
//! The first rule whose masks contain the current state wins. Substate masks
//! are only evaluated in MM IDLE.

use gsmsim_nas::MmMessageType;

use super::layer::MmLayer;
use super::state::{IdleSubstate, MainState};
use crate::error::MmResult;
use crate::primitives::{EventTag, MmEvent, MmxxPrim, MmxxType, RrPrim, RrType};

/// Mask matching every state or substate.
pub const ALL_STATES: u32 = u32::MAX;

/// Protocol mask matching CC, SS and SMS.
const ANY_CM: u8 = 0x07;
const CC_ONLY: u8 = 0x01;

const fn sbit(state: MainState) -> u32 {
    state.bit()
}

const fn ssbit(substate: IdleSubstate) -> u32 {
    substate.bit()
}

pub type UpperHandler = fn(&mut MmLayer, &MmxxPrim) -> MmResult<()>;
pub type RrHandler = fn(&mut MmLayer, &RrPrim) -> MmResult<()>;
pub type PeerHandler = fn(&mut MmLayer, &[u8]) -> MmResult<()>;
pub type EventHandler = fn(&mut MmLayer, &MmEvent) -> MmResult<()>;

pub struct UpperRule {
    states: u32,
    substates: u32,
    msg_type: MmxxType,
    protocols: u8,
    handler: UpperHandler,
}

pub struct RrRule {
    states: u32,
    msg_type: RrType,
    handler: RrHandler,
}

pub struct PeerRule {
    states: u32,
    msg_type: MmMessageType,
    handler: PeerHandler,
}

pub struct EventRule {
    states: u32,
    substates: u32,
    tag: EventTag,
    handler: EventHandler,
}

fn state_matches(
    states: u32,
    substates: u32,
    state: MainState,
    substate: Option<IdleSubstate>,
) -> bool {
    if states & state.bit() == 0 {
        return false;
    }
    match substate {
        Some(substate) => substates & substate.bit() != 0,
        None => true,
    }
}

// ============================================================================
// MMxx-SAP (downward)
// ============================================================================

const IDLE: u32 = sbit(MainState::MmIdle);

static UPPER_RULES: &[UpperRule] = &[
    // 4.2.2.1 normal service
    UpperRule {
        states: IDLE,
        substates: ssbit(IdleSubstate::NormalService),
        msg_type: MmxxType::EstReq,
        protocols: ANY_CM,
        handler: MmLayer::init_mm_no_rr,
    },
    // 4.2.2.2 to 4.2.2.4, emergency calls only
    UpperRule {
        states: IDLE,
        substates: ssbit(IdleSubstate::AttemptUpdate)
            | ssbit(IdleSubstate::LimitedService)
            | ssbit(IdleSubstate::NoImsi)
            | ssbit(IdleSubstate::PlmnSearch),
        msg_type: MmxxType::EstReq,
        protocols: CC_ONLY,
        handler: MmLayer::init_mm_no_rr,
    },
    // 4.2.2.5 PLMN search, normal service
    UpperRule {
        states: IDLE,
        substates: ssbit(IdleSubstate::PlmnSearchNormal),
        msg_type: MmxxType::EstReq,
        protocols: ANY_CM,
        handler: MmLayer::init_mm_no_rr,
    },
    // 4.5.1.1
    UpperRule {
        states: sbit(MainState::RrConnReleaseNa),
        substates: ALL_STATES,
        msg_type: MmxxType::EstReq,
        protocols: ANY_CM,
        handler: MmLayer::init_mm_first,
    },
    UpperRule {
        states: sbit(MainState::MmConnActive),
        substates: ALL_STATES,
        msg_type: MmxxType::EstReq,
        protocols: ANY_CM,
        handler: MmLayer::init_mm_more,
    },
    UpperRule {
        states: ALL_STATES,
        substates: ALL_STATES,
        msg_type: MmxxType::EstReq,
        protocols: ANY_CM,
        handler: MmLayer::init_mm_reject,
    },
    // 4.5.2.1 data
    UpperRule {
        states: sbit(MainState::MmConnActive) | sbit(MainState::WaitAddOutMmCon),
        substates: ALL_STATES,
        msg_type: MmxxType::DataReq,
        protocols: ANY_CM,
        handler: MmLayer::mm_data,
    },
    // 4.5.3 release
    UpperRule {
        states: sbit(MainState::MmConnActive),
        substates: ALL_STATES,
        msg_type: MmxxType::RelReq,
        protocols: ANY_CM,
        handler: MmLayer::release_active,
    },
    UpperRule {
        states: sbit(MainState::WaitAddOutMmCon),
        substates: ALL_STATES,
        msg_type: MmxxType::RelReq,
        protocols: ANY_CM,
        handler: MmLayer::release_wait_add,
    },
    UpperRule {
        states: sbit(MainState::WaitOutMmConn),
        substates: ALL_STATES,
        msg_type: MmxxType::RelReq,
        protocols: ANY_CM,
        handler: MmLayer::release_wait_active,
    },
    UpperRule {
        states: sbit(MainState::WaitRrConnMmCon),
        substates: ALL_STATES,
        msg_type: MmxxType::RelReq,
        protocols: ANY_CM,
        handler: MmLayer::release_wait_rr,
    },
];

pub fn find_upper(
    state: MainState,
    substate: Option<IdleSubstate>,
    prim: &MmxxPrim,
) -> Option<UpperHandler> {
    UPPER_RULES
        .iter()
        .find(|rule| {
            rule.msg_type == prim.msg_type
                && rule.protocols & prim.protocol.bit() != 0
                && state_matches(rule.states, rule.substates, state, substate)
        })
        .map(|rule| rule.handler)
}

// ============================================================================
// RR-SAP (upward)
// ============================================================================

const MM_CON_STATES: u32 = sbit(MainState::WaitRrConnMmCon)
    | sbit(MainState::WaitOutMmConn)
    | sbit(MainState::WaitAddOutMmCon)
    | sbit(MainState::MmConnActive);

const DETACH_STATES: u32 = sbit(MainState::WaitRrConnImsiD) | sbit(MainState::ImsiDetachInit);

const LUPD_STATES: u32 = sbit(MainState::LocUpdInit) | sbit(MainState::WaitRrConnLupd);

static RR_RULES: &[RrRule] = &[
    // paging
    RrRule {
        states: IDLE,
        msg_type: RrType::EstInd,
        handler: MmLayer::rr_est_ind,
    },
    // 4.3.4.4 IMSI detach
    RrRule {
        states: sbit(MainState::WaitRrConnImsiD),
        msg_type: RrType::EstCnf,
        handler: MmLayer::imsi_detach_sent,
    },
    RrRule {
        states: DETACH_STATES,
        msg_type: RrType::RelInd,
        handler: MmLayer::imsi_detach_rr_lost,
    },
    RrRule {
        states: DETACH_STATES,
        msg_type: RrType::AbortInd,
        handler: MmLayer::imsi_detach_rr_lost,
    },
    // 4.4.4.1 location update
    RrRule {
        states: sbit(MainState::WaitRrConnLupd),
        msg_type: RrType::EstCnf,
        handler: MmLayer::est_loc_upd,
    },
    // 4.4.4.9
    RrRule {
        states: LUPD_STATES,
        msg_type: RrType::RelInd,
        handler: MmLayer::rel_loc_upd_abort,
    },
    RrRule {
        states: LUPD_STATES,
        msg_type: RrType::AbortInd,
        handler: MmLayer::rel_loc_upd_abort,
    },
    // 4.4.4.7
    RrRule {
        states: sbit(MainState::LocUpdRej),
        msg_type: RrType::RelInd,
        handler: MmLayer::rel_loc_upd_rej,
    },
    RrRule {
        states: sbit(MainState::LocUpdRej),
        msg_type: RrType::AbortInd,
        handler: MmLayer::rel_loc_upd_rej,
    },
    // 4.5.1.1 MM connection establishment
    RrRule {
        states: sbit(MainState::WaitRrConnMmCon),
        msg_type: RrType::EstCnf,
        handler: MmLayer::est_mm_con,
    },
    RrRule {
        states: ALL_STATES,
        msg_type: RrType::DataInd,
        handler: MmLayer::rr_data_ind,
    },
    RrRule {
        states: sbit(MainState::WaitOutMmConn) | sbit(MainState::WaitAddOutMmCon),
        msg_type: RrType::SyncInd,
        handler: MmLayer::sync_ind_wait,
    },
    RrRule {
        states: sbit(MainState::MmConnActive),
        msg_type: RrType::SyncInd,
        handler: MmLayer::sync_ind_active,
    },
    // 4.5.1.2 release or abort of the MM connections
    RrRule {
        states: MM_CON_STATES,
        msg_type: RrType::RelInd,
        handler: MmLayer::abort_mm_con,
    },
    RrRule {
        states: MM_CON_STATES,
        msg_type: RrType::AbortInd,
        handler: MmLayer::abort_mm_con,
    },
    RrRule {
        states: ALL_STATES,
        msg_type: RrType::RelInd,
        handler: MmLayer::rel_other,
    },
    RrRule {
        states: ALL_STATES,
        msg_type: RrType::AbortInd,
        handler: MmLayer::rel_other,
    },
];

pub fn find_rr(state: MainState, prim: &RrPrim) -> Option<RrHandler> {
    RR_RULES
        .iter()
        .find(|rule| rule.msg_type == prim.msg_type && rule.states & state.bit() != 0)
        .map(|rule| rule.handler)
}

// ============================================================================
// MM peer messages
// ============================================================================

static PEER_RULES: &[PeerRule] = &[
    // 4.3.1.2
    PeerRule {
        states: ALL_STATES,
        msg_type: MmMessageType::TmsiReallocationCommand,
        handler: MmLayer::rx_tmsi_realloc_cmd,
    },
    // 4.3.2.2
    PeerRule {
        states: ALL_STATES,
        msg_type: MmMessageType::AuthenticationRequest,
        handler: MmLayer::rx_auth_req,
    },
    // 4.3.2.5
    PeerRule {
        states: ALL_STATES,
        msg_type: MmMessageType::AuthenticationReject,
        handler: MmLayer::rx_auth_rej,
    },
    // 4.3.3.2
    PeerRule {
        states: ALL_STATES,
        msg_type: MmMessageType::IdentityRequest,
        handler: MmLayer::rx_id_req,
    },
    // 4.3.5.2
    PeerRule {
        states: ALL_STATES,
        msg_type: MmMessageType::Abort,
        handler: MmLayer::rx_abort,
    },
    // 4.3.6.2
    PeerRule {
        states: ALL_STATES,
        msg_type: MmMessageType::MmInformation,
        handler: MmLayer::rx_info,
    },
    // 4.4.4.6
    PeerRule {
        states: sbit(MainState::LocUpdInit),
        msg_type: MmMessageType::LocationUpdatingAccept,
        handler: MmLayer::rx_loc_upd_acc,
    },
    // 4.4.4.7
    PeerRule {
        states: sbit(MainState::LocUpdInit),
        msg_type: MmMessageType::LocationUpdatingReject,
        handler: MmLayer::rx_loc_upd_rej,
    },
    // 4.5.1.1
    PeerRule {
        states: ALL_STATES,
        msg_type: MmMessageType::CmServiceAccept,
        handler: MmLayer::rx_cm_service_acc,
    },
    PeerRule {
        states: ALL_STATES,
        msg_type: MmMessageType::CmServiceReject,
        handler: MmLayer::rx_cm_service_rej,
    },
    // 8.x, never answered with another STATUS
    PeerRule {
        states: ALL_STATES,
        msg_type: MmMessageType::MmStatus,
        handler: MmLayer::rx_status,
    },
];

/// Result of a peer table lookup.
pub enum PeerLookup {
    Found(PeerHandler),
    /// A rule exists for the message type, but not in this state
    WrongState,
    /// No rule knows the message type
    Unknown,
}

pub fn find_peer(state: MainState, msg_type: MmMessageType) -> PeerLookup {
    let mut supported = false;
    for rule in PEER_RULES.iter().filter(|rule| rule.msg_type == msg_type) {
        supported = true;
        if rule.states & state.bit() != 0 {
            return PeerLookup::Found(rule.handler);
        }
    }
    if supported {
        PeerLookup::WrongState
    } else {
        PeerLookup::Unknown
    }
}

// ============================================================================
// Internal events
// ============================================================================

static EVENT_RULES: &[EventRule] = &[
    // 4.2.2.1 normal service
    EventRule {
        states: IDLE,
        substates: ssbit(IdleSubstate::NormalService),
        tag: EventTag::NewLai,
        handler: MmLayer::loc_upd_normal,
    },
    EventRule {
        states: IDLE,
        substates: ssbit(IdleSubstate::NormalService),
        tag: EventTag::TimeoutT3211,
        handler: MmLayer::loc_upd_retry,
    },
    EventRule {
        states: IDLE,
        substates: ssbit(IdleSubstate::NormalService),
        tag: EventTag::TimeoutT3213,
        handler: MmLayer::loc_upd_retry,
    },
    EventRule {
        states: IDLE,
        substates: ssbit(IdleSubstate::NormalService),
        tag: EventTag::TimeoutT3212,
        handler: MmLayer::loc_upd_periodic,
    },
    EventRule {
        states: IDLE,
        substates: ssbit(IdleSubstate::NormalService),
        tag: EventTag::ImsiDetach,
        handler: MmLayer::imsi_detach_start,
    },
    // 4.2.2.2 attempt to update
    EventRule {
        states: IDLE,
        substates: ssbit(IdleSubstate::AttemptUpdate),
        tag: EventTag::TimeoutT3211,
        handler: MmLayer::loc_upd_retry,
    },
    EventRule {
        states: IDLE,
        substates: ssbit(IdleSubstate::AttemptUpdate),
        tag: EventTag::TimeoutT3213,
        handler: MmLayer::loc_upd_retry,
    },
    EventRule {
        states: IDLE,
        substates: ssbit(IdleSubstate::AttemptUpdate),
        tag: EventTag::NewLai,
        handler: MmLayer::loc_upd_normal,
    },
    EventRule {
        states: IDLE,
        substates: ssbit(IdleSubstate::AttemptUpdate),
        tag: EventTag::TimeoutT3212,
        handler: MmLayer::loc_upd_periodic,
    },
    // 4.2.2.3 limited service
    EventRule {
        states: IDLE,
        substates: ssbit(IdleSubstate::LimitedService),
        tag: EventTag::NewLai,
        handler: MmLayer::loc_upd_normal,
    },
    // 4.2.3 location updating needed
    EventRule {
        states: IDLE,
        substates: ssbit(IdleSubstate::LocUpdNeeded),
        tag: EventTag::NewLai,
        handler: MmLayer::loc_upd_normal,
    },
    EventRule {
        states: IDLE,
        substates: ssbit(IdleSubstate::LocUpdNeeded),
        tag: EventTag::TimeoutT3211,
        handler: MmLayer::loc_upd_retry,
    },
    EventRule {
        states: IDLE,
        substates: ssbit(IdleSubstate::LocUpdNeeded),
        tag: EventTag::TimeoutT3213,
        handler: MmLayer::loc_upd_retry,
    },
    // 4.2.2.5 PLMN search, normal service
    EventRule {
        states: IDLE,
        substates: ssbit(IdleSubstate::PlmnSearchNormal),
        tag: EventTag::TimeoutT3211,
        handler: MmLayer::loc_upd_retry,
    },
    EventRule {
        states: IDLE,
        substates: ssbit(IdleSubstate::PlmnSearchNormal),
        tag: EventTag::TimeoutT3213,
        handler: MmLayer::loc_upd_retry,
    },
    EventRule {
        states: IDLE,
        substates: ssbit(IdleSubstate::PlmnSearchNormal),
        tag: EventTag::TimeoutT3212,
        handler: MmLayer::loc_upd_delay,
    },
    EventRule {
        states: IDLE,
        substates: ssbit(IdleSubstate::PlmnSearchNormal),
        tag: EventTag::ImsiDetach,
        handler: MmLayer::imsi_detach_start,
    },
    // 4.2.2.4 PLMN search, no cell available
    EventRule {
        states: IDLE,
        substates: ssbit(IdleSubstate::PlmnSearch) | ssbit(IdleSubstate::NoCellAvail),
        tag: EventTag::TimeoutT3212,
        handler: MmLayer::loc_upd_delay,
    },
    // a suitable cell has been found while searching
    EventRule {
        states: IDLE,
        substates: ssbit(IdleSubstate::PlmnSearch)
            | ssbit(IdleSubstate::PlmnSearchNormal)
            | ssbit(IdleSubstate::NoCellAvail),
        tag: EventTag::NewLai,
        handler: MmLayer::cell_selected,
    },
    // IMSI detach in other cases
    EventRule {
        states: IDLE,
        substates: ALL_STATES,
        tag: EventTag::ImsiDetach,
        handler: MmLayer::imsi_detach_end,
    },
    EventRule {
        states: sbit(MainState::WaitOutMmConn)
            | sbit(MainState::MmConnActive)
            | sbit(MainState::ProcessCmServP)
            | sbit(MainState::WaitReest)
            | sbit(MainState::WaitAddOutMmCon)
            | sbit(MainState::MmConnActiveVgcs)
            | sbit(MainState::WaitNetworkCmd),
        substates: ALL_STATES,
        tag: EventTag::ImsiDetach,
        handler: MmLayer::imsi_detach_release,
    },
    EventRule {
        states: sbit(MainState::WaitRrConnImsiD)
            | sbit(MainState::ImsiDetachInit)
            | sbit(MainState::ImsiDetachPend),
        substates: ALL_STATES,
        tag: EventTag::ImsiDetach,
        handler: MmLayer::imsi_detach_ignore,
    },
    EventRule {
        states: ALL_STATES,
        substates: ALL_STATES,
        tag: EventTag::ImsiDetach,
        handler: MmLayer::imsi_detach_delay,
    },
    EventRule {
        states: sbit(MainState::ImsiDetachInit),
        substates: ALL_STATES,
        tag: EventTag::TimeoutT3220,
        handler: MmLayer::imsi_detach_end,
    },
    // location update in other cases
    EventRule {
        states: ALL_STATES & !IDLE,
        substates: ALL_STATES,
        tag: EventTag::TimeoutT3212,
        handler: MmLayer::loc_upd_delay,
    },
    EventRule {
        states: ALL_STATES & !IDLE,
        substates: ALL_STATES,
        tag: EventTag::TimeoutT3210,
        handler: MmLayer::loc_upd_timeout,
    },
    EventRule {
        states: ALL_STATES,
        substates: ALL_STATES,
        tag: EventTag::Sysinfo,
        handler: MmLayer::sysinfo,
    },
    // 4.4.4.8
    EventRule {
        states: sbit(MainState::WaitNetworkCmd) | sbit(MainState::LocUpdRej),
        substates: ALL_STATES,
        tag: EventTag::TimeoutT3240,
        handler: MmLayer::abort_rr,
    },
    EventRule {
        states: sbit(MainState::WaitOutMmConn) | sbit(MainState::WaitAddOutMmCon),
        substates: ALL_STATES,
        tag: EventTag::TimeoutT3230,
        handler: MmLayer::timeout_mm_con,
    },
    // 4.3.2.2
    EventRule {
        states: ALL_STATES,
        substates: ALL_STATES,
        tag: EventTag::AuthResponse,
        handler: MmLayer::tx_auth_rsp,
    },
];

pub fn find_event(
    state: MainState,
    substate: Option<IdleSubstate>,
    tag: EventTag,
) -> Option<EventHandler> {
    EVENT_RULES
        .iter()
        .find(|rule| rule.tag == tag && state_matches(rule.states, rule.substates, state, substate))
        .map(|rule| rule.handler)
}
