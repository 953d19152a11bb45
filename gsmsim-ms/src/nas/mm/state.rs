//! MM State Machine
//!
//! States of the mobile station MM layer as per 3GPP TS 04.08 section 4.1.2.1.
//!
//! # Main States
//!
//! The main state is one of 26 numbered slots; only the codes listed in
//! [`MainState`] are used, the others are reserved.
//!
//! # Idle Substates
//!
//! While the main state is MM IDLE the service offered to the user is given
//! by an [`IdleSubstate`]. The substate is remembered across excursions into
//! connected states so that it can be restored or re-derived on return.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MmError, MmResult};

/// MM main state.
///
/// 3GPP TS 04.08 Section 4.1.2.1.1. The discriminants are the state numbers
/// of the standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum MainState {
    /// MM NULL (power off)
    #[default]
    Null = 0,
    LocUpdInit = 3,
    WaitOutMmConn = 5,
    MmConnActive = 6,
    ImsiDetachInit = 7,
    ProcessCmServP = 8,
    WaitNetworkCmd = 9,
    LocUpdRej = 10,
    WaitRrConnLupd = 13,
    WaitRrConnMmCon = 14,
    WaitRrConnImsiD = 15,
    WaitReest = 17,
    WaitRrActive = 18,
    MmIdle = 19,
    WaitAddOutMmCon = 20,
    MmConnActiveVgcs = 21,
    WaitRrConnVgcs = 22,
    LocUpdPend = 23,
    ImsiDetachPend = 24,
    RrConnReleaseNa = 25,
}

impl MainState {
    /// Number of state slots, including the reserved ones.
    pub const SLOTS: u8 = 26;

    /// State number as used in TS 04.08.
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Map a state number back to a state. Reserved slots are rejected.
    pub fn from_code(code: u8) -> MmResult<Self> {
        let state = match code {
            0 => MainState::Null,
            3 => MainState::LocUpdInit,
            5 => MainState::WaitOutMmConn,
            6 => MainState::MmConnActive,
            7 => MainState::ImsiDetachInit,
            8 => MainState::ProcessCmServP,
            9 => MainState::WaitNetworkCmd,
            10 => MainState::LocUpdRej,
            13 => MainState::WaitRrConnLupd,
            14 => MainState::WaitRrConnMmCon,
            15 => MainState::WaitRrConnImsiD,
            17 => MainState::WaitReest,
            18 => MainState::WaitRrActive,
            19 => MainState::MmIdle,
            20 => MainState::WaitAddOutMmCon,
            21 => MainState::MmConnActiveVgcs,
            22 => MainState::WaitRrConnVgcs,
            23 => MainState::LocUpdPend,
            24 => MainState::ImsiDetachPend,
            25 => MainState::RrConnReleaseNa,
            _ => return Err(MmError::InvalidState(code)),
        };
        Ok(state)
    }

    /// Bit of this state in a state mask.
    pub const fn bit(self) -> u32 {
        1 << (self as u8)
    }

    /// Name as used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            MainState::Null => "MM null",
            MainState::LocUpdInit => "location updating initiated",
            MainState::WaitOutMmConn => "wait for outgoing MM connection",
            MainState::MmConnActive => "MM connection active",
            MainState::ImsiDetachInit => "IMSI detach initiated",
            MainState::ProcessCmServP => "process CM service prompt",
            MainState::WaitNetworkCmd => "wait for network command",
            MainState::LocUpdRej => "location updating reject",
            MainState::WaitRrConnLupd => "wait for RR connection (location updating)",
            MainState::WaitRrConnMmCon => "wait for RR connection (MM connection)",
            MainState::WaitRrConnImsiD => "wait for RR connection (IMSI detach)",
            MainState::WaitReest => "wait for reestablish",
            MainState::WaitRrActive => "wait for RR connection active",
            MainState::MmIdle => "MM idle",
            MainState::WaitAddOutMmCon => "wait for additional outgoing MM connection",
            MainState::MmConnActiveVgcs => "MM connection active (group call)",
            MainState::WaitRrConnVgcs => "wait for RR connection (group call)",
            MainState::LocUpdPend => "location updating pending",
            MainState::ImsiDetachPend => "IMSI detach pending",
            MainState::RrConnReleaseNa => "RR connection release not allowed",
        }
    }
}

impl fmt::Display for MainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// MM IDLE substate.
///
/// 3GPP TS 04.08 Section 4.1.2.1.2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum IdleSubstate {
    NormalService = 1,
    AttemptUpdate = 2,
    LimitedService = 3,
    NoImsi = 4,
    NoCellAvail = 5,
    LocUpdNeeded = 6,
    #[default]
    PlmnSearch = 7,
    PlmnSearchNormal = 8,
    RxVgcsNormal = 9,
    RxVgcsLimited = 10,
}

impl IdleSubstate {
    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn from_code(code: u8) -> MmResult<Self> {
        let substate = match code {
            1 => IdleSubstate::NormalService,
            2 => IdleSubstate::AttemptUpdate,
            3 => IdleSubstate::LimitedService,
            4 => IdleSubstate::NoImsi,
            5 => IdleSubstate::NoCellAvail,
            6 => IdleSubstate::LocUpdNeeded,
            7 => IdleSubstate::PlmnSearch,
            8 => IdleSubstate::PlmnSearchNormal,
            9 => IdleSubstate::RxVgcsNormal,
            10 => IdleSubstate::RxVgcsLimited,
            _ => return Err(MmError::InvalidSubstate(code)),
        };
        Ok(substate)
    }

    /// Bit of this substate in a substate mask.
    pub const fn bit(self) -> u32 {
        1 << (self as u8)
    }
}

impl fmt::Display for IdleSubstate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IdleSubstate::NormalService => "normal service",
            IdleSubstate::AttemptUpdate => "attempting to update",
            IdleSubstate::LimitedService => "limited service",
            IdleSubstate::NoImsi => "no IMSI",
            IdleSubstate::NoCellAvail => "no cell available",
            IdleSubstate::LocUpdNeeded => "location updating needed",
            IdleSubstate::PlmnSearch => "PLMN search",
            IdleSubstate::PlmnSearchNormal => "PLMN search (normal)",
            IdleSubstate::RxVgcsNormal => "receiving group call (normal)",
            IdleSubstate::RxVgcsLimited => "receiving group call (limited)",
        };
        write!(f, "{name}")
    }
}

/// Location update status (U-state).
///
/// 3GPP TS 04.08 Section 4.1.2.2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpdateStatus {
    /// U1 UPDATED
    Updated,
    /// U2 NOT UPDATED
    #[default]
    NotUpdated,
    /// U3 ROAMING NOT ALLOWED
    RoamingNotAllowed,
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateStatus::Updated => write!(f, "U1-UPDATED"),
            UpdateStatus::NotUpdated => write!(f, "U2-NOT-UPDATED"),
            UpdateStatus::RoamingNotAllowed => write!(f, "U3-ROAMING-NOT-ALLOWED"),
        }
    }
}

/// State transition event for the MM state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmStateTransition {
    pub old_state: MainState,
    pub new_state: MainState,
    /// Idle substate before the transition (`None` when not idle)
    pub old_substate: Option<IdleSubstate>,
    /// Idle substate after the transition (`None` when not idle)
    pub new_substate: Option<IdleSubstate>,
}

/// Serializable (state, substate) pair.
///
/// Codes are the TS 04.08 state numbers; the substate is present only for
/// MM IDLE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MmStateSnapshot {
    pub state: u8,
    #[serde(default)]
    pub substate: Option<u8>,
}

/// MM state machine holding the main state and the idle substate.
///
/// The idle substate is only meaningful in MM IDLE. When the machine leaves
/// MM IDLE the last substate is kept as `mr_substate`.
///
/// # Example
///
/// ```
/// use gsmsim_ms::nas::mm::{IdleSubstate, MainState, MmStateMachine};
///
/// let mut sm = MmStateMachine::new();
/// assert_eq!(sm.state(), MainState::MmIdle);
///
/// sm.switch_state(MainState::WaitRrConnLupd, None);
/// assert_eq!(sm.substate(), None);
/// assert_eq!(sm.mr_substate(), IdleSubstate::PlmnSearch);
/// ```
#[derive(Debug, Clone)]
pub struct MmStateMachine {
    state: MainState,
    substate: IdleSubstate,
    mr_substate: IdleSubstate,
}

impl Default for MmStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl MmStateMachine {
    /// Creates a machine in MM IDLE, PLMN SEARCH.
    pub fn new() -> Self {
        Self {
            state: MainState::MmIdle,
            substate: IdleSubstate::PlmnSearch,
            mr_substate: IdleSubstate::PlmnSearch,
        }
    }

    pub fn state(&self) -> MainState {
        self.state
    }

    /// Idle substate, `None` unless in MM IDLE.
    pub fn substate(&self) -> Option<IdleSubstate> {
        (self.state == MainState::MmIdle).then_some(self.substate)
    }

    /// Substate held before the last departure from MM IDLE.
    pub fn mr_substate(&self) -> IdleSubstate {
        self.mr_substate
    }

    pub fn is_idle(&self) -> bool {
        self.state == MainState::MmIdle
    }

    /// Switches the main state. `substate` is only taken when entering or
    /// staying in MM IDLE; a missing substate then keeps the current one.
    ///
    /// Returns `Some(MmStateTransition)` if anything changed.
    pub fn switch_state(
        &mut self,
        state: MainState,
        substate: Option<IdleSubstate>,
    ) -> Option<MmStateTransition> {
        let old_state = self.state;
        let old_substate = self.substate();

        if old_state == MainState::MmIdle && state != MainState::MmIdle {
            self.mr_substate = self.substate;
        }
        self.state = state;
        if state == MainState::MmIdle {
            if let Some(substate) = substate {
                self.substate = substate;
            }
        }

        let transition = MmStateTransition {
            old_state,
            new_state: self.state,
            old_substate,
            new_substate: self.substate(),
        };
        if transition.old_state == transition.new_state
            && transition.old_substate == transition.new_substate
        {
            return None;
        }
        Some(transition)
    }

    pub fn snapshot(&self) -> MmStateSnapshot {
        MmStateSnapshot {
            state: self.state.code(),
            substate: self.substate().map(|s| s.code()),
        }
    }

    /// Rebuilds a machine from a snapshot. Reserved state codes, a missing
    /// substate in MM IDLE or a substate outside MM IDLE are rejected.
    pub fn restore(snapshot: &MmStateSnapshot) -> MmResult<Self> {
        let state = MainState::from_code(snapshot.state)?;
        let substate = match (state, snapshot.substate) {
            (MainState::MmIdle, Some(code)) => IdleSubstate::from_code(code)?,
            (MainState::MmIdle, None) => return Err(MmError::InvalidSubstate(0)),
            (_, Some(code)) => return Err(MmError::InvalidSubstate(code)),
            (_, None) => IdleSubstate::default(),
        };
        Ok(Self {
            state,
            substate,
            mr_substate: substate,
        })
    }
}

impl fmt::Display for MmStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.substate() {
            Some(substate) => write!(f, "{}, {}", self.state, substate),
            None => write!(f, "{}", self.state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_codes() {
        assert_eq!(MainState::MmIdle.code(), 19);
        assert_eq!(MainState::RrConnReleaseNa.code(), 25);
        assert_eq!(MainState::from_code(9).unwrap(), MainState::WaitNetworkCmd);
        assert!(MainState::from_code(1).is_err());
        assert!(MainState::from_code(MainState::SLOTS).is_err());
        assert_eq!(MainState::MmConnActive.bit(), 1 << 6);
    }

    #[test]
    fn test_substate_only_in_idle() {
        let mut sm = MmStateMachine::new();
        sm.switch_state(MainState::MmIdle, Some(IdleSubstate::NormalService));
        assert_eq!(sm.substate(), Some(IdleSubstate::NormalService));

        let transition = sm.switch_state(MainState::WaitRrConnMmCon, None).unwrap();
        assert_eq!(transition.old_substate, Some(IdleSubstate::NormalService));
        assert_eq!(transition.new_substate, None);
        assert_eq!(sm.substate(), None);
        assert_eq!(sm.mr_substate(), IdleSubstate::NormalService);
    }

    #[test]
    fn test_no_change_yields_none() {
        let mut sm = MmStateMachine::new();
        assert!(sm.switch_state(MainState::MmIdle, None).is_none());
        assert!(sm
            .switch_state(MainState::MmIdle, Some(IdleSubstate::PlmnSearch))
            .is_none());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut sm = MmStateMachine::new();
        sm.switch_state(MainState::MmIdle, Some(IdleSubstate::AttemptUpdate));
        let yaml = serde_yaml::to_string(&sm.snapshot()).unwrap();
        let snapshot: MmStateSnapshot = serde_yaml::from_str(&yaml).unwrap();
        let restored = MmStateMachine::restore(&snapshot).unwrap();
        assert_eq!(restored.state(), MainState::MmIdle);
        assert_eq!(restored.substate(), Some(IdleSubstate::AttemptUpdate));

        sm.switch_state(MainState::LocUpdRej, None);
        let restored = MmStateMachine::restore(&sm.snapshot()).unwrap();
        assert_eq!(restored.state(), MainState::LocUpdRej);
        assert_eq!(restored.substate(), None);
    }

    #[test]
    fn test_restore_rejects_invalid() {
        let reserved = MmStateSnapshot {
            state: 4,
            substate: None,
        };
        assert_eq!(
            MmStateMachine::restore(&reserved).unwrap_err(),
            MmError::InvalidState(4)
        );
        let stray = MmStateSnapshot {
            state: MainState::WaitNetworkCmd.code(),
            substate: Some(1),
        };
        assert!(MmStateMachine::restore(&stray).is_err());
        let missing = MmStateSnapshot {
            state: MainState::MmIdle.code(),
            substate: None,
        };
        assert!(MmStateMachine::restore(&missing).is_err());
    }
}
