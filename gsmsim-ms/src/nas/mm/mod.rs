//! GSM MM (Mobility Management) Procedures
//!
//! This module implements the mobile station side of TS 04.08 section 4:
//! - Location updating (normal, periodic, IMSI attach)
//! - IMSI detach
//! - TMSI reallocation, authentication, identification, abort, MM information
//! - MM connection establishment and release for CC, SS and SMS
//!
//! # State Machine
//!
//! [`MmLayer`] owns the main state and, in MM IDLE, the idle substate
//! (TS 04.08 4.1.2.1). Every input (CM primitive, RR primitive, peer message,
//! internal event) is looked up in a static state/message table and handled
//! by the matching procedure. Inputs without a matching entry are dropped or,
//! for peer messages, answered with MM STATUS.
//!
//! # Timers
//!
//! The layer never reads the clock. Callers pass the current instant to
//! [`MmLayer::work`] and [`MmLayer::tick`].

mod cm_connection;
mod common;
mod connection;
mod dispatch;
mod imsi_detach;
mod layer;
mod location_update;
mod state;

pub use cm_connection::cm_cause;
pub use connection::{
    ConnState, ConnectionRegistry, MmConnection, ReleaseFilter, DEFAULT_MAX_CONNECTIONS,
};
pub use layer::{MmLayer, LUPD_ATTEMPT_MAX};
pub use state::{
    IdleSubstate, MainState, MmStateMachine, MmStateSnapshot, MmStateTransition, UpdateStatus,
};
