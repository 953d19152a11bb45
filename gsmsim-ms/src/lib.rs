//! gsmsim MS (Mobile Station) Library
//!
//! This crate provides the GSM 04.08 Mobility Management layer of a mobile
//! station. It includes:
//!
//! - Timer management for T3210 .. T3240
//! - The MM state machine and its procedures (location update, IMSI detach,
//!   common procedures, MM connections)
//! - The serving cell and subscriber views MM works on
//! - Service access point primitives towards CM, RR, MMR and the SIM
//! - Task framework for async message passing

pub mod cell;
pub mod error;
pub mod nas;
pub mod primitives;
pub mod subscriber;
pub mod tasks;
pub mod timer;

pub use cell::{CampStatus, ServingCell};
pub use error::{MmError, MmResult};
pub use subscriber::{SubscriberState, KEY_SEQ_INVALID};
pub use timer::{MmTimer, MmTimerId, MmTimerSet, TimerExpiryEvent};

// Re-export MM types
pub use nas::mm::{
    cm_cause, ConnState, ConnectionRegistry, IdleSubstate, MainState, MmConnection, MmLayer,
    MmStateMachine, MmStateSnapshot, MmStateTransition, ReleaseFilter, UpdateStatus,
    DEFAULT_MAX_CONNECTIONS, LUPD_ATTEMPT_MAX,
};

// Re-export primitives
pub use primitives::{
    rr_cause, rr_rel_cause, CellSelEvent, CmProtocol, EventTag, MmEvent, MmOutput, MmrPrim,
    MmxxPrim, MmxxType, PlmnEvent, RrEstCause, RrPrim, RrType, SimRequest, SysInfo,
};

// Re-export task types
pub use tasks::{
    MmInput, MmTask, Task, TaskHandle, TaskMessage, DEFAULT_CHANNEL_CAPACITY, MM_TICK_INTERVAL_MS,
};
