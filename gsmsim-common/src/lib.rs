//! Common types and utilities for gsmsim
//!
//! This crate provides the identifiers, configuration structures and logging
//! helpers shared by the GSM mobility management codec and the mobile
//! station layer.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{MmTimerConfig, MsConfig};
pub use error::Error;
pub use logging::{
    format_hex_compact, init_logging, init_logging_with_filter, log_mm_message,
    log_protocol_message, log_rr_message, Direction, HexDump, LogLevel,
};
pub use types::{Lai, Plmn};
