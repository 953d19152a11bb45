//! NAS (Non-Access Stratum) Protocol Handling
//!
//! Only the Mobility Management sublayer lives here. CC, SS and SMS sit
//! above it and talk to it through the MMxx primitives.

pub mod mm;
