//! Layer 3 messages

pub mod mm;
