//! MM layer errors

use thiserror::Error;

use gsmsim_nas::CodecError;

use crate::primitives::CmProtocol;

/// Errors returned by the MM layer to its callers.
///
/// Protocol level failures are answered on the air interface with cause
/// codes and never surface here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MmError {
    #[error("Message decode failed: {0}")]
    Decode(#[from] CodecError),

    #[error("Connection registry exhausted ({0} connections)")]
    RegistryExhausted(usize),

    #[error("Connection reference {0} already in use")]
    DuplicateReference(u32),

    #[error("{0} transaction {1} already in use")]
    DuplicateTransaction(CmProtocol, u8),

    #[error("Invalid MM state code {0}")]
    InvalidState(u8),

    #[error("Invalid idle substate code {0}")]
    InvalidSubstate(u8),
}

pub type MmResult<T> = Result<T, MmError>;
