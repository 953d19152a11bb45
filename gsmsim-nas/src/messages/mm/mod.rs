//! MM (Mobility Management) Messages
//!
//! Messages of TS 04.08 section 9.2 used by the mobile station.
//!
//! ## Registration
//!
//! - [`LocationUpdatingRequest`] / [`LocationUpdatingAccept`] / [`LocationUpdatingReject`]
//! - [`ImsiDetachIndication`]
//!
//! ## Security
//!
//! - [`AuthenticationRequest`] / [`AuthenticationResponse`] / [`AuthenticationReject`]
//! - [`IdentityRequest`] / [`IdentityResponse`]
//! - [`TmsiReallocationCommand`] / [`TmsiReallocationComplete`]
//!
//! ## Connection management
//!
//! - [`CmServiceRequest`] / [`CmServiceAccept`] / [`CmServiceReject`] / [`CmServiceAbort`]
//! - [`Abort`]
//!
//! ## Miscellaneous
//!
//! - [`MmStatus`]
//! - [`MmInformation`]

mod abort;
mod authentication;
mod cm_service;
mod identity;
mod imsi_detach;
mod information;
mod location_update;
mod status;
mod tmsi_reallocation;

pub use abort::Abort;
pub use authentication::{AuthenticationReject, AuthenticationRequest, AuthenticationResponse};
pub use cm_service::{CmServiceAbort, CmServiceAccept, CmServiceReject, CmServiceRequest};
pub use identity::{IdentityRequest, IdentityResponse};
pub use imsi_detach::ImsiDetachIndication;
pub use information::MmInformation;
pub use location_update::{LocationUpdatingAccept, LocationUpdatingReject, LocationUpdatingRequest};
pub use status::MmStatus;
pub use tmsi_reallocation::{TmsiReallocationCommand, TmsiReallocationComplete};

use gsmsim_common::Lai;
use bytes::Buf;

use crate::codec::{ensure_remaining, CodecResult};

pub(crate) fn decode_lai<B: Buf>(buf: &mut B) -> CodecResult<Lai> {
    ensure_remaining(buf, Lai::LENGTH)?;
    let mut value = [0u8; Lai::LENGTH];
    buf.copy_to_slice(&mut value);
    Ok(Lai::decode(value))
}
