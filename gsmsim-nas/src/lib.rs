//! GSM layer 3 Mobility Management codec
//!
//! Implements encoding/decoding of the TS 04.08 MM messages and the
//! information elements they carry.
//!
//! # Message Structure
//!
//! A layer 3 message is a two octet header (protocol discriminator plus
//! skip indicator or transaction identifier, then the message type)
//! followed by the mandatory IEs in fixed order and the optional IEs in
//! TLV form.
//!
//! # Example
//!
//! ```rust
//! use gsmsim_nas::codec::MmMessage;
//! use gsmsim_nas::header::L3Header;
//! use gsmsim_nas::ies::MobileIdentity;
//! use gsmsim_nas::messages::mm::IdentityResponse;
//!
//! let response = IdentityResponse::new(MobileIdentity::Tmsi(0x0102_0304));
//! let bytes = response.to_bytes().unwrap();
//!
//! let header = L3Header::decode(&mut bytes.as_slice()).unwrap();
//! assert_eq!(header.pd(), 0x05);
//! ```

pub mod codec;
pub mod enums;
pub mod header;
pub mod ies;
pub mod messages;

pub use codec::{CodecError, CodecResult, MmMessage};
pub use enums::{
    CmServiceType, IdentityType, LocationUpdatingType, MmMessageType, ProtocolDiscriminator,
    RejectCause,
};
pub use header::{HeaderError, L3Header, MmHeader};
pub use ies::{Classmark1, Classmark2, IeError, MobileIdentity, NetworkName};
pub use messages::mm::*;
