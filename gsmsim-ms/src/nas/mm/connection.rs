//! MM connection registry
//!
//! One record per CM transaction multiplexed over the RR link. Records are
//! keyed by (protocol, transaction identifier) for traffic from the network
//! and by reference for traffic from the CM sublayers.

use std::fmt;

use tracing::{debug, info};

use crate::error::{MmError, MmResult};
use crate::primitives::{CmProtocol, MmxxPrim, MmxxType};

/// Default maximum number of simultaneous MM connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 32;

/// MM connection sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnState {
    #[default]
    Idle,
    /// Waiting for CM SERVICE ACCEPT
    ConnPend,
    Dedicated,
    ConnSusp,
    ReestPend,
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnState::Idle => write!(f, "IDLE"),
            ConnState::ConnPend => write!(f, "CONN_PEND"),
            ConnState::Dedicated => write!(f, "DEDICATED"),
            ConnState::ConnSusp => write!(f, "CONN_SUSP"),
            ConnState::ReestPend => write!(f, "REESTPEND"),
        }
    }
}

/// A single MM connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmConnection {
    pub protocol: CmProtocol,
    pub transaction_id: u8,
    pub reference: u32,
    state: ConnState,
}

impl MmConnection {
    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn set_state(&mut self, state: ConnState) {
        if self.state != state {
            info!(
                "MM connection {} ref={} ti={} {} -> {}",
                self.protocol, self.reference, self.transaction_id, self.state, state
            );
            self.state = state;
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == ConnState::ConnPend
    }

    /// Upward primitive of the given type addressed to this connection.
    pub fn prim(&self, msg_type: MmxxType) -> MmxxPrim {
        MmxxPrim::new(msg_type, self.protocol, self.reference, self.transaction_id)
    }
}

/// Which connections a bulk release applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseFilter {
    All,
    PendingOnly,
}

impl ReleaseFilter {
    fn matches(&self, conn: &MmConnection) -> bool {
        match self {
            ReleaseFilter::All => true,
            ReleaseFilter::PendingOnly => conn.is_pending(),
        }
    }
}

/// Registry of the MM connections of one mobile station.
#[derive(Debug, Clone)]
pub struct ConnectionRegistry {
    connections: Vec<MmConnection>,
    capacity: usize,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_CONNECTIONS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            connections: Vec::new(),
            capacity,
        }
    }

    /// Create a connection in state IDLE.
    ///
    /// Fails when the registry is full, or when the reference or the
    /// (protocol, transaction identifier) pair is already in use.
    pub fn create(
        &mut self,
        protocol: CmProtocol,
        transaction_id: u8,
        reference: u32,
    ) -> MmResult<&mut MmConnection> {
        if self.connections.len() >= self.capacity {
            return Err(MmError::RegistryExhausted(self.capacity));
        }
        if self.find_by_ref(reference).is_some() {
            return Err(MmError::DuplicateReference(reference));
        }
        if self.find_by_id(protocol, transaction_id).is_some() {
            return Err(MmError::DuplicateTransaction(protocol, transaction_id));
        }

        debug!(
            "New MM connection {} ref={} ti={}",
            protocol, reference, transaction_id
        );
        self.connections.push(MmConnection {
            protocol,
            transaction_id,
            reference,
            state: ConnState::Idle,
        });
        let index = self.connections.len() - 1;
        Ok(&mut self.connections[index])
    }

    pub fn find_by_id(&self, protocol: CmProtocol, transaction_id: u8) -> Option<&MmConnection> {
        self.connections
            .iter()
            .find(|c| c.protocol == protocol && c.transaction_id == transaction_id)
    }

    pub fn find_by_id_mut(
        &mut self,
        protocol: CmProtocol,
        transaction_id: u8,
    ) -> Option<&mut MmConnection> {
        self.connections
            .iter_mut()
            .find(|c| c.protocol == protocol && c.transaction_id == transaction_id)
    }

    pub fn find_by_ref(&self, reference: u32) -> Option<&MmConnection> {
        self.connections.iter().find(|c| c.reference == reference)
    }

    pub fn find_by_ref_mut(&mut self, reference: u32) -> Option<&mut MmConnection> {
        self.connections
            .iter_mut()
            .find(|c| c.reference == reference)
    }

    /// The connection waiting for CM SERVICE ACCEPT, if any.
    pub fn pending(&self) -> Option<&MmConnection> {
        self.connections.iter().find(|c| c.is_pending())
    }

    pub fn pending_mut(&mut self) -> Option<&mut MmConnection> {
        self.connections.iter_mut().find(|c| c.is_pending())
    }

    /// Remove a connection without notifying its owner.
    pub fn destroy(&mut self, reference: u32) -> Option<MmConnection> {
        let index = self
            .connections
            .iter()
            .position(|c| c.reference == reference)?;
        let conn = self.connections.remove(index);
        debug!(
            "Freeing MM connection {} ref={} ti={}",
            conn.protocol, conn.reference, conn.transaction_id
        );
        Some(conn)
    }

    /// Release every connection matching `filter`.
    ///
    /// Returns one REL_IND (or ERR_IND when `is_error`) per released
    /// connection, carrying `cause`, in registry order.
    pub fn release_matching(
        &mut self,
        filter: ReleaseFilter,
        cause: u8,
        is_error: bool,
    ) -> Vec<MmxxPrim> {
        let msg_type = if is_error {
            MmxxType::ErrInd
        } else {
            MmxxType::RelInd
        };

        let (released, kept): (Vec<_>, Vec<_>) = self
            .connections
            .drain(..)
            .partition(|c| filter.matches(c));
        self.connections = kept;

        released
            .iter()
            .map(|conn| {
                debug!(
                    "Releasing MM connection {} ref={} ti={} cause={}",
                    conn.protocol, conn.reference, conn.transaction_id, cause
                );
                conn.prim(msg_type).with_cause(cause)
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MmConnection> {
        self.connections.iter()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every connection without notifying the owners.
    pub fn clear(&mut self) {
        self.connections.clear();
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
