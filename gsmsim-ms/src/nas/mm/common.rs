//! MM common procedures
//!
//! TMSI reallocation, authentication, identification, abort and MM
//! information (TS 04.08 section 4.3), plus MM STATUS reception.

use gsmsim_nas::{
    Abort, AuthenticationRequest, AuthenticationResponse, CodecError, IdentityRequest,
    IdentityResponse, IdentityType, IeError, MmInformation, MmMessage, MmStatus,
    MobileIdentity, RejectCause, TmsiReallocationCommand, TmsiReallocationComplete,
};
use tracing::{info, warn};

use super::cm_connection::cm_cause;
use super::connection::ReleaseFilter;
use super::layer::MmLayer;
use super::state::{MainState, UpdateStatus};
use crate::error::MmResult;
use crate::primitives::{rr_cause, MmEvent, RrPrim, SimRequest};
use crate::timer::MmTimerId;

impl MmLayer {
    // ========================================================================
    // 4.3.1 TMSI Reallocation
    // ========================================================================

    pub(crate) fn rx_tmsi_realloc_cmd(&mut self, data: &[u8]) -> MmResult<()> {
        let command = match TmsiReallocationCommand::from_bytes(data) {
            Ok(command) => command,
            Err(CodecError::Ie(IeError::InvalidIdentityType(value))) => {
                warn!("TMSI REALLOCATION COMMAND with identity type {}", value);
                return self.tx_mm_status(RejectCause::SEMANTICALLY_INCORRECT);
            }
            Err(e) => return Err(e.into()),
        };

        match command.identity {
            MobileIdentity::Tmsi(tmsi) => {
                self.subscriber.lai = command.lai;
                self.subscriber.lai_valid = true;
                self.subscriber.tmsi = tmsi;
                self.subscriber.tmsi_valid = true;
                info!("TMSI {:#010x} assigned in {}", tmsi, command.lai);
            }
            MobileIdentity::Imsi(_) => {
                self.subscriber.lai = command.lai;
                self.subscriber.lai_valid = true;
                self.subscriber.tmsi_valid = false;
                info!("TMSI removed");
            }
            other => {
                warn!("TMSI REALLOCATION COMMAND with identity {}", other);
                return self.tx_mm_status(RejectCause::SEMANTICALLY_INCORRECT);
            }
        }

        self.tx_mm_data(&TmsiReallocationComplete)
    }

    // ========================================================================
    // 4.3.2 Authentication
    // ========================================================================

    pub(crate) fn rx_auth_req(&mut self, data: &[u8]) -> MmResult<()> {
        let request = AuthenticationRequest::from_bytes(data)?;

        if !self.subscriber.sim_valid {
            warn!("AUTHENTICATION REQUEST without valid SIM");
            return self.tx_mm_status(RejectCause::MSG_TYPE_NOT_COMPATIBLE);
        }

        info!("AUTHENTICATION REQUEST (key_seq {})", request.key_seq);
        self.subscriber.key_seq = request.key_seq;
        self.send_sim(SimRequest::RunGsmAlgo {
            key_seq: request.key_seq,
            rand: request.rand,
        });
        Ok(())
    }

    /// SIM answered, send SRES.
    pub(crate) fn tx_auth_rsp(&mut self, event: &MmEvent) -> MmResult<()> {
        let MmEvent::AuthResponse { sres } = event else {
            return Ok(());
        };
        info!("AUTHENTICATION RESPONSE");
        self.tx_mm_data(&AuthenticationResponse::new(*sres))
    }

    pub(crate) fn rx_auth_rej(&mut self, _data: &[u8]) -> MmResult<()> {
        info!("AUTHENTICATION REJECT");

        self.stop_timer(MmTimerId::T3212);
        self.subscriber.sim_valid = false;
        self.subscriber.invalidate_registration();
        self.subscriber
            .set_update_status(UpdateStatus::RoamingNotAllowed);

        // 4.3.4.3 detach cannot complete
        if self.state() == MainState::ImsiDetachInit {
            self.send_rr(RrPrim::abort_req(rr_cause::NORMAL));
            self.return_idle();
        }
        Ok(())
    }

    // ========================================================================
    // 4.3.3 Identification
    // ========================================================================

    pub(crate) fn rx_id_req(&mut self, data: &[u8]) -> MmResult<()> {
        let request = IdentityRequest::from_bytes(data)?;
        let requested = request.requested();

        if !self.subscriber.sim_valid {
            warn!("IDENTITY REQUEST without valid SIM");
            return self.tx_mm_status(RejectCause::MSG_TYPE_NOT_COMPATIBLE);
        }
        if requested == Some(IdentityType::Tmsi) && !self.subscriber.tmsi_valid {
            warn!("IDENTITY REQUEST for TMSI, but none is assigned");
            return self.tx_mm_status(RejectCause::MSG_TYPE_NOT_COMPATIBLE);
        }

        let subscriber = &self.subscriber;
        let identity = match requested {
            Some(IdentityType::Imsi) => MobileIdentity::Imsi(subscriber.imsi.clone()),
            Some(IdentityType::Imei) => MobileIdentity::Imei(subscriber.imei.clone()),
            Some(IdentityType::Imeisv) => MobileIdentity::Imeisv(subscriber.imeisv.clone()),
            Some(IdentityType::Tmsi) => MobileIdentity::Tmsi(subscriber.tmsi),
            Some(IdentityType::NoIdentity) | None => MobileIdentity::NoIdentity,
        };

        info!("IDENTITY REQUEST for {:#x}, responding", request.identity_type);
        self.tx_mm_data(&IdentityResponse::new(identity))
    }

    // ========================================================================
    // 4.3.5 Abort
    // ========================================================================

    pub(crate) fn rx_abort(&mut self, data: &[u8]) -> MmResult<()> {
        let abort = Abort::from_bytes(data)?;

        if self.conns.is_empty() {
            warn!("ABORT without MM connection");
            return self.tx_mm_status(RejectCause::MSG_TYPE_NOT_COMPATIBLE);
        }

        info!("ABORT (cause {})", abort.cause);
        self.stop_timer(MmTimerId::T3230);
        self.release_connections(ReleaseFilter::All, cm_cause::NORMAL_RELEASE, false);

        if abort.cause == RejectCause::ILLEGAL_ME {
            self.subscriber.sim_valid = false;
            self.subscriber.invalidate_registration();
            self.subscriber
                .set_update_status(UpdateStatus::RoamingNotAllowed);
            self.return_idle();
        }
        Ok(())
    }

    // ========================================================================
    // 4.3.6 MM Information
    // ========================================================================

    pub(crate) fn rx_info(&mut self, data: &[u8]) -> MmResult<()> {
        let information = MmInformation::from_bytes(data)?;

        if let Some(name) = information.full_name {
            info!("Network name (long): {}", name.as_str());
            self.name_long = Some(name.0);
        }
        if let Some(name) = information.short_name {
            info!("Network name (short): {}", name.as_str());
            self.name_short = Some(name.0);
        }
        Ok(())
    }

    pub(crate) fn rx_status(&mut self, data: &[u8]) -> MmResult<()> {
        let status = MmStatus::from_bytes(data)?;
        info!("MM STATUS (cause {})", status.cause);
        Ok(())
    }
}
