//! Location Updating Procedure
//!
//! Normal, periodic and IMSI attach location updating, TS 04.08 section
//! 4.4, including the retry handling of 4.4.4.9 and the T3212 handling of
//! 4.4.2.

use std::time::Duration;

use gsmsim_nas::{
    LocationUpdatingAccept, LocationUpdatingReject, LocationUpdatingRequest,
    LocationUpdatingType, MmMessage, MobileIdentity, RejectCause, TmsiReallocationComplete,
};
use rand::Rng;
use tracing::{debug, info, warn};

use super::layer::{MmLayer, LUPD_ATTEMPT_MAX};
use super::state::{IdleSubstate, MainState, UpdateStatus};
use crate::error::MmResult;
use crate::primitives::{
    rr_cause, rr_rel_cause, MmEvent, MmrPrim, PlmnEvent, RrEstCause, RrPrim,
};
use crate::timer::MmTimerId;

impl MmLayer {
    // ========================================================================
    // Initiation
    // ========================================================================

    /// IMSI attach is needed: updated in the serving LA but not attached.
    fn imsi_attach_required(&self) -> bool {
        self.subscriber.is_updated()
            && self.cell.camped_normally()
            && self.subscriber.lai == self.cell.lai
            && !self.subscriber.imsi_attached
            && self.subscriber.attach_allowed
    }

    /// Start a normal location update or an IMSI attach (4.4.1, 4.4.3).
    pub(crate) fn loc_upd_normal(&mut self, _event: &MmEvent) -> MmResult<()> {
        if self.lupd_pending {
            info!("Loc. upd. already pending");
            return Ok(());
        }

        self.lupd_type = if self.imsi_attach_required() {
            LocationUpdatingType::ImsiAttach
        } else {
            LocationUpdatingType::Normal
        };
        self.lupd_attempt = 0;
        self.lupd_pending = true;
        self.lupd_ra_failure = false;

        self.loc_upd()
    }

    /// Start a periodic location update (4.4.2).
    pub(crate) fn loc_upd_periodic(&mut self, _event: &MmEvent) -> MmResult<()> {
        if self.lupd_pending {
            info!("Loc. upd. already pending");
            return Ok(());
        }

        self.lupd_type = LocationUpdatingType::Periodic;
        self.lupd_attempt = 0;
        self.lupd_pending = true;
        self.lupd_ra_failure = false;

        self.loc_upd()
    }

    /// T3211 or T3213 expired, try again.
    pub(crate) fn loc_upd_retry(&mut self, _event: &MmEvent) -> MmResult<()> {
        self.loc_upd()
    }

    /// T3212 expired outside a state that can update. The periodic update
    /// happens when T3212 is restarted on the next return to idle.
    pub(crate) fn loc_upd_delay(&mut self, _event: &MmEvent) -> MmResult<()> {
        debug!("Periodic loc. upd. delayed in state {}", self.state());
        Ok(())
    }

    /// A cell has been found while searching. Re-evaluate the idle substate
    /// and register if needed.
    pub(crate) fn cell_selected(&mut self, event: &MmEvent) -> MmResult<()> {
        info!("Cell selected: {}", self.cell);
        self.return_idle();

        match self.substate() {
            Some(IdleSubstate::LocUpdNeeded | IdleSubstate::AttemptUpdate) => {
                self.loc_upd_normal(event)
            }
            Some(IdleSubstate::NormalService) if self.imsi_attach_required() => {
                self.loc_upd_normal(event)
            }
            _ => Ok(()),
        }
    }

    /// (Re)start a location update (4.4.4.1). Every failed precondition
    /// cancels the pending update.
    pub(crate) fn loc_upd(&mut self) -> MmResult<()> {
        if !self.lupd_pending {
            info!("No loc. upd. pending");
            return Ok(());
        }

        if !self.cell.camped_normally() {
            info!("Loc. upd. not camping normally");
            self.lupd_pending = false;
            return Ok(());
        }

        let lai = self.cell.lai;
        if self.subscriber.is_plmn_forbidden(&lai.plmn) {
            info!("Loc. upd. not allowed PLMN {}", lai.plmn);
            self.lupd_pending = false;
            return Ok(());
        }
        if self.cell.is_la_forbidden(&lai) {
            info!("Loc. upd. not allowed LA {}", lai);
            self.lupd_pending = false;
            return Ok(());
        }

        // 4.4.4.9
        if self
            .cell
            .access_barred(self.subscriber.access_class, self.subscriber.acc_barr)
        {
            info!("Loc. upd. no access");
            self.lupd_pending = false;
            return Ok(());
        }

        self.tx_loc_upd_req()
    }

    /// 9.2.15 LOCATION UPDATING REQUEST, sent with the RR establishment.
    fn tx_loc_upd_req(&mut self) -> MmResult<()> {
        info!(
            "LOCATION UPDATING REQUEST ({}, attempt {})",
            self.lupd_type, self.lupd_attempt
        );

        let lai = if self.subscriber.lai_valid {
            self.subscriber.lai
        } else {
            self.cell.lai
        };
        let request = LocationUpdatingRequest::new(
            self.lupd_type,
            self.subscriber.key_seq,
            lai,
            self.classmark1(),
            self.subscriber.mobile_identity(),
        );
        let data = self.encode_mm(&request)?;

        self.new_mm_state(MainState::WaitRrConnLupd, None);
        self.send_rr(RrPrim::est_req(RrEstCause::LocationUpdate, data));
        Ok(())
    }

    /// RR is established during location update (4.4.4.1).
    pub(crate) fn est_loc_upd(&mut self, _prim: &RrPrim) -> MmResult<()> {
        self.start_timer(MmTimerId::T3210, self.config.timers.t3210());
        self.new_mm_state(MainState::LocUpdInit, None);
        Ok(())
    }

    // ========================================================================
    // Network Responses
    // ========================================================================

    /// 4.4.4.6 LOCATION UPDATING ACCEPT
    pub(crate) fn rx_loc_upd_acc(&mut self, data: &[u8]) -> MmResult<()> {
        let accept = LocationUpdatingAccept::from_bytes(data)?;

        self.lupd_pending = false;
        self.lupd_ra_failure = false;
        // 4.4.2
        self.stop_timer(MmTimerId::T3212);
        self.stop_timer(MmTimerId::T3210);

        self.subscriber.lai = accept.lai;
        self.subscriber.lai_valid = true;
        self.lupd_attempt = 0;
        if self.lupd_type == LocationUpdatingType::ImsiAttach {
            self.subscriber.imsi_attached = true;
        }
        self.subscriber.set_update_status(UpdateStatus::Updated);

        info!("LOCATION UPDATING ACCEPT (LAI {})", accept.lai);

        self.cell.remove_forbidden_la(&accept.lai);

        match accept.identity {
            Some(MobileIdentity::Tmsi(tmsi)) => {
                self.subscriber.tmsi = tmsi;
                self.subscriber.tmsi_valid = true;
                info!("got TMSI {:#010x}", tmsi);
                self.tx_mm_data(&TmsiReallocationComplete)?;
            }
            Some(MobileIdentity::Imsi(_)) => {
                info!("TMSI removed");
                self.subscriber.tmsi_valid = false;
                self.tx_mm_data(&TmsiReallocationComplete)?;
            }
            Some(other) => {
                warn!("TMSI reallocation with unexpected identity {}", other);
            }
            None => {}
        }

        self.send_plmn(PlmnEvent::RegSuccess);
        self.send_mmr(MmrPrim::RegCnf);

        if accept.follow_on_proceed {
            warn!("follow-on proceed not supported");
        }

        self.start_timer(MmTimerId::T3240, self.config.timers.t3240());
        self.new_mm_state(MainState::WaitNetworkCmd, None);
        Ok(())
    }

    /// 4.4.4.7 LOCATION UPDATING REJECT. The cause is acted upon when RR is
    /// released.
    pub(crate) fn rx_loc_upd_rej(&mut self, data: &[u8]) -> MmResult<()> {
        let reject = LocationUpdatingReject::from_bytes(data)?;
        info!("LOCATION UPDATING REJECT (cause {})", reject.cause);

        self.lupd_ra_failure = false;
        // 4.4.2
        self.stop_timer(MmTimerId::T3212);
        self.stop_timer(MmTimerId::T3210);

        self.lupd_rej_cause = reject.cause;

        self.start_timer(MmTimerId::T3240, self.config.timers.t3240());
        self.new_mm_state(MainState::LocUpdRej, None);
        Ok(())
    }

    /// RR released after LOCATION UPDATING REJECT (4.4.4.7).
    pub(crate) fn rel_loc_upd_rej(&mut self, _prim: &RrPrim) -> MmResult<()> {
        let cause = self.lupd_rej_cause;
        info!("Loc. upd. rejected (cause {})", cause);

        if cause.is_identity_reject() {
            self.lupd_attempt = 0;
            self.subscriber.sim_valid = false;
        }
        if cause.is_identity_reject()
            || matches!(
                cause,
                RejectCause::PLMN_NOT_ALLOWED
                    | RejectCause::LA_NOT_ALLOWED
                    | RejectCause::ROAMING_NOT_ALLOWED
            )
        {
            self.subscriber.invalidate_registration();
            self.subscriber
                .set_update_status(UpdateStatus::RoamingNotAllowed);
        }

        let event = if cause == RejectCause::ROAMING_NOT_ALLOWED {
            PlmnEvent::RoamingNotAllowed
        } else if cause.is_identity_reject() {
            PlmnEvent::InvalidSim
        } else {
            PlmnEvent::RegFailed(cause)
        };
        self.send_plmn(event);

        let lai = self.cell.lai;
        match cause {
            RejectCause::PLMN_NOT_ALLOWED => self.subscriber.add_forbidden_plmn(lai.plmn),
            RejectCause::LA_NOT_ALLOWED => self.cell.add_forbidden_la(lai),
            RejectCause::ROAMING_NOT_ALLOWED => {}
            _ if cause.is_identity_reject() => {}
            // 4.4.4.9
            _ => return self.loc_upd_failed(),
        }

        self.lupd_pending = false;
        // cause 13 is resolved to PLMN SEARCH there
        self.return_idle();
        Ok(())
    }

    // ========================================================================
    // Abnormal Cases (4.4.4.9)
    // ========================================================================

    /// Count a failed attempt and decide between a retry and giving up.
    pub(crate) fn loc_upd_failed(&mut self) -> MmResult<()> {
        self.stop_timer(MmTimerId::T3210);

        if self.lupd_attempt < LUPD_ATTEMPT_MAX {
            self.lupd_attempt += 1;
        }

        if self.subscriber.is_updated()
            && self.cell.camped_normally()
            && self.subscriber.is_registered_in(&self.cell.lai)
            && self.lupd_attempt < LUPD_ATTEMPT_MAX
        {
            info!("Loc. upd. failed, retry #{}", self.lupd_attempt);
            self.start_timer(MmTimerId::T3211, self.config.timers.t3211());
            self.return_idle();
            return Ok(());
        }

        self.subscriber.invalidate_registration();
        self.subscriber.set_update_status(UpdateStatus::NotUpdated);

        if self.lupd_attempt < LUPD_ATTEMPT_MAX {
            info!("Loc. upd. failed, retry #{} not updated", self.lupd_attempt);
            self.start_timer(MmTimerId::T3211, self.config.timers.t3211());
        } else {
            info!("Loc. upd. failed too often");
            self.lupd_pending = false;
        }

        self.return_idle();
        Ok(())
    }

    /// RR released or aborted during location update.
    pub(crate) fn rel_loc_upd_abort(&mut self, prim: &RrPrim) -> MmResult<()> {
        info!("Loc. upd. aborted by radio (cause #{})", prim.cause);

        // a single random access failure only delays the update
        if prim.cause == rr_rel_cause::RA_FAILURE && !self.lupd_ra_failure {
            self.lupd_ra_failure = true;
            self.start_timer(MmTimerId::T3213, self.config.timers.t3213());
            self.return_idle();
            return Ok(());
        }

        self.lupd_ra_failure = false;
        self.loc_upd_failed()
    }

    /// T3210 expired.
    pub(crate) fn loc_upd_timeout(&mut self, _event: &MmEvent) -> MmResult<()> {
        if !self.lupd_pending || self.state() != MainState::LocUpdInit {
            debug!("Stale T3210 expiry ignored in state {}", self.state());
            return Ok(());
        }

        self.send_rr(RrPrim::abort_req(rr_cause::ABNORMAL_TIMER));
        self.loc_upd_failed()
    }

    // ========================================================================
    // System Information
    // ========================================================================

    /// Apply new system information, re-arming T3212 when the broadcast
    /// interval changes.
    pub(crate) fn sysinfo(&mut self, event: &MmEvent) -> MmResult<()> {
        let MmEvent::Sysinfo(sysinfo) = event else {
            return Ok(());
        };

        self.cell.apply_sysinfo(sysinfo);
        self.subscriber.attach_allowed = sysinfo.att_allowed;

        let value = sysinfo.t3212;
        if value != 0 && value != self.t3212_value {
            match self.timers.remaining(MmTimerId::T3212, self.now) {
                Some(rest) => {
                    let rest = rest.as_secs() % u64::from(value);
                    info!(
                        "New T3212 while timer is running (value {} rest {})",
                        value, rest
                    );
                    self.timers
                        .get_mut(MmTimerId::T3212)
                        .set_remaining(self.now, Duration::from_secs(rest));
                }
                None => {
                    info!("New T3212 while timer is not running (value {})", value);
                    // a zero start would leave T3212 unarmed
                    let start = self.rng.gen_range(1..=value);
                    self.start_t3212(Duration::from_secs(u64::from(start)));
                }
            }
            self.t3212_value = value;
        }

        if sysinfo.si3 && value == 0 {
            self.stop_timer(MmTimerId::T3212);
            self.t3212_value = 0;
        }

        Ok(())
    }
}
