//! MM connection management (TS 04.08 section 4.5)
//!
//! Establishment of MM connections requested by CC, SS and SMS, the CM
//! SERVICE REQUEST exchange, and release and abort of the connections.

use gsmsim_nas::{
    CmServiceAbort, CmServiceReject, CmServiceRequest, CmServiceType, MmMessage,
    MobileIdentity, RejectCause,
};
use tracing::{debug, info, warn};

use super::connection::{ConnState, ReleaseFilter};
use super::layer::MmLayer;
use super::state::{IdleSubstate, MainState, UpdateStatus};
use crate::error::{MmError, MmResult};
use crate::primitives::{
    rr_cause, CmProtocol, MmEvent, MmxxPrim, MmxxType, RrEstCause, RrPrim,
};
use crate::timer::MmTimerId;

/// Causes reported to the CM sublayers (TS 04.08 10.5.4.11).
pub mod cm_cause {
    /// Released by MM, RR or the network
    pub const NORMAL_RELEASE: u8 = 16;
    /// Another connection is being established
    pub const BUSY: u8 = 17;
    /// No service
    pub const NO_SERVICE: u8 = 21;
    /// Connection reference unknown
    pub const UNKNOWN_REFERENCE: u8 = 31;
    /// T3230 expired
    pub const TIMER_EXPIRY: u8 = 102;
}

/// How the CM SERVICE REQUEST reaches the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServiceRoute {
    /// Piggybacked on RR establishment
    Establish,
    /// On the existing RR connection
    Data,
}

impl MmLayer {
    // ========================================================================
    // Establishment
    // ========================================================================

    fn reject_upper(&mut self, prim: &MmxxPrim, cause: u8) {
        info!("{} rejected with cause {}", prim.name(), cause);
        let reply = MmxxPrim::new(
            MmxxType::RelInd,
            prim.protocol,
            prim.reference,
            prim.transaction_id,
        )
        .with_cause(cause);
        self.send_upper(reply);
    }

    /// Create a pending connection and send CM SERVICE REQUEST. Returns
    /// `false` when the request was rejected towards CM.
    fn init_mm(&mut self, prim: &MmxxPrim, route: ServiceRoute) -> MmResult<bool> {
        self.lupd_attempt = 0;

        if let Some(pending) = self.conns.pending() {
            info!(
                "Connection ref={} already pending, rejecting ref={}",
                pending.reference, prim.reference
            );
            self.reject_upper(prim, cm_cause::BUSY);
            return Ok(false);
        }

        let emergency = prim.protocol == CmProtocol::Cc && prim.emergency;
        if !emergency && !self.subscriber.is_updated() {
            info!("Not updated, only emergency calls allowed");
            self.reject_upper(prim, cm_cause::NO_SERVICE);
            return Ok(false);
        }
        if let Some(substate) = self.substate() {
            let full_service = matches!(
                substate,
                IdleSubstate::NormalService | IdleSubstate::PlmnSearchNormal
            );
            if !full_service && !emergency {
                info!("No normal service in {}, only emergency calls allowed", substate);
                self.reject_upper(prim, cm_cause::NO_SERVICE);
                return Ok(false);
            }
        }

        let (cause, service_type) = match prim.protocol {
            CmProtocol::Cc if emergency => (RrEstCause::Emergency, CmServiceType::EmergencyCall),
            CmProtocol::Cc => (RrEstCause::OrigTchF, CmServiceType::MobileOriginatingCall),
            CmProtocol::Ss => (RrEstCause::OtherSdcch, CmServiceType::SupplementaryService),
            CmProtocol::Sms => (RrEstCause::OtherSdcch, CmServiceType::ShortMessage),
        };

        // 4.5.1.5 emergency calls without SIM identify by IMEI
        let identity = if self.subscriber.sim_valid {
            self.subscriber.mobile_identity()
        } else {
            MobileIdentity::Imei(self.subscriber.imei.clone())
        };
        let request = CmServiceRequest::new(
            service_type,
            self.subscriber.key_seq,
            self.classmark2(),
            identity,
        );
        let data = self.encode_mm(&request)?;

        match self
            .conns
            .create(prim.protocol, prim.transaction_id, prim.reference)
        {
            Ok(conn) => conn.set_state(ConnState::ConnPend),
            Err(err @ MmError::DuplicateTransaction(..)) => {
                warn!("{}", err);
                self.reject_upper(prim, cm_cause::BUSY);
                return Ok(false);
            }
            Err(err) => return Err(err),
        }

        info!("CM SERVICE REQUEST ({:?}) for ref={}", service_type, prim.reference);
        match route {
            ServiceRoute::Establish => self.send_rr(RrPrim::est_req(cause, data)),
            ServiceRoute::Data => self.send_rr(RrPrim::data_req(data)),
        }
        Ok(true)
    }

    /// Connection request in idle: RR must be established first.
    pub(crate) fn init_mm_no_rr(&mut self, prim: &MmxxPrim) -> MmResult<()> {
        if self.init_mm(prim, ServiceRoute::Establish)? {
            self.new_mm_state(MainState::WaitRrConnMmCon, None);
        }
        Ok(())
    }

    /// First connection on an RR link that is still up.
    pub(crate) fn init_mm_first(&mut self, prim: &MmxxPrim) -> MmResult<()> {
        if self.init_mm(prim, ServiceRoute::Data)? {
            self.start_timer(MmTimerId::T3230, self.config.timers.t3230());
            self.new_mm_state(MainState::WaitOutMmConn, None);
        }
        Ok(())
    }

    /// Additional connection while others are active.
    pub(crate) fn init_mm_more(&mut self, prim: &MmxxPrim) -> MmResult<()> {
        if self.init_mm(prim, ServiceRoute::Data)? {
            self.start_timer(MmTimerId::T3230, self.config.timers.t3230());
            self.new_mm_state(MainState::WaitAddOutMmCon, None);
        }
        Ok(())
    }

    pub(crate) fn init_mm_reject(&mut self, prim: &MmxxPrim) -> MmResult<()> {
        self.reject_upper(prim, cm_cause::BUSY);
        Ok(())
    }

    /// RR established for the CM SERVICE REQUEST.
    pub(crate) fn est_mm_con(&mut self, _prim: &RrPrim) -> MmResult<()> {
        if self.conns.is_empty() {
            info!("Connection released while establishing RR");
            self.start_timer(MmTimerId::T3240, self.config.timers.t3240());
            self.new_mm_state(MainState::WaitNetworkCmd, None);
            return self.tx_mm_data(&CmServiceAbort);
        }

        self.start_timer(MmTimerId::T3230, self.config.timers.t3230());
        self.new_mm_state(MainState::WaitOutMmConn, None);
        Ok(())
    }

    /// The network opened RR towards us (paging).
    pub(crate) fn rr_est_ind(&mut self, _prim: &RrPrim) -> MmResult<()> {
        self.new_mm_state(MainState::WaitNetworkCmd, None);
        Ok(())
    }

    /// Confirm the pending connection towards its CM owner.
    fn go_dedic(&mut self) {
        match self.conns.pending_mut() {
            Some(conn) => {
                conn.set_state(ConnState::Dedicated);
                let prim = conn.prim(MmxxType::EstCnf);
                self.send_upper(prim);
            }
            None => debug!("No pending connection to confirm"),
        }
    }

    /// 4.5.1.1 CM SERVICE ACCEPT
    pub(crate) fn rx_cm_service_acc(&mut self, data: &[u8]) -> MmResult<()> {
        if self.conns.pending().is_none() {
            warn!("CM SERVICE ACCEPT without pending connection ({} bytes)", data.len());
            return Ok(());
        }

        self.stop_timer(MmTimerId::T3230);
        self.new_mm_state(MainState::MmConnActive, None);
        self.go_dedic();
        Ok(())
    }

    /// 4.5.1.1 CM SERVICE REJECT
    pub(crate) fn rx_cm_service_rej(&mut self, data: &[u8]) -> MmResult<()> {
        let reject = CmServiceReject::from_bytes(data)?;
        info!("CM SERVICE REJECT (cause {})", reject.cause);

        self.stop_timer(MmTimerId::T3230);

        let abort_any = matches!(
            reject.cause,
            RejectCause::IMSI_UNKNOWN_IN_VLR | RejectCause::ILLEGAL_ME
        );
        if abort_any {
            self.subscriber.invalidate_registration();
            self.subscriber.set_update_status(UpdateStatus::NotUpdated);
            if reject.cause == RejectCause::ILLEGAL_ME {
                self.subscriber.sim_valid = false;
            }
            self.release_connections(ReleaseFilter::All, cm_cause::NORMAL_RELEASE, true);
        } else {
            self.release_connections(
                ReleaseFilter::PendingOnly,
                cm_cause::NORMAL_RELEASE,
                false,
            );
        }

        if self.conns.is_empty() {
            self.start_timer(MmTimerId::T3240, self.config.timers.t3240());
            self.new_mm_state(MainState::WaitNetworkCmd, None);
        } else {
            self.new_mm_state(MainState::MmConnActive, None);
        }
        Ok(())
    }

    /// Ciphering started while waiting: counts as acceptance.
    pub(crate) fn sync_ind_wait(&mut self, _prim: &RrPrim) -> MmResult<()> {
        self.stop_timer(MmTimerId::T3230);
        self.new_mm_state(MainState::MmConnActive, None);
        self.go_dedic();
        Ok(())
    }

    /// Channel change while active: every call control connection is told.
    pub(crate) fn sync_ind_active(&mut self, prim: &RrPrim) -> MmResult<()> {
        self.stop_timer(MmTimerId::T3230);

        let indications: Vec<MmxxPrim> = self
            .conns
            .iter()
            .filter(|conn| conn.protocol == CmProtocol::Cc)
            .map(|conn| conn.prim(MmxxType::SyncInd).with_payload(prim.payload.clone()))
            .collect();
        for indication in indications {
            self.send_upper(indication);
        }
        Ok(())
    }

    /// T3230 expired without an answer to CM SERVICE REQUEST.
    pub(crate) fn timeout_mm_con(&mut self, _event: &MmEvent) -> MmResult<()> {
        info!("CM SERVICE REQUEST timed out");
        self.release_connections(ReleaseFilter::PendingOnly, cm_cause::TIMER_EXPIRY, false);

        if self.conns.is_empty() {
            self.start_timer(MmTimerId::T3240, self.config.timers.t3240());
            self.new_mm_state(MainState::WaitNetworkCmd, None);
        } else {
            self.new_mm_state(MainState::MmConnActive, None);
        }
        Ok(())
    }

    // ========================================================================
    // Data and Release
    // ========================================================================

    /// Forward a CM message downward.
    pub(crate) fn mm_data(&mut self, prim: &MmxxPrim) -> MmResult<()> {
        if self.conns.find_by_ref(prim.reference).is_none() {
            warn!("{} for unknown ref={}", prim.name(), prim.reference);
            self.reject_upper(prim, cm_cause::UNKNOWN_REFERENCE);
            return Ok(());
        }

        self.send_rr(RrPrim::data_req(prim.payload.clone()));
        Ok(())
    }

    pub(crate) fn release_active(&mut self, prim: &MmxxPrim) -> MmResult<()> {
        self.conns.destroy(prim.reference);

        if self.conns.is_empty() {
            self.start_timer(MmTimerId::T3240, self.config.timers.t3240());
            self.new_mm_state(MainState::WaitNetworkCmd, None);
        } else {
            self.new_mm_state(MainState::MmConnActive, None);
        }
        Ok(())
    }

    pub(crate) fn release_wait_add(&mut self, prim: &MmxxPrim) -> MmResult<()> {
        self.conns.destroy(prim.reference);
        Ok(())
    }

    /// Release while CM SERVICE REQUEST is outstanding. The last one aborts
    /// the request.
    pub(crate) fn release_wait_active(&mut self, prim: &MmxxPrim) -> MmResult<()> {
        self.conns.destroy(prim.reference);

        if self.conns.is_empty() {
            self.stop_timer(MmTimerId::T3230);
            self.start_timer(MmTimerId::T3240, self.config.timers.t3240());
            self.new_mm_state(MainState::WaitNetworkCmd, None);
            return self.tx_mm_data(&CmServiceAbort);
        }
        Ok(())
    }

    /// Release before RR is up. [`Self::est_mm_con`] sends the abort.
    pub(crate) fn release_wait_rr(&mut self, prim: &MmxxPrim) -> MmResult<()> {
        self.conns.destroy(prim.reference);
        Ok(())
    }

    /// RR released or failed under the MM connections.
    pub(crate) fn abort_mm_con(&mut self, prim: &RrPrim) -> MmResult<()> {
        info!("RR gone with MM connections (cause #{})", prim.cause);
        self.stop_timer(MmTimerId::T3230);
        self.release_connections(ReleaseFilter::All, cm_cause::NORMAL_RELEASE, true);
        self.return_idle();
        Ok(())
    }

    /// T3240 expired: nothing came from the network, drop RR.
    pub(crate) fn abort_rr(&mut self, _event: &MmEvent) -> MmResult<()> {
        info!("Aborting RR connection");
        self.send_rr(RrPrim::abort_req(rr_cause::ABNORMAL_TIMER));
        self.return_idle();
        Ok(())
    }

    pub(crate) fn rel_other(&mut self, prim: &RrPrim) -> MmResult<()> {
        debug!("RR released in state {} (cause #{})", self.state(), prim.cause);
        self.stop_timer(MmTimerId::T3240);
        self.return_idle();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use gsmsim_common::config::MsConfig;
    use gsmsim_common::{Lai, Plmn};

    use super::*;
    use crate::cell::ServingCell;
    use crate::primitives::{MmOutput, RrType};

    fn registered_layer() -> MmLayer {
        let yaml = r#"
imei: "356938035643809"
imeisv: "3569380356438091"
sim:
  imsi: "262420000000001"
  updated: true
"#;
        let mut mm = MmLayer::from_config(MsConfig::from_yaml(yaml).unwrap());
        let lai = Lai::new(Plmn::new(262, 42, false), 7);
        *mm.cell_mut() = ServingCell::camped(lai);
        mm.subscriber.lai = lai;
        mm.subscriber.lai_valid = true;
        mm.return_idle();
        mm
    }

    fn upper_outputs(mm: &mut MmLayer) -> Vec<MmxxPrim> {
        mm.take_outputs()
            .into_iter()
            .filter_map(|o| match o {
                MmOutput::Upper(prim) => Some(prim),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_second_request_rejected_busy() {
        let mut mm = registered_layer();
        mm.init_mm_no_rr(&MmxxPrim::est_req(CmProtocol::Cc, 1, 0))
            .unwrap();
        assert_eq!(mm.state(), MainState::WaitRrConnMmCon);
        mm.take_outputs();

        mm.init_mm_reject(&MmxxPrim::est_req(CmProtocol::Sms, 2, 0))
            .unwrap();
        let upper = upper_outputs(&mut mm);
        assert_eq!(upper.len(), 1);
        assert_eq!(upper[0].msg_type, MmxxType::RelInd);
        assert_eq!(upper[0].cause, cm_cause::BUSY);
        assert_eq!(mm.connections().len(), 1);
    }

    #[test]
    fn test_not_updated_rejects_non_emergency() {
        let mut mm = registered_layer();
        mm.subscriber_mut().set_update_status(UpdateStatus::NotUpdated);

        mm.init_mm_no_rr(&MmxxPrim::est_req(CmProtocol::Ss, 1, 0))
            .unwrap();
        let upper = upper_outputs(&mut mm);
        assert_eq!(upper[0].cause, cm_cause::NO_SERVICE);
        assert!(mm.connections().is_empty());
        assert_eq!(mm.state(), MainState::MmIdle);
    }

    #[test]
    fn test_emergency_without_sim_uses_imei() {
        let mut mm = registered_layer();
        mm.subscriber_mut().sim_valid = false;
        mm.return_idle();

        mm.init_mm_no_rr(&MmxxPrim::est_req(CmProtocol::Cc, 1, 0).with_emergency())
            .unwrap();
        let outputs = mm.take_outputs();
        let request = outputs
            .iter()
            .find_map(|o| match o {
                MmOutput::Rr(prim) if prim.msg_type == RrType::EstReq => Some(prim),
                _ => None,
            })
            .unwrap();
        assert_eq!(request.cause, RrEstCause::Emergency as u8);
        let decoded = CmServiceRequest::from_bytes(&request.payload).unwrap();
        assert_eq!(decoded.service_type, CmServiceType::EmergencyCall);
        assert_eq!(
            decoded.identity,
            MobileIdentity::Imei(String::from("356938035643809"))
        );
    }

    #[test]
    fn test_release_before_rr_sends_abort() {
        let mut mm = registered_layer();
        mm.init_mm_no_rr(&MmxxPrim::est_req(CmProtocol::Cc, 1, 0))
            .unwrap();
        mm.release_wait_rr(&MmxxPrim::rel_req(CmProtocol::Cc, 1, 0))
            .unwrap();
        mm.take_outputs();

        mm.est_mm_con(&RrPrim::new(RrType::EstCnf)).unwrap();
        assert_eq!(mm.state(), MainState::WaitNetworkCmd);
        assert!(mm.timers().is_running(MmTimerId::T3240));
        let outputs = mm.take_outputs();
        assert!(outputs
            .iter()
            .any(|o| matches!(o, MmOutput::Rr(prim) if prim.msg_type == RrType::DataReq)));
    }

    #[test]
    fn test_mm_data_unknown_reference() {
        let mut mm = registered_layer();
        let prim = MmxxPrim::data_req(CmProtocol::Sms, 42, 1, vec![0x09, 0x01]);
        mm.mm_data(&prim).unwrap();
        let upper = upper_outputs(&mut mm);
        assert_eq!(upper[0].cause, cm_cause::UNKNOWN_REFERENCE);
        assert_eq!(upper[0].reference, 42);
    }

    #[test]
    fn test_sync_ind_only_to_call_control() {
        let mut mm = registered_layer();
        mm.conns
            .create(CmProtocol::Cc, 0, 1)
            .unwrap()
            .set_state(ConnState::Dedicated);
        mm.conns
            .create(CmProtocol::Sms, 0, 2)
            .unwrap()
            .set_state(ConnState::Dedicated);
        mm.new_mm_state(MainState::MmConnActive, None);

        mm.sync_ind_active(&RrPrim::new(RrType::SyncInd)).unwrap();
        let upper = upper_outputs(&mut mm);
        assert_eq!(upper.len(), 1);
        assert_eq!(upper[0].msg_type, MmxxType::SyncInd);
        assert_eq!(upper[0].reference, 1);
    }
}
