//! MM connection scenarios: CM service requests, concurrent connections,
//! rejection, release and network initiated transactions.

mod common;

use common::*;
use gsmsim_ms::{
    cm_cause, rr_rel_cause, CmProtocol, IdleSubstate, MainState, MmEvent, MmTimerId, MmxxPrim,
    MmxxType, RrEstCause, RrType, UpdateStatus,
};
use gsmsim_nas::{
    CmServiceAccept, CmServiceReject, CmServiceRequest, CmServiceType, MmMessage,
    MmMessageType, MobileIdentity, RejectCause,
};

/// Registered in LAC 7 with one active CC connection (ref 1, TI 0).
fn active_call() -> Harness {
    let mut h = Harness::new(REGISTERED_SIM);
    h.camp(home_lai(7));
    h.upper(MmxxPrim::est_req(CmProtocol::Cc, 1, 0));
    h.rr(RrType::EstCnf, 0);
    h.peer(&CmServiceAccept);
    assert_eq!(h.mm.state(), MainState::MmConnActive);
    h
}

#[test]
fn test_call_setup_and_release() {
    let mut h = Harness::new(REGISTERED_SIM);
    h.camp(home_lai(7));

    let out = h.upper(MmxxPrim::est_req(CmProtocol::Cc, 1, 0));
    assert_eq!(h.mm.state(), MainState::WaitRrConnMmCon);
    let est = single_rr(&out, RrType::EstReq);
    assert_eq!(est.cause, RrEstCause::OrigTchF as u8);
    let request = CmServiceRequest::from_bytes(&est.payload).unwrap();
    assert_eq!(request.service_type, CmServiceType::MobileOriginatingCall);
    assert_eq!(request.identity, MobileIdentity::Tmsi(0x0102_0304));

    h.rr(RrType::EstCnf, 0);
    assert_eq!(h.mm.state(), MainState::WaitOutMmConn);
    assert!(h.mm.timers().is_running(MmTimerId::T3230));

    let out = h.peer(&CmServiceAccept);
    assert_eq!(h.mm.state(), MainState::MmConnActive);
    assert!(!h.mm.timers().is_running(MmTimerId::T3230));
    let upper = upper_prims(&out);
    assert_eq!(upper.len(), 1);
    assert_eq!(upper[0].msg_type, MmxxType::EstCnf);
    assert_eq!(upper[0].reference, 1);

    // CC SETUP goes down unchanged
    let setup = vec![0x03, 0x05, 0x04, 0x01, 0xa0];
    let out = h.upper(MmxxPrim::data_req(CmProtocol::Cc, 1, 0, setup.clone()));
    assert_eq!(single_rr(&out, RrType::DataReq).payload, setup);

    // CC CALL PROCEEDING from the network, TI flag set
    let out = h.peer_raw(vec![0x83, 0x02]);
    let upper = upper_prims(&out);
    assert_eq!(upper.len(), 1);
    assert_eq!(upper[0].msg_type, MmxxType::DataInd);
    assert_eq!(upper[0].reference, 1);

    h.upper(MmxxPrim::rel_req(CmProtocol::Cc, 1, 0));
    assert_eq!(h.mm.state(), MainState::WaitNetworkCmd);
    assert!(h.mm.connections().is_empty());
    assert!(h.mm.timers().is_running(MmTimerId::T3240));

    let out = h.advance(10);
    single_rr(&out, RrType::AbortReq);
    assert_eq!(h.mm.substate(), Some(IdleSubstate::NormalService));
}

#[test]
fn test_second_request_while_establishing_is_busy() {
    let mut h = Harness::new(REGISTERED_SIM);
    h.camp(home_lai(7));
    h.upper(MmxxPrim::est_req(CmProtocol::Cc, 1, 0));

    let out = h.upper(MmxxPrim::est_req(CmProtocol::Sms, 2, 0));
    assert!(rr_prims(&out).is_empty());
    let upper = upper_prims(&out);
    assert_eq!(upper.len(), 1);
    assert_eq!(upper[0].name(), "MMSMS_REL_IND");
    assert_eq!(upper[0].reference, 2);
    assert_eq!(upper[0].cause, cm_cause::BUSY);
    assert_eq!(h.mm.connections().len(), 1);
    assert_eq!(h.mm.state(), MainState::WaitRrConnMmCon);
}

#[test]
fn test_illegal_me_reject_aborts_all_connections() {
    let mut h = active_call();

    let out = h.upper(MmxxPrim::est_req(CmProtocol::Sms, 2, 1));
    assert_eq!(h.mm.state(), MainState::WaitAddOutMmCon);
    assert_eq!(sent_messages(&out), vec![MmMessageType::CmServiceRequest]);
    single_rr(&out, RrType::DataReq);

    let out = h.peer(&CmServiceReject::new(RejectCause::ILLEGAL_ME));
    let upper = upper_prims(&out);
    assert_eq!(upper.len(), 2);
    assert!(upper.iter().all(|p| p.msg_type == MmxxType::ErrInd));
    assert!(h.mm.connections().is_empty());

    let subscriber = h.mm.subscriber();
    assert!(!subscriber.sim_valid);
    assert_eq!(subscriber.update_status(), UpdateStatus::NotUpdated);
    assert!(!subscriber.lai_valid);
    assert!(!subscriber.tmsi_valid);

    assert_eq!(h.mm.state(), MainState::WaitNetworkCmd);
    assert!(h.mm.timers().is_running(MmTimerId::T3240));

    h.advance(10);
    assert_eq!(h.mm.substate(), Some(IdleSubstate::NoImsi));
}

#[test]
fn test_service_reject_keeps_active_connection() {
    let mut h = active_call();
    h.upper(MmxxPrim::est_req(CmProtocol::Ss, 2, 0));

    let out = h.peer(&CmServiceReject::new(RejectCause::CONGESTION));
    let upper = upper_prims(&out);
    assert_eq!(upper.len(), 1);
    assert_eq!(upper[0].name(), "MMSS_REL_IND");
    assert_eq!(upper[0].reference, 2);
    assert_eq!(h.mm.connections().len(), 1);
    assert_eq!(h.mm.state(), MainState::MmConnActive);
    assert!(h.mm.subscriber().sim_valid);
}

#[test]
fn test_t3230_expiry_releases_pending_only() {
    let mut h = active_call();
    h.upper(MmxxPrim::est_req(CmProtocol::Sms, 2, 1));
    assert!(h.mm.timers().is_running(MmTimerId::T3230));

    let out = h.advance(15);
    let upper = upper_prims(&out);
    assert_eq!(upper.len(), 1);
    assert_eq!(upper[0].msg_type, MmxxType::RelInd);
    assert_eq!(upper[0].reference, 2);
    assert_eq!(upper[0].cause, cm_cause::TIMER_EXPIRY);
    assert_eq!(h.mm.state(), MainState::MmConnActive);
    assert!(h.mm.connections().find_by_ref(1).is_some());
}

#[test]
fn test_release_before_rr_sends_service_abort() {
    let mut h = Harness::new(REGISTERED_SIM);
    h.camp(home_lai(7));
    h.upper(MmxxPrim::est_req(CmProtocol::Ss, 1, 0));
    h.upper(MmxxPrim::rel_req(CmProtocol::Ss, 1, 0));
    assert_eq!(h.mm.state(), MainState::WaitRrConnMmCon);

    let out = h.rr(RrType::EstCnf, 0);
    assert_eq!(sent_messages(&out), vec![MmMessageType::CmServiceAbort]);
    assert_eq!(h.mm.state(), MainState::WaitNetworkCmd);
}

#[test]
fn test_radio_link_failure_releases_connections() {
    let mut h = active_call();

    let out = h.rr(RrType::AbortInd, rr_rel_cause::LINK_FAILURE);
    let upper = upper_prims(&out);
    assert_eq!(upper.len(), 1);
    assert_eq!(upper[0].name(), "MMCC_ERR_IND");
    assert!(h.mm.connections().is_empty());
    assert_eq!(h.mm.state(), MainState::MmIdle);
}

#[test]
fn test_channel_sync_reaches_call_control_only() {
    let mut h = active_call();
    h.upper(MmxxPrim::est_req(CmProtocol::Sms, 2, 1));
    h.peer(&CmServiceAccept);
    assert_eq!(h.mm.connections().len(), 2);

    let out = h.rr(RrType::SyncInd, 0);
    let upper = upper_prims(&out);
    assert_eq!(upper.len(), 1);
    assert_eq!(upper[0].name(), "MMCC_SYNC_IND");
}

#[test]
fn test_network_initiated_transaction() {
    let mut h = Harness::new(REGISTERED_SIM);
    h.camp(home_lai(7));

    h.rr(RrType::EstInd, 0);
    assert_eq!(h.mm.state(), MainState::WaitNetworkCmd);

    // CC SETUP with TI 0 from the network
    let out = h.peer_raw(vec![0x03, 0x05]);
    let upper = upper_prims(&out);
    assert_eq!(upper.len(), 1);
    assert_eq!(upper[0].msg_type, MmxxType::EstInd);
    assert_eq!(upper[0].protocol, CmProtocol::Cc);
    assert_eq!(upper[0].transaction_id, 8);
    assert_eq!(upper[0].payload, vec![0x03, 0x05]);
    assert_eq!(h.mm.state(), MainState::MmConnActive);
    assert!(!h.mm.timers().is_running(MmTimerId::T3240));
}

#[test]
fn test_emergency_call_without_sim() {
    let mut h = Harness::new(
        r#"
imei: "356938035643809"
imeisv: "3569380356438091"
"#,
    );
    h.camp(home_lai(7));
    assert_eq!(h.mm.substate(), Some(IdleSubstate::NoImsi));

    let out = h.upper(MmxxPrim::est_req(CmProtocol::Sms, 1, 0));
    assert_eq!(upper_prims(&out)[0].msg_type, MmxxType::RelInd);
    assert!(h.mm.connections().is_empty());

    let out = h.upper(MmxxPrim::est_req(CmProtocol::Cc, 2, 0).with_emergency());
    let est = single_rr(&out, RrType::EstReq);
    assert_eq!(est.cause, RrEstCause::Emergency as u8);
    let request = CmServiceRequest::from_bytes(&est.payload).unwrap();
    assert_eq!(request.service_type, CmServiceType::EmergencyCall);
    assert_eq!(
        request.identity,
        MobileIdentity::Imei(String::from("356938035643809"))
    );
}

#[test]
fn test_duplicate_transaction_rejected() {
    let mut h = active_call();

    let out = h.upper(MmxxPrim::est_req(CmProtocol::Cc, 2, 0));
    assert!(rr_prims(&out).is_empty());
    let upper = upper_prims(&out);
    assert_eq!(upper.len(), 1);
    assert_eq!(upper[0].msg_type, MmxxType::RelInd);
    assert_eq!(upper[0].reference, 2);
    assert_eq!(upper[0].cause, cm_cause::BUSY);

    assert_eq!(h.mm.connections().len(), 1);
    assert_eq!(h.mm.connections().find_by_id(CmProtocol::Cc, 0).unwrap().reference, 1);
    assert_eq!(h.mm.state(), MainState::MmConnActive);
}

#[test]
fn test_network_transaction_beside_caller_reference() {
    let mut h = active_call();

    // CC SETUP from the network on TI 1 while ref 1 is held by the caller
    let out = h.peer_raw(vec![0x13, 0x05]);
    let upper = upper_prims(&out);
    assert_eq!(upper.len(), 1);
    assert_eq!(upper[0].msg_type, MmxxType::EstInd);
    assert_ne!(upper[0].reference, 1);
    assert_eq!(h.mm.connections().len(), 2);
    assert!(h.mm.connections().find_by_ref(upper[0].reference).is_some());

    // the caller's connection still gets its own traffic
    let out = h.peer_raw(vec![0x83, 0x02]);
    let upper = upper_prims(&out);
    assert_eq!(upper.len(), 1);
    assert_eq!(upper[0].msg_type, MmxxType::DataInd);
    assert_eq!(upper[0].reference, 1);
}

#[test]
fn test_stale_t3230_expiry_ignored() {
    let mut h = active_call();
    assert!(!h.mm.timers().is_running(MmTimerId::T3230));

    h.mm.push_event(MmEvent::Timeout(MmTimerId::T3230));
    let out = h.run();
    assert!(out.is_empty());
    assert_eq!(h.mm.state(), MainState::MmConnActive);
    assert!(h.mm.connections().find_by_ref(1).is_some());
}

#[test]
fn test_stale_t3240_expiry_ignored() {
    let mut h = active_call();

    h.mm.push_event(MmEvent::Timeout(MmTimerId::T3240));
    let out = h.run();
    assert!(rr_prims(&out).is_empty());
    assert_eq!(h.mm.state(), MainState::MmConnActive);
    assert_eq!(h.mm.connections().len(), 1);
}

/// SIM registered in LAC 7 but not updated there.
const NOT_UPDATED_SIM: &str = r#"
imei: "356938035643809"
imeisv: "3569380356438091"
sim:
  imsi: "262420000000001"
  lai:
    plmn:
      mcc: 262
      mnc: 42
    lac: 7
"#;

#[test]
fn test_attempt_update_rejects_normal_call() {
    let mut h = Harness::new(NOT_UPDATED_SIM);
    h.camp(home_lai(7));
    assert_eq!(h.mm.state(), MainState::WaitRrConnLupd);
    // the first random access failure leaves MM attempting to update
    h.rr(RrType::AbortInd, rr_rel_cause::RA_FAILURE);
    assert_eq!(h.mm.substate(), Some(IdleSubstate::AttemptUpdate));

    let out = h.upper(MmxxPrim::est_req(CmProtocol::Cc, 1, 0));
    assert!(rr_prims(&out).is_empty());
    let upper = upper_prims(&out);
    assert_eq!(upper.len(), 1);
    assert_eq!(upper[0].name(), "MMCC_REL_IND");
    assert_eq!(upper[0].cause, cm_cause::NO_SERVICE);
    assert!(h.mm.connections().is_empty());

    // emergency calls still go through
    let out = h.upper(MmxxPrim::est_req(CmProtocol::Cc, 2, 0).with_emergency());
    let est = single_rr(&out, RrType::EstReq);
    assert_eq!(est.cause, RrEstCause::Emergency as u8);
}
