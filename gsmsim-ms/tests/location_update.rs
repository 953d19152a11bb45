//! Location updating scenarios: registration, rejection, retries and the
//! periodic timer.

mod common;

use std::time::Duration;

use common::*;
use gsmsim_ms::{
    rr_rel_cause, IdleSubstate, MainState, MmOutput, MmTimerId, MmrPrim, PlmnEvent, RrEstCause,
    RrType, SysInfo, UpdateStatus,
};
use gsmsim_nas::{
    LocationUpdatingAccept, LocationUpdatingReject, LocationUpdatingRequest, LocationUpdatingType,
    MmMessage, MmMessageType, MobileIdentity, RejectCause,
};

#[test]
fn test_registration_accepted_with_new_tmsi() {
    let mut h = Harness::new(FRESH_SIM);
    let lai = home_lai(7);

    let out = h.camp(lai);
    assert_eq!(h.mm.state(), MainState::WaitRrConnLupd);
    let est = single_rr(&out, RrType::EstReq);
    assert_eq!(est.cause, RrEstCause::LocationUpdate as u8);
    let request = LocationUpdatingRequest::from_bytes(&est.payload).unwrap();
    assert_eq!(request.update_type, LocationUpdatingType::Normal);
    assert_eq!(request.lai, lai);
    assert_eq!(
        request.identity,
        MobileIdentity::Imsi(String::from("262420000000001"))
    );

    h.rr(RrType::EstCnf, 0);
    assert_eq!(h.mm.state(), MainState::LocUpdInit);
    assert!(h.mm.timers().is_running(MmTimerId::T3210));

    let accept = LocationUpdatingAccept::new(lai).with_identity(MobileIdentity::Tmsi(0x1122_3344));
    let out = h.peer(&accept);
    assert_eq!(sent_messages(&out), vec![MmMessageType::TmsiReallocationComplete]);
    assert_eq!(plmn_events(&out), vec![PlmnEvent::RegSuccess]);
    assert!(out.contains(&MmOutput::Mmr(MmrPrim::RegCnf)));

    assert_eq!(h.mm.state(), MainState::WaitNetworkCmd);
    assert!(!h.mm.timers().is_running(MmTimerId::T3210));
    assert!(h.mm.timers().is_running(MmTimerId::T3240));
    assert!(!h.mm.lupd_pending());

    let subscriber = h.mm.subscriber();
    assert_eq!(subscriber.update_status(), UpdateStatus::Updated);
    assert!(subscriber.is_registered_in(&lai));
    assert!(subscriber.tmsi_valid);
    assert_eq!(subscriber.tmsi, 0x1122_3344);

    h.rr(RrType::RelInd, rr_rel_cause::NORMAL);
    assert_eq!(h.mm.state(), MainState::MmIdle);
    assert_eq!(h.mm.substate(), Some(IdleSubstate::NormalService));
}

#[test]
fn test_network_silence_after_accept_aborts_rr() {
    let mut h = Harness::new(FRESH_SIM);
    let lai = home_lai(7);
    h.camp(lai);
    h.rr(RrType::EstCnf, 0);
    h.peer(&LocationUpdatingAccept::new(lai));

    let out = h.advance(10);
    single_rr(&out, RrType::AbortReq);
    assert_eq!(h.mm.state(), MainState::MmIdle);
    assert_eq!(h.mm.substate(), Some(IdleSubstate::NormalService));
}

#[test]
fn test_roaming_not_allowed_starts_plmn_search() {
    let mut h = Harness::new(FRESH_SIM);
    h.camp(home_lai(7));
    h.rr(RrType::EstCnf, 0);

    h.peer(&LocationUpdatingReject::new(RejectCause::ROAMING_NOT_ALLOWED));
    assert_eq!(h.mm.state(), MainState::LocUpdRej);
    assert!(h.mm.timers().is_running(MmTimerId::T3240));

    let out = h.rr(RrType::RelInd, rr_rel_cause::NORMAL);
    assert_eq!(plmn_events(&out), vec![PlmnEvent::RoamingNotAllowed]);
    assert_eq!(h.mm.substate(), Some(IdleSubstate::PlmnSearch));
    assert_eq!(
        h.mm.subscriber().update_status(),
        UpdateStatus::RoamingNotAllowed
    );
    assert!(h.mm.cell().forbidden_las().is_empty());
    assert!(h.mm.subscriber().forbidden_plmns().is_empty());
    assert!(!h.mm.lupd_pending());
}

#[test]
fn test_la_not_allowed_blocks_further_updates() {
    let mut h = Harness::new(FRESH_SIM);
    let lai = home_lai(7);
    h.camp(lai);
    h.rr(RrType::EstCnf, 0);
    h.peer(&LocationUpdatingReject::new(RejectCause::LA_NOT_ALLOWED));

    let out = h.rr(RrType::RelInd, rr_rel_cause::NORMAL);
    assert_eq!(
        plmn_events(&out),
        vec![PlmnEvent::RegFailed(RejectCause::LA_NOT_ALLOWED)]
    );
    assert_eq!(h.mm.cell().forbidden_las(), &[lai]);
    assert_eq!(h.mm.state(), MainState::MmIdle);

    // same location area again: nothing is sent
    let out = h.camp(lai);
    assert!(rr_prims(&out).is_empty());
    assert!(!h.mm.lupd_pending());
}

#[test]
fn test_illegal_ms_invalidates_sim() {
    let mut h = Harness::new(FRESH_SIM);
    h.camp(home_lai(7));
    h.rr(RrType::EstCnf, 0);
    h.peer(&LocationUpdatingReject::new(RejectCause::ILLEGAL_MS));

    let out = h.rr(RrType::RelInd, rr_rel_cause::NORMAL);
    assert_eq!(plmn_events(&out), vec![PlmnEvent::InvalidSim]);
    assert!(!h.mm.subscriber().sim_valid);
    assert_eq!(h.mm.substate(), Some(IdleSubstate::NoImsi));
}

#[test]
fn test_random_access_failure_retries_after_t3213() {
    let mut h = Harness::new(FRESH_SIM);
    h.camp(home_lai(7));

    h.rr(RrType::AbortInd, rr_rel_cause::RA_FAILURE);
    assert_eq!(h.mm.state(), MainState::MmIdle);
    assert_eq!(h.mm.substate(), Some(IdleSubstate::LocUpdNeeded));
    assert!(h.mm.timers().is_running(MmTimerId::T3213));
    assert!(h.mm.lupd_pending());
    assert_eq!(h.mm.lupd_attempt(), 0);

    let out = h.advance(4);
    single_rr(&out, RrType::EstReq);
    assert_eq!(h.mm.state(), MainState::WaitRrConnLupd);
    assert_eq!(h.mm.lupd_attempt(), 0);

    // a second random access failure counts as an attempt
    h.rr(RrType::AbortInd, rr_rel_cause::RA_FAILURE);
    assert_eq!(h.mm.lupd_attempt(), 1);
    assert!(h.mm.timers().is_running(MmTimerId::T3211));
    assert_eq!(h.mm.subscriber().update_status(), UpdateStatus::NotUpdated);
}

#[test]
fn test_attempts_stop_after_four_failures() {
    let mut h = Harness::new(FRESH_SIM);
    h.camp(home_lai(7));

    for attempt in 1..=4 {
        h.rr(RrType::RelInd, rr_rel_cause::LINK_FAILURE);
        assert_eq!(h.mm.lupd_attempt(), attempt);
        if attempt < 4 {
            assert!(h.mm.timers().is_running(MmTimerId::T3211));
            let out = h.advance(15);
            single_rr(&out, RrType::EstReq);
        }
    }

    assert!(!h.mm.lupd_pending());
    assert!(!h.mm.timers().is_running(MmTimerId::T3211));
    assert_eq!(h.mm.subscriber().update_status(), UpdateStatus::NotUpdated);
    assert_eq!(h.mm.substate(), Some(IdleSubstate::LocUpdNeeded));

    let out = h.advance(15);
    assert!(rr_prims(&out).is_empty());
}

#[test]
fn test_t3210_expiry_aborts_update() {
    let mut h = Harness::new(FRESH_SIM);
    h.camp(home_lai(7));
    h.rr(RrType::EstCnf, 0);

    let out = h.advance(20);
    single_rr(&out, RrType::AbortReq);
    assert_eq!(h.mm.lupd_attempt(), 1);
    assert_eq!(h.mm.state(), MainState::MmIdle);
    assert!(h.mm.timers().is_running(MmTimerId::T3211));
}

#[test]
fn test_imsi_attach_when_registered_but_detached() {
    let mut h = Harness::new(REGISTERED_SIM);
    h.sysinfo(SysInfo {
        att_allowed: true,
        ..SysInfo::default()
    });

    let lai = home_lai(7);
    let out = h.camp(lai);
    let est = single_rr(&out, RrType::EstReq);
    let request = LocationUpdatingRequest::from_bytes(&est.payload).unwrap();
    assert_eq!(request.update_type, LocationUpdatingType::ImsiAttach);
    assert_eq!(request.identity, MobileIdentity::Tmsi(0x0102_0304));
    assert_eq!(request.key_seq, 2);

    h.rr(RrType::EstCnf, 0);
    h.peer(&LocationUpdatingAccept::new(lai));
    assert!(h.mm.subscriber().imsi_attached);
}

#[test]
fn test_registered_cell_needs_no_update() {
    let mut h = Harness::new(REGISTERED_SIM);
    let out = h.camp(home_lai(7));
    assert!(rr_prims(&out).is_empty());
    assert_eq!(h.mm.substate(), Some(IdleSubstate::NormalService));
}

#[test]
fn test_periodic_update_on_t3212_expiry() {
    let yaml = format!("{REGISTERED_SIM}t3212: 360\n");
    let mut h = Harness::new(&yaml);
    h.camp(home_lai(7));
    assert_eq!(
        h.mm.timers().remaining(MmTimerId::T3212, h.now),
        Some(Duration::from_secs(360))
    );

    let out = h.advance(360);
    let est = single_rr(&out, RrType::EstReq);
    let request = LocationUpdatingRequest::from_bytes(&est.payload).unwrap();
    assert_eq!(request.update_type, LocationUpdatingType::Periodic);
    assert_eq!(h.mm.lupd_type(), LocationUpdatingType::Periodic);
}

#[test]
fn test_broadcast_t3212_starts_within_interval() {
    let mut h = Harness::new(REGISTERED_SIM);
    h.camp(home_lai(7));
    assert!(!h.mm.timers().is_running(MmTimerId::T3212));

    h.sysinfo(SysInfo {
        t3212: 1800,
        si3: true,
        ..SysInfo::default()
    });
    assert_eq!(h.mm.t3212_value(), 1800);
    let rest = h.mm.timers().remaining(MmTimerId::T3212, h.now).unwrap();
    assert!(rest >= Duration::from_secs(1));
    assert!(rest <= Duration::from_secs(1800));
}

#[test]
fn test_periodic_update_starts_a_fresh_attempt_count() {
    let yaml = format!("{REGISTERED_SIM}t3212: 360\n");
    let mut h = Harness::new(&yaml);
    h.camp(home_lai(7));

    // periodic update at 360 s, then three failed tries
    let out = h.advance(360);
    single_rr(&out, RrType::EstReq);
    for attempt in 1..=3 {
        h.rr(RrType::RelInd, rr_rel_cause::LINK_FAILURE);
        assert_eq!(h.mm.lupd_attempt(), attempt);
        assert_eq!(h.mm.substate(), Some(IdleSubstate::NormalService));
        if attempt < 3 {
            let out = h.advance(15);
            single_rr(&out, RrType::EstReq);
        }
    }

    // the next retry finds the cell barred and gives up
    h.mm.cell_mut().cell_barr = true;
    let out = h.advance(15);
    assert!(rr_prims(&out).is_empty());
    assert!(!h.mm.lupd_pending());
    assert_eq!(h.mm.lupd_attempt(), 3);
    h.mm.cell_mut().cell_barr = false;

    // T3212 was restarted on the first failure at 360 s
    let out = h.advance(315);
    single_rr(&out, RrType::EstReq);
    assert_eq!(h.mm.lupd_type(), LocationUpdatingType::Periodic);
    assert_eq!(h.mm.lupd_attempt(), 0);

    h.rr(RrType::RelInd, rr_rel_cause::LINK_FAILURE);
    assert_eq!(h.mm.lupd_attempt(), 1);
    assert_eq!(h.mm.subscriber().update_status(), UpdateStatus::Updated);
    assert!(h.mm.timers().is_running(MmTimerId::T3211));
}
