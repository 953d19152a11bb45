//! IMSI detach scenarios.

mod common;

use common::*;
use gsmsim_ms::{
    cm_cause, rr_rel_cause, CmProtocol, IdleSubstate, MainState, MmEvent, MmOutput, MmTimerId,
    MmrPrim, MmxxPrim, MmxxType, PlmnEvent, RrType, SysInfo,
};
use gsmsim_nas::{
    CmServiceAccept, ImsiDetachIndication, LocationUpdatingAccept, MmMessage, MmMessageType,
    MobileIdentity,
};

/// Start an IMSI attach on a cell that allows attach and detach.
fn attaching() -> Harness {
    let mut h = Harness::new(REGISTERED_SIM);
    h.sysinfo(SysInfo {
        att_allowed: true,
        ..SysInfo::default()
    });
    h.camp(home_lai(7));
    h.rr(RrType::EstCnf, 0);
    assert_eq!(h.mm.state(), MainState::LocUpdInit);
    h
}

/// Attached and back in MM IDLE, NORMAL SERVICE.
fn attached() -> Harness {
    let mut h = attaching();
    h.peer(&LocationUpdatingAccept::new(home_lai(7)));
    h.rr(RrType::RelInd, rr_rel_cause::NORMAL);
    assert!(h.mm.subscriber().imsi_attached);
    assert_eq!(h.mm.substate(), Some(IdleSubstate::NormalService));
    h
}

fn detach(h: &mut Harness) -> Vec<MmOutput> {
    h.mm.push_event(MmEvent::ImsiDetach);
    h.run()
}

fn assert_detached(h: &Harness, out: &[MmOutput]) {
    assert!(out.contains(&MmOutput::Mmr(MmrPrim::NregInd)));
    assert!(plmn_events(out).contains(&PlmnEvent::SimRemove));
    assert!(!h.mm.subscriber().sim_valid);
    assert!(!h.mm.subscriber().imsi_attached);
    assert_eq!(h.mm.substate(), Some(IdleSubstate::NoImsi));
}

#[test]
fn test_detach_from_idle_completes_on_release() {
    let mut h = attached();

    let out = detach(&mut h);
    assert_eq!(h.mm.state(), MainState::WaitRrConnImsiD);
    let est = single_rr(&out, RrType::EstReq);
    let indication = ImsiDetachIndication::from_bytes(&est.payload).unwrap();
    assert_eq!(indication.identity, MobileIdentity::Tmsi(0x0102_0304));

    h.rr(RrType::EstCnf, 0);
    assert_eq!(h.mm.state(), MainState::ImsiDetachInit);
    assert!(h.mm.timers().is_running(MmTimerId::T3220));

    let out = h.rr(RrType::RelInd, rr_rel_cause::NORMAL);
    assert!(!h.mm.timers().is_running(MmTimerId::T3220));
    assert_detached(&h, &out);
}

#[test]
fn test_detach_completes_on_t3220_expiry() {
    let mut h = attached();
    detach(&mut h);
    h.rr(RrType::EstCnf, 0);

    let out = h.advance(5);
    assert_detached(&h, &out);
}

#[test]
fn test_detach_without_attach_is_local() {
    let mut h = Harness::new(REGISTERED_SIM);
    h.camp(home_lai(7));

    let out = detach(&mut h);
    assert!(rr_prims(&out).is_empty());
    assert_detached(&h, &out);
}

#[test]
fn test_detach_releases_active_connections() {
    let mut h = attached();
    h.upper(MmxxPrim::est_req(CmProtocol::Cc, 1, 0));
    h.rr(RrType::EstCnf, 0);
    h.peer(&CmServiceAccept);
    assert_eq!(h.mm.state(), MainState::MmConnActive);

    let out = detach(&mut h);
    let upper = upper_prims(&out);
    assert_eq!(upper.len(), 1);
    assert_eq!(upper[0].msg_type, MmxxType::RelInd);
    assert_eq!(upper[0].cause, cm_cause::NORMAL_RELEASE);
    assert_eq!(sent_messages(&out), vec![MmMessageType::ImsiDetachIndication]);
    assert_eq!(h.mm.state(), MainState::ImsiDetachInit);

    let out = h.rr(RrType::AbortInd, rr_rel_cause::LINK_FAILURE);
    assert_detached(&h, &out);
}

#[test]
fn test_detach_during_attach_is_delayed() {
    let mut h = attaching();

    let out = detach(&mut h);
    assert!(out.is_empty());
    assert_eq!(h.mm.state(), MainState::LocUpdInit);

    // the accept finishes the attach, then the delayed detach runs
    let out = h.peer(&LocationUpdatingAccept::new(home_lai(7)));
    assert_eq!(
        sent_messages(&out),
        vec![MmMessageType::ImsiDetachIndication]
    );
    assert_eq!(h.mm.state(), MainState::ImsiDetachInit);

    let out = h.rr(RrType::RelInd, rr_rel_cause::NORMAL);
    assert_detached(&h, &out);
}

#[test]
fn test_detach_not_required_waits_for_network_release() {
    let mut h = Harness::new(REGISTERED_SIM);
    h.camp(home_lai(7));
    h.upper(MmxxPrim::est_req(CmProtocol::Cc, 1, 0));
    h.rr(RrType::EstCnf, 0);
    h.peer(&CmServiceAccept);
    assert!(!h.mm.subscriber().imsi_attached);

    let out = detach(&mut h);
    let upper = upper_prims(&out);
    assert_eq!(upper.len(), 1);
    assert_eq!(upper[0].cause, cm_cause::NORMAL_RELEASE);
    assert!(sent_messages(&out).is_empty());
    assert_eq!(h.mm.state(), MainState::WaitNetworkCmd);
    assert!(h.mm.timers().is_running(MmTimerId::T3240));

    let out = h.advance(10);
    single_rr(&out, RrType::AbortReq);
    assert_eq!(h.mm.state(), MainState::MmIdle);
}
