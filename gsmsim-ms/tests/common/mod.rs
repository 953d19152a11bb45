//! Shared harness for the MM scenario tests
//!
//! Drives an [`MmLayer`] on a virtual clock: inputs are queued, `run()`
//! drains them at the current instant and `advance()` moves the clock and
//! fires whatever timers expired on the way.

#![allow(dead_code)]

use std::time::{Duration, Instant};

use gsmsim_common::config::MsConfig;
use gsmsim_common::{Lai, Plmn};
use gsmsim_ms::{
    MmEvent, MmLayer, MmOutput, MmxxPrim, PlmnEvent, RrPrim, RrType, ServingCell, SysInfo,
};
use gsmsim_nas::{L3Header, MmMessage, MmMessageType};
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize logging for tests.
///
/// Uses RUST_LOG environment variable if set, otherwise defaults to "info"
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt().with_env_filter(filter).with_test_writer().try_init();
}

pub const HOME_PLMN: Plmn = Plmn::new(262, 42, false);

pub fn home_lai(lac: u16) -> Lai {
    Lai::new(HOME_PLMN, lac)
}

/// SIM present, never registered.
pub const FRESH_SIM: &str = r#"
imei: "356938035643809"
imeisv: "3569380356438091"
sim:
  imsi: "262420000000001"
"#;

/// SIM registered in 262-42 LAC 7 with a TMSI.
pub const REGISTERED_SIM: &str = r#"
imei: "356938035643809"
imeisv: "3569380356438091"
sim:
  imsi: "262420000000001"
  tmsi: 16909060
  lai:
    plmn:
      mcc: 262
      mnc: 42
    lac: 7
  key_seq: 2
  updated: true
"#;

pub struct Harness {
    pub mm: MmLayer,
    pub now: Instant,
}

impl Harness {
    pub fn new(yaml: &str) -> Self {
        init_test_logging();
        let config = MsConfig::from_yaml(yaml).expect("test config");
        let mut mm = MmLayer::from_config(config);
        mm.seed_rng(7);
        Self {
            mm,
            now: Instant::now(),
        }
    }

    pub fn run(&mut self) -> Vec<MmOutput> {
        self.mm.work(self.now);
        self.mm.take_outputs()
    }

    /// Camp normally on `lai` and announce it to MM.
    pub fn camp(&mut self, lai: Lai) -> Vec<MmOutput> {
        self.mm.cell_mut().reselect(ServingCell::camped(lai));
        self.mm.push_event(MmEvent::NewLai);
        self.run()
    }

    pub fn sysinfo(&mut self, sysinfo: SysInfo) -> Vec<MmOutput> {
        self.mm.push_event(MmEvent::Sysinfo(sysinfo));
        self.run()
    }

    /// Move the clock forward and process every timer that fired.
    pub fn advance(&mut self, secs: u64) -> Vec<MmOutput> {
        self.now += Duration::from_secs(secs);
        self.mm.tick(self.now);
        self.run()
    }

    pub fn rr(&mut self, msg_type: RrType, cause: u8) -> Vec<MmOutput> {
        self.mm.push_rr(RrPrim::new(msg_type).with_cause(cause));
        self.run()
    }

    pub fn upper(&mut self, prim: MmxxPrim) -> Vec<MmOutput> {
        self.mm.push_upper(prim);
        self.run()
    }

    /// Deliver a message from the network.
    pub fn peer<M: MmMessage>(&mut self, msg: &M) -> Vec<MmOutput> {
        let data = msg.to_bytes().expect("encode peer message");
        self.peer_raw(data)
    }

    pub fn peer_raw(&mut self, data: Vec<u8>) -> Vec<MmOutput> {
        self.mm.push_rr(RrPrim::data_ind(data));
        self.run()
    }
}

pub fn rr_prims(outputs: &[MmOutput]) -> Vec<&RrPrim> {
    outputs
        .iter()
        .filter_map(|o| match o {
            MmOutput::Rr(prim) => Some(prim),
            _ => None,
        })
        .collect()
}

pub fn upper_prims(outputs: &[MmOutput]) -> Vec<&MmxxPrim> {
    outputs
        .iter()
        .filter_map(|o| match o {
            MmOutput::Upper(prim) => Some(prim),
            _ => None,
        })
        .collect()
}

pub fn plmn_events(outputs: &[MmOutput]) -> Vec<PlmnEvent> {
    outputs
        .iter()
        .filter_map(|o| match o {
            MmOutput::Plmn(event) => Some(*event),
            _ => None,
        })
        .collect()
}

/// The only RR primitive of the given type.
pub fn single_rr(outputs: &[MmOutput], msg_type: RrType) -> &RrPrim {
    let found: Vec<_> = rr_prims(outputs)
        .into_iter()
        .filter(|p| p.msg_type == msg_type)
        .collect();
    assert_eq!(found.len(), 1, "expected one {:?} in {:?}", msg_type, outputs);
    found[0]
}

/// MM message types carried by RR-EST-REQ and RR-DATA-REQ, in order.
pub fn sent_messages(outputs: &[MmOutput]) -> Vec<MmMessageType> {
    rr_prims(outputs)
        .into_iter()
        .filter(|p| matches!(p.msg_type, RrType::EstReq | RrType::DataReq))
        .filter_map(|p| {
            let header = L3Header::decode(&mut p.payload.as_slice()).ok()?;
            header.mm_message_type().ok()
        })
        .collect()
}
