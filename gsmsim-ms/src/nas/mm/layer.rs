//! MM layer core
//!
//! [`MmLayer`] owns the state machine, the timers, the connection registry
//! and the subscriber state. Inbound traffic is queued with the `push_*`
//! methods and processed by [`MmLayer::work`]; the `handle_*` methods process
//! a single message directly. Everything MM sends ends up in an outbox that
//! the owner empties with [`MmLayer::take_outputs`].
//!
//! Time is supplied by the caller: [`MmLayer::tick`] expires timers against
//! the given instant and queues one event per expiry.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use gsmsim_common::config::MsConfig;
use gsmsim_common::logging::{log_mm_message, log_rr_message, Direction};
use gsmsim_nas::{
    Classmark1, Classmark2, L3Header, LocationUpdatingType, MmMessage, MmMessageType, MmStatus,
    ProtocolDiscriminator, RejectCause,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use super::connection::{ConnState, ConnectionRegistry, ReleaseFilter};
use super::dispatch::{self, PeerLookup};
use super::state::{IdleSubstate, MainState, MmStateMachine, MmStateSnapshot};
use crate::cell::ServingCell;
use crate::error::{MmError, MmResult};
use crate::primitives::{
    CellSelEvent, CmProtocol, MmEvent, MmOutput, MmrPrim, MmxxPrim, MmxxType, PlmnEvent, RrPrim,
    SimRequest,
};
use crate::subscriber::SubscriberState;
use crate::timer::{MmTimerId, MmTimerSet};

/// Maximum number of location update attempts before giving up.
pub const LUPD_ATTEMPT_MAX: u8 = 4;

/// Mobility management layer of one mobile station.
pub struct MmLayer {
    pub(crate) config: MsConfig,
    sm: MmStateMachine,
    pub(crate) timers: MmTimerSet,
    pub(crate) conns: ConnectionRegistry,
    pub(crate) subscriber: SubscriberState,
    pub(crate) cell: ServingCell,

    upper_queue: VecDeque<MmxxPrim>,
    mmr_queue: VecDeque<MmrPrim>,
    rr_queue: VecDeque<RrPrim>,
    event_queue: VecDeque<MmEvent>,

    /// A location update is wanted
    pub(crate) lupd_pending: bool,
    pub(crate) lupd_type: LocationUpdatingType,
    pub(crate) lupd_attempt: u8,
    /// The last location update failed with a random access failure
    pub(crate) lupd_ra_failure: bool,
    /// IMSI detach requested in a state that cannot handle it
    pub(crate) delay_detach: bool,
    pub(crate) lupd_rej_cause: RejectCause,
    /// Periodic location update interval in seconds
    pub(crate) t3212_value: u32,

    pub(crate) name_long: Option<String>,
    pub(crate) name_short: Option<String>,

    /// Reference for the next network initiated connection
    next_ref: u32,
    outbox: Vec<MmOutput>,
    pub(crate) now: Instant,
    pub(crate) rng: StdRng,
}

impl MmLayer {
    /// Create an MM layer in MM IDLE, PLMN SEARCH.
    pub fn new(config: MsConfig, subscriber: SubscriberState) -> Self {
        let t3212_value = config.t3212;
        info!("MM layer created: {}", subscriber);
        Self {
            config,
            sm: MmStateMachine::new(),
            timers: MmTimerSet::new(),
            conns: ConnectionRegistry::new(),
            subscriber,
            cell: ServingCell::default(),
            upper_queue: VecDeque::new(),
            mmr_queue: VecDeque::new(),
            rr_queue: VecDeque::new(),
            event_queue: VecDeque::new(),
            lupd_pending: false,
            lupd_type: LocationUpdatingType::Normal,
            lupd_attempt: 0,
            lupd_ra_failure: false,
            delay_detach: false,
            lupd_rej_cause: RejectCause::default(),
            t3212_value,
            name_long: None,
            name_short: None,
            next_ref: 1,
            outbox: Vec::new(),
            now: Instant::now(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Create an MM layer whose subscriber state comes from `config`.
    pub fn from_config(config: MsConfig) -> Self {
        let subscriber = SubscriberState::from_config(&config);
        Self::new(config, subscriber)
    }

    /// Reseed the generator used for the random T3212 start value.
    pub fn seed_rng(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    // ========================================================================
    // Queues
    // ========================================================================

    pub fn push_upper(&mut self, prim: MmxxPrim) {
        self.upper_queue.push_back(prim);
    }

    pub fn push_mmr(&mut self, prim: MmrPrim) {
        self.mmr_queue.push_back(prim);
    }

    pub fn push_rr(&mut self, prim: RrPrim) {
        self.rr_queue.push_back(prim);
    }

    pub fn push_event(&mut self, event: MmEvent) {
        self.event_queue.push_back(event);
    }

    /// Drain all queues, in the order upper, MMR, RR, events, until every
    /// queue is empty. Returns the number of messages processed.
    pub fn work(&mut self, now: Instant) -> usize {
        self.now = now;
        let mut total = 0;
        loop {
            let mut handled = 0;
            while let Some(prim) = self.upper_queue.pop_front() {
                let result = self.handle_upper(&prim);
                log_failure(&prim.name(), result);
                handled += 1;
            }
            while let Some(prim) = self.mmr_queue.pop_front() {
                let result = self.handle_mmr(prim);
                log_failure(&prim.to_string(), result);
                handled += 1;
            }
            while let Some(prim) = self.rr_queue.pop_front() {
                let result = self.handle_rr(&prim);
                log_failure(prim.msg_type.name(), result);
                handled += 1;
            }
            while let Some(event) = self.event_queue.pop_front() {
                let result = self.handle_event(&event);
                log_failure(&event.to_string(), result);
                handled += 1;
            }
            if handled == 0 {
                return total;
            }
            total += handled;
        }
    }

    /// Expire timers at `now`, queueing one event per expired timer.
    pub fn tick(&mut self, now: Instant) {
        self.now = now;
        for expiry in self.timers.perform_tick(now) {
            info!(
                "timer {} ({}) has fired",
                expiry.timer,
                expiry.timer.description()
            );
            // 4.4.4.5
            if expiry.timer == MmTimerId::T3212
                && self.sm.substate() == Some(IdleSubstate::AttemptUpdate)
            {
                self.lupd_attempt = 0;
            }
            self.push_event(MmEvent::Timeout(expiry.timer));
        }
    }

    /// Earliest deadline of any running timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Everything emitted since the last call.
    pub fn take_outputs(&mut self) -> Vec<MmOutput> {
        std::mem::take(&mut self.outbox)
    }

    // ========================================================================
    // Entry Points
    // ========================================================================

    /// Process an MMxx primitive from a CM sublayer.
    pub fn handle_upper(&mut self, prim: &MmxxPrim) -> MmResult<()> {
        debug!("Received {} in state {}", prim, self.sm);

        if let Some(conn) = self.conns.find_by_ref_mut(prim.reference) {
            conn.transaction_id = prim.transaction_id;
        }

        match dispatch::find_upper(self.sm.state(), self.sm.substate(), prim) {
            Some(handler) => handler(self, prim),
            None => {
                debug!("{} unhandled in state {}", prim.name(), self.sm);
                Ok(())
            }
        }
    }

    /// Process an MMR primitive.
    pub fn handle_mmr(&mut self, prim: MmrPrim) -> MmResult<()> {
        debug!("Received {} in state {}", prim, self.sm);
        match prim {
            MmrPrim::RegReq => self.send_plmn(PlmnEvent::SimInsert),
            MmrPrim::NregReq => {
                self.send_plmn(PlmnEvent::SimRemove);
                self.send_cellsel(CellSelEvent::SimRemove);
            }
            MmrPrim::RegCnf | MmrPrim::NregInd => {
                debug!("{} is not a downward primitive, ignored", prim);
            }
        }
        Ok(())
    }

    /// Process a primitive from RR.
    pub fn handle_rr(&mut self, prim: &RrPrim) -> MmResult<()> {
        log_rr_message(Direction::Rx, prim.msg_type.name(), &prim.payload);
        debug!("Received {} in state {}", prim, self.sm);

        match dispatch::find_rr(self.sm.state(), prim) {
            Some(handler) => handler(self, prim),
            None => {
                debug!("{} unhandled in state {}", prim.msg_type.name(), self.sm);
                Ok(())
            }
        }
    }

    /// Process an internal event.
    pub fn handle_event(&mut self, event: &MmEvent) -> MmResult<()> {
        info!("Received {} in state {}", event, self.sm);

        match dispatch::find_event(self.sm.state(), self.sm.substate(), event.tag()) {
            Some(handler) => handler(self, event),
            None => {
                debug!("{} unhandled in state {}", event, self.sm);
                Ok(())
            }
        }
    }

    /// Process a layer 3 message received from the network.
    pub fn handle_peer(&mut self, data: &[u8]) -> MmResult<()> {
        let header = L3Header::decode(&mut &data[..]).map_err(gsmsim_nas::CodecError::from)?;

        match header.protocol() {
            Some(ProtocolDiscriminator::MobilityManagement) => self.rx_mm_message(&header, data),
            Some(pd) => match CmProtocol::from_pd(pd) {
                Some(protocol) => self.rx_cm_message(protocol, &header, data),
                None => self.unsupported_pd(header.pd()),
            },
            None => self.unsupported_pd(header.pd()),
        }
    }

    fn unsupported_pd(&mut self, pd: u8) -> MmResult<()> {
        warn!("Protocol discriminator {:#x} unsupported", pd);
        self.tx_mm_status(RejectCause::MSG_TYPE_NOT_IMPLEMENTED)
    }

    /// Forward a CM message to the owning connection, creating it when the
    /// network opens a new transaction.
    fn rx_cm_message(
        &mut self,
        protocol: CmProtocol,
        header: &L3Header,
        data: &[u8],
    ) -> MmResult<()> {
        let transaction_id = header.transaction_id();

        let prim = match self.conns.find_by_id(protocol, transaction_id) {
            Some(conn) => conn.prim(MmxxType::DataInd),
            None => {
                let reference = self.new_reference();
                let conn = self.conns.create(protocol, transaction_id, reference)?;
                conn.set_state(ConnState::Dedicated);
                conn.prim(MmxxType::EstInd)
            }
        };

        if matches!(
            self.sm.state(),
            MainState::WaitNetworkCmd | MainState::RrConnReleaseNa
        ) {
            self.stop_timer(MmTimerId::T3240);
            self.new_mm_state(MainState::MmConnActive, None);
        }

        self.send_upper(prim.with_payload(data.to_vec()));
        Ok(())
    }

    fn rx_mm_message(&mut self, header: &L3Header, data: &[u8]) -> MmResult<()> {
        if header.skip_indicator() != 0 {
            debug!("MM message with skip indicator {} ignored", header.skip_indicator());
            return Ok(());
        }

        let msg_type = match header.mm_message_type() {
            Ok(msg_type) => msg_type,
            Err(_) => {
                warn!(
                    "MM message type {:#04x} not supported",
                    header.message_type & MmMessageType::TYPE_MASK
                );
                return self.tx_mm_status(RejectCause::MSG_TYPE_NOT_IMPLEMENTED);
            }
        };
        log_mm_message(Direction::Rx, msg_type.name(), data);
        info!("Received {} in state {}", msg_type, self.sm);

        // 4.4.2
        self.stop_timer(MmTimerId::T3212);
        // 11.2
        if self.timers.is_running(MmTimerId::T3240) {
            self.start_timer(MmTimerId::T3240, self.config.timers.t3240());
        }

        match dispatch::find_peer(self.sm.state(), msg_type) {
            PeerLookup::Found(handler) => handler(self, data),
            PeerLookup::WrongState => {
                warn!("{} unhandled in state {}", msg_type, self.sm);
                self.tx_mm_status(RejectCause::MSG_TYPE_NOT_COMPATIBLE)
            }
            PeerLookup::Unknown => {
                warn!("{} not supported", msg_type);
                self.tx_mm_status(RejectCause::MSG_TYPE_NOT_IMPLEMENTED)
            }
        }
    }

    pub(crate) fn rr_data_ind(&mut self, prim: &RrPrim) -> MmResult<()> {
        self.handle_peer(&prim.payload)
    }

    // ========================================================================
    // State Handling
    // ========================================================================

    /// Change state. Every transition goes through here.
    pub(crate) fn new_mm_state(&mut self, state: MainState, substate: Option<IdleSubstate>) {
        let old = self.sm.to_string();
        self.sm.switch_state(state, substate);
        info!("new state {} -> {}", old, self.sm);

        if self.delay_detach {
            self.delay_detach = false;
            self.push_event(MmEvent::ImsiDetach);
        }

        // 4.4.2 start T3212 in MM IDLE if not running
        if matches!(
            self.sm.substate(),
            Some(IdleSubstate::NormalService | IdleSubstate::AttemptUpdate)
        ) && !self.timers.is_running(MmTimerId::T3212)
        {
            self.start_t3212(Duration::from_secs(u64::from(self.t3212_value)));
        }
    }

    /// Return to MM IDLE, deriving the substate (4.2.3).
    pub(crate) fn return_idle(&mut self) {
        if !self.subscriber.sim_valid {
            info!("SIM invalid as returning to IDLE");
            self.lupd_pending = false;
            self.stop_timer(MmTimerId::T3212);
            self.new_mm_state(MainState::MmIdle, Some(IdleSubstate::NoImsi));
            return;
        }

        if !self.cell.camped_any() {
            info!("No cell found as returning to IDLE");
            self.new_mm_state(MainState::MmIdle, Some(IdleSubstate::PlmnSearch));
            return;
        }

        if self.sm.state() == MainState::LocUpdRej
            && self.lupd_rej_cause == RejectCause::ROAMING_NOT_ALLOWED
        {
            info!("Roaming not allowed as returning to IDLE");
            self.new_mm_state(MainState::MmIdle, Some(IdleSubstate::PlmnSearch));
            return;
        }

        if self.cell.camped_normally() && self.subscriber.is_registered_in(&self.cell.lai) {
            info!("We are in registered LAI as returning to IDLE");
            // 4.4.4.9 abnormal case: registered LAI but not updated
            let substate = if self.subscriber.is_updated() {
                IdleSubstate::NormalService
            } else {
                IdleSubstate::AttemptUpdate
            };
            self.new_mm_state(MainState::MmIdle, Some(substate));
            return;
        }

        if self.cell.camped_normally() {
            info!("We are camping normally as returning to IDLE");
            self.new_mm_state(MainState::MmIdle, Some(IdleSubstate::LocUpdNeeded));
        } else {
            info!("We are camping on any cell as returning to IDLE");
            self.new_mm_state(MainState::MmIdle, Some(IdleSubstate::LimitedService));
        }
    }

    /// Flush connections and queues and stop every timer. No primitives are
    /// sent for the dropped connections.
    pub fn exit(&mut self) {
        info!("MM layer shutting down");
        self.conns.clear();
        self.upper_queue.clear();
        self.mmr_queue.clear();
        self.rr_queue.clear();
        self.event_queue.clear();
        self.timers.stop_all();
    }

    // ========================================================================
    // Timers
    // ========================================================================

    pub(crate) fn start_timer(&mut self, id: MmTimerId, interval: Duration) {
        info!(
            "starting {} ({}) with {} seconds",
            id,
            id.description(),
            interval.as_secs()
        );
        self.timers.start(id, self.now, interval);
    }

    pub(crate) fn stop_timer(&mut self, id: MmTimerId) {
        if self.timers.stop(id) {
            info!("stopping pending timer {}", id);
        }
    }

    pub(crate) fn start_t3212(&mut self, interval: Duration) {
        if self.timers.start(MmTimerId::T3212, self.now, interval) {
            info!(
                "starting T3212 ({}) with {} seconds",
                MmTimerId::T3212.description(),
                interval.as_secs()
            );
        }
    }

    // ========================================================================
    // Output
    // ========================================================================

    pub(crate) fn send_rr(&mut self, prim: RrPrim) {
        log_rr_message(Direction::Tx, prim.msg_type.name(), &prim.payload);
        self.outbox.push(MmOutput::Rr(prim));
    }

    pub(crate) fn send_upper(&mut self, prim: MmxxPrim) {
        debug!("Sending {}", prim);
        self.outbox.push(MmOutput::Upper(prim));
    }

    pub(crate) fn send_mmr(&mut self, prim: MmrPrim) {
        debug!("Sending {}", prim);
        self.outbox.push(MmOutput::Mmr(prim));
    }

    pub(crate) fn send_plmn(&mut self, event: PlmnEvent) {
        debug!("Sending {:?} to PLMN search", event);
        self.outbox.push(MmOutput::Plmn(event));
    }

    pub(crate) fn send_cellsel(&mut self, event: CellSelEvent) {
        debug!("Sending {:?} to cell selection", event);
        self.outbox.push(MmOutput::CellSel(event));
    }

    pub(crate) fn send_sim(&mut self, request: SimRequest) {
        self.outbox.push(MmOutput::Sim(request));
    }

    /// Encode an MM message, logging it.
    pub(crate) fn encode_mm<M: MmMessage>(&self, msg: &M) -> MmResult<Vec<u8>> {
        let data = msg.to_bytes()?;
        log_mm_message(Direction::Tx, M::MESSAGE_TYPE.name(), &data);
        Ok(data)
    }

    /// Send an MM message on the established RR connection.
    pub(crate) fn tx_mm_data<M: MmMessage>(&mut self, msg: &M) -> MmResult<()> {
        let data = self.encode_mm(msg)?;
        self.send_rr(RrPrim::data_req(data));
        Ok(())
    }

    pub(crate) fn tx_mm_status(&mut self, cause: RejectCause) -> MmResult<()> {
        info!("Sending MM STATUS cause {}", cause);
        self.tx_mm_data(&MmStatus::new(cause))
    }

    /// Release connections, sending the upward primitives.
    pub(crate) fn release_connections(&mut self, filter: ReleaseFilter, cause: u8, is_error: bool) {
        for prim in self.conns.release_matching(filter, cause, is_error) {
            self.send_upper(prim);
        }
    }

    pub(crate) fn classmark1(&self) -> Classmark1 {
        Classmark1(self.config.classmark1)
    }

    pub(crate) fn classmark2(&self) -> Classmark2 {
        Classmark2(self.config.classmark2)
    }

    /// Allocate a connection reference not held by any connection. Zero is
    /// never handed out.
    pub fn new_reference(&mut self) -> u32 {
        loop {
            let reference = self.next_ref;
            self.next_ref = self.next_ref.wrapping_add(1);
            if reference != 0 && self.conns.find_by_ref(reference).is_none() {
                return reference;
            }
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> MainState {
        self.sm.state()
    }

    /// Idle substate, `None` unless in MM IDLE.
    pub fn substate(&self) -> Option<IdleSubstate> {
        self.sm.substate()
    }

    pub fn mr_substate(&self) -> IdleSubstate {
        self.sm.mr_substate()
    }

    pub fn state_machine(&self) -> &MmStateMachine {
        &self.sm
    }

    pub fn snapshot(&self) -> MmStateSnapshot {
        self.sm.snapshot()
    }

    pub fn subscriber(&self) -> &SubscriberState {
        &self.subscriber
    }

    pub fn subscriber_mut(&mut self) -> &mut SubscriberState {
        &mut self.subscriber
    }

    pub fn cell(&self) -> &ServingCell {
        &self.cell
    }

    /// Cell view, for the cell selection process.
    pub fn cell_mut(&mut self) -> &mut ServingCell {
        &mut self.cell
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.conns
    }

    pub fn timers(&self) -> &MmTimerSet {
        &self.timers
    }

    pub fn lupd_pending(&self) -> bool {
        self.lupd_pending
    }

    pub fn lupd_attempt(&self) -> u8 {
        self.lupd_attempt
    }

    pub fn lupd_type(&self) -> LocationUpdatingType {
        self.lupd_type
    }

    pub fn t3212_value(&self) -> u32 {
        self.t3212_value
    }

    /// Network names received in MM INFORMATION (full, short).
    pub fn network_name(&self) -> (Option<&str>, Option<&str>) {
        (self.name_long.as_deref(), self.name_short.as_deref())
    }

    /// No queued input is waiting.
    pub fn is_quiet(&self) -> bool {
        self.upper_queue.is_empty()
            && self.mmr_queue.is_empty()
            && self.rr_queue.is_empty()
            && self.event_queue.is_empty()
    }
}

fn log_failure(what: &str, result: MmResult<()>) {
    match result {
        Ok(()) => {}
        Err(MmError::Decode(e)) => warn!("{}: malformed message dropped: {}", what, e),
        Err(e) => warn!("{}: {}", what, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsmsim_common::{Lai, Plmn};

    fn layer() -> MmLayer {
        let yaml = r#"
imei: "356938035643809"
imeisv: "3569380356438091"
sim:
  imsi: "262420000000001"
"#;
        MmLayer::from_config(MsConfig::from_yaml(yaml).unwrap())
    }

    #[test]
    fn test_initial_state() {
        let mm = layer();
        assert_eq!(mm.state(), MainState::MmIdle);
        assert_eq!(mm.substate(), Some(IdleSubstate::PlmnSearch));
        assert!(mm.is_quiet());
        assert!(mm.timers().running_timers().is_empty());
    }

    #[test]
    fn test_new_reference_skips_used() {
        let mut mm = layer();
        mm.conns.create(CmProtocol::Cc, 0, 1).unwrap();
        mm.conns.create(CmProtocol::Sms, 0, 2).unwrap();
        assert_eq!(mm.new_reference(), 3);
        assert_eq!(mm.new_reference(), 4);

        mm.next_ref = u32::MAX;
        assert_eq!(mm.new_reference(), u32::MAX);
        // zero and the held references are skipped after the wrap
        assert_eq!(mm.new_reference(), 3);
    }

    #[test]
    fn test_return_idle_without_sim() {
        let mut mm = MmLayer::from_config(MsConfig::default());
        mm.return_idle();
        assert_eq!(mm.substate(), Some(IdleSubstate::NoImsi));
    }

    #[test]
    fn test_return_idle_substates() {
        let lai = Lai::new(Plmn::new(262, 42, false), 7);
        let mut mm = layer();
        mm.return_idle();
        assert_eq!(mm.substate(), Some(IdleSubstate::PlmnSearch));

        *mm.cell_mut() = ServingCell::camped(lai);
        mm.return_idle();
        assert_eq!(mm.substate(), Some(IdleSubstate::LocUpdNeeded));

        mm.subscriber.lai = lai;
        mm.subscriber.lai_valid = true;
        mm.return_idle();
        assert_eq!(mm.substate(), Some(IdleSubstate::AttemptUpdate));

        mm.subscriber.set_update_status(crate::nas::mm::UpdateStatus::Updated);
        mm.return_idle();
        assert_eq!(mm.substate(), Some(IdleSubstate::NormalService));

        mm.cell_mut().camp = crate::cell::CampStatus::AnyCell;
        mm.return_idle();
        assert_eq!(mm.substate(), Some(IdleSubstate::LimitedService));
    }

    #[test]
    fn test_t3212_started_on_normal_service() {
        let mut mm = layer();
        mm.t3212_value = 360;
        mm.new_mm_state(MainState::MmIdle, Some(IdleSubstate::NormalService));
        assert!(mm.timers().is_running(MmTimerId::T3212));
    }

    #[test]
    fn test_delay_detach_requeued_on_transition() {
        let mut mm = layer();
        mm.delay_detach = true;
        mm.new_mm_state(MainState::WaitNetworkCmd, None);
        assert!(!mm.delay_detach);
        assert!(!mm.is_quiet());
    }

    #[test]
    fn test_exit_clears_everything() {
        let mut mm = layer();
        mm.push_event(MmEvent::NewLai);
        mm.start_timer(MmTimerId::T3240, Duration::from_secs(10));
        mm.conns.create(CmProtocol::Cc, 1, 99).unwrap();
        mm.exit();
        assert!(mm.is_quiet());
        assert!(mm.connections().is_empty());
        assert!(mm.timers().running_timers().is_empty());
        assert!(mm.take_outputs().is_empty());
    }
}
