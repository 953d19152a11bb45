//! IMSI detach procedure (TS 04.08 section 4.3.4)

use gsmsim_nas::ImsiDetachIndication;
use tracing::info;

use super::connection::ReleaseFilter;
use super::layer::MmLayer;
use super::state::MainState;
use crate::error::MmResult;
use crate::primitives::{CellSelEvent, MmEvent, MmrPrim, PlmnEvent, RrEstCause, RrPrim};
use crate::timer::MmTimerId;

/// Release cause reported upward when detach tears down the MM connections.
const CAUSE_DETACH_RELEASE: u8 = 16;

impl MmLayer {
    fn detach_required(&self) -> bool {
        self.subscriber.attach_allowed && self.subscriber.imsi_attached
    }

    fn imsi_detach_indication(&self) -> ImsiDetachIndication {
        ImsiDetachIndication::new(self.classmark1(), self.subscriber.mobile_identity())
    }

    /// Detach from idle: establish RR for the indication, or finish at once
    /// if the network does not want one.
    pub(crate) fn imsi_detach_start(&mut self, _event: &MmEvent) -> MmResult<()> {
        if !self.detach_required() {
            info!("IMSI detach not required");
            return self.detach_end();
        }

        info!("IMSI detach started");
        let data = self.encode_mm(&self.imsi_detach_indication())?;
        self.new_mm_state(MainState::WaitRrConnImsiD, None);
        self.send_rr(RrPrim::est_req(RrEstCause::OtherSdcch, data));
        Ok(())
    }

    /// RR is up and carried the IMSI DETACH INDICATION.
    pub(crate) fn imsi_detach_sent(&mut self, _prim: &RrPrim) -> MmResult<()> {
        self.start_timer(MmTimerId::T3220, self.config.timers.t3220());
        self.new_mm_state(MainState::ImsiDetachInit, None);
        Ok(())
    }

    /// Detach while RR is established: drop every MM connection first.
    pub(crate) fn imsi_detach_release(&mut self, _event: &MmEvent) -> MmResult<()> {
        self.stop_timer(MmTimerId::T3230);
        self.release_connections(ReleaseFilter::All, CAUSE_DETACH_RELEASE, false);

        if !self.detach_required() {
            info!("IMSI detach not required");
            self.start_timer(MmTimerId::T3240, self.config.timers.t3240());
            self.new_mm_state(MainState::WaitNetworkCmd, None);
            return Ok(());
        }

        info!("IMSI detach on established RR connection");
        let indication = self.imsi_detach_indication();
        self.tx_mm_data(&indication)?;
        self.start_timer(MmTimerId::T3220, self.config.timers.t3220());
        self.new_mm_state(MainState::ImsiDetachInit, None);
        Ok(())
    }

    /// T3220 expired or detach requested where no signalling is possible.
    pub(crate) fn imsi_detach_end(&mut self, _event: &MmEvent) -> MmResult<()> {
        self.detach_end()
    }

    /// RR released or lost while detaching.
    pub(crate) fn imsi_detach_rr_lost(&mut self, prim: &RrPrim) -> MmResult<()> {
        info!("RR gone during IMSI detach (cause #{})", prim.cause);
        self.detach_end()
    }

    pub(crate) fn imsi_detach_ignore(&mut self, _event: &MmEvent) -> MmResult<()> {
        info!("IMSI detach already in progress in state {}", self.state());
        Ok(())
    }

    /// Remember the request until the running procedure has finished.
    pub(crate) fn imsi_detach_delay(&mut self, _event: &MmEvent) -> MmResult<()> {
        info!("IMSI detach delayed until state {} is left", self.state());
        self.delay_detach = true;
        Ok(())
    }

    /// Finish the detach: the SIM is unusable until it is inserted again.
    pub(crate) fn detach_end(&mut self) -> MmResult<()> {
        self.stop_timer(MmTimerId::T3220);

        self.subscriber.sim_valid = false;
        self.subscriber.imsi_attached = false;

        info!("IMSI detach done");
        self.send_plmn(PlmnEvent::SimRemove);
        self.send_cellsel(CellSelEvent::SimRemove);
        self.send_mmr(MmrPrim::NregInd);

        self.return_idle();
        Ok(())
    }
}
