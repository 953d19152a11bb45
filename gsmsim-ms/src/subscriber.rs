//! Subscriber and registration state
//!
//! What MM knows about the SIM: identities, the stored location area, the
//! location update status and the network's attach settings. Only the MM
//! state machine mutates it.

use std::fmt;

use gsmsim_common::config::MsConfig;
use gsmsim_common::{Lai, Plmn};
use gsmsim_nas::MobileIdentity;
use tracing::info;

use crate::nas::mm::UpdateStatus;

/// Key sequence value meaning "no key available".
pub const KEY_SEQ_INVALID: u8 = 7;

/// Registration state of the subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberState {
    /// A usable SIM is inserted
    pub sim_valid: bool,
    update_status: UpdateStatus,
    /// Stored location area
    pub lai: Lai,
    pub lai_valid: bool,
    pub tmsi: u32,
    pub tmsi_valid: bool,
    pub imsi: String,
    /// Ciphering key sequence number
    pub key_seq: u8,
    /// IMSI attach has been performed
    pub imsi_attached: bool,
    /// Network allows IMSI attach/detach (ATT flag)
    pub attach_allowed: bool,
    /// Access control class bitmap
    pub access_class: u16,
    /// Access barring override
    pub acc_barr: bool,
    pub imei: String,
    pub imeisv: String,
    forbidden_plmns: Vec<Plmn>,
}

impl SubscriberState {
    /// Subscriber without SIM.
    pub fn without_sim(imei: impl Into<String>, imeisv: impl Into<String>) -> Self {
        Self {
            sim_valid: false,
            update_status: UpdateStatus::NotUpdated,
            lai: Lai::default(),
            lai_valid: false,
            tmsi: 0,
            tmsi_valid: false,
            imsi: String::new(),
            key_seq: KEY_SEQ_INVALID,
            imsi_attached: false,
            attach_allowed: false,
            access_class: 0,
            acc_barr: false,
            imei: imei.into(),
            imeisv: imeisv.into(),
            forbidden_plmns: Vec::new(),
        }
    }

    /// Build the subscriber state from the station configuration.
    pub fn from_config(config: &MsConfig) -> Self {
        let mut subscriber = Self::without_sim(config.imei.clone(), config.imeisv.clone());
        if let Some(sim) = &config.sim {
            subscriber.sim_valid = true;
            subscriber.imsi = sim.imsi.clone();
            subscriber.key_seq = sim.key_seq;
            subscriber.access_class = sim.access_class;
            if let Some(tmsi) = sim.tmsi {
                subscriber.tmsi = tmsi;
                subscriber.tmsi_valid = true;
            }
            if let Some(lai) = sim.lai {
                subscriber.lai = lai;
                subscriber.lai_valid = true;
            }
            if sim.updated {
                subscriber.update_status = UpdateStatus::Updated;
            }
        }
        subscriber
    }

    pub fn update_status(&self) -> UpdateStatus {
        self.update_status
    }

    pub fn set_update_status(&mut self, status: UpdateStatus) {
        if self.update_status != status {
            info!("Update status {} -> {}", self.update_status, status);
            self.update_status = status;
        }
    }

    pub fn is_updated(&self) -> bool {
        self.update_status == UpdateStatus::Updated
    }

    /// Forget the stored location area, TMSI and ciphering key.
    pub fn invalidate_registration(&mut self) {
        self.lai_valid = false;
        self.tmsi_valid = false;
        self.key_seq = KEY_SEQ_INVALID;
    }

    /// The stored LAI is valid and equals `lai`.
    pub fn is_registered_in(&self, lai: &Lai) -> bool {
        self.lai_valid && self.lai == *lai
    }

    /// Identity used towards the network: TMSI if valid, else IMSI.
    pub fn mobile_identity(&self) -> MobileIdentity {
        if self.tmsi_valid {
            MobileIdentity::Tmsi(self.tmsi)
        } else {
            MobileIdentity::Imsi(self.imsi.clone())
        }
    }

    pub fn is_plmn_forbidden(&self, plmn: &Plmn) -> bool {
        self.forbidden_plmns.contains(plmn)
    }

    pub fn add_forbidden_plmn(&mut self, plmn: Plmn) {
        if !self.is_plmn_forbidden(&plmn) {
            info!("Adding PLMN {} to forbidden list", plmn);
            self.forbidden_plmns.push(plmn);
        }
    }

    pub fn remove_forbidden_plmn(&mut self, plmn: &Plmn) {
        self.forbidden_plmns.retain(|p| p != plmn);
    }

    pub fn forbidden_plmns(&self) -> &[Plmn] {
        &self.forbidden_plmns
    }
}

impl fmt::Display for SubscriberState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.sim_valid {
            return write!(f, "no SIM");
        }
        write!(f, "IMSI {} {}", self.imsi, self.update_status)?;
        if self.lai_valid {
            write!(f, " LAI {}", self.lai)?;
        }
        if self.tmsi_valid {
            write!(f, " TMSI {:#010x}", self.tmsi)?;
        }
        Ok(())
    }
}
