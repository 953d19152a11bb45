//! Configuration structures for the mobile station
//!
//! The mobile station is configured from a YAML file holding the equipment
//! identities, the SIM contents (if a SIM is inserted) and the MM timer
//! durations.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::logging::LogLevel;
use crate::types::Lai;

/// MM timer durations in seconds (TS 04.08 11.2).
///
/// T3212 is not listed here: its value is broadcast by the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MmTimerConfig {
    /// Location update response timeout
    pub t3210: u64,
    /// Location update retry delay
    pub t3211: u64,
    /// Delay after a random access failure
    pub t3213: u64,
    /// IMSI detach acknowledgement wait
    pub t3220: u64,
    /// MM connection establishment timeout
    pub t3230: u64,
    /// RR release wait
    pub t3240: u64,
}

impl Default for MmTimerConfig {
    fn default() -> Self {
        Self {
            t3210: 20,
            t3211: 15,
            t3213: 4,
            t3220: 5,
            t3230: 15,
            t3240: 10,
        }
    }
}

impl MmTimerConfig {
    pub fn t3210(&self) -> Duration {
        Duration::from_secs(self.t3210)
    }

    pub fn t3211(&self) -> Duration {
        Duration::from_secs(self.t3211)
    }

    pub fn t3213(&self) -> Duration {
        Duration::from_secs(self.t3213)
    }

    pub fn t3220(&self) -> Duration {
        Duration::from_secs(self.t3220)
    }

    pub fn t3230(&self) -> Duration {
        Duration::from_secs(self.t3230)
    }

    pub fn t3240(&self) -> Duration {
        Duration::from_secs(self.t3240)
    }
}

/// Contents of an inserted SIM as seen by MM (EF_IMSI and EF_LOCI).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    /// IMSI, 6 to 15 decimal digits
    pub imsi: String,
    /// Stored TMSI, if any
    #[serde(default)]
    pub tmsi: Option<u32>,
    /// Stored location area, if any
    #[serde(default)]
    pub lai: Option<Lai>,
    /// Ciphering key sequence number (7 = no key)
    #[serde(default = "default_key_seq")]
    pub key_seq: u8,
    /// Whether the stored location update status is UPDATED
    #[serde(default)]
    pub updated: bool,
    /// Access control class bitmap (bits 0-15)
    #[serde(default = "default_access_class")]
    pub access_class: u16,
}

fn default_key_seq() -> u8 {
    7
}

fn default_access_class() -> u16 {
    0x0001
}

/// Mobile station configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsConfig {
    /// IMEI, 15 decimal digits
    pub imei: String,
    /// IMEISV, 16 decimal digits
    pub imeisv: String,
    /// Inserted SIM, `None` when no SIM is present
    #[serde(default)]
    pub sim: Option<SimConfig>,
    /// Mobile station classmark 1 (value octet)
    #[serde(default = "default_classmark1")]
    pub classmark1: u8,
    /// Mobile station classmark 2 (value octets)
    #[serde(default = "default_classmark2")]
    pub classmark2: [u8; 3],
    /// Periodic location update interval assumed until system information
    /// is received, in seconds (0 disables)
    #[serde(default)]
    pub t3212: u32,
    #[serde(default)]
    pub timers: MmTimerConfig,
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_classmark1() -> u8 {
    0x33
}

fn default_classmark2() -> [u8; 3] {
    [0x33, 0x19, 0xa2]
}

impl Default for MsConfig {
    fn default() -> Self {
        Self {
            imei: String::from("000000000000000"),
            imeisv: String::from("0000000000000000"),
            sim: None,
            classmark1: default_classmark1(),
            classmark2: default_classmark2(),
            t3212: 0,
            timers: MmTimerConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl MsConfig {
    /// Parses a mobile station configuration from a YAML string.
    ///
    /// # Example
    /// ```
    /// use gsmsim_common::MsConfig;
    ///
    /// let yaml = r#"
    /// imei: "356938035643809"
    /// imeisv: "3569380356438091"
    /// sim:
    ///   imsi: "262420000000001"
    /// "#;
    ///
    /// let config = MsConfig::from_yaml(yaml).unwrap();
    /// assert_eq!(config.timers.t3210, 20);
    /// ```
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Loads a mobile station configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Serializes the configuration to a YAML string.
    pub fn to_yaml(&self) -> Result<String, Error> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Checks identity formats and SIM fields.
    pub fn validate(&self) -> Result<(), Error> {
        check_digits("IMEI", &self.imei, 15, 15)?;
        check_digits("IMEISV", &self.imeisv, 16, 16)?;
        if let Some(sim) = &self.sim {
            check_digits("IMSI", &sim.imsi, 6, 15)?;
            if sim.key_seq > 7 {
                return Err(Error::Config(format!(
                    "Invalid key sequence {}: must be 0-7",
                    sim.key_seq
                )));
            }
        }
        Ok(())
    }
}

fn check_digits(name: &str, value: &str, min: usize, max: usize) -> Result<(), Error> {
    if value.len() < min || value.len() > max {
        return Err(Error::Config(format!(
            "Invalid {name} '{value}': expected {min}-{max} digits, got {}",
            value.len()
        )));
    }
    if !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::Config(format!(
            "Invalid {name} '{value}': must contain only digits"
        )));
    }
    Ok(())
}
