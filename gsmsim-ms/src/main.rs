//! gsmsim MS binary entry point
//!
//! Runs the MM layer of one mobile station and drives it from line commands
//! on stdin. Everything MM emits is logged.
//!
//! # Usage
//!
//! ```bash
//! gsm-ms -c config/ms.yaml -l debug
//! ```

use std::collections::HashMap;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use gsmsim_common::config::MsConfig;
use gsmsim_common::logging::{init_logging, LogLevel};
use gsmsim_common::{Lai, Plmn};
use gsmsim_ms::{
    CmProtocol, MmEvent, MmInput, MmLayer, MmTask, MmrPrim, MmxxPrim, RrPrim, RrType,
    ServingCell, SysInfo, Task, DEFAULT_CHANNEL_CAPACITY,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

/// gsmsim MS - GSM 04.08 Mobility Management simulator
#[derive(Parser, Debug)]
#[command(name = "gsm-ms")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the MS configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config_file: String,

    /// Log level, overrides the configuration file
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL")]
    log_level: Option<LogLevel>,
}

/// Connection references handed out by the CLI. Kept apart from the range
/// MM uses for network initiated connections.
const CLI_REF_BASE: u32 = 0x8000_0001;

/// Highest transaction identifier a mobile originated transaction may use.
const TI_MAX: u8 = 6;

/// A parsed stdin command.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CliCommand {
    Reg,
    Nreg,
    NewLai { mcc: u16, mnc: u16, long_mnc: bool, lac: u16 },
    Sysinfo { t3212: u32, att_allowed: bool },
    Detach,
    Est { protocol: CmProtocol, emergency: bool },
    Rel { reference: u32 },
    Rr(RrType),
    Rx(Vec<u8>),
    Sres([u8; 4]),
    Status,
    Quit,
}

const HELP: &str = "commands: reg | nreg | new-lai MCC MNC LAC | si T3212 [att] | detach | \
est cc|ss|sms [emergency] | rel REF | rr est-cnf|est-ind|rel|abort|sync | \
rx HEX | sres HEX | status | quit";

fn parse_protocol(word: &str) -> Result<CmProtocol> {
    match word {
        "cc" => Ok(CmProtocol::Cc),
        "ss" => Ok(CmProtocol::Ss),
        "sms" => Ok(CmProtocol::Sms),
        other => bail!("unknown CM protocol '{}'", other),
    }
}

fn parse_number<T: std::str::FromStr>(word: Option<&str>, what: &str) -> Result<T> {
    let word = word.ok_or_else(|| anyhow!("missing {}", what))?;
    word.parse()
        .map_err(|_| anyhow!("invalid {} '{}'", what, word))
}

/// Parse one input line. Empty lines and comments yield `None`.
fn parse_command(line: &str) -> Result<Option<CliCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    if verb.starts_with('#') {
        return Ok(None);
    }

    let command = match verb {
        "reg" => CliCommand::Reg,
        "nreg" => CliCommand::Nreg,
        "new-lai" => {
            let mcc = parse_number(words.next(), "MCC")?;
            let mnc_word = words.next();
            let long_mnc = mnc_word.map(|w| w.len() == 3).unwrap_or(false);
            let mnc = parse_number(mnc_word, "MNC")?;
            let lac = parse_number(words.next(), "LAC")?;
            CliCommand::NewLai { mcc, mnc, long_mnc, lac }
        }
        "si" => {
            let t3212 = parse_number(words.next(), "T3212")?;
            let att_allowed = words.next() == Some("att");
            CliCommand::Sysinfo { t3212, att_allowed }
        }
        "detach" => CliCommand::Detach,
        "est" => {
            let protocol = parse_protocol(words.next().unwrap_or_default())?;
            let emergency = words.next() == Some("emergency");
            if emergency && protocol != CmProtocol::Cc {
                bail!("only call control can request an emergency call");
            }
            CliCommand::Est { protocol, emergency }
        }
        "rel" => CliCommand::Rel {
            reference: parse_number(words.next(), "reference")?,
        },
        "rr" => {
            let msg_type = match words.next() {
                Some("est-cnf") => RrType::EstCnf,
                Some("est-ind") => RrType::EstInd,
                Some("rel") => RrType::RelInd,
                Some("abort") => RrType::AbortInd,
                Some("sync") => RrType::SyncInd,
                other => bail!("unknown RR primitive {:?}", other),
            };
            CliCommand::Rr(msg_type)
        }
        "rx" => {
            let data = hex::decode(words.next().unwrap_or_default())
                .context("invalid hex message")?;
            CliCommand::Rx(data)
        }
        "sres" => {
            let data = hex::decode(words.next().unwrap_or_default()).context("invalid SRES")?;
            let sres: [u8; 4] = data
                .try_into()
                .map_err(|_| anyhow!("SRES must be 4 octets"))?;
            CliCommand::Sres(sres)
        }
        "status" => CliCommand::Status,
        "quit" | "exit" => CliCommand::Quit,
        other => bail!("unknown command '{}' ({})", other, HELP),
    };
    Ok(Some(command))
}

/// Bookkeeping of the connections opened from the CLI.
struct CliState {
    next_ref: u32,
    next_ti: HashMap<CmProtocol, u8>,
    connections: HashMap<u32, (CmProtocol, u8)>,
}

impl CliState {
    fn new() -> Self {
        Self {
            next_ref: CLI_REF_BASE,
            next_ti: HashMap::new(),
            connections: HashMap::new(),
        }
    }

    /// Translate a command into an MM input. `Status` and `Quit` are handled
    /// by the caller.
    fn to_input(&mut self, command: CliCommand) -> Result<MmInput> {
        let input = match command {
            CliCommand::Reg => MmInput::Mmr(MmrPrim::RegReq),
            CliCommand::Nreg => MmInput::Mmr(MmrPrim::NregReq),
            CliCommand::NewLai { mcc, mnc, long_mnc, lac } => {
                let lai = Lai::new(Plmn::new(mcc, mnc, long_mnc), lac);
                MmInput::Cell(ServingCell::camped(lai))
            }
            CliCommand::Sysinfo { t3212, att_allowed } => MmInput::Event(MmEvent::Sysinfo(SysInfo {
                t3212,
                si3: true,
                att_allowed,
                ..SysInfo::default()
            })),
            CliCommand::Detach => MmInput::Event(MmEvent::ImsiDetach),
            CliCommand::Est { protocol, emergency } => {
                let reference = self.next_ref;
                self.next_ref = self.next_ref.wrapping_add(1).max(CLI_REF_BASE);
                let ti = self.next_ti.entry(protocol).or_insert(0);
                let transaction_id = *ti;
                *ti = if *ti >= TI_MAX { 0 } else { *ti + 1 };
                self.connections.insert(reference, (protocol, transaction_id));

                info!("{} connection ref={} ti={}", protocol, reference, transaction_id);
                let prim = MmxxPrim::est_req(protocol, reference, transaction_id);
                MmInput::Upper(if emergency { prim.with_emergency() } else { prim })
            }
            CliCommand::Rel { reference } => {
                let (protocol, transaction_id) = self
                    .connections
                    .remove(&reference)
                    .ok_or_else(|| anyhow!("no connection with ref={}", reference))?;
                MmInput::Upper(MmxxPrim::rel_req(protocol, reference, transaction_id))
            }
            CliCommand::Rr(msg_type) => MmInput::Rr(RrPrim::new(msg_type)),
            CliCommand::Rx(data) => MmInput::Rr(RrPrim::data_ind(data)),
            CliCommand::Sres(sres) => MmInput::Event(MmEvent::AuthResponse { sres }),
            CliCommand::Status | CliCommand::Quit => bail!("not an MM input"),
        };
        Ok(input)
    }
}

/// Load and validate the MS configuration file.
fn load_ms_config(path: &str) -> Result<MsConfig> {
    let config = MsConfig::from_yaml_file(path)
        .with_context(|| format!("Failed to load configuration from {path}"))?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_ms_config(&args.config_file) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("gsm-ms: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(args.log_level.unwrap_or(config.log_level));
    info!("gsmsim MS - GSM Mobility Management");

    match run_ms(config).await {
        Ok(()) => {
            info!("MS exited successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("MS failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Main MS execution logic
async fn run_ms(config: MsConfig) -> Result<()> {
    match &config.sim {
        Some(sim) => info!("IMSI {}, IMEI {}", sim.imsi, config.imei),
        None => info!("No SIM, IMEI {}", config.imei),
    }

    let layer = MmLayer::from_config(config);
    let (mut task, handle, rx, mut outputs) =
        MmTask::spawn_channels(layer, DEFAULT_CHANNEL_CAPACITY);

    let task_join = tokio::spawn(async move {
        task.run(rx).await;
    });
    let output_join = tokio::spawn(async move {
        while let Some(output) = outputs.recv().await {
            info!("{}", output);
        }
    });

    let mut cli = CliState::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("{}", HELP);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C");
                None
            }
        };
        let Some(line) = line else {
            break;
        };

        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                warn!("{:#}", e);
                continue;
            }
        };

        match command {
            CliCommand::Quit => break,
            CliCommand::Status => {
                let (reply_tx, reply_rx) = oneshot::channel();
                handle
                    .send(MmInput::Status(reply_tx))
                    .await
                    .map_err(|_| anyhow!("MM task has stopped"))?;
                let snapshot = reply_rx.await.context("MM task dropped status request")?;
                println!("{}", serde_yaml::to_string(&snapshot)?);
            }
            command => match cli.to_input(command) {
                Ok(input) => handle
                    .send(input)
                    .await
                    .map_err(|_| anyhow!("MM task has stopped"))?,
                Err(e) => warn!("{:#}", e),
            },
        }
    }

    // Ignore errors - the task may already be gone
    let _ = handle.shutdown().await;
    task_join.await.context("MM task panicked")?;
    output_join.await.context("Output task panicked")?;
    Ok(())
}
