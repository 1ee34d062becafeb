//! boardlink CLI
//!
//! Manufacturing-test driver for the control board.

use std::process::ExitCode;

use boardlink::catalog::KeyToken;
use boardlink::sim::{SimulatedBoard, SimulatedTransport};
use boardlink::{BoardLink, Config, LinkError};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

/// boardlink CLI
#[derive(Parser, Debug)]
#[command(name = "boardlink-cli")]
#[command(about = "Command/response driver for the control board serial link")]
#[command(version)]
struct Args {
    /// Serial device, or tcp://host:port for a serial bridge
    #[arg(short, long, default_value = "/dev/ttyS0")]
    device: String,

    /// Baud rate
    #[arg(short, long, default_value = "115200")]
    baud: u32,

    /// Ack/response timeout in milliseconds
    #[arg(short, long, default_value = "2000")]
    timeout_ms: u64,

    /// Talk to an in-process simulated board instead of a device
    #[arg(long)]
    simulate: bool,

    /// Print responses as JSON
    #[arg(long)]
    json: bool,

    /// Debug logging (frame dumps)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ping the board
    Ping,

    /// Read the firmware version
    Version,

    /// Send a 32-character key
    SetKey {
        /// The key to store
        key: String,
    },

    /// Read back the stored key
    GetKey,

    /// Read slot, hardware, BIT and unit info
    Info,

    /// Repeat ping / version / set-key / get-key, counting passes and fails
    Soak {
        /// Number of rounds
        #[arg(short = 'n', long, default_value = "10")]
        iterations: u32,

        /// Key used for the set-key / get-key steps
        #[arg(long, default_value = "ABCDEFGHIJKLMNOPQRSTUVWXYZ012345")]
        key: String,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing/logging
    let default_filter = if args.verbose { "info,boardlink=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt().with_env_filter(filter).with_target(false).init();

    let config = Config::builder()
        .device(&args.device)
        .baud_rate(args.baud)
        .response_timeout_ms(args.timeout_ms)
        .build();

    let link = match open_link(&args, config) {
        Ok(link) => link,
        Err(e) => {
            tracing::error!("Failed to open link: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = run(&link, &args);
    link.stop();

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn open_link(args: &Args, config: Config) -> boardlink::Result<BoardLink> {
    if args.simulate {
        let (transport, _board) = SimulatedTransport::new(SimulatedBoard::default(), config.poll_interval());
        BoardLink::with_transport(Box::new(transport), config)
    } else {
        BoardLink::open(config)
    }
}

/// Execute the subcommand; `Ok(false)` means the board answered badly
fn run(link: &BoardLink, args: &Args) -> boardlink::Result<bool> {
    match &args.command {
        Commands::Ping => {
            link.send_ping()?;
            println!("pong");
        }
        Commands::Version => {
            let version = link.get_software_version()?;
            emit(args.json, &version, &version.to_string());
        }
        Commands::SetKey { key } => {
            let key: KeyToken = key.parse()?;
            link.send_set_key(&key)?;
            println!("key stored");
        }
        Commands::GetKey => {
            let key = link.get_key()?;
            emit(args.json, &key, &key.to_string());
        }
        Commands::Info => {
            let info = BoardInfo {
                slot_no: link.get_slot_no()?,
                hardware_info: link.get_hardware_info()?,
                bit_info: link.get_bit_info()?,
                unit_info: link.get_unit_info()?,
            };
            let text = format!("slot {}", info.slot_no.body.first().copied().unwrap_or_default());
            emit(args.json, &info, &text);
        }
        Commands::Soak { iterations, key } => {
            let key: KeyToken = key.parse()?;
            let tally = soak(link, *iterations, &key);
            tracing::info!("Pass Count: {}", tally.passed);
            tracing::info!("Fail Count: {}", tally.failed);
            if args.json {
                emit(true, &tally, "");
            }
            return Ok(tally.failed == 0);
        }
    }
    Ok(true)
}

#[derive(Serialize)]
struct BoardInfo {
    slot_no: boardlink::catalog::VersionedPayload,
    hardware_info: boardlink::catalog::VersionedPayload,
    bit_info: boardlink::catalog::VersionedPayload,
    unit_info: boardlink::catalog::VersionedPayload,
}

#[derive(Debug, Default, Serialize)]
struct Tally {
    passed: u32,
    failed: u32,
}

impl Tally {
    fn record<T>(&mut self, step: &str, round: u32, result: boardlink::Result<T>) -> Option<T> {
        match result {
            Ok(value) => {
                tracing::info!("true {} {}", step, round);
                self.passed += 1;
                Some(value)
            }
            Err(e) if e.is_recoverable() => {
                tracing::info!("false {} {}: {}", step, round, e);
                self.failed += 1;
                None
            }
            Err(e) => {
                tracing::warn!("false {} {}: {}", step, round, e);
                self.failed += 1;
                None
            }
        }
    }
}

/// One missed ack never aborts the run; only a dead link does
fn soak(link: &BoardLink, iterations: u32, key: &KeyToken) -> Tally {
    let mut tally = Tally::default();

    for round in 0..iterations {
        tally.record("Ping", round, link.send_ping());
        if let Some(version) = tally.record("Sw Ver", round, link.get_software_version()) {
            tracing::info!("Sw Ver: {}", version);
        }
        tally.record("Set Key", round, link.send_set_key(key));
        if let Some(read_back) = tally.record("Get Key", round, link.get_key()) {
            if &read_back != key {
                tracing::warn!("Get Key returned a different key");
                tally.passed -= 1;
                tally.failed += 1;
            }
        }

        if !link.is_connected() {
            tracing::error!("{} after round {}", LinkError::Disconnected, round);
            break;
        }
    }
    tally
}

fn emit<T: Serialize>(json: bool, value: &T, text: &str) {
    if json {
        match serde_json::to_string_pretty(value) {
            Ok(rendered) => println!("{}", rendered),
            Err(e) => tracing::error!("Cannot render JSON: {}", e),
        }
    } else {
        println!("{}", text);
    }
}
