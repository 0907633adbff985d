//! `spp`: inspect an XTCE document, or decode a recorded packet stream
//! against one (section 4.L).

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use xtce_spacepacket::config::DecoderConfig;
use xtce_spacepacket::sink::LogSink;
use xtce_spacepacket::PacketStream;

#[derive(Parser)]
#[command(name = "spp", version, about = "Decode CCSDS Space Packets against an XTCE document")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load an XTCE document and print a summary of its type system.
    Describe {
        /// Path to the XTCE document.
        xtce: PathBuf,
    },
    /// Decode a recorded binary packet stream against an XTCE document,
    /// printing one JSON object per packet record to stdout.
    Packets {
        /// Path to the XTCE document.
        xtce: PathBuf,
        /// Path to the raw CCSDS packet stream.
        binary: PathBuf,
        /// Bytes of leading synchronization marker preceding every packet.
        #[arg(long, default_value_t = 0)]
        leading_sync_bytes: usize,
        /// Bytes of secondary header present on every non-first segment.
        #[arg(long, default_value_t = 0)]
        secondary_header_bytes: usize,
        /// Abort the whole run on the first packet-level error instead of
        /// logging and resynchronizing.
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Serialize)]
struct DescribeOutput {
    space_system: String,
    namespace: String,
    parameter_type_count: usize,
    parameter_count: usize,
    container_count: usize,
    root_container_count: usize,
    parameters: BTreeMap<String, String>,
}

const EXIT_OK: u8 = 0;
const EXIT_MALFORMED_XTCE: u8 = 3;
const EXIT_MALFORMED_STREAM: u8 = 4;

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let code = match cli.command {
        Command::Describe { xtce } => run_describe(&xtce),
        Command::Packets { xtce, binary, leading_sync_bytes, secondary_header_bytes, strict } => {
            run_packets(&xtce, &binary, leading_sync_bytes, secondary_header_bytes, strict)
        }
    };
    ExitCode::from(code)
}

fn run_describe(xtce_path: &PathBuf) -> u8 {
    let reader = match File::open(xtce_path).map(BufReader::new) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: could not open '{}': {e}", xtce_path.display());
            return EXIT_MALFORMED_XTCE;
        }
    };

    let loaded = match xtce_spacepacket::xtce::load(reader) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("error: failed to load XTCE document: {e}");
            return EXIT_MALFORMED_XTCE;
        }
    };

    let ts = &loaded.type_system;
    let parameters = ts.parameters.iter().map(|(name, p)| (name.clone(), p.type_name.clone())).collect();

    let output = DescribeOutput {
        space_system: loaded.space_system_name,
        namespace: loaded.namespace,
        parameter_type_count: ts.parameter_types.len(),
        parameter_count: ts.parameters.len(),
        container_count: ts.containers.len(),
        root_container_count: ts.root_containers.len(),
        parameters,
    };

    match serde_json::to_string_pretty(&output) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("error: could not serialize summary: {e}");
            return EXIT_MALFORMED_XTCE;
        }
    }
    EXIT_OK
}

fn run_packets(xtce_path: &PathBuf, binary_path: &PathBuf, leading_sync_bytes: usize, secondary_header_bytes: usize, strict: bool) -> u8 {
    let xtce_reader = match File::open(xtce_path).map(BufReader::new) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: could not open '{}': {e}", xtce_path.display());
            return EXIT_MALFORMED_XTCE;
        }
    };
    let type_system = match xtce_spacepacket::load_type_system(xtce_reader) {
        Ok(ts) => ts,
        Err(e) => {
            eprintln!("error: failed to load XTCE document: {e}");
            return EXIT_MALFORMED_XTCE;
        }
    };

    let source = match File::open(binary_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: could not open '{}': {e}", binary_path.display());
            return EXIT_MALFORMED_STREAM;
        }
    };

    let config = DecoderConfig::builder()
        .leading_sync_bytes(leading_sync_bytes)
        .secondary_header_bytes(secondary_header_bytes)
        .warning_policy(if strict {
            xtce_spacepacket::config::WarningPolicy::Strict
        } else {
            xtce_spacepacket::config::WarningPolicy::Lenient
        })
        .build();

    let stream = PacketStream::with_reassembly(source, type_system, config, LogSink);

    for record in stream {
        match record {
            Ok(record) => match serde_json::to_string(&record) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("error: could not serialize packet record: {e}");
                    return EXIT_MALFORMED_STREAM;
                }
            },
            Err(e) => {
                eprintln!("error: packet stream aborted: {e}");
                return EXIT_MALFORMED_STREAM;
            }
        }
    }
    EXIT_OK
}
