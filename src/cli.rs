//! sde-profile options parser.

use sde_profile::config;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(about = "SDE basic block profile to CSV converter")]
pub struct Application {
    #[structopt(short, long, help = "Reports progress of every stage")]
    pub verbose: bool,

    #[structopt(subcommand)]
    pub cmd: Command,
}

#[derive(StructOpt)]
pub enum Command {
    #[structopt(about = "Converts the trace into block, instruction and global tables")]
    Convert {
        #[structopt(flatten)]
        input: TraceInput,
    },

    #[structopt(about = "Aggregates a block table per function and per source line")]
    Symbolize {
        #[structopt(parse(from_os_str), help = "Path to the input block table (*bb.csv)")]
        bb_csv: PathBuf,

        #[structopt(parse(from_os_str), help = "Path to the profiled binary")]
        binary: PathBuf,

        #[structopt(flatten)]
        symbolizer: SymbolizerOptions,
    },

    #[structopt(about = "Converts the trace and aggregates the block table")]
    Run {
        #[structopt(flatten)]
        input: TraceInput,

        #[structopt(flatten)]
        symbolizer: SymbolizerOptions,
    },
}

#[derive(StructOpt)]
pub struct TraceInput {
    #[structopt(parse(from_os_str), help = "Path to the input SDE profile")]
    pub trace: PathBuf,

    #[structopt(parse(from_os_str), help = "Path to the profiled binary")]
    pub binary: PathBuf,

    #[structopt(
        long,
        help = "Extra counters to collect, comma separated (e.g. PUSH,POP)"
    )]
    pub items: Option<String>,

    #[structopt(
        long,
        parse(try_from_str = parse_hex),
        help = "Link-time load address in hex (read from the binary otherwise)"
    )]
    pub load_address: Option<config::Address>,
}

#[derive(StructOpt)]
pub struct SymbolizerOptions {
    #[structopt(
        parse(from_os_str),
        long,
        default_value = config::DEFAULT_SYMBOLIZER,
        help = "Path to addr2line (needed if the system one cannot read the binary's DWARF)"
    )]
    pub addr2line: PathBuf,
}

fn parse_hex(s: &str) -> Result<config::Address, std::num::ParseIntError> {
    config::Address::from_str_radix(s.trim_start_matches("0x"), 16)
}

/// Constructs an instance of the Application.
pub fn application() -> Application {
    Application::from_args()
}
