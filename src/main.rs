//! sde-profile main module.
//!
//! This program reads the profile written by Intel SDE for a single-threaded
//! program and generates CSV tables per basic block, per instruction and for
//! the whole program; the block table is then folded per function and per
//! source line with `addr2line`.
//!
//! You can create the profile file by running the program under SDE:
//!     `sde64 -omix a.err -top_blocks -1 -dynamic_stats_per_block -- ./a.out`

#![forbid(unsafe_code)]

mod cli;

use sde_profile::counters::CounterSchema;
use sde_profile::error::Result;
use sde_profile::{aggregate, config, global, trace};

fn main() {
    init_logger();
    if let Err(err) = execute(cli::application()) {
        eprintln!("Error: {:#}", err);
        std::process::exit(config::FAILURE);
    }
}

/// Initializes the logger.
fn init_logger() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();
}

/// Builds the counter schema from the optional `--items` list.
fn schema(items: Option<&str>) -> CounterSchema {
    match items {
        None => CounterSchema::default(),
        Some(items) => CounterSchema::with_extra(&CounterSchema::parse_items(items)),
    }
}

/// Dispatches CLI commands.
fn execute(app: cli::Application) -> Result<()> {
    global::set_verbose(app.verbose);

    match app.cmd {
        cli::Command::Convert { input } => {
            trace::run(
                &input.trace,
                &input.binary,
                &schema(input.items.as_deref()),
                input.load_address,
            )?;
        }

        cli::Command::Symbolize {
            bb_csv,
            binary,
            symbolizer,
        } => {
            aggregate::run(&bb_csv, &binary, &symbolizer.addr2line)?;
        }

        cli::Command::Run { input, symbolizer } => {
            sde_profile::run(
                &input.trace,
                &input.binary,
                &schema(input.items.as_deref()),
                input.load_address,
                &symbolizer.addr2line,
            )?;
        }
    }

    Ok(())
}
