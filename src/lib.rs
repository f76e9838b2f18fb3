//! sde-profile library.
//!
//! Turns SDE basic block profiles into CSV tables keyed by block, instruction,
//! function and source line.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregate;
pub mod config;
pub mod counters;
pub mod error;
pub mod global;
pub mod image;
pub mod symbolizer;
pub mod table;
pub mod trace;

mod filebuf;


use crate::config::{Address, BLOCK_SUFFIX};
use crate::counters::CounterSchema;
use crate::error::Result;
use std::path::Path;

/// Converts the trace and symbolizes the resulting block table.
pub fn run(
    trace_path: &Path,
    binary_path: &Path,
    schema: &CounterSchema,
    load_address: Option<Address>,
    addr2line: &Path,
) -> Result<trace::Summary> {
    let summary = trace::run(trace_path, binary_path, schema, load_address)?;
    let bb_path = filebuf::with_suffix(trace_path, BLOCK_SUFFIX);
    aggregate::run(&bb_path, binary_path, addr2line)?;
    Ok(summary)
}
