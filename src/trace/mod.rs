//! sde-profile trace parser.
//!
//! Reads the textual profile emitted by SDE (`-omix ... -top_blocks -1
//! -dynamic_stats_per_block`) and writes three CSV tables: per basic block,
//! per instruction and whole program. The log is walked through its named
//! regions strictly in this order:
//!
//! ```text
//! # EMIT_IMAGE_ADDRESSES
//! /path/to/a.out 555555554000 555555558fff
//! # END_IMAGE_ADDRESSES
//! # EMIT_TOP_BLOCK_STATS
//! BLOCK: 1 PC: 555555555139 ICOUNT: 2 EXECUTIONS: 10
//! XDIS 555555555139: BASE 55 push rbp
//! *total 20
//! # END_TOP_BLOCK_STATS
//! # END_TOP_BLOCK_STATS
//! # $global-dynamic-counts
//! *total 1234
//! # END_GLOBAL_DYNAMIC_STATS
//! ```
//!
//! SDE forms its basic blocks differently from a compiler: one instruction
//! may terminate several blocks (e.g. fall-through `switch` cases produce
//! blocks of different length ending at the same address), so per
//! instruction executions are summed over all blocks ending at it.

use crate::config::{
    Address, Count, Index, Map, BLOCK_SUFFIX, COLUMN_ENTRY, COLUMN_EXECUTION, COLUMN_EXIT,
    COLUMN_PC, GLOBAL_SUFFIX, INSN_SUFFIX,
};
use crate::counters::{CounterSchema, CounterSet};
use crate::error::{Error, Result};
use crate::global::progress;
use crate::image::{self, Relocation};
use crate::{filebuf, table};
use lazy_static::lazy_static;
use regex::Regex;
use std::io::{BufRead, Write};
use std::path::Path;

#[cfg(test)]
mod tests;

const EMIT_IMAGE_ADDRESSES: &str = "EMIT_IMAGE_ADDRESSES";
const END_IMAGE_ADDRESSES: &str = "END_IMAGE_ADDRESSES";
const EMIT_TOP_BLOCK_STATS: &str = "EMIT_TOP_BLOCK_STATS";
const END_TOP_BLOCK_STATS: &str = "END_TOP_BLOCK_STATS";
const GLOBAL_DYNAMIC_COUNTS: &str = "global-dynamic-counts";
const END_GLOBAL_DYNAMIC_STATS: &str = "END_GLOBAL_DYNAMIC_STATS";

/// SDE closes the block stats once per thread and once globally.
const MAX_END_TOP_BLOCK_STATS: u8 = 2;

/// Converts the trace file into `<trace>.bb.csv`, `<trace>.insn.csv` and `<trace>.global.csv`.
/// The link-time base is read from `binary` unless `load_address` is given.
pub fn run(
    trace_path: &Path,
    binary_path: &Path,
    schema: &CounterSchema,
    load_address: Option<Address>,
) -> Result<Summary> {
    let load_address = match load_address {
        Some(address) => address,
        None => image::load_address(binary_path)?,
    };
    progress!(
        "Converting {:?} (load address 0x{:x})...",
        trace_path,
        load_address
    );

    let outputs = Outputs {
        blocks: filebuf::open_w(&filebuf::with_suffix(trace_path, BLOCK_SUFFIX))?,
        instructions: filebuf::open_w(&filebuf::with_suffix(trace_path, INSN_SUFFIX))?,
        global: filebuf::open_w(&filebuf::with_suffix(trace_path, GLOBAL_SUFFIX))?,
    };
    let image_name = image_name(binary_path)?;
    let reader = filebuf::open(trace_path)?;
    let summary = parse(reader, Parser::new(schema, &image_name, load_address, outputs))?;

    progress!(
        "{} blocks ({} outside the image), {} instructions",
        summary.blocks,
        summary.skipped_blocks,
        summary.instructions
    );
    Ok(summary)
}

/// Returns the file name the image lines are matched against.
fn image_name(binary_path: &Path) -> Result<String> {
    binary_path
        .file_name()
        .and_then(|name| name.to_str())
        .map(String::from)
        .ok_or_else(|| Error::Filename(binary_path.into()))
}

/// Parses the whole trace, driving the parser line by line.
pub fn parse<W: Write>(mut reader: impl BufRead, mut parser: Parser<'_, W>) -> Result<Summary> {
    let mut line = String::with_capacity(512);
    loop {
        let bytes_read = filebuf::read_line(&mut reader, &mut line)?;
        if bytes_read == 0 {
            break;
        }
        parser.feed(&line)?;
    }
    parser.finish()
}

/// Destinations of the three tables.
#[derive(Debug)]
pub struct Outputs<W: Write> {
    /// Per basic block table, appended as each block is flushed.
    pub blocks: W,
    /// Per instruction table, written once the block stats are closed.
    pub instructions: W,
    /// Whole program table, written once the global counts are closed.
    pub global: W,
}

/// Statistics of a parsed trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// Rows written to the block table.
    pub blocks: usize,
    /// Block declarations outside the image window.
    pub skipped_blocks: usize,
    /// Rows written to the instruction table.
    pub instructions: usize,
    /// Whole program counters.
    pub global: CounterSet,
}

/// Named regions of the trace, in the order they must appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Start,
    ImageAddresses,
    ImageAddressesDone,
    TopBlockStats,
    TopBlockStatsDone,
    GlobalCounts,
    Done,
}

impl Region {
    fn describe(self) -> &'static str {
        match self {
            Region::Start | Region::ImageAddresses => "image addresses",
            Region::ImageAddressesDone | Region::TopBlockStats => "top block stats",
            Region::TopBlockStatsDone | Region::GlobalCounts | Region::Done => {
                "global dynamic counts"
            }
        }
    }
}

/// Basic block being accumulated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    /// Relocated address of the first instruction.
    pub entry: Address,
    /// Relocated address of the last decoded instruction.
    pub exit: Option<Address>,
    /// Number of times the block was executed.
    pub execution: Count,
    /// Counters of the block (running totals, last value wins).
    pub counters: CounterSet,
}

/// Executions per relocated instruction address, in first-seen order.
#[derive(Debug, Default)]
struct InstructionCounts {
    counts: Vec<(Address, Count)>,
    index: Map<Address, Index>,
}

impl InstructionCounts {
    /// Adds executions of one more block ending at `pc`.
    fn add(&mut self, pc: Address, execution: Count) {
        match self.index.get(&pc) {
            Some(&i) => self.counts[i].1 = self.counts[i].1.saturating_add(execution),
            None => {
                self.index.insert(pc, self.counts.len());
                self.counts.push((pc, execution));
            }
        }
    }

    fn len(&self) -> usize {
        self.counts.len()
    }
}

/// State machine over the trace regions holding at most one block in flight.
#[derive(Debug)]
pub struct Parser<'a, W: Write> {
    schema: &'a CounterSchema,
    image_name: String,
    load_address: Address,
    outputs: Outputs<W>,
    region: Region,
    end_top_block_stats: u8,
    relocation: Option<Relocation>,
    block: Option<BasicBlock>,
    instructions: InstructionCounts,
    global: CounterSet,
    blocks: usize,
    skipped_blocks: usize,
    lc: usize,
}

impl<'a, W: Write> Parser<'a, W> {
    /// Creates the parser for the image whose file name contains `image_name`.
    pub fn new(
        schema: &'a CounterSchema,
        image_name: &str,
        load_address: Address,
        outputs: Outputs<W>,
    ) -> Self {
        Parser {
            schema,
            image_name: image_name.to_string(),
            load_address,
            outputs,
            region: Region::Start,
            end_top_block_stats: 0,
            relocation: None,
            block: None,
            instructions: InstructionCounts::default(),
            global: schema.empty_set(),
            blocks: 0,
            skipped_blocks: 0,
            lc: 0,
        }
    }

    /// Processes the next line of the trace.
    pub fn feed(&mut self, line: &str) -> Result<()> {
        self.lc += 1;
        if self.handle_marker(line)? {
            return Ok(());
        }
        match self.region {
            Region::ImageAddresses => self.image_line(line),
            Region::TopBlockStats => self.block_line(line),
            Region::GlobalCounts => self.global_line(line),
            _ => Ok(()),
        }
    }

    /// Finishes the parsing; every region must have been closed.
    pub fn finish(mut self) -> Result<Summary> {
        if self.region == Region::TopBlockStats {
            // Keep the data of a truncated trace in the block table.
            self.flush_block()?;
            self.outputs.blocks.flush()?;
        }
        if self.region != Region::Done {
            return Err(Error::TraceTruncated(self.region.describe()));
        }
        self.outputs.blocks.flush()?;
        self.outputs.instructions.flush()?;
        self.outputs.global.flush()?;
        Ok(Summary {
            blocks: self.blocks,
            skipped_blocks: self.skipped_blocks,
            instructions: self.instructions.len(),
            global: self.global,
        })
    }

    /// Performs region transitions; returns true if the line is a marker.
    fn handle_marker(&mut self, line: &str) -> Result<bool> {
        if line.contains(EMIT_IMAGE_ADDRESSES) {
            self.expect_region(Region::Start, EMIT_IMAGE_ADDRESSES)?;
            self.enter(Region::ImageAddresses);
        } else if line.contains(END_IMAGE_ADDRESSES) {
            self.expect_region(Region::ImageAddresses, END_IMAGE_ADDRESSES)?;
            self.enter(Region::ImageAddressesDone);
        } else if line.contains(EMIT_TOP_BLOCK_STATS) {
            self.expect_region(Region::ImageAddressesDone, EMIT_TOP_BLOCK_STATS)?;
            let reloc = self.relocation.ok_or_else(|| {
                Error::TraceFormat(
                    format!("address window of image '{}' not found", self.image_name),
                    self.lc,
                )
            })?;
            tracing::debug!(
                "Image window 0x{:x}..0x{:x}",
                reloc.low(),
                reloc.high()
            );
            let leading = [COLUMN_ENTRY, COLUMN_EXECUTION, COLUMN_EXIT];
            table::write_header(&mut self.outputs.blocks, &leading, self.schema.names())?;
            self.enter(Region::TopBlockStats);
        } else if line.contains(END_TOP_BLOCK_STATS) {
            self.end_top_block_stats()?;
        } else if line.contains(GLOBAL_DYNAMIC_COUNTS) {
            self.expect_region(Region::TopBlockStatsDone, GLOBAL_DYNAMIC_COUNTS)?;
            table::write_header(&mut self.outputs.global, &[], self.schema.names())?;
            self.global.clear();
            self.enter(Region::GlobalCounts);
        } else if line.contains(END_GLOBAL_DYNAMIC_STATS) {
            self.expect_region(Region::GlobalCounts, END_GLOBAL_DYNAMIC_STATS)?;
            table::write_row(&mut self.outputs.global, &[], &self.global)?;
            self.enter(Region::Done);
        } else {
            return Ok(false);
        }
        Ok(true)
    }

    /// Closes the block stats on the first marker; tolerates exactly one repetition.
    fn end_top_block_stats(&mut self) -> Result<()> {
        self.end_top_block_stats += 1;
        if self.end_top_block_stats > MAX_END_TOP_BLOCK_STATS {
            return Err(Error::TraceFormat(
                format!("'{}' seen more than twice", END_TOP_BLOCK_STATS),
                self.lc,
            ));
        }
        if self.end_top_block_stats > 1 {
            tracing::debug!("Repeated {} at line {} ignored", END_TOP_BLOCK_STATS, self.lc);
            return Ok(());
        }
        self.expect_region(Region::TopBlockStats, END_TOP_BLOCK_STATS)?;
        self.flush_block()?;
        self.write_instructions()?;
        self.enter(Region::TopBlockStatsDone);
        Ok(())
    }

    fn expect_region(&self, expected: Region, marker: &str) -> Result<()> {
        if self.region != expected {
            return Err(Error::TraceFormat(
                format!(
                    "'{}' found while expecting the {} region",
                    marker,
                    self.region.describe()
                ),
                self.lc,
            ));
        }
        Ok(())
    }

    fn enter(&mut self, region: Region) {
        tracing::debug!("Line {}: {:?} -> {:?}", self.lc, self.region, region);
        self.region = region;
    }

    /// Handles `name low high`; the last line naming the image wins.
    fn image_line(&mut self, line: &str) -> Result<()> {
        lazy_static! {
            static ref IMAGE: Regex =
                Regex::new(r"^(\S+)\s+(?:0x)?([[:xdigit:]]+)\s+(?:0x)?([[:xdigit:]]+)")
                    .expect("Invalid regex");
        }

        if let Some(caps) = IMAGE.captures(line) {
            if caps[1].contains(&self.image_name) {
                let low = parse_hex(&caps[2], self.lc)?;
                let high = parse_hex(&caps[3], self.lc)?;
                self.relocation = Some(Relocation::new(low, high, self.load_address));
            }
        }
        Ok(())
    }

    /// Handles block declarations, disassembly and counters of the active block.
    fn block_line(&mut self, line: &str) -> Result<()> {
        lazy_static! {
            static ref BLOCK: Regex = Regex::new(
                r"^BLOCK:\s+(\d+)\s+PC:\s+(?:0x)?([[:xdigit:]]+)\s+ICOUNT:\s+(\d+)\s+EXECUTIONS:\s+(\d+)"
            )
            .expect("Invalid regex");
            static ref XDIS: Regex =
                Regex::new(r"^XDIS\s+(?:0x)?([[:xdigit:]]+):").expect("Invalid regex");
        }

        // The region is only entered with a known image window.
        let reloc = match self.relocation {
            Some(reloc) => reloc,
            None => return Ok(()),
        };

        if let Some(caps) = BLOCK.captures(line) {
            self.flush_block()?;
            let pc = parse_hex(&caps[2], self.lc)?;
            if !reloc.contains(pc) {
                self.skipped_blocks += 1;
                return Ok(());
            }
            self.block = Some(BasicBlock {
                entry: reloc.relocate(pc),
                exit: None,
                execution: parse_dec(&caps[4], self.lc)?,
                counters: self.schema.empty_set(),
            });
        } else if let Some(caps) = XDIS.captures(line) {
            if let Some(block) = self.block.as_mut() {
                let pc = reloc.relocate(parse_hex(&caps[1], self.lc)?);
                self.instructions.add(pc, block.execution);
                block.exit = Some(pc);
            }
        } else if let Some((slot, value)) = counter(line, self.schema, self.lc)? {
            if let Some(block) = self.block.as_mut() {
                block.counters.set(slot, value);
            }
        }
        Ok(())
    }

    fn global_line(&mut self, line: &str) -> Result<()> {
        if let Some((slot, value)) = counter(line, self.schema, self.lc)? {
            self.global.set(slot, value);
        }
        Ok(())
    }

    /// Appends the block in flight (if any) to the block table.
    fn flush_block(&mut self) -> Result<()> {
        let block = match self.block.take() {
            Some(block) => block,
            None => return Ok(()),
        };
        let entry = format!("{:x}", block.entry);
        let execution = block.execution.to_string();
        let exit = match block.exit {
            Some(exit) => format!("{:x}", exit),
            None => {
                tracing::warn!(
                    "Block 0x{} has no decoded instructions (line {})",
                    entry,
                    self.lc
                );
                String::new()
            }
        };
        table::write_row(
            &mut self.outputs.blocks,
            &[entry.as_str(), execution.as_str(), exit.as_str()],
            &block.counters,
        )?;
        self.blocks += 1;
        Ok(())
    }

    fn write_instructions(&mut self) -> Result<()> {
        let output = &mut self.outputs.instructions;
        writeln!(output, "{},{}", COLUMN_PC, COLUMN_EXECUTION)?;
        for (pc, execution) in &self.instructions.counts {
            writeln!(output, "{:x},{}", pc, execution)?;
        }
        Ok(())
    }
}

/// Parses `*name value` returning the schema slot; unknown names are skipped.
fn counter(line: &str, schema: &CounterSchema, lc: usize) -> Result<Option<(Index, Count)>> {
    lazy_static! {
        static ref COUNTER: Regex = Regex::new(r"^\*?([\w-]+)\s+(\d+)").expect("Invalid regex");
    }

    let caps = match COUNTER.captures(line) {
        Some(caps) => caps,
        None => return Ok(None),
    };
    match schema.position(&caps[1]) {
        Some(slot) => Ok(Some((slot, parse_dec(&caps[2], lc)?))),
        None => Ok(None),
    }
}

fn parse_hex(s: &str, lc: usize) -> Result<Address> {
    Address::from_str_radix(s, 16).map_err(|_| Error::TraceParsing(s.into(), lc))
}

fn parse_dec(s: &str, lc: usize) -> Result<Count> {
    s.parse::<Count>()
        .map_err(|_| Error::TraceParsing(s.into(), lc))
}
