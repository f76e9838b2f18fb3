//! sde-profile trace parser tests module.


use crate::counters::CounterSchema;
use crate::error::{Error, Result};
use crate::trace::{self, Outputs, Parser, Summary};
use std::fs;
use std::io::Cursor;

/// Tables produced by one conversion.
#[derive(Default)]
struct Tables {
    blocks: Vec<u8>,
    instructions: Vec<u8>,
    global: Vec<u8>,
}

fn convert(
    input: &[u8],
    schema: &CounterSchema,
    image: &str,
    load_address: u64,
    tables: &mut Tables,
) -> Result<Summary> {
    let outputs = Outputs {
        blocks: &mut tables.blocks,
        instructions: &mut tables.instructions,
        global: &mut tables.global,
    };
    let parser = Parser::new(schema, image, load_address, outputs);
    trace::parse(Cursor::new(input), parser)
}

fn text(bytes: &[u8]) -> &str {
    std::str::from_utf8(bytes).unwrap()
}

#[test]
fn simple() {
    let schema = CounterSchema::default();
    let mut tables = Tables::default();
    let r = convert(mock::SIMPLE_INPUT, &schema, "a.out", 0, &mut tables);
    assert!(r.is_ok());

    //==== do not delete ====================================
    //println!("{}", text(&tables.blocks));
    //=======================================================

    let summary = r.unwrap();
    assert_eq!(summary.blocks, 3);
    assert_eq!(summary.skipped_blocks, 1);
    assert_eq!(summary.instructions, 3);
    assert_eq!(summary.global.get(0), 418);

    assert_eq!(text(&tables.blocks), text(mock::SIMPLE_BLOCKS));
    assert_eq!(text(&tables.instructions), text(mock::SIMPLE_INSTRUCTIONS));
    assert_eq!(text(&tables.global), text(mock::SIMPLE_GLOBAL));
}

#[test]
fn extra_counters() {
    let schema = CounterSchema::with_extra(&CounterSchema::parse_items("PUSH"));
    let mut tables = Tables::default();
    let r = convert(mock::SIMPLE_INPUT, &schema, "a.out", 0, &mut tables);
    assert!(r.is_ok());
    assert_eq!(text(&tables.blocks), text(mock::SIMPLE_BLOCKS_WITH_PUSH));
    assert_eq!(text(&tables.global), text(mock::SIMPLE_GLOBAL_WITH_PUSH));
}

#[test]
fn scenario() {
    let schema = CounterSchema::from_names(["total"]);
    let mut tables = Tables::default();
    let r = convert(mock::SCENARIO_INPUT, &schema, "a.out", 0x401000, &mut tables);
    assert!(r.is_ok());
    assert_eq!(
        text(&tables.blocks),
        "entry,execution,exit,total\n401000,10,401000,20\n401010,1,,0\n"
    );
    assert_eq!(text(&tables.instructions), "pc,execution\n401000,10\n");
    assert_eq!(text(&tables.global), "total\n21\n");
}

#[test]
fn relocation_round_trip() {
    let schema = CounterSchema::from_names(["total"]);
    let mut tables = Tables::default();
    let r = convert(mock::SIMPLE_INPUT, &schema, "a.out", 0x5555_5555_4000, &mut tables);
    assert!(r.is_ok());
    let blocks = text(&tables.blocks);
    assert!(blocks.contains("\n555555555139,3,55555555513a,6\n"));
    assert!(blocks.contains("\n555555555160,7,555555555160,7\n"));
}

#[test]
fn summed_instruction_counts() {
    let input = String::from_utf8(mock::SCENARIO_INPUT.to_vec()).unwrap().replace(
        "BLOCK: 2 PC: 0x401010 ICOUNT: 1 EXECUTIONS: 1\n",
        "BLOCK: 2 PC: 0x400ff0 ICOUNT: 2 EXECUTIONS: 3\nXDIS 0x401000: BASE 55 push rbp\n\
         BLOCK: 3 PC: 0x401000 ICOUNT: 1 EXECUTIONS: 5\nXDIS 0x401000: BASE 55 push rbp\n",
    );
    let schema = CounterSchema::from_names(["total"]);
    let mut tables = Tables::default();
    let r = convert(input.as_bytes(), &schema, "a.out", 0x401000, &mut tables);
    assert!(r.is_ok());

    // Block 2 lies outside the image window and contributes nothing.
    assert_eq!(r.unwrap().skipped_blocks, 1);
    assert_eq!(text(&tables.instructions), "pc,execution\n401000,15\n");
}

#[test]
fn out_of_window_block_ignored() {
    let input = String::from_utf8(mock::SCENARIO_INPUT.to_vec())
        .unwrap()
        .replace("PC: 0x401000 ICOUNT", "PC: 0x402000 ICOUNT");
    let schema = CounterSchema::from_names(["total"]);
    let mut tables = Tables::default();
    let r = convert(input.as_bytes(), &schema, "a.out", 0x401000, &mut tables);
    assert!(r.is_ok());
    assert_eq!(
        text(&tables.blocks),
        "entry,execution,exit,total\n401010,1,,0\n"
    );
    assert_eq!(text(&tables.instructions), "pc,execution\n");
}

#[test]
fn single_end_marker() {
    let input = String::from_utf8(mock::SCENARIO_INPUT.to_vec())
        .unwrap()
        .replacen("# END_TOP_BLOCK_STATS\n", "", 1);
    let schema = CounterSchema::from_names(["total"]);

    let mut once = Tables::default();
    let r = convert(input.as_bytes(), &schema, "a.out", 0x401000, &mut once);
    assert!(r.is_ok());

    let mut twice = Tables::default();
    let r = convert(mock::SCENARIO_INPUT, &schema, "a.out", 0x401000, &mut twice);
    assert!(r.is_ok());

    assert_eq!(once.blocks, twice.blocks);
    assert_eq!(once.instructions, twice.instructions);
    assert_eq!(once.global, twice.global);
}

#[test]
fn third_end_marker() {
    let input = String::from_utf8(mock::SCENARIO_INPUT.to_vec())
        .unwrap()
        .replacen(
            "# END_TOP_BLOCK_STATS\n",
            "# END_TOP_BLOCK_STATS\n# END_TOP_BLOCK_STATS\n",
            1,
        );
    let schema = CounterSchema::default();
    let r = convert(input.as_bytes(), &schema, "a.out", 0, &mut Tables::default());
    assert!(matches!(r, Err(Error::TraceFormat(_, 11))));
}

#[test]
fn missing_image_window() {
    let schema = CounterSchema::default();
    let r = convert(mock::SCENARIO_INPUT, &schema, "b.out", 0, &mut Tables::default());
    assert!(matches!(r, Err(Error::TraceFormat(_, 4))));
}

#[test]
fn global_counts_before_block_stats() {
    let input = b"# EMIT_IMAGE_ADDRESSES
a.out 401000 401fff
# END_IMAGE_ADDRESSES
# $global-dynamic-counts
total 1
# END_GLOBAL_DYNAMIC_STATS
";
    let schema = CounterSchema::default();
    let r = convert(input, &schema, "a.out", 0, &mut Tables::default());
    assert!(matches!(r, Err(Error::TraceFormat(_, 4))));
}

#[test]
fn lines_outside_block_skipped() {
    let input = b"# EMIT_IMAGE_ADDRESSES
a.out 401000 401fff
# END_IMAGE_ADDRESSES
# EMIT_TOP_BLOCK_STATS
XDIS 401000: BASE 55 push rbp
total 5
BLOCK: 1 PC: 401000 ICOUNT: 1 EXECUTIONS: 2
total 4
# END_TOP_BLOCK_STATS
# $global-dynamic-counts
# END_GLOBAL_DYNAMIC_STATS
";
    let schema = CounterSchema::from_names(["total"]);
    let mut tables = Tables::default();
    let r = convert(input, &schema, "a.out", 0x401000, &mut tables);
    assert!(r.is_ok());
    assert_eq!(text(&tables.blocks), "entry,execution,exit,total\n401000,2,,4\n");
    assert_eq!(text(&tables.instructions), "pc,execution\n");
    assert_eq!(text(&tables.global), "total\n0\n");
}

#[test]
fn truncated_trace_flushes_block() {
    let input = b"# EMIT_IMAGE_ADDRESSES
a.out 401000 401fff
# END_IMAGE_ADDRESSES
# EMIT_TOP_BLOCK_STATS
BLOCK: 1 PC: 401000 ICOUNT: 1 EXECUTIONS: 2
XDIS 401004: BASE C3 ret
total 2
";
    let schema = CounterSchema::from_names(["total"]);
    let mut tables = Tables::default();
    let r = convert(input, &schema, "a.out", 0x401000, &mut tables);
    assert!(matches!(r, Err(Error::TraceTruncated(_))));
    assert_eq!(
        text(&tables.blocks),
        "entry,execution,exit,total\n401000,2,401004,2\n"
    );
    assert!(tables.instructions.is_empty());
}

#[test]
fn missing_global_counts() {
    let input = String::from_utf8(mock::SCENARIO_INPUT.to_vec()).unwrap();
    let input = &input[..input.find("# $global").unwrap()];
    let schema = CounterSchema::default();
    let r = convert(input.as_bytes(), &schema, "a.out", 0, &mut Tables::default());
    assert!(matches!(r, Err(Error::TraceTruncated(_))));
}

#[test]
fn overflowing_count() {
    let input = String::from_utf8(mock::SCENARIO_INPUT.to_vec())
        .unwrap()
        .replace("EXECUTIONS: 10", "EXECUTIONS: 99999999999999999999999");
    let schema = CounterSchema::default();
    let r = convert(input.as_bytes(), &schema, "a.out", 0, &mut Tables::default());
    assert!(matches!(r, Err(Error::TraceParsing(_, 5))));
}

#[test]
fn run_writes_tables() {
    let dir = tempfile::tempdir().unwrap();
    let trace_path = dir.path().join("a.err");
    fs::write(&trace_path, mock::SIMPLE_INPUT).unwrap();

    let schema = CounterSchema::default();
    let r = trace::run(
        &trace_path,
        &dir.path().join("a.out"),
        &schema,
        Some(0),
    );
    assert!(r.is_ok());

    let blocks = fs::read(dir.path().join("a.err.bb.csv")).unwrap();
    let instructions = fs::read(dir.path().join("a.err.insn.csv")).unwrap();
    let global = fs::read(dir.path().join("a.err.global.csv")).unwrap();
    assert_eq!(blocks, mock::SIMPLE_BLOCKS);
    assert_eq!(instructions, mock::SIMPLE_INSTRUCTIONS);
    assert_eq!(global, mock::SIMPLE_GLOBAL);
}
