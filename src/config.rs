//! sde-profile config module.

pub const FAILURE: i32 = 1;

pub const DEFAULT_SYMBOLIZER: &str = "addr2line";

/// Counters extracted from the trace unless extended by `--items`.
pub const REGION_OF_INTEREST: &[&str] = &[
    "total",
    "mem-read",
    "mem-write",
    "category-COND_BR",
    "category-UNCOND_BR",
    "ilen-1",
    "ilen-2",
    "ilen-3",
    "ilen-4",
    "ilen-5",
    "ilen-6",
    "ilen-7",
    "ilen-8",
    "ilen-9",
    "ilen-10",
    "ilen-11",
    "ilen-12",
    "ilen-13",
    "ilen-14",
    "ilen-15",
];

pub const COLUMN_ENTRY: &str = "entry";
pub const COLUMN_EXECUTION: &str = "execution";
pub const COLUMN_EXIT: &str = "exit";
pub const COLUMN_PC: &str = "pc";
pub const COLUMN_NAME: &str = "name";
pub const COLUMN_SOURCE_LINE: &str = "source_line";

pub const BLOCK_SUFFIX: &str = "bb.csv";
pub const INSN_SUFFIX: &str = "insn.csv";
pub const GLOBAL_SUFFIX: &str = "global.csv";
pub const FUNCTION_SUFFIX: &str = "f.csv";
pub const LINE_SUFFIX: &str = "line.csv";

pub type Address = u64;
pub type Count = u64;
pub type Index = usize;

#[cfg(not(test))]
pub type Map<K, V> = std::collections::HashMap<K, V>;

// Use less performant BTree in tests for deterministic sequences
#[cfg(test)]
pub type Map<K, V> = std::collections::BTreeMap<K, V>;
