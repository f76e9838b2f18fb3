//! sde-profile symbol aggregator.
//!
//! Folds the block table into per function and per source line tables.
//! All entry addresses go to the symbolizer in one batch; responses are
//! matched to blocks by position.

use crate::config::{
    Address, Index, Map, BLOCK_SUFFIX, COLUMN_ENTRY, COLUMN_EXECUTION, COLUMN_EXIT, COLUMN_NAME,
    COLUMN_SOURCE_LINE, FUNCTION_SUFFIX, LINE_SUFFIX,
};
use crate::counters::{CounterSchema, CounterSet};
use crate::error::{Error, Result};
use crate::global::progress;
use crate::symbolizer::{Addr2Line, Symbolizer};
use crate::{filebuf, table};
use std::io::{BufRead, Write};
use std::path::Path;


/// Reads `<prefix>bb.csv` and writes `<prefix>f.csv` and `<prefix>line.csv`.
pub fn run(bb_path: &Path, binary_path: &Path, addr2line: &Path) -> Result<()> {
    let f_path = filebuf::replace_suffix(bb_path, BLOCK_SUFFIX, FUNCTION_SUFFIX)?;
    let line_path = filebuf::replace_suffix(bb_path, BLOCK_SUFFIX, LINE_SUFFIX)?;

    progress!("Reading block table {:?}...", bb_path);
    let blocks = BlockTable::read(filebuf::open(bb_path)?)?;

    progress!("Symbolizing {} blocks with {:?}...", blocks.len(), addr2line);
    let mut symbolizer = Addr2Line::new(addr2line, binary_path);
    let (functions, lines) = aggregate(&blocks, &mut symbolizer)?;

    functions.write(filebuf::open_w(&f_path)?, blocks.schema())?;
    lines.write(filebuf::open_w(&line_path)?, blocks.schema())?;
    progress!(
        "{} functions, {} source lines",
        functions.len(),
        lines.len()
    );
    Ok(())
}

/// Resolves every block entry in one symbolizer call and sums block counters
/// per function and per source line.
pub fn aggregate(
    blocks: &BlockTable,
    symbolizer: &mut impl Symbolizer,
) -> Result<(SymbolTable, SymbolTable)> {
    let mut functions = SymbolTable::new(COLUMN_NAME);
    let mut lines = SymbolTable::new(COLUMN_SOURCE_LINE);
    if blocks.is_empty() {
        tracing::warn!("Block table is empty, nothing to symbolize");
        return Ok((functions, lines));
    }

    let addresses = blocks.rows.iter().map(|b| b.entry).collect::<Vec<_>>();
    let symbols = symbolizer.symbolize(&addresses)?;
    if symbols.len() != addresses.len() {
        return Err(Error::SymbolizerMismatch(addresses.len(), symbols.len()));
    }

    for (block, symbol) in blocks.rows.iter().zip(&symbols) {
        functions.add(&symbol.function, &block.counters);
        lines.add(&symbol.source_line, &block.counters);
    }
    Ok((functions, lines))
}

/// Block table row as needed for symbolization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRow {
    /// Relocated entry address.
    pub entry: Address,
    /// Every counter column of the row.
    pub counters: CounterSet,
}

/// Block table read back from CSV.
#[derive(Debug, Clone)]
pub struct BlockTable {
    schema: CounterSchema,
    rows: Vec<BlockRow>,
}

impl BlockTable {
    /// Reads the table; counter columns are all columns but `entry`, `execution` and `exit`.
    pub fn read(mut reader: impl BufRead) -> Result<Self> {
        let mut line = String::with_capacity(512);
        if filebuf::read_line(&mut reader, &mut line)? == 0 {
            return Err(Error::BlockTableFormat("missing header".into()));
        }
        let header = table::split(&line);
        let entry_column = header
            .iter()
            .position(|c| c == COLUMN_ENTRY)
            .ok_or_else(|| {
                Error::BlockTableFormat(format!("no '{}' column in header", COLUMN_ENTRY))
            })?;
        let counter_columns = header
            .iter()
            .enumerate()
            .filter(|(_, c)| ![COLUMN_ENTRY, COLUMN_EXECUTION, COLUMN_EXIT].contains(&c.as_str()))
            .map(|(i, _)| i)
            .collect::<Vec<Index>>();
        let schema = CounterSchema::from_names(counter_columns.iter().map(|&i| &header[i]));
        if schema.len() != counter_columns.len() {
            return Err(Error::BlockTableFormat("repeated column in header".into()));
        }

        let mut rows = Vec::new();
        let mut lc = 1_usize;
        loop {
            if filebuf::read_line(&mut reader, &mut line)? == 0 {
                break;
            }
            lc += 1;
            if line.trim().is_empty() {
                continue;
            }
            let cells = table::split(&line);
            if cells.len() != header.len() {
                return Err(Error::BlockTableFormat(format!(
                    "line {} has {} cells, expected {}",
                    lc,
                    cells.len(),
                    header.len()
                )));
            }
            let entry = &cells[entry_column];
            let entry = Address::from_str_radix(entry.trim_start_matches("0x"), 16)
                .map_err(|_| Error::BlockTableParsing(entry.clone(), lc))?;
            let counters = counter_columns
                .iter()
                .map(|&i| parse_count(&cells[i], lc))
                .collect::<Result<Vec<_>>>()?;
            rows.push(BlockRow {
                entry,
                counters: counters.into(),
            });
        }

        tracing::debug!("Block table: {} rows, {} counters", rows.len(), schema.len());
        Ok(BlockTable { schema, rows })
    }

    /// Returns the counter vocabulary of the table.
    pub fn schema(&self) -> &CounterSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[BlockRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Empty cells count as zero.
fn parse_count(cell: &str, lc: usize) -> Result<u64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(0);
    }
    cell.parse::<u64>()
        .map_err(|_| Error::BlockTableParsing(cell.into(), lc))
}

/// Counters summed per key, in first-seen key order.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    key_column: &'static str,
    rows: Vec<(String, CounterSet)>,
    index: Map<String, Index>,
}

impl SymbolTable {
    fn new(key_column: &'static str) -> Self {
        SymbolTable {
            key_column,
            rows: Vec::new(),
            index: Map::new(),
        }
    }

    fn add(&mut self, key: &str, counters: &CounterSet) {
        match self.index.get(key) {
            Some(&i) => self.rows[i].1.accumulate(counters),
            None => {
                self.index.insert(key.to_string(), self.rows.len());
                self.rows.push((key.to_string(), counters.clone()));
            }
        }
    }

    /// Returns the counters of a key, if present.
    pub fn get(&self, key: &str) -> Option<&CounterSet> {
        self.index.get(key).map(|&i| &self.rows[i].1)
    }

    /// Returns the keys in output order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Writes the table as CSV: key column followed by the counters.
    pub fn write(&self, mut output: impl Write, schema: &CounterSchema) -> Result<()> {
        table::write_header(&mut output, &[self.key_column], schema.names())?;
        for (key, counters) in &self.rows {
            table::write_row(&mut output, &[key.as_str()], counters)?;
        }
        output.flush()?;
        Ok(())
    }
}
