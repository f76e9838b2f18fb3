//! sde-profile CSV table module.

use crate::counters::CounterSet;
use crate::error::Result;
use std::borrow::Cow;
use std::io::Write;

/// Writes the header row: fixed leading columns followed by counter names.
pub fn write_header<S: AsRef<str>>(
    output: &mut impl Write,
    leading: &[&str],
    counters: &[S],
) -> Result<()> {
    let columns = leading
        .iter()
        .copied()
        .chain(counters.iter().map(AsRef::as_ref))
        .map(escape)
        .collect::<Vec<_>>();
    writeln!(output, "{}", columns.join(","))?;
    Ok(())
}

/// Writes one row: leading cells followed by every counter value.
pub fn write_row(output: &mut impl Write, leading: &[&str], counters: &CounterSet) -> Result<()> {
    let mut row = String::with_capacity(128);
    for cell in leading {
        if !row.is_empty() {
            row.push(',');
        }
        row.push_str(&escape(cell));
    }
    for value in counters.values() {
        if !row.is_empty() {
            row.push(',');
        }
        row.push_str(&value.to_string());
    }
    writeln!(output, "{}", row)?;
    Ok(())
}

/// Quotes a cell if it contains a separator, a quote or a line break.
pub fn escape(cell: &str) -> Cow<'_, str> {
    if cell.contains(&[',', '"', '\n', '\r'][..]) {
        Cow::Owned(format!("\"{}\"", cell.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(cell)
    }
}

/// Splits a CSV line into cells, honoring quoted cells.
pub fn split(line: &str) -> Vec<String> {
    let line = line.trim_end_matches(&['\n', '\r'][..]);
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => cells.push(std::mem::take(&mut cell)),
            _ => cell.push(c),
        }
    }
    cells.push(cell);
    cells
}
