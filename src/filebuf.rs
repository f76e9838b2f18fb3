//! sde-profile file buffered utilities module.

use crate::error::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Opens a file for buffered reading.
pub fn open(filepath: &Path) -> Result<impl BufRead> {
    let file = File::open(filepath).map_err(|e| Error::OpenFile(e, filepath.into()))?;
    Ok(BufReader::new(file))
}

/// Opens a file for buffered writing; rewrites existing.
pub fn open_w(filepath: &Path) -> Result<impl Write> {
    if filepath.exists() {
        fs::remove_file(filepath).map_err(|e| Error::OpenFile(e, filepath.into()))?;
    }
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .open(filepath)
        .map_err(|e| Error::OpenFile(e, filepath.into()))?;
    Ok(BufWriter::new(file))
}

/// Reads all bytes until a newline (the `0xA` byte) is reached,
/// and puts them to the provided buffer replacing the buffer's contents.
pub fn read_line(reader: &mut impl BufRead, line: &mut String) -> Result<usize> {
    line.clear();
    reader
        .read_line(line)
        .map_err(|e| Error::ReadLine(e, line.clone()))
}

/// Appends `.suffix` to the whole file name: `a.err` -> `a.err.bb.csv`.
pub fn with_suffix(filepath: &Path, suffix: &str) -> PathBuf {
    let mut name = filepath.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Replaces the trailing `from` of the file name with `to`:
/// `a.err.bb.csv` -> `a.err.f.csv`.
pub fn replace_suffix(filepath: &Path, from: &str, to: &str) -> Result<PathBuf> {
    let name = filepath
        .to_str()
        .ok_or_else(|| Error::Filename(filepath.into()))?;
    let prefix = name
        .strip_suffix(from)
        .ok_or_else(|| Error::Filename(filepath.into()))?;
    Ok(PathBuf::from(format!("{}{}", prefix, to)))
}
