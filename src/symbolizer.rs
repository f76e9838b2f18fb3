//! sde-profile symbolizer module.

use crate::config::Address;
use crate::error::{Error, Result};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

/// Function and source location an address maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSymbol {
    /// Function name, `??` if unknown.
    pub function: String,
    /// Source location as `file:line`, `??:0` if unknown.
    pub source_line: String,
}

/// Maps a batch of addresses to symbols, one result per address in query order.
pub trait Symbolizer {
    /// Resolves all addresses at once.
    fn symbolize(&mut self, addresses: &[Address]) -> Result<Vec<SourceSymbol>>;
}

/// Symbolizer running `addr2line -e <binary> -f` once per batch.
#[derive(Debug, Clone)]
pub struct Addr2Line {
    program: PathBuf,
    binary: PathBuf,
}

impl Addr2Line {
    /// Creates the symbolizer for the binary using the given `addr2line` executable.
    pub fn new(program: &Path, binary: &Path) -> Self {
        Addr2Line {
            program: program.into(),
            binary: binary.into(),
        }
    }
}

impl Symbolizer for Addr2Line {
    fn symbolize(&mut self, addresses: &[Address]) -> Result<Vec<SourceSymbol>> {
        tracing::debug!(
            "Running {:?} for {} addresses",
            &self.program,
            addresses.len()
        );

        let mut child = Command::new(&self.program)
            .arg("-e")
            .arg(&self.binary)
            .arg("-f")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::SymbolizerSpawn(e, self.program.clone()))?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            Error::SymbolizerSpawn(
                io::Error::new(io::ErrorKind::BrokenPipe, "stdin is not captured"),
                self.program.clone(),
            )
        })?;
        let input = addresses
            .iter()
            .map(|a| format!("{:x}\n", a))
            .collect::<String>();
        // Feed stdin from another thread, the output may not fit into the pipe buffer.
        let writer = thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(Error::SymbolizerFailed(
                self.program.clone(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        writer
            .join()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "symbolizer input writer panicked"))??;

        parse_response(addresses.len(), &String::from_utf8_lossy(&output.stdout))
    }
}

/// Pairs the output lines of `addr2line -f`:
///
/// ```text
/// main
/// /tmp/a.c:11
/// ```
fn parse_response(queried: usize, stdout: &str) -> Result<Vec<SourceSymbol>> {
    let lines = stdout.trim().lines().map(str::trim).collect::<Vec<_>>();
    if lines.len() != queried * 2 {
        // Two lines per result, a dangling line counts as a result too.
        return Err(Error::SymbolizerMismatch(queried, (lines.len() + 1) / 2));
    }
    Ok(lines
        .chunks(2)
        .map(|pair| SourceSymbol {
            function: pair[0].to_string(),
            source_line: pair[1].to_string(),
        })
        .collect())
}
