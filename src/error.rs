//! sde-profile error module.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

/// Represents errors of the converter.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Unsupported file name '{0}'")]
    Filename(PathBuf),

    #[error("Cannot open file '{1}': {0}")]
    OpenFile(#[source] io::Error, PathBuf),
    #[error("Cannot read line '{1}': {0}")]
    ReadLine(#[source] io::Error, String),
    #[error("Input/output error: {0}")]
    Io(#[from] io::Error),

    #[error("Cannot parse executable '{1}': {0}")]
    Executable(#[source] object::read::Error, PathBuf),
    #[error("No loadable segment found in '{0}'")]
    NotFound(PathBuf),

    #[error("Unexpected trace format at line {1}: {0}")]
    TraceFormat(String, usize),
    #[error("Trace ended inside {0}")]
    TraceTruncated(&'static str),
    #[error("Cannot parse number '{0}' at line {1}")]
    TraceParsing(String, usize),

    #[error("Unsupported format of block table: {0}")]
    BlockTableFormat(String),
    #[error("Cannot parse block table value '{0}' at line {1}")]
    BlockTableParsing(String, usize),

    #[error("Cannot run symbolizer '{1}': {0}")]
    SymbolizerSpawn(#[source] io::Error, PathBuf),
    #[error("Symbolizer '{0}' failed with {1}: {2}")]
    SymbolizerFailed(PathBuf, ExitStatus, String),
    #[error("Symbolizer returned {1} results for {0} addresses")]
    SymbolizerMismatch(usize, usize),
}

/// Represents results.
pub type Result<T> = std::result::Result<T, Error>;
