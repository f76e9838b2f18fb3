//! sde-profile image module.
//!
//! Addresses in the trace are runtime addresses of the profiled image, which
//! may be shifted by ASLR. Symbolizers and disassemblers expect link-time
//! addresses, so every traced address is moved by
//! `runtime_pc - image_low + load_address`, where `load_address` is the
//! virtual address of the first `PT_LOAD` program header:
//!
//! ```text
//! Program Headers:
//!   Type           Offset             VirtAddr           PhysAddr
//!   PHDR           0x0000000000000040 0x0000000000400040 0x0000000000400040
//!   LOAD           0x0000000000000000 0x0000000000400000 0x0000000000400000   <-- this one
//!   LOAD           0x0000000000001000 0x0000000000401000 0x0000000000401000
//! ```

use crate::config::Address;
use crate::error::{Error, Result};
use object::{Object, ObjectSegment};
use std::fs;
use std::path::Path;

/// Returns the virtual address of the first loadable segment of the executable.
pub fn load_address(binary: &Path) -> Result<Address> {
    let data = fs::read(binary).map_err(|e| Error::OpenFile(e, binary.into()))?;
    let address = first_load_address(&data).map_err(|e| Error::Executable(e, binary.into()))?;
    let address = address.ok_or_else(|| Error::NotFound(binary.into()))?;
    tracing::debug!("Load address of {:?} is 0x{:x}", binary, address);
    Ok(address)
}

/// Parses the program headers and returns the first `PT_LOAD` address, in header order.
fn first_load_address(data: &[u8]) -> object::Result<Option<Address>> {
    let file = object::File::parse(data)?;
    // ELF segments are reported for PT_LOAD entries only, in program header order.
    let first = file.segments().next().map(|segment| segment.address());
    Ok(first)
}

/// Runtime address window of the profiled image together with its link-time base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    low: Address,
    high: Address,
    load_address: Address,
}

impl Relocation {
    /// Creates the relocation for the runtime window `[low, high]`.
    pub const fn new(low: Address, high: Address, load_address: Address) -> Self {
        Self {
            low,
            high,
            load_address,
        }
    }

    /// Checks the runtime address lies within the image window (inclusive).
    pub fn contains(&self, pc: Address) -> bool {
        self.low <= pc && pc <= self.high
    }

    /// Translates a runtime address into the link-time address space.
    pub fn relocate(&self, pc: Address) -> Address {
        // Modular arithmetic keeps the result exact even when pc < low.
        pc.wrapping_sub(self.low).wrapping_add(self.load_address)
    }

    pub fn low(&self) -> Address {
        self.low
    }

    pub fn high(&self) -> Address {
        self.high
    }
}
