//! Memory-mapped devices registerable with a [`crate::mapper::Mapper`].
//!
//! Generalizes `rustynes-mappers`'s per-cartridge-mapper `read_prg`/`write_prg`/
//! `read_chr`/`write_chr` quartet (one fixed enumeration of mapper chips) to
//! a single open-ended `Device` trait plus a string-keyed construction
//! registry, since devices here are not a fixed, enumerable set the way NES
//! mapper numbers are.

mod ram;
mod registry;
mod rom;
mod uart;

pub use ram::Ram;
pub use registry::{DeviceFactory, Registry};
pub use rom::{Rom, RomError};
pub use uart::Uart;

use crate::save_state::SaveStateError;

/// One memory-mapped peripheral. A device only knows its own local address
/// space (`offset`, not a bus address); [`crate::mapper::Mapper`] is
/// responsible for translating bus addresses into device offsets.
pub trait Device: Send {
    /// Read one byte at `offset`. Returns `None` if the device has no data
    /// there (the mapper then reports open bus).
    fn read(&mut self, offset: u32) -> Option<u8>;

    /// Write one byte at `offset`. Implementations that cannot be written
    /// (ROM) should silently ignore the write, optionally tracking it.
    fn write(&mut self, offset: u32, value: u8);

    /// Side-effect-free read for tracing/debugging. Default: same as
    /// [`Device::read`] would return, without the side effects a stateful
    /// device's `read` might have; devices with no such side effects may
    /// just delegate.
    fn peek(&self, offset: u32) -> Option<u8> {
        let _ = offset;
        None
    }

    /// Whether this device currently asserts its interrupt line. Default
    /// `false` (most devices never interrupt).
    fn interrupting(&self) -> bool {
        false
    }

    /// Size of this device's own address space, in bytes. A
    /// [`crate::mapper::Mapper::add`] mapping's `dev_offset + length` must
    /// not exceed this.
    fn size(&self) -> u32;

    /// Restore power-on state. Default no-op (stateless devices, or ROM,
    /// which has nothing to reset).
    fn reset(&mut self) {}

    /// The device-kind registry key this device was constructed under
    /// (`"ram"`, `"rom"`, `"uart"`).
    fn kind(&self) -> &'static str;

    /// Construction parameters, re-emitted into the save state's `params`
    /// field so [`Registry`] can reconstruct an equivalent device on load.
    fn params(&self) -> serde_json::Value;

    /// Device-specific state, re-emitted into the save state's `state`
    /// field. Bulk data (RAM contents) is excluded here; see
    /// [`Device::ram_dump`].
    fn to_state(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Apply device-specific state previously returned by [`Device::to_state`].
    ///
    /// # Errors
    ///
    /// Returns [`SaveStateError`] if `state` does not match what this device
    /// expects.
    fn load_state(&mut self, state: &serde_json::Value) -> Result<(), SaveStateError> {
        let _ = state;
        Ok(())
    }

    /// Raw bytes to write as this device's `<guid>.ramdump` sidecar file, if
    /// it has bulk storage worth dumping separately from the JSON. Default
    /// `None`.
    fn ram_dump(&self) -> Option<&[u8]> {
        None
    }

    /// Load bytes previously returned by [`Device::ram_dump`]. Default no-op.
    fn load_ram_dump(&mut self, bytes: &[u8]) {
        let _ = bytes;
    }
}
