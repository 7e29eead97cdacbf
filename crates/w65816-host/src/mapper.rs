//! The Bus Mapper: a sorted interval map from 24-bit addresses to devices.
//!
//! Generalizes `rustynes-cpu::bus::NesBus`'s fixed `match`-based memory map
//! to a data-driven list, since device regions here are not known at compile
//! time the way the NES's fixed PPU/APU/cartridge windows are.

use std::fmt;

use w65816_cpu::bus::{Address, Bus};

use crate::device::Device;

/// One registered interval: `[bus_start, bus_start + length)` forwards to
/// `device`, offset by `dev_offset` into the device's own address space.
struct Mapping {
    guid: String,
    kind: &'static str,
    bus_start: Address,
    length: u32,
    dev_offset: u32,
    device: Box<dyn Device>,
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("guid", &self.guid)
            .field("kind", &self.kind)
            .field("bus_start", &self.bus_start)
            .field("length", &self.length)
            .field("dev_offset", &self.dev_offset)
            .finish_non_exhaustive()
    }
}

/// A record describing one mapping, for save-state serialization. Does not
/// borrow the `Mapper`; [`Mapper::mappings`] clones one out of each entry.
#[derive(Debug, Clone)]
pub struct MappingInfo {
    /// Stable identifier for this device, used as its save-state key and
    /// `.ramdump` sidecar filename stem.
    pub guid: String,
    /// The device-kind registry key (`"ram"`, `"rom"`, `"uart"`, ...).
    pub kind: &'static str,
    /// First bus address this mapping claims.
    pub bus_start: Address,
    /// Number of addresses this mapping claims.
    pub length: u32,
    /// Offset added to `addr - bus_start` before indexing into the device.
    pub dev_offset: u32,
}

/// A mapping's bus range overlaps an existing one, runs past the 24-bit
/// address space, or has zero length.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MapperError {
    /// `[bus_start, bus_start + length)` intersects an already-registered
    /// mapping's range.
    #[error("mapping {bus_start:#08x}..{bus_end:#08x} overlaps an existing mapping")]
    MappingOverlap {
        /// First address of the rejected mapping.
        bus_start: Address,
        /// One past the last address of the rejected mapping.
        bus_end: Address,
    },
    /// `bus_start + length` exceeds the 24-bit address space (`0x1000000`).
    #[error("mapping end {bus_end:#08x} exceeds the 24-bit address space")]
    AddressOutOfRange {
        /// One past the last address the mapping would claim.
        bus_end: Address,
    },
    /// `length` was zero.
    #[error("mapping length must be nonzero")]
    ZeroLength,
    /// `dev_offset + length` exceeds the device's own address space.
    #[error("mapping range {dev_offset:#06x}..{dev_end:#06x} exceeds device size {device_size:#06x}")]
    DeviceRangeExceeded {
        /// Offset into the device the mapping would start at.
        dev_offset: u32,
        /// One past the last device offset the mapping would read/write.
        dev_end: u32,
        /// The device's own reported size.
        device_size: u32,
    },
}

/// The 24-bit address space's size; no mapping may end past this.
const ADDRESS_SPACE: u64 = 1 << 24;

/// Sparse interval map from bus addresses to devices.
///
/// Implements [`Bus`] directly, so a `Mapper` can be handed straight to
/// [`w65816_cpu::cpu::Processor::tick`]. Mappings are kept sorted by
/// `bus_start` and searched with `binary_search_by`, the same asymptotic
/// approach `rustynes-cpu::bus::NesBus` gets "for free" from its match
/// arms' compile-time-known ranges.
#[derive(Default)]
pub struct Mapper {
    mappings: Vec<Mapping>,
    /// An externally asserted IRQ level, OR'd with every device's own
    /// `interrupting()` bit. Lets a host facade's `issue_irq(bool)` drive
    /// the line without needing its own device registration.
    irq_external: bool,
}

impl Mapper {
    /// An empty mapper: every address reads open bus and writes are dropped.
    #[must_use]
    pub fn new() -> Self {
        Mapper { mappings: Vec::new(), irq_external: false }
    }

    /// Register `device` at `[bus_start, bus_start + length)`, reading and
    /// writing it starting at `dev_offset` into its own address space.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::ZeroLength`] if `length` is zero,
    /// [`MapperError::AddressOutOfRange`] if the range runs past the 24-bit
    /// address space, [`MapperError::DeviceRangeExceeded`] if
    /// `dev_offset + length` runs past `device.size()`, or
    /// [`MapperError::MappingOverlap`] if it intersects an already-registered
    /// mapping.
    pub fn add(
        &mut self,
        guid: impl Into<String>,
        kind: &'static str,
        device: Box<dyn Device>,
        bus_start: Address,
        dev_offset: u32,
        length: u32,
    ) -> Result<(), MapperError> {
        if length == 0 {
            return Err(MapperError::ZeroLength);
        }
        let bus_end = u64::from(bus_start) + u64::from(length);
        if bus_end > ADDRESS_SPACE {
            return Err(MapperError::AddressOutOfRange { bus_end: bus_end as Address });
        }
        let bus_end = bus_end as Address;

        let dev_end = u64::from(dev_offset) + u64::from(length);
        if dev_end > u64::from(device.size()) {
            return Err(MapperError::DeviceRangeExceeded {
                dev_offset,
                dev_end: dev_end as u32,
                device_size: device.size(),
            });
        }

        let insert_at = self.mappings.partition_point(|m| m.bus_start < bus_start);
        if let Some(prev) = insert_at.checked_sub(1).and_then(|i| self.mappings.get(i)) {
            if prev.bus_start + prev.length > bus_start {
                log::warn!("mapper: rejected mapping {bus_start:#08x}..{bus_end:#08x}, overlaps previous");
                return Err(MapperError::MappingOverlap { bus_start, bus_end });
            }
        }
        if let Some(next) = self.mappings.get(insert_at) {
            if bus_end > next.bus_start {
                log::warn!("mapper: rejected mapping {bus_start:#08x}..{bus_end:#08x}, overlaps next");
                return Err(MapperError::MappingOverlap { bus_start, bus_end });
            }
        }

        self.mappings.insert(
            insert_at,
            Mapping { guid: guid.into(), kind, bus_start, length, dev_offset, device },
        );
        Ok(())
    }

    fn find(&self, addr: Address) -> Option<usize> {
        let i = self.mappings.partition_point(|m| m.bus_start <= addr);
        let i = i.checked_sub(1)?;
        let m = &self.mappings[i];
        if addr < m.bus_start + m.length { Some(i) } else { None }
    }

    /// Logical OR of every device's `interrupting()` line and any externally
    /// asserted level set by [`Mapper::assert_external_irq`].
    #[must_use]
    pub fn interrupt_line(&self) -> bool {
        self.irq_external || self.mappings.iter().any(|m| m.device.interrupting())
    }

    /// Drive (or release) an IRQ line not backed by any registered device —
    /// the host facade's `issue_irq(bool)` passthrough.
    pub fn assert_external_irq(&mut self, level: bool) {
        self.irq_external = level;
    }

    /// Reset every registered device to its power-on state.
    pub fn reset_devices(&mut self) {
        for m in &mut self.mappings {
            m.device.reset();
        }
    }

    /// Metadata for every registered mapping, in bus-address order. Used by
    /// the save-state writer; does not expose the devices themselves.
    pub fn mappings(&self) -> impl Iterator<Item = MappingInfo> + '_ {
        self.mappings.iter().map(|m| MappingInfo {
            guid: m.guid.clone(),
            kind: m.kind,
            bus_start: m.bus_start,
            length: m.length,
            dev_offset: m.dev_offset,
        })
    }

    /// The device registered under `guid`, if any.
    pub(crate) fn device(&self, guid: &str) -> Option<&dyn Device> {
        self.mappings.iter().find(|m| m.guid == guid).map(|m| m.device.as_ref())
    }

    /// The device registered under `guid`, mutably.
    pub(crate) fn device_mut(&mut self, guid: &str) -> Option<&mut dyn Device> {
        self.mappings.iter_mut().find(|m| m.guid == guid).map(|m| m.device.as_mut())
    }
}

impl Bus for Mapper {
    fn read(&mut self, addr: Address) -> Option<u8> {
        let i = self.find(addr)?;
        let m = &mut self.mappings[i];
        let offset = m.dev_offset + (addr - m.bus_start);
        let byte = m.device.read(offset);
        if byte.is_none() {
            log::trace!("mapper: open-bus read at {addr:#08x} (device {} declined)", m.guid);
        }
        byte
    }

    fn write(&mut self, addr: Address, value: u8) {
        let Some(i) = self.find(addr) else {
            log::trace!("mapper: write to unmapped address {addr:#08x} dropped");
            return;
        };
        let m = &mut self.mappings[i];
        let offset = m.dev_offset + (addr - m.bus_start);
        m.device.write(offset, value);
    }

    fn peek(&self, addr: Address) -> Option<u8> {
        let i = self.find(addr)?;
        let m = &self.mappings[i];
        let offset = m.dev_offset + (addr - m.bus_start);
        m.device.peek(offset)
    }

    fn irq_line(&self) -> bool {
        self.interrupt_line()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Ram;

    #[test]
    fn read_write_round_trips_through_a_mapping() {
        let mut mapper = Mapper::new();
        mapper.add("ram0", "ram", Box::new(Ram::new(0x100)), 0x0000, 0, 0x100).unwrap();
        mapper.write(0x10, 0x42);
        assert_eq!(mapper.read(0x10), Some(0x42));
    }

    #[test]
    fn unmapped_address_is_open_bus() {
        let mut mapper = Mapper::new();
        mapper.add("ram0", "ram", Box::new(Ram::new(0x100)), 0x0000, 0, 0x100).unwrap();
        assert_eq!(mapper.read(0x200), None);
    }

    #[test]
    fn overlapping_mapping_is_rejected() {
        let mut mapper = Mapper::new();
        mapper.add("ram0", "ram", Box::new(Ram::new(0x100)), 0x0000, 0, 0x100).unwrap();
        let err = mapper.add("ram1", "ram", Box::new(Ram::new(0x10)), 0x0080, 0, 0x10).unwrap_err();
        assert_eq!(err, MapperError::MappingOverlap { bus_start: 0x0080, bus_end: 0x0090 });
    }

    #[test]
    fn adjacent_mappings_do_not_overlap() {
        let mut mapper = Mapper::new();
        mapper.add("ram0", "ram", Box::new(Ram::new(0x100)), 0x0000, 0, 0x100).unwrap();
        mapper.add("ram1", "ram", Box::new(Ram::new(0x100)), 0x0100, 0, 0x100).unwrap();
        mapper.write(0x100, 0x7F);
        assert_eq!(mapper.read(0x100), Some(0x7F));
        assert_eq!(mapper.read(0x00FF), Some(0));
    }

    #[test]
    fn zero_length_mapping_is_rejected() {
        let mut mapper = Mapper::new();
        let err = mapper.add("ram0", "ram", Box::new(Ram::new(1)), 0, 0, 0).unwrap_err();
        assert_eq!(err, MapperError::ZeroLength);
    }

    #[test]
    fn mapping_past_device_size_is_rejected() {
        let mut mapper = Mapper::new();
        let err = mapper.add("ram0", "ram", Box::new(Ram::new(0x10)), 0, 0, 0x100).unwrap_err();
        assert_eq!(
            err,
            MapperError::DeviceRangeExceeded { dev_offset: 0, dev_end: 0x100, device_size: 0x10 }
        );
    }

    #[test]
    fn mapping_past_address_space_is_rejected() {
        let mut mapper = Mapper::new();
        let err = mapper.add("ram0", "ram", Box::new(Ram::new(0x10)), 0x00FF_FFF8, 0, 0x10).unwrap_err();
        assert!(matches!(err, MapperError::AddressOutOfRange { .. }));
    }

    #[test]
    fn external_irq_ors_with_device_lines() {
        let mut mapper = Mapper::new();
        assert!(!mapper.interrupt_line());
        mapper.assert_external_irq(true);
        assert!(mapper.interrupt_line());
        mapper.assert_external_irq(false);
        assert!(!mapper.interrupt_line());
    }
}
