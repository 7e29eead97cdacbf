//! Bus interface used by the processor core.
//!
//! The core never touches memory directly; every cycle it issues exactly
//! one read or write through this trait using a 24-bit address. An
//! implementor (typically `w65816_host::mapper::Mapper`) decides which
//! device, if any, claims each address.

/// A 24-bit bus address: 8-bit bank, 16-bit offset, packed as `(bank << 16) |
/// offset`.
pub type Address = u32;

/// Bus interface the processor core issues reads and writes through.
///
/// Implementors provide memory/device access for the whole 24-bit address
/// space. A read may return `None` to signal open bus: no device claims that
/// address, and the processor retains the previous value on its internal
/// data latch (`MD`) rather than reading a fabricated zero.
///
/// # Examples
///
/// ```
/// use w65816_cpu::bus::{Address, Bus};
///
/// struct FlatBus {
///     ram: Vec<u8>,
/// }
///
/// impl Bus for FlatBus {
///     fn read(&mut self, addr: Address) -> Option<u8> {
///         self.ram.get(addr as usize).copied()
///     }
///
///     fn write(&mut self, addr: Address, value: u8) {
///         if let Some(slot) = self.ram.get_mut(addr as usize) {
///             *slot = value;
///         }
///     }
/// }
/// ```
pub trait Bus {
    /// Read a byte at `addr`. Returns `None` for open bus.
    ///
    /// May have side effects (clearing a device's interrupt flag, advancing
    /// a FIFO). For side-effect-free inspection use [`Bus::peek`].
    fn read(&mut self, addr: Address) -> Option<u8>;

    /// Write `value` to `addr`. Writes to unmapped or read-only addresses
    /// are silently dropped; the bus never signals a write fault to the
    /// core.
    fn write(&mut self, addr: Address, value: u8);

    /// Side-effect-free read for tracing/debugging. Default implementation
    /// returns `None` unconditionally; override for real debugger support.
    #[inline]
    fn peek(&self, addr: Address) -> Option<u8> {
        let _ = addr;
        None
    }

    /// Logical OR of every interrupting device's IRQ line. Default `false`
    /// (no interrupting devices registered).
    #[inline]
    fn irq_line(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestBus {
        ram: Vec<u8>,
    }

    impl Bus for TestBus {
        fn read(&mut self, addr: Address) -> Option<u8> {
            self.ram.get(addr as usize).copied()
        }

        fn write(&mut self, addr: Address, value: u8) {
            if let Some(slot) = self.ram.get_mut(addr as usize) {
                *slot = value;
            }
        }

        fn peek(&self, addr: Address) -> Option<u8> {
            self.ram.get(addr as usize).copied()
        }
    }

    #[test]
    fn read_write_round_trips() {
        let mut bus = TestBus { ram: vec![0; 0x100] };
        bus.write(0x10, 0x42);
        assert_eq!(bus.read(0x10), Some(0x42));
    }

    #[test]
    fn read_out_of_range_is_open_bus() {
        let mut bus = TestBus { ram: vec![0; 0x10] };
        assert_eq!(bus.read(0xFFFF), None);
    }

    #[test]
    fn write_out_of_range_is_silently_dropped() {
        let mut bus = TestBus { ram: vec![0; 0x10] };
        bus.write(0xFFFF, 0x42);
        assert_eq!(bus.read(0xFFFF), None);
    }
}
