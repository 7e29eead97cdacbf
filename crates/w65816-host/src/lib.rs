//! Host-side wiring for the W65C816S core: the bus mapper, memory-mapped
//! devices, the tick facade, disassembly, and JSON save states.
//!
//! `w65816-cpu` is the processor alone — registers, micro-op queue, opcode
//! tables, no I/O. This crate supplies everything a program embedding the
//! core actually needs to run it against real memory: [`mapper::Mapper`]
//! (a sparse interval map from 24-bit addresses to devices), the built-in
//! [`device::Device`] implementations (RAM, ROM, a virtual UART), the
//! [`machine::Machine`] tick facade, and [`save_state`] JSON I/O.
//!
//! Generalizes `rustynes-core`'s NES-specific integration layer
//! (`Console`/`NesBus` wiring a fixed CPU/PPU/APU/mapper quartet) to an
//! open-ended device model, since this crate has no fixed peripheral set to
//! hard-code.

pub mod device;
pub mod machine;
pub mod mapper;
pub mod save_state;
pub mod trace;

pub use device::{Device, DeviceFactory, Ram, Registry, Rom, RomError, Uart};
pub use machine::{Machine, MachineError};
pub use mapper::{Mapper, MapperError, MappingInfo};
pub use save_state::{DeviceRecord, SaveState, SaveStateError};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machine_and_mapper_are_reachable_from_the_crate_root() {
        let machine = Machine::new();
        machine.add_device("ram0", "ram", Box::new(Ram::new(0x10)), 0, 0, 0x10).unwrap();
        assert_eq!(machine.processor_state(), w65816_cpu::ProcessorState::Resetting);
    }
}
