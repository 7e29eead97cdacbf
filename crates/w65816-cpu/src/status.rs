//! Processor status flags (the `P` register).
//!
//! The W65C816S status register packs eight flags into one byte. Two of the
//! bit positions change meaning depending on the emulation-mode flag `E`,
//! which itself is not a bit of `P` but lives alongside it on the processor:
//! in native mode (`E=0`) bit 4 and bit 5 are the `X` (index register width)
//! and `M` (accumulator/memory width) flags; in emulation mode (`E=1`) bit 4
//! reads/writes as the `B` (break) flag and bit 5 is always read as `1`.
//!
//! `Status` always stores the native-mode interpretation. [`Status::to_stack_byte`]
//! and [`Status::from_stack_byte`] perform the emulation-mode reinterpretation
//! at the push/pull boundary, mirroring how a 6502-family `Status` type keeps
//! one canonical bit layout and translates only when the byte crosses onto
//! the stack.

use bitflags::bitflags;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

bitflags! {
    /// The eight-bit processor status register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct Status: u8 {
        /// Carry.
        const C = 0b0000_0001;
        /// Zero.
        const Z = 0b0000_0010;
        /// IRQ disable.
        const I = 0b0000_0100;
        /// Decimal mode.
        const D = 0b0000_1000;
        /// Index register width select (native mode only): 1 = 8-bit.
        const X = 0b0001_0000;
        /// Accumulator/memory width select (native mode only): 1 = 8-bit.
        const M = 0b0010_0000;
        /// Overflow.
        const V = 0b0100_0000;
        /// Negative.
        const N = 0b1000_0000;

        /// Break flag; occupies the same bit as `X` but only has meaning
        /// when read back off the stack in emulation mode.
        const B = 0b0001_0000;
        /// Unused bit; occupies the same bit as `M`, always reads as 1 when
        /// pushed in emulation mode.
        const U = 0b0010_0000;
    }
}

impl Status {
    /// Status on a cold power-on / reset: interrupts disabled, decimal mode
    /// cleared, both width flags forced to 8-bit (emulation mode implies
    /// `M=1, X=1` unconditionally; native-mode resets still start 8-bit per
    /// the reset sequence in [`crate::cpu::Processor`]'s `enter_resetting`).
    #[must_use]
    pub fn power_on() -> Self {
        Status::I | Status::M | Status::X
    }

    /// Set the `N` and `Z` flags from an 8-bit result.
    pub fn set_nz8(&mut self, value: u8) {
        self.set(Status::Z, value == 0);
        self.set(Status::N, value & 0x80 != 0);
    }

    /// Set the `N` and `Z` flags from a 16-bit result.
    pub fn set_nz16(&mut self, value: u16) {
        self.set(Status::Z, value == 0);
        self.set(Status::N, value & 0x8000 != 0);
    }

    /// Encode this status for pushing onto the stack.
    ///
    /// `emulation` selects the emulation-mode bit reinterpretation; `brk`
    /// additionally forces the break bit (set for BRK, clear for
    /// hardware IRQ/NMI) when `emulation` is true. In native mode the break
    /// bit has no meaning and `brk` is ignored.
    #[must_use]
    pub fn to_stack_byte(self, emulation: bool, brk: bool) -> u8 {
        if emulation {
            let mut bits = self.bits() | Status::U.bits();
            if brk {
                bits |= Status::B.bits();
            } else {
                bits &= !Status::B.bits();
            }
            bits
        } else {
            self.bits()
        }
    }

    /// Decode a status byte pulled from the stack or set via `PLP`/`RTI`.
    ///
    /// In emulation mode, `M` and `X` remain forced to 1 regardless of the
    /// pulled bits (the hidden bit positions are not real in emulation mode).
    #[must_use]
    pub fn from_stack_byte(value: u8, emulation: bool) -> Self {
        let mut status = Status::from_bits_truncate(value);
        if emulation {
            status.insert(Status::M | Status::X);
        }
        status
    }
}
