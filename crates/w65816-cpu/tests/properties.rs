//! Property tests for the universal invariants in the design spec's §8
//! ("Testable Properties"): reset normalization (1), native-to-emulation
//! entry forcing register widths and SH (2), BCD addition (5), stack
//! pointer high byte pinned in emulation mode (6), and snapshot round-trip
//! (9). Invariants 3/4/7/10 are concrete-scenario tests, not universally
//! quantified, and live in `src/cpu.rs`'s inline `#[cfg(test)]` module;
//! invariant 8 (mapper overlap rejection) is a `w65816-host` concern and
//! lives in that crate's `tests/properties.rs`.

use proptest::prelude::*;
use w65816_cpu::bus::{Address, Bus};
use w65816_cpu::cpu::Processor;
use w65816_cpu::state::ProcessorState;
use w65816_cpu::status::Status;
use w65816_cpu::{ProcessorSnapshot, alu};

/// 64KB flat RAM, enough address space to hold a reset vector and a short
/// test program without any real device wiring.
struct FlatBus {
    ram: Vec<u8>,
}

impl FlatBus {
    fn new() -> Self {
        let mut ram = vec![0xEAu8; 0x1_0000]; // NOP filler
        ram[0x7FFC] = 0x00;
        ram[0x7FFD] = 0x80;
        FlatBus { ram }
    }
}

impl Bus for FlatBus {
    fn read(&mut self, addr: Address) -> Option<u8> {
        self.ram.get((addr & 0xFFFF) as usize).copied()
    }

    fn write(&mut self, addr: Address, value: u8) {
        if let Some(slot) = self.ram.get_mut((addr & 0xFFFF) as usize) {
            *slot = value;
        }
    }

    fn peek(&self, addr: Address) -> Option<u8> {
        self.ram.get((addr & 0xFFFF) as usize).copied()
    }
}

/// Run the reset sequence to completion: `Running`, queue empty, ready for
/// a fresh `FetchDecode`.
fn reset_to_running(processor: &mut Processor, bus: &mut FlatBus) {
    processor.enable(true).unwrap();
    for _ in 0..32 {
        if processor.state() == ProcessorState::Running && processor.queue_is_empty() {
            return;
        }
        processor.tick(bus).unwrap();
    }
    panic!("reset sequence did not reach a quiescent Running state within 32 ticks");
}

proptest! {
    /// Invariant 1: whatever garbage the registers held before reset, after
    /// the reset sequence completes E=1, M=1, X=1, I=1, D=0,
    /// PC=word(0xFFFC), SH=0x01.
    #[test]
    fn reset_normalizes_registers_regardless_of_prior_state(
        a in any::<u16>(), x in any::<u16>(), y in any::<u16>(),
        s in any::<u16>(), d in any::<u16>(), p in any::<u8>(),
    ) {
        let mut bus = FlatBus::new();
        let mut processor = Processor::new();
        processor.load_snapshot(ProcessorSnapshot {
            a, x, y, d, s, dbr: 0, pbr: 0, pc: 0x1234, p, e: false, cycles: 0,
        });
        reset_to_running(&mut processor, &mut bus);

        let snap = processor.snapshot();
        prop_assert!(snap.e);
        prop_assert_eq!(snap.s & 0xFF00, 0x0100);
        let status = Status::from_bits_truncate(snap.p);
        prop_assert!(status.contains(Status::M));
        prop_assert!(status.contains(Status::X));
        prop_assert!(status.contains(Status::I));
        prop_assert!(!status.contains(Status::D));
        prop_assert_eq!(snap.pc, 0x8000);
        prop_assert_eq!(snap.pbr, 0);
    }

    /// Invariant 2: entering emulation mode (E: 0->1) forces XH=0, YH=0,
    /// SH=0x01, M=1, X=1, whatever the native-mode register contents were.
    #[test]
    fn entering_emulation_forces_widths_and_stack_high_byte(
        x in any::<u16>(), y in any::<u16>(), s in any::<u16>(),
    ) {
        let mut bus = FlatBus::new();
        bus.write(0x8000, 0x38); // SEC
        bus.write(0x8001, 0xFB); // XCE

        let mut processor = Processor::new();
        reset_to_running(&mut processor, &mut bus);
        processor.load_snapshot(ProcessorSnapshot {
            a: 0, x, y, d: 0, s,
            dbr: 0, pbr: 0, pc: 0x8000,
            p: 0, e: false, cycles: 0,
        });

        for _ in 0..4 {
            processor.tick(&mut bus).unwrap();
        }

        let snap = processor.snapshot();
        prop_assert!(snap.e);
        prop_assert_eq!(snap.x & 0xFF00, 0);
        prop_assert_eq!(snap.y & 0xFF00, 0);
        prop_assert_eq!(snap.s & 0xFF00, 0x0100);
        let status = Status::from_bits_truncate(snap.p);
        prop_assert!(status.contains(Status::M));
        prop_assert!(status.contains(Status::X));
    }

    /// Invariant 5: for every pair of valid BCD digit-pairs with C=0, D=1,
    /// the low two decimal digits of the 8-bit BCD add equal `(a + op) %
    /// 100`.
    #[test]
    fn bcd_add_matches_decimal_mod_100(a in 0u8..100, op in 0u8..100) {
        fn to_bcd(n: u8) -> u16 { u16::from(((n / 10) << 4) | (n % 10)) }
        fn from_bcd(n: u16) -> u8 { ((n >> 4) as u8) * 10 + (n & 0xF) as u8 }

        let mut status = Status::empty();
        let result = alu::adc(to_bcd(a), to_bcd(op), false, true, true, &mut status);
        prop_assert_eq!(u16::from(from_bcd(result)), u16::from((a + op) % 100));
    }

    /// Invariant 6: in emulation mode, SH stays 0x01 after every push/pull.
    /// Exercised here via PHA/PLA with arbitrary prior SP low bytes.
    #[test]
    fn stack_high_byte_pinned_across_push_pull_in_emulation(sl in any::<u8>(), a in any::<u8>()) {
        let mut bus = FlatBus::new();
        bus.write(0x8000, 0x48); // PHA
        bus.write(0x8001, 0x68); // PLA

        let mut processor = Processor::new();
        reset_to_running(&mut processor, &mut bus);
        processor.load_snapshot(ProcessorSnapshot {
            a: u16::from(a), x: 0, y: 0, d: 0, s: 0x0100 | u16::from(sl),
            dbr: 0, pbr: 0, pc: 0x8000, p: Status::power_on().bits(), e: true, cycles: 0,
        });

        // PHA is 3 cycles, PLA is 4 in 8-bit mode.
        for _ in 0..7 {
            processor.tick(&mut bus).unwrap();
        }

        prop_assert_eq!(processor.snapshot().s & 0xFF00, 0x0100);
    }

    /// Invariant 9: snapshot -> load_snapshot -> snapshot is lossless.
    #[test]
    fn snapshot_round_trips_through_load_snapshot(
        a in any::<u16>(), x in any::<u16>(), y in any::<u16>(),
        d in any::<u16>(), s in any::<u16>(), dbr in any::<u8>(), pbr in any::<u8>(),
        pc in any::<u16>(), p in any::<u8>(), e in any::<bool>(), cycles in any::<u64>(),
    ) {
        let snapshot = ProcessorSnapshot { a, x, y, d, s, dbr, pbr, pc, p, e, cycles };
        let mut processor = Processor::new();
        processor.load_snapshot(snapshot);
        prop_assert_eq!(processor.snapshot(), snapshot);
    }
}
