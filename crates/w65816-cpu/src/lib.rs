//! Cycle-stepped core for the Western Design Center W65C816S microprocessor.
//!
//! This crate is the processor alone: registers, the micro-op queue, the
//! addressing-mode/opcode tables, and the ALU. It has no knowledge of
//! memory-mapped devices, file I/O, or save states — those live in
//! `w65816-host`, which drives this crate through [`bus::Bus`].
//!
//! Generalizes `rustynes-cpu`'s split of a tick-stepped `Cpu` core from the
//! NES-specific bus/mapper crates that surround it.

#![warn(missing_docs)]

pub mod addressing;
pub mod alu;
pub mod bus;
pub mod cpu;
pub mod microop;
pub mod opcodes;
pub mod state;
pub mod status;

pub use cpu::{Cycle, CycleKind, CpuError, Processor, ProcessorSnapshot};
pub use state::ProcessorState;
pub use status::Status;
