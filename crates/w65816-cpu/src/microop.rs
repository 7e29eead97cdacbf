//! The micro-operation queue: one atomic bus/internal step per tick.
//!
//! [`crate::cpu::Processor::tick`] dequeues exactly one [`MicroOp`] per call.
//! Decoding an opcode (`FetchDecode`) enqueues the rest of the sequence for
//! that opcode/addressing-mode/register-width combination; later micro-ops
//! may themselves push additional micro-ops onto the front of the queue
//! (index-crossing penalties, decimal-mode adjust cycles, taken-branch
//! cycles, block-move re-iteration) so that every conditional extra cycle
//! spec.md §4.3 lists is representable without widening this enum.

/// One byte-wide slot pushed to or pulled from the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackSlot {
    /// Accumulator low byte.
    ALo,
    /// Accumulator high byte (16-bit pushes only).
    AHi,
    /// X index register low byte.
    XLo,
    /// X index register high byte (16-bit pushes only).
    XHi,
    /// Y index register low byte.
    YLo,
    /// Y index register high byte (16-bit pushes only).
    YHi,
    /// Status register.
    P,
    /// Program bank register.
    Pbr,
    /// Data bank register.
    Dbr,
    /// Program counter high byte.
    PcHi,
    /// Program counter low byte.
    PcLo,
    /// Direct page register low byte.
    DLo,
    /// Direct page register high byte.
    DHi,
}

/// One atomic step of instruction execution, consumed one per
/// [`crate::cpu::Processor::tick`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicroOp {
    /// Read the opcode byte at `(PBR, PC)`, advance PC, decode, and enqueue
    /// the rest of this instruction's sequence (or redirect to an interrupt
    /// sequence if one is pending at this instruction boundary).
    FetchDecode,
    /// Read the next instruction-stream byte at `(PBR, PC)`, advance PC, and
    /// append it to the operand byte buffer.
    FetchOperandByte,
    /// Read the low byte of a pointer already located by `ptr_addr`.
    FetchIndirectLow,
    /// Read the high byte of a pointer located at `ptr_addr + 1`.
    FetchIndirectHigh,
    /// Read the bank byte of a 24-bit pointer located at `ptr_addr + 2`.
    FetchIndirectBank,
    /// Read the low byte of an interrupt/reset vector.
    FetchVectorLow,
    /// Read the high byte of an interrupt/reset vector.
    FetchVectorHigh,
    /// A bus cycle with no data transfer; the address asserted is whatever
    /// the processor is currently pointing at (`PBR:PC` in most cases).
    Internal,
    /// Read the low byte of the resolved operand at `effective_addr`.
    ReadOperandLow,
    /// Read the high byte of the resolved operand at `effective_addr + 1`
    /// (16-bit operand width only).
    ReadOperandHigh,
    /// Write the low byte of `write_value` to `effective_addr`.
    WriteOperandLow,
    /// Write the high byte of `write_value` to `effective_addr + 1`.
    WriteOperandHigh,
    /// Read-modify-write's dummy write-back of the unmodified low byte.
    DummyWriteLow,
    /// Read-modify-write's dummy write-back of the unmodified high byte.
    DummyWriteHigh,
    /// Push one byte from the named register half onto the stack.
    PushByte(StackSlot),
    /// Push the high byte of a computed (not register-resident) word value
    /// onto the stack: `PEA`'s literal operand, `PEI`'s indirect word, and
    /// `PER`'s PC-relative target all produce a value with no register of
    /// its own to read back from.
    PushValueHigh,
    /// Push the low byte of the same computed word value; always follows
    /// [`MicroOp::PushValueHigh`].
    PushValueLow,
    /// Pull one byte from the stack into the named register half.
    PullByte(StackSlot),
    /// Perform the mnemonic's register/flag mutation using whatever operand
    /// state has been gathered so far. Every sequence has exactly one
    /// `Execute` step.
    Execute,
    /// Read one byte of an MVN/MVP block move from `(srcBank, X)`.
    BlockMoveIterate,
    /// Write the byte `BlockMoveIterate` read to `(destBank, Y)`, step the
    /// index registers, and decrement the transfer count in `A`.
    BlockMoveWrite,
    /// Rewind PC by 3 so the same MVN/MVP re-executes, if the transfer
    /// count in `A` has not yet underflowed past `0xFFFF`.
    BlockMoveReschedule,
}
