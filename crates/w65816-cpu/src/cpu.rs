//! The processor core: registers, the tick engine, and opcode semantics.
//!
//! [`Processor`] owns every piece of mutable CPU state and nothing else — no
//! bus, no devices. Each call to [`Processor::tick`] takes the bus by
//! reference, performs exactly one observable bus cycle, and returns a
//! [`Cycle`] record. This mirrors `rustynes-cpu::cpu::Cpu`'s
//! `tick(&mut self, bus: &mut dyn Bus)` shape, generalized from its fixed
//! `CpuState` dispatch to a micro-op queue so that one engine can express all
//! 25 addressing modes and their conditional extra cycles instead of one
//! hand-written `tick_*` method per 6502 addressing mode.

use std::collections::VecDeque;

use crate::addressing::AddressingMode;
use crate::alu;
use crate::bus::{Address, Bus};
use crate::microop::{MicroOp, StackSlot};
use crate::opcodes::{Mnemonic, OpcodeInfo, OPCODE_TABLE};
use crate::state::{Event, InvalidTransition, ProcessorState};
use crate::status::Status;

/// Bank-0 interrupt vector addresses, low byte first. Indexed by
/// `[native as usize]`; see spec §6.
const VEC_COP: [u16; 2] = [0xFFF4, 0xFFE4];
const VEC_BRK: [u16; 2] = [0xFFFE, 0xFFE6];
const VEC_NMI: [u16; 2] = [0xFFFA, 0xFFEA];
const VEC_IRQ: [u16; 2] = [0xFFFE, 0xFFEE];
const VEC_RESET: u16 = 0xFFFC;

/// The kind of bus activity a [`Cycle`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    /// No data transfer; the address asserted is whatever the core is
    /// currently pointing at.
    Internal,
    /// A bus read. `data` is the byte returned (or the retained `MD` value
    /// on open bus).
    Read,
    /// A bus write.
    Write,
}

/// One externally observable bus cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cycle {
    /// The kind of activity this cycle performed.
    pub kind: CycleKind,
    /// The 24-bit address asserted during this cycle.
    pub address: Address,
    /// The byte transferred (or retained, for internal/open-bus cycles).
    pub data: u8,
}

/// An immutable, serializable copy of the processor's architectural
/// (register-file) state, as returned by [`Processor::snapshot`] and
/// consumed by [`Processor::load_snapshot`]. `p` is the status register's
/// raw byte rather than [`crate::status::Status`] itself, so that the save
/// state's JSON encoding (spec §6) stores it as a plain integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessorSnapshot {
    /// Accumulator.
    pub a: u16,
    /// X index register.
    pub x: u16,
    /// Y index register.
    pub y: u16,
    /// Direct page register.
    pub d: u16,
    /// Stack pointer.
    pub s: u16,
    /// Data bank register.
    pub dbr: u8,
    /// Program bank register.
    pub pbr: u8,
    /// Program counter.
    pub pc: u16,
    /// Status register, raw byte.
    pub p: u8,
    /// Emulation-mode flag.
    pub e: bool,
    /// Cumulative bus cycle count.
    pub cycles: u64,
}

/// An error raised by [`Processor::tick`] or a lifecycle method.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CpuError {
    /// The requested lifecycle event is not valid from the current state.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

/// Which fixed vector an interrupt sequence loads PC from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterruptKind {
    Brk,
    Cop,
    Nmi,
    Irq,
}

impl InterruptKind {
    fn vector(self, native: bool) -> u16 {
        let i = usize::from(native);
        match self {
            InterruptKind::Brk => VEC_BRK[i],
            InterruptKind::Cop => VEC_COP[i],
            InterruptKind::Nmi => VEC_NMI[i],
            InterruptKind::Irq => VEC_IRQ[i],
        }
    }
}

/// Block-move direction, captured from the mnemonic at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockMoveDir {
    Increment,
    Decrement,
}

/// Transient state for the instruction currently in flight. Reset by
/// `FetchDecode`; irrelevant between instructions.
#[derive(Debug, Clone, Default)]
struct Ctx {
    opcode: u8,
    mnemonic: Option<Mnemonic>,
    mode: Option<AddressingMode>,
    /// Instruction-stream operand bytes, in the order fetched.
    operand: Vec<u8>,
    /// Bytes read back through an indirection pointer.
    indirect: Vec<u8>,
    /// Resolved 24-bit effective address, when the mode has one.
    eff_addr: Address,
    /// Register/memory width for this opcode's class (`M` or `X`; `true` =
    /// 8-bit).
    width8: bool,
    /// The loaded operand value (for reads); also used as the pre-RMW value.
    value: u16,
    /// Value to write back for stores and RMW instructions.
    write_value: u16,
    /// Whether a conditional branch's condition was satisfied.
    branch_taken: bool,
    interrupt: Option<InterruptKind>,
    /// Set when an interrupt sequence's push is for BRK in emulation mode
    /// (forces the B bit on the pushed status).
    interrupt_is_brk: bool,
    block_move: Option<BlockMoveDir>,
    /// Byte `block_move_read` fetched, carried over to `block_move_write`.
    block_move_byte: u8,
}

/// The W65C816S processor core.
pub struct Processor {
    /// Accumulator; only the low byte is meaningful when `M=1`.
    pub a: u16,
    /// X index register; forced to 8-bit (high byte zero) when `X=1`.
    pub x: u16,
    /// Y index register; forced to 8-bit (high byte zero) when `X=1`.
    pub y: u16,
    /// Direct page register.
    pub d: u16,
    /// Stack pointer; high byte forced to `0x01` whenever `E=1`.
    pub s: u16,
    /// Data bank register.
    pub dbr: u8,
    /// Program bank register.
    pub pbr: u8,
    /// Program counter, relative to `pbr`.
    pub pc: u16,
    /// Processor status flags.
    pub status: Status,
    /// Emulation-mode flag.
    pub e: bool,
    /// Last byte latched from the data bus.
    pub md: u8,
    /// Instruction register: the most recently fetched opcode byte.
    pub ir: u8,
    /// Total bus cycles ticked since construction.
    pub cycles: u64,
    state: ProcessorState,
    queue: VecDeque<MicroOp>,
    nmi_pending: bool,
    reset_pending: bool,
    ctx: Ctx,
}

impl Default for Processor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor {
    /// A processor with everything zeroed and the lifecycle state
    /// `Disabled`. Matches `rustynes-cpu::cpu::Cpu::new`'s convention of a
    /// cheap, side-effect-free constructor; callers must `enable()` before
    /// ticking.
    #[must_use]
    pub fn new() -> Self {
        Processor {
            a: 0,
            x: 0,
            y: 0,
            d: 0,
            s: 0x01FF,
            dbr: 0,
            pbr: 0,
            pc: 0,
            status: Status::power_on(),
            e: true,
            md: 0,
            ir: 0,
            cycles: 0,
            state: ProcessorState::Disabled,
            queue: VecDeque::new(),
            nmi_pending: false,
            reset_pending: false,
            ctx: Ctx::default(),
        }
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ProcessorState {
        self.state
    }

    /// Enable the processor. `with_reset` starts a reset sequence
    /// immediately; otherwise the processor begins `Running` with whatever
    /// register state it already has.
    pub fn enable(&mut self, with_reset: bool) -> Result<(), CpuError> {
        self.state = self.state.apply(Event::Enable { with_reset })?;
        if with_reset {
            self.enter_resetting(true);
        }
        Ok(())
    }

    /// Stop clocking the processor, clearing every register to its power-on
    /// value so a later `enable(false)` (warm, no reset sequence) does not
    /// resume with stale state.
    pub fn disable(&mut self) -> Result<(), CpuError> {
        self.state = self.state.apply(Event::Disable)?;
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.d = 0;
        self.s = 0;
        self.dbr = 0;
        self.pbr = 0;
        self.pc = 0;
        self.e = true;
        self.status = Status::power_on();
        self.queue.clear();
        self.ctx = Ctx::default();
        self.nmi_pending = false;
        self.reset_pending = false;
        Ok(())
    }

    /// Assert the reset line. Valid from any state. Asserting reset directly
    /// on a `Disabled` processor performs a cold reset (A/X/Y zeroed), the
    /// same as `enable(true)`, since there is no other register-clearing
    /// path between `Disabled` and `Resetting`.
    pub fn assert_reset(&mut self) -> Result<(), CpuError> {
        let cold = self.state == ProcessorState::Disabled;
        self.state = self.state.apply(Event::AssertReset)?;
        self.enter_resetting(cold);
        Ok(())
    }

    /// Request the bus for an external agent (DMA). The core goes idle
    /// until [`Processor::bus_release`].
    pub fn bus_request(&mut self) -> Result<(), CpuError> {
        self.state = self.state.apply(Event::BusRequest)?;
        Ok(())
    }

    /// Release a held bus request.
    pub fn bus_release(&mut self) -> Result<(), CpuError> {
        self.state = self.state.apply(Event::BusRelease)?;
        Ok(())
    }

    /// Latch a pending NMI. Edge-triggered: calling this twice before it is
    /// serviced has the same effect as calling it once.
    pub fn issue_nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Whether the micro-op queue is empty. When `state()` is `Running`,
    /// this means the next `tick()` will fetch and decode a new opcode
    /// rather than continue one already in flight — the instruction
    /// boundary a host facade's tracer hooks off of.
    #[must_use]
    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// The 24-bit address `(PBR:PC)` the processor is currently pointing at.
    #[must_use]
    pub fn current_address(&self) -> Address {
        self.pc_address()
    }

    /// Capture an immutable, serializable copy of the architectural state:
    /// every register, the status byte, the emulation-mode flag, and the
    /// cumulative cycle count. Does not capture the micro-op queue or any
    /// in-flight instruction context, matching spec's definition of a save
    /// state as register-file-plus-devices rather than a mid-instruction
    /// resumption point.
    #[must_use]
    pub fn snapshot(&self) -> ProcessorSnapshot {
        ProcessorSnapshot {
            a: self.a,
            x: self.x,
            y: self.y,
            d: self.d,
            s: self.s,
            dbr: self.dbr,
            pbr: self.pbr,
            pc: self.pc,
            p: self.status.bits(),
            e: self.e,
            cycles: self.cycles,
        }
    }

    /// Load register state captured by [`Processor::snapshot`]. Callers are
    /// responsible for only doing this while `state()` is `Disabled`; unlike
    /// the lifecycle methods this never fails, since it has no event to
    /// validate against the state machine.
    pub fn load_snapshot(&mut self, snapshot: ProcessorSnapshot) {
        self.a = snapshot.a;
        self.x = snapshot.x;
        self.y = snapshot.y;
        self.d = snapshot.d;
        self.s = snapshot.s;
        self.dbr = snapshot.dbr;
        self.pbr = snapshot.pbr;
        self.pc = snapshot.pc;
        self.status = Status::from_bits_truncate(snapshot.p);
        self.e = snapshot.e;
        self.cycles = snapshot.cycles;
    }

    /// Enter `Resetting`, applying the register side effects spec.md §4.1
    /// describes. `cold` additionally zeros A/X/Y (a power-on reset); a warm
    /// reset (re-asserting the line while already running) leaves them
    /// unchanged.
    fn enter_resetting(&mut self, cold: bool) {
        self.e = true;
        self.status = Status::power_on();
        self.d = 0;
        self.dbr = 0;
        self.pbr = 0;
        self.s = 0x0100 | (self.s & 0xFF);
        if cold {
            self.a = 0;
            self.x = 0;
            self.y = 0;
        }
        self.queue.clear();
        self.ctx = Ctx::default();
        self.nmi_pending = false;
        self.reset_pending = true;
    }

    /// Advance by one bus cycle. Returns the [`Cycle`] record observed, or
    /// an error if the current state rejects ticking at all.
    pub fn tick(&mut self, bus: &mut dyn Bus) -> Result<Cycle, CpuError> {
        // Validate (and, for Waiting, potentially transition on) the tick
        // event; the queue-draining/state-advancing logic below is the
        // engine's own responsibility, not `ProcessorState::apply`'s.
        self.state.apply(Event::Tick)?;

        match self.state {
            ProcessorState::Disabled => unreachable!("Disabled rejects Tick in apply()"),
            ProcessorState::Stopped | ProcessorState::BusAcquired => {
                Ok(Cycle { kind: CycleKind::Internal, address: self.pc_address(), data: self.md })
            }
            ProcessorState::Resetting => Ok(self.tick_resetting(bus)),
            ProcessorState::Waiting => Ok(self.tick_waiting(bus)),
            ProcessorState::Running => Ok(self.tick_running(bus)),
        }
    }

    fn pc_address(&self) -> Address {
        (u32::from(self.pbr) << 16) | u32::from(self.pc)
    }

    fn tick_resetting(&mut self, bus: &mut dyn Bus) -> Cycle {
        if self.queue.is_empty() {
            self.queue.push_back(MicroOp::FetchVectorLow);
            self.queue.push_back(MicroOp::FetchVectorHigh);
        }
        let op = self.queue.pop_front().expect("just populated");
        let cycle = match op {
            MicroOp::FetchVectorLow => {
                let lo = self.read(bus, u32::from(VEC_RESET));
                self.pc = (self.pc & 0xFF00) | u16::from(lo);
                Cycle { kind: CycleKind::Read, address: u32::from(VEC_RESET), data: lo }
            }
            MicroOp::FetchVectorHigh => {
                let hi = self.read(bus, u32::from(VEC_RESET) + 1);
                self.pc = (self.pc & 0x00FF) | (u16::from(hi) << 8);
                Cycle { kind: CycleKind::Read, address: u32::from(VEC_RESET) + 1, data: hi }
            }
            _ => unreachable!("only vector fetches are queued during Resetting"),
        };
        self.cycles += 1;
        if self.queue.is_empty() {
            self.reset_pending = false;
            self.state = ProcessorState::Running;
        }
        cycle
    }

    fn tick_waiting(&mut self, bus: &mut dyn Bus) -> Cycle {
        if self.reset_pending {
            self.state = ProcessorState::Resetting;
            return self.tick_resetting(bus);
        }
        if self.nmi_pending || bus.irq_line() {
            // Per spec §4.1 and scenario S6: leaving Waiting resumes at the
            // instruction after WAI. A pending, masked IRQ still wakes the
            // core but does not dispatch a handler (I remains whatever it
            // was); NMI always dispatches.
            self.state = ProcessorState::Running;
            if self.nmi_pending {
                self.nmi_pending = false;
                self.begin_interrupt(InterruptKind::Nmi, false);
            }
            return Cycle { kind: CycleKind::Internal, address: self.pc_address(), data: self.md };
        }
        Cycle { kind: CycleKind::Internal, address: self.pc_address(), data: self.md }
    }

    fn tick_running(&mut self, bus: &mut dyn Bus) -> Cycle {
        if self.queue.is_empty() {
            self.start_next_instruction(bus);
        }
        let op = self.queue.pop_front().expect("just populated");
        let cycle = self.step(bus, op);
        self.cycles += 1;
        cycle
    }

    /// Instruction-boundary work: sample interrupt lines, then either enter
    /// an interrupt sequence or fetch/decode the next opcode.
    fn start_next_instruction(&mut self, bus: &mut dyn Bus) {
        if self.nmi_pending {
            self.nmi_pending = false;
            self.begin_interrupt(InterruptKind::Nmi, false);
            return;
        }
        if bus.irq_line() && !self.status.contains(Status::I) {
            self.begin_interrupt(InterruptKind::Irq, false);
            return;
        }
        self.queue.push_back(MicroOp::FetchDecode);
    }

    fn begin_interrupt(&mut self, kind: InterruptKind, is_brk: bool) {
        self.ctx = Ctx::default();
        self.ctx.interrupt = Some(kind);
        self.ctx.interrupt_is_brk = is_brk;
        if !self.e {
            self.queue.push_back(MicroOp::PushByte(StackSlot::Pbr));
        }
        self.queue.push_back(MicroOp::PushByte(StackSlot::PcHi));
        self.queue.push_back(MicroOp::PushByte(StackSlot::PcLo));
        self.queue.push_back(MicroOp::PushByte(StackSlot::P));
        self.queue.push_back(MicroOp::FetchVectorLow);
        self.queue.push_back(MicroOp::FetchVectorHigh);
        self.queue.push_back(MicroOp::Execute);
    }

    /// One dequeued micro-op: perform its bus activity and mutate state.
    #[allow(clippy::too_many_lines)]
    fn step(&mut self, bus: &mut dyn Bus, op: MicroOp) -> Cycle {
        match op {
            MicroOp::FetchDecode => self.fetch_decode(bus),
            MicroOp::FetchOperandByte => {
                let addr = self.pc_address();
                let byte = self.read(bus, addr);
                self.pc = self.pc.wrapping_add(1);
                self.ctx.operand.push(byte);
                self.after_operand_bytes(bus);
                Cycle { kind: CycleKind::Read, address: addr, data: byte }
            }
            MicroOp::FetchIndirectLow => {
                let addr = self.ctx.eff_addr;
                let byte = self.read(bus, addr);
                self.ctx.indirect.push(byte);
                Cycle { kind: CycleKind::Read, address: addr, data: byte }
            }
            MicroOp::FetchIndirectHigh => {
                let addr = self.dp_bank_wrap(self.ctx.eff_addr, 1);
                let byte = self.read(bus, addr);
                self.ctx.indirect.push(byte);
                self.after_indirect_bytes();
                Cycle { kind: CycleKind::Read, address: addr, data: byte }
            }
            MicroOp::FetchIndirectBank => {
                let addr = self.dp_bank_wrap(self.ctx.eff_addr, 2);
                let byte = self.read(bus, addr);
                self.ctx.indirect.push(byte);
                self.after_indirect_bytes();
                Cycle { kind: CycleKind::Read, address: addr, data: byte }
            }
            MicroOp::FetchVectorLow => {
                let vector = self.ctx.interrupt.expect("vector fetch only during interrupt seq").vector(!self.e);
                let addr = u32::from(vector);
                let byte = self.read(bus, addr);
                self.pc = (self.pc & 0xFF00) | u16::from(byte);
                Cycle { kind: CycleKind::Read, address: addr, data: byte }
            }
            MicroOp::FetchVectorHigh => {
                let vector = self.ctx.interrupt.expect("vector fetch only during interrupt seq").vector(!self.e);
                let addr = u32::from(vector) + 1;
                let byte = self.read(bus, addr);
                self.pc = (self.pc & 0x00FF) | (u16::from(byte) << 8);
                self.pbr = 0;
                Cycle { kind: CycleKind::Read, address: addr, data: byte }
            }
            MicroOp::Internal => {
                Cycle { kind: CycleKind::Internal, address: self.pc_address(), data: self.md }
            }
            MicroOp::ReadOperandLow => {
                let byte = self.read(bus, self.ctx.eff_addr);
                self.ctx.value = (self.ctx.value & 0xFF00) | u16::from(byte);
                Cycle { kind: CycleKind::Read, address: self.ctx.eff_addr, data: byte }
            }
            MicroOp::ReadOperandHigh => {
                let addr = self.ctx.eff_addr.wrapping_add(1);
                let byte = self.read(bus, addr);
                self.ctx.value = (self.ctx.value & 0x00FF) | (u16::from(byte) << 8);
                Cycle { kind: CycleKind::Read, address: addr, data: byte }
            }
            MicroOp::WriteOperandLow => {
                let byte = (self.ctx.write_value & 0xFF) as u8;
                self.write(bus, self.ctx.eff_addr, byte);
                Cycle { kind: CycleKind::Write, address: self.ctx.eff_addr, data: byte }
            }
            MicroOp::WriteOperandHigh => {
                let addr = self.ctx.eff_addr.wrapping_add(1);
                let byte = (self.ctx.write_value >> 8) as u8;
                self.write(bus, addr, byte);
                Cycle { kind: CycleKind::Write, address: addr, data: byte }
            }
            MicroOp::DummyWriteLow => {
                let byte = (self.ctx.value & 0xFF) as u8;
                self.write(bus, self.ctx.eff_addr, byte);
                Cycle { kind: CycleKind::Write, address: self.ctx.eff_addr, data: byte }
            }
            MicroOp::DummyWriteHigh => {
                let addr = self.ctx.eff_addr.wrapping_add(1);
                let byte = (self.ctx.value >> 8) as u8;
                self.write(bus, addr, byte);
                Cycle { kind: CycleKind::Write, address: addr, data: byte }
            }
            MicroOp::PushByte(slot) => self.push(bus, slot),
            MicroOp::PushValueHigh => {
                let byte = (self.ctx.write_value >> 8) as u8;
                let addr = self.stack_push_addr();
                self.write(bus, addr, byte);
                Cycle { kind: CycleKind::Write, address: addr, data: byte }
            }
            MicroOp::PushValueLow => {
                let byte = (self.ctx.write_value & 0xFF) as u8;
                let addr = self.stack_push_addr();
                self.write(bus, addr, byte);
                Cycle { kind: CycleKind::Write, address: addr, data: byte }
            }
            MicroOp::PullByte(slot) => self.pull(bus, slot),
            MicroOp::Execute => {
                self.execute();
                Cycle { kind: CycleKind::Internal, address: self.pc_address(), data: self.md }
            }
            MicroOp::BlockMoveIterate => self.block_move_read(bus),
            MicroOp::BlockMoveWrite => self.block_move_write(bus),
            MicroOp::BlockMoveReschedule => self.block_move_reschedule(),
        }
    }

    fn read(&mut self, bus: &mut dyn Bus, addr: Address) -> u8 {
        match bus.read(addr) {
            Some(byte) => {
                self.md = byte;
                byte
            }
            None => self.md,
        }
    }

    fn write(&mut self, bus: &mut dyn Bus, addr: Address, byte: u8) {
        self.md = byte;
        bus.write(addr, byte);
    }

    /// Word reads off an indirection pointer wrap within the bank-0 page the
    /// pointer itself lives in (spec.md §4.4's closing note), not the data
    /// bank: `offset` is added to the low 16 bits only.
    fn dp_bank_wrap(&self, base: Address, offset: u16) -> Address {
        let bank = base & 0xFF0000;
        let low16 = (base as u16).wrapping_add(offset);
        bank | u32::from(low16)
    }

    fn stack_push_addr(&mut self) -> Address {
        let addr = if self.e { 0x0100 | u32::from(self.s & 0xFF) } else { u32::from(self.s) };
        self.s = if self.e {
            0x0100 | self.s.wrapping_sub(1) & 0xFF
        } else {
            self.s.wrapping_sub(1)
        };
        addr
    }

    fn stack_pull_addr(&mut self) -> Address {
        self.s = if self.e {
            0x0100 | self.s.wrapping_add(1) & 0xFF
        } else {
            self.s.wrapping_add(1)
        };
        if self.e { 0x0100 | u32::from(self.s & 0xFF) } else { u32::from(self.s) }
    }

    fn push(&mut self, bus: &mut dyn Bus, slot: StackSlot) -> Cycle {
        let byte = match slot {
            StackSlot::ALo => (self.a & 0xFF) as u8,
            StackSlot::AHi => (self.a >> 8) as u8,
            StackSlot::XLo => (self.x & 0xFF) as u8,
            StackSlot::XHi => (self.x >> 8) as u8,
            StackSlot::YLo => (self.y & 0xFF) as u8,
            StackSlot::YHi => (self.y >> 8) as u8,
            StackSlot::P => self.status.to_stack_byte(self.e, self.ctx.interrupt_is_brk),
            StackSlot::Pbr => self.pbr,
            StackSlot::Dbr => self.dbr,
            StackSlot::PcHi => (self.pc >> 8) as u8,
            StackSlot::PcLo => (self.pc & 0xFF) as u8,
            StackSlot::DLo => (self.d & 0xFF) as u8,
            StackSlot::DHi => (self.d >> 8) as u8,
        };
        let addr = self.stack_push_addr();
        self.write(bus, addr, byte);
        Cycle { kind: CycleKind::Write, address: addr, data: byte }
    }

    fn pull(&mut self, bus: &mut dyn Bus, slot: StackSlot) -> Cycle {
        let addr = self.stack_pull_addr();
        let byte = self.read(bus, addr);
        match slot {
            StackSlot::ALo => self.a = (self.a & 0xFF00) | u16::from(byte),
            StackSlot::AHi => self.a = (self.a & 0x00FF) | (u16::from(byte) << 8),
            StackSlot::XLo => self.x = (self.x & 0xFF00) | u16::from(byte),
            StackSlot::XHi => self.x = (self.x & 0x00FF) | (u16::from(byte) << 8),
            StackSlot::YLo => self.y = (self.y & 0xFF00) | u16::from(byte),
            StackSlot::YHi => self.y = (self.y & 0x00FF) | (u16::from(byte) << 8),
            StackSlot::P => self.status = Status::from_stack_byte(byte, self.e),
            StackSlot::Pbr => self.pbr = byte,
            StackSlot::Dbr => self.dbr = byte,
            StackSlot::PcHi => self.pc = (self.pc & 0x00FF) | (u16::from(byte) << 8),
            StackSlot::PcLo => self.pc = (self.pc & 0xFF00) | u16::from(byte),
            StackSlot::DLo => self.d = (self.d & 0xFF00) | u16::from(byte),
            StackSlot::DHi => self.d = (self.d & 0x00FF) | (u16::from(byte) << 8),
        }
        Cycle { kind: CycleKind::Read, address: addr, data: byte }
    }

    // ---- decode -----------------------------------------------------

    fn fetch_decode(&mut self, bus: &mut dyn Bus) -> Cycle {
        let addr = self.pc_address();
        let opcode = self.read(bus, addr);
        self.pc = self.pc.wrapping_add(1);
        self.ir = opcode;
        self.ctx = Ctx::default();
        self.ctx.opcode = opcode;
        let info = OPCODE_TABLE[opcode as usize];
        self.ctx.mnemonic = Some(info.mnemonic);
        self.ctx.mode = Some(info.mode);
        self.ctx.width8 = self.operand_width8(info.mnemonic);
        match info.mnemonic {
            Mnemonic::Brk => {
                self.ctx.interrupt = Some(InterruptKind::Brk);
                self.ctx.interrupt_is_brk = true;
            }
            Mnemonic::Cop => self.ctx.interrupt = Some(InterruptKind::Cop),
            _ => {}
        }
        self.enqueue_operand_fetch(info);
        Cycle { kind: CycleKind::Read, address: addr, data: opcode }
    }

    /// 8-bit-register mnemonics (`X`/`Y` targets and index-mode addressing)
    /// key off `Status::X`; everything else (accumulator/memory) keys off
    /// `Status::M`. In emulation mode both are forced to 1 regardless.
    fn operand_width8(&self, mnemonic: Mnemonic) -> bool {
        use Mnemonic::{
            Cpx, Cpy, Dex, Dey, Inx, Iny, Ldx, Ldy, Phx, Phy, Plx, Ply, Stx, Sty, Tax, Tay, Tsx,
            Txy, Tyx,
        };
        if self.e {
            return true;
        }
        match mnemonic {
            Cpx | Cpy | Ldx | Ldy | Stx | Sty | Inx | Iny | Dex | Dey | Tax | Tay | Tsx | Txy
            | Tyx | Phx | Phy | Plx | Ply => self.status.contains(Status::X),
            _ => self.status.contains(Status::M),
        }
    }

    /// Direct-page addressing's extra internal cycle, skipped only on the
    /// fast path of emulation mode with DL (D's low byte) already zero.
    fn dp_extra_cycle(&self) -> bool {
        !(self.e && self.d & 0xFF == 0)
    }

    /// Whether adding `index` to `base16` costs an extra internal cycle on
    /// the indexed-absolute / `(d),Y` family: always, in 16-bit index mode;
    /// only on an actual page (high-byte) change, in 8-bit index mode.
    fn index_cross_extra(&self, base16: u16, index: u16) -> bool {
        if !self.status.contains(Status::X) {
            true
        } else {
            (base16 & 0xFF00) != (base16.wrapping_add(index) & 0xFF00)
        }
    }

    /// JMP/JML load PC (and, for JML, PBR) the instant the effective
    /// address is resolved, with no dedicated `Execute` cycle: real silicon
    /// folds the load into the same cycle as the last address byte. Other
    /// mnemonics sharing these addressing modes resolve `eff_addr` and
    /// leave the mutation to `Execute` as usual.
    fn apply_direct_jump(&mut self) {
        match self.ctx.mnemonic {
            Some(Mnemonic::Jmp) => self.pc = self.ctx.eff_addr as u16,
            Some(Mnemonic::Jml) => {
                self.pc = self.ctx.eff_addr as u16;
                self.pbr = (self.ctx.eff_addr >> 16) as u8;
            }
            _ => {}
        }
    }

    fn enqueue_operand_fetch(&mut self, info: OpcodeInfo) {
        use AddressingMode::{
            AbsoluteIndexedIndirectX, AbsoluteIndexedX, AbsoluteIndexedY, AbsoluteIndirect,
            AbsoluteIndirectLong, AbsoluteLong, AbsoluteLongIndexedX, Accumulator, BlockMove,
            Direct, DirectIndexedIndirectX, DirectIndexedX, DirectIndexedY, DirectIndirect,
            DirectIndirectIndexedY, DirectIndirectLong, DirectIndirectLongIndexedY, Immediate,
            Implied, PcRelative, PcRelativeLong, Stack, StackRelative,
            StackRelativeIndirectIndexedY,
        };

        let mut operand_bytes = info.mode.operand_bytes();
        if matches!(info.mode, Immediate) && !self.ctx.width8 {
            operand_bytes += 1;
        }
        for _ in 0..operand_bytes {
            self.queue.push_back(MicroOp::FetchOperandByte);
        }

        match info.mode {
            Implied | Stack | Accumulator | Immediate => {
                // BRK/COP are the one Stack-mode pair with a trailing
                // signature byte: real silicon fetches and discards it
                // before the push sequence, which is also what advances PC
                // past it for the "push PC, not PC-1" rule spec.md §4.5
                // describes.
                if matches!(info.mnemonic, Mnemonic::Brk | Mnemonic::Cop) {
                    self.queue.push_back(MicroOp::FetchOperandByte);
                }
                self.enqueue_body(info);
            }
            Direct | DirectIndexedX | DirectIndexedY => {
                if self.dp_extra_cycle() {
                    self.queue.push_back(MicroOp::Internal);
                }
                self.enqueue_body(info);
            }
            PcRelative
            | PcRelativeLong
            | AddressingMode::Absolute
            | AbsoluteIndexedX
            | AbsoluteIndexedY
            | AbsoluteLong
            | AbsoluteLongIndexedX
            | StackRelative
            | BlockMove => {
                // Fully resolved combinationally once operand bytes land;
                // no further bus cycles needed before the body starts.
                self.enqueue_body(info);
            }
            DirectIndirect | DirectIndexedIndirectX | DirectIndirectIndexedY => {
                if self.dp_extra_cycle() {
                    self.queue.push_back(MicroOp::Internal);
                }
                self.queue.push_back(MicroOp::FetchIndirectLow);
                self.queue.push_back(MicroOp::FetchIndirectHigh);
                self.enqueue_body(info);
            }
            DirectIndirectLong | DirectIndirectLongIndexedY => {
                if self.dp_extra_cycle() {
                    self.queue.push_back(MicroOp::Internal);
                }
                self.queue.push_back(MicroOp::FetchIndirectLow);
                self.queue.push_back(MicroOp::FetchIndirectHigh);
                self.queue.push_back(MicroOp::FetchIndirectBank);
                self.enqueue_body(info);
            }
            StackRelativeIndirectIndexedY => {
                self.queue.push_back(MicroOp::FetchIndirectLow);
                self.queue.push_back(MicroOp::FetchIndirectHigh);
                self.enqueue_body(info);
            }
            AbsoluteIndirect | AbsoluteIndexedIndirectX => {
                // The 65816 spends one extra internal cycle adding X before
                // the pointer fetch on the indexed form, but only for JMP;
                // the indirect JSR (opcode 0xFC) folds it into its own
                // push sequence instead.
                if matches!(info.mode, AbsoluteIndexedIndirectX)
                    && matches!(info.mnemonic, Mnemonic::Jmp)
                {
                    self.queue.push_back(MicroOp::Internal);
                }
                self.queue.push_back(MicroOp::FetchIndirectLow);
                self.queue.push_back(MicroOp::FetchIndirectHigh);
                self.enqueue_body(info);
            }
            AbsoluteIndirectLong => {
                self.queue.push_back(MicroOp::FetchIndirectLow);
                self.queue.push_back(MicroOp::FetchIndirectHigh);
                self.queue.push_back(MicroOp::FetchIndirectBank);
                self.enqueue_body(info);
            }
        }
    }

    /// Called after every `FetchOperandByte` lands; once the last one has,
    /// resolve whatever can be resolved combinationally (everything except
    /// the indirect-pointer modes, which finish resolving in
    /// `after_indirect_bytes`).
    fn after_operand_bytes(&mut self, _bus: &mut dyn Bus) {
        let mode = self.ctx.mode.expect("decoded");
        let needed = mode.operand_bytes()
            + usize::from(matches!(mode, AddressingMode::Immediate) && !self.ctx.width8);
        if self.ctx.operand.len() < needed {
            return;
        }
        self.resolve_pre_indirect();
    }

    fn word(&self, hi_idx: usize) -> u16 {
        u16::from(self.ctx.operand[hi_idx - 1]) | (u16::from(self.ctx.operand[hi_idx]) << 8)
    }

    /// Resolve the effective address for every mode that needs no further
    /// bus reads, or the pointer address for indirect modes (consumed by
    /// the `FetchIndirect*` steps already queued).
    fn resolve_pre_indirect(&mut self) {
        use AddressingMode::{
            AbsoluteIndexedIndirectX, AbsoluteIndexedX, AbsoluteIndexedY, AbsoluteIndirect,
            AbsoluteIndirectLong, AbsoluteLong, AbsoluteLongIndexedX, Accumulator, BlockMove,
            Direct, DirectIndexedIndirectX, DirectIndexedX, DirectIndexedY, DirectIndirect,
            DirectIndirectIndexedY, DirectIndirectLong, DirectIndirectLongIndexedY, Immediate,
            Implied, PcRelative, PcRelativeLong, Stack, StackRelative,
            StackRelativeIndirectIndexedY,
        };
        let op = &self.ctx.operand;
        let mode = self.ctx.mode.expect("decoded");
        match mode {
            Implied | Stack | Accumulator => {}
            Immediate => {
                self.ctx.value = if self.ctx.width8 {
                    u16::from(op[0])
                } else {
                    u16::from(op[0]) | (u16::from(op[1]) << 8)
                };
            }
            Direct => {
                self.ctx.eff_addr = u32::from(self.d.wrapping_add(u16::from(op[0])));
            }
            DirectIndexedX => {
                self.ctx.eff_addr = u32::from(self.d.wrapping_add(u16::from(op[0])).wrapping_add(self.x));
            }
            DirectIndexedY => {
                self.ctx.eff_addr = u32::from(self.d.wrapping_add(u16::from(op[0])).wrapping_add(self.y));
            }
            DirectIndirect | DirectIndirectIndexedY | DirectIndirectLong
            | DirectIndirectLongIndexedY => {
                self.ctx.eff_addr = u32::from(self.d.wrapping_add(u16::from(op[0])));
            }
            DirectIndexedIndirectX => {
                self.ctx.eff_addr =
                    u32::from(self.d.wrapping_add(u16::from(op[0])).wrapping_add(self.x));
            }
            PcRelative => {
                let offset = i32::from(op[0] as i8);
                let target = (i32::from(self.pc) + offset).rem_euclid(0x1_0000) as u16;
                self.ctx.eff_addr = (u32::from(self.pbr) << 16) | u32::from(target);
                self.ctx.branch_taken = self.branch_condition();
                // No separate Execute is queued for branches (see
                // `enqueue_body`): a taken branch costs one internal cycle,
                // plus a second when E=1 and the branch crosses a page.
                if self.ctx.branch_taken {
                    self.queue.push_back(MicroOp::Internal);
                    if self.e && (self.pc & 0xFF00) != (target & 0xFF00) {
                        self.queue.push_back(MicroOp::Internal);
                    }
                    self.pc = target;
                }
            }
            PcRelativeLong => {
                let offset = i32::from(self.word(1) as i16);
                let target = (i32::from(self.pc) + offset).rem_euclid(0x1_0000) as u16;
                self.ctx.eff_addr = (u32::from(self.pbr) << 16) | u32::from(target);
                // BRL is always taken and never queues a separate Execute;
                // PER shares this addressing mode but jumps nowhere, so it
                // is excluded here (see the PER arm below).
                if matches!(self.ctx.mnemonic, Some(Mnemonic::Brl)) {
                    self.queue.push_back(MicroOp::Internal);
                    self.pc = target;
                }
            }
            AddressingMode::Absolute => {
                self.ctx.eff_addr = (u32::from(self.dbr) << 16) | u32::from(self.word(1));
                self.apply_direct_jump();
            }
            AbsoluteIndexedX => {
                let base = self.word(1);
                self.ctx.eff_addr =
                    (u32::from(self.dbr) << 16).wrapping_add(u32::from(base)).wrapping_add(u32::from(self.x));
                if self.index_cross_extra(base, self.x) {
                    self.queue.push_front(MicroOp::Internal);
                }
            }
            AbsoluteIndexedY => {
                let base = self.word(1);
                self.ctx.eff_addr =
                    (u32::from(self.dbr) << 16).wrapping_add(u32::from(base)).wrapping_add(u32::from(self.y));
                if self.index_cross_extra(base, self.y) {
                    self.queue.push_front(MicroOp::Internal);
                }
            }
            AbsoluteLong => {
                self.ctx.eff_addr =
                    u32::from(op[0]) | (u32::from(op[1]) << 8) | (u32::from(op[2]) << 16);
                self.apply_direct_jump();
            }
            AbsoluteLongIndexedX => {
                let base = u32::from(op[0]) | (u32::from(op[1]) << 8) | (u32::from(op[2]) << 16);
                self.ctx.eff_addr = base.wrapping_add(u32::from(self.x));
            }
            StackRelative | StackRelativeIndirectIndexedY => {
                self.ctx.eff_addr = u32::from(self.s.wrapping_add(u16::from(op[0])));
            }
            AbsoluteIndirect | AbsoluteIndexedIndirectX => {
                let word = self.word(1);
                let base = if matches!(mode, AbsoluteIndexedIndirectX) {
                    word.wrapping_add(self.x)
                } else {
                    word
                };
                self.ctx.eff_addr = u32::from(base);
            }
            AbsoluteIndirectLong => {
                self.ctx.eff_addr = u32::from(self.word(1));
            }
            BlockMove => {
                // op[0] = destination bank, op[1] = source bank (spec.md
                // §4.5 lists `[destBank, srcBank]` in fetch order).
                self.dbr = op[0];
            }
        }

        // PEA/PER have no register or memory operand of their own; their
        // pushed value is derived straight from the instruction bytes once
        // those bytes have landed (this function only runs once they have).
        // JSR/JSL push PC-1 (the address of the call instruction's own last
        // byte), not PC itself; `self.pc` has already advanced past every
        // operand byte by the time this runs, regardless of addressing mode
        // (indirect resolution happens later and never touches PC), so the
        // value is final now even though the push micro-ops run later.
        match self.ctx.mnemonic {
            Some(Mnemonic::Pea) => self.ctx.write_value = self.word(1),
            Some(Mnemonic::Per) => {
                let offset = i32::from(self.word(1) as i16);
                let target = (i32::from(self.pc) + offset).rem_euclid(0x1_0000) as u16;
                self.ctx.write_value = target;
            }
            Some(Mnemonic::Jsr | Mnemonic::Jsl) => self.ctx.write_value = self.pc.wrapping_sub(1),
            _ => {}
        }
    }

    fn after_indirect_bytes(&mut self) {
        use AddressingMode::{
            AbsoluteIndexedIndirectX, AbsoluteIndirect, AbsoluteIndirectLong, DirectIndexedIndirectX,
            DirectIndirect, DirectIndirectIndexedY, DirectIndirectLong, DirectIndirectLongIndexedY,
            StackRelativeIndirectIndexedY,
        };
        let mode = self.ctx.mode.expect("decoded");
        let expected = if matches!(mode, DirectIndirectLong | DirectIndirectLongIndexedY | AbsoluteIndirectLong) {
            3
        } else {
            2
        };
        if self.ctx.indirect.len() < expected {
            return;
        }
        let ind = &self.ctx.indirect;
        let word = u32::from(ind[0]) | (u32::from(ind[1]) << 8);
        match mode {
            DirectIndirect | DirectIndexedIndirectX => {
                if matches!(self.ctx.mnemonic, Some(Mnemonic::Pei)) {
                    self.ctx.write_value = word as u16;
                } else {
                    self.ctx.eff_addr = (u32::from(self.dbr) << 16) | word;
                }
            }
            DirectIndirectIndexedY => {
                self.ctx.eff_addr = ((u32::from(self.dbr) << 16) | word).wrapping_add(u32::from(self.y));
                if self.index_cross_extra(word as u16, self.y) {
                    self.queue.push_front(MicroOp::Internal);
                }
            }
            DirectIndirectLong => {
                self.ctx.eff_addr = word | (u32::from(ind[2]) << 16);
            }
            DirectIndirectLongIndexedY => {
                self.ctx.eff_addr = (word | (u32::from(ind[2]) << 16)).wrapping_add(u32::from(self.y));
            }
            StackRelativeIndirectIndexedY => {
                // Fixed extra internal cycle, unlike `(d),Y`: the pointer's
                // own stack-relative fetch already spends a cycle, so this
                // mode never varies with index width or page crossing.
                self.ctx.eff_addr = ((u32::from(self.dbr) << 16) | word).wrapping_add(u32::from(self.y));
                self.queue.push_front(MicroOp::Internal);
            }
            AbsoluteIndirect | AbsoluteIndexedIndirectX => {
                self.ctx.eff_addr = (u32::from(self.pbr) << 16) | word;
                if !matches!(self.ctx.mnemonic, Some(Mnemonic::Jsr)) {
                    self.apply_direct_jump();
                }
            }
            AbsoluteIndirectLong => {
                self.ctx.eff_addr = word | (u32::from(ind[2]) << 16);
                self.apply_direct_jump();
            }
            _ => {}
        }
    }

    fn branch_condition(&self) -> bool {
        match self.ctx.mnemonic.expect("decoded") {
            Mnemonic::Bra | Mnemonic::Brl => true,
            Mnemonic::Bcc => !self.status.contains(Status::C),
            Mnemonic::Bcs => self.status.contains(Status::C),
            Mnemonic::Beq => self.status.contains(Status::Z),
            Mnemonic::Bne => !self.status.contains(Status::Z),
            Mnemonic::Bmi => self.status.contains(Status::N),
            Mnemonic::Bpl => !self.status.contains(Status::N),
            Mnemonic::Bvc => !self.status.contains(Status::V),
            Mnemonic::Bvs => self.status.contains(Status::V),
            _ => false,
        }
    }

    /// After operand/indirect resolution, enqueue the remaining steps that
    /// depend on whether this opcode reads, writes, or read-modify-writes
    /// memory, plus the closing `Execute`.
    fn enqueue_body(&mut self, info: OpcodeInfo) {
        use Mnemonic::{
            Adc, And, Asl, Bit, Brk, Cmp, Cop, Cpx, Cpy, Dec, Eor, Inc, Jml, Jmp, Jsl, Jsr, Lda,
            Ldx, Ldy, Lsr, Mvn, Mvp, Ora, Pea, Pei, Per, Pha, Phb, Phd, Phk, Php, Phx, Phy, Pla,
            Plb, Pld, Plp, Plx, Ply, Rol, Ror, Rti, Rtl, Rts, Sbc, Sta, Stx, Sty, Stz, Trb, Tsb,
        };

        match info.mnemonic {
            Brk | Cop => {
                if !self.e {
                    self.queue.push_back(MicroOp::PushByte(StackSlot::Pbr));
                }
                self.queue.push_back(MicroOp::PushByte(StackSlot::PcHi));
                self.queue.push_back(MicroOp::PushByte(StackSlot::PcLo));
                self.queue.push_back(MicroOp::PushByte(StackSlot::P));
                self.queue.push_back(MicroOp::FetchVectorLow);
                self.queue.push_back(MicroOp::FetchVectorHigh);
            }
            Lda | Ldx | Ldy | And | Ora | Eor | Cmp | Cpx | Cpy | Bit => {
                if !matches!(info.mode, AddressingMode::Immediate | AddressingMode::Accumulator) {
                    self.queue.push_back(MicroOp::ReadOperandLow);
                    if !self.ctx.width8 {
                        self.queue.push_back(MicroOp::ReadOperandHigh);
                    }
                }
            }
            Adc | Sbc => {
                if !matches!(info.mode, AddressingMode::Immediate | AddressingMode::Accumulator) {
                    self.queue.push_back(MicroOp::ReadOperandLow);
                    if !self.ctx.width8 {
                        self.queue.push_back(MicroOp::ReadOperandHigh);
                    }
                }
                if self.status.contains(Status::D) {
                    self.queue.push_back(MicroOp::Internal);
                }
            }
            Sta | Stx | Sty | Stz => {
                self.queue.push_back(MicroOp::WriteOperandLow);
                if !self.ctx.width8 {
                    self.queue.push_back(MicroOp::WriteOperandHigh);
                }
            }
            Asl | Lsr | Rol | Ror | Inc | Dec | Trb | Tsb => {
                if !matches!(info.mode, AddressingMode::Accumulator) {
                    self.queue.push_back(MicroOp::ReadOperandLow);
                    if !self.ctx.width8 {
                        self.queue.push_back(MicroOp::ReadOperandHigh);
                    }
                    self.queue.push_back(MicroOp::DummyWriteLow);
                    if !self.ctx.width8 {
                        self.queue.push_back(MicroOp::DummyWriteHigh);
                    }
                }
            }
            Pha => {
                if !self.ctx.width8 {
                    self.queue.push_back(MicroOp::PushByte(StackSlot::AHi));
                }
                self.queue.push_back(MicroOp::PushByte(StackSlot::ALo));
            }
            Phx => {
                if !self.ctx.width8 {
                    self.queue.push_back(MicroOp::PushByte(StackSlot::XHi));
                }
                self.queue.push_back(MicroOp::PushByte(StackSlot::XLo));
            }
            Phy => {
                if !self.ctx.width8 {
                    self.queue.push_back(MicroOp::PushByte(StackSlot::YHi));
                }
                self.queue.push_back(MicroOp::PushByte(StackSlot::YLo));
            }
            Php => self.queue.push_back(MicroOp::PushByte(StackSlot::P)),
            Phb => self.queue.push_back(MicroOp::PushByte(StackSlot::Dbr)),
            Phd => {
                self.queue.push_back(MicroOp::PushByte(StackSlot::DHi));
                self.queue.push_back(MicroOp::PushByte(StackSlot::DLo));
            }
            Phk => self.queue.push_back(MicroOp::PushByte(StackSlot::Pbr)),
            Pla => {
                self.queue.push_back(MicroOp::Internal);
                self.queue.push_back(MicroOp::PullByte(StackSlot::ALo));
                if !self.ctx.width8 {
                    self.queue.push_back(MicroOp::PullByte(StackSlot::AHi));
                }
            }
            Plx => {
                self.queue.push_back(MicroOp::Internal);
                self.queue.push_back(MicroOp::PullByte(StackSlot::XLo));
                if !self.ctx.width8 {
                    self.queue.push_back(MicroOp::PullByte(StackSlot::XHi));
                }
            }
            Ply => {
                self.queue.push_back(MicroOp::Internal);
                self.queue.push_back(MicroOp::PullByte(StackSlot::YLo));
                if !self.ctx.width8 {
                    self.queue.push_back(MicroOp::PullByte(StackSlot::YHi));
                }
            }
            Plp => {
                self.queue.push_back(MicroOp::Internal);
                self.queue.push_back(MicroOp::PullByte(StackSlot::P));
            }
            Plb => {
                self.queue.push_back(MicroOp::Internal);
                self.queue.push_back(MicroOp::PullByte(StackSlot::Dbr));
            }
            Pld => {
                self.queue.push_back(MicroOp::Internal);
                self.queue.push_back(MicroOp::PullByte(StackSlot::DLo));
                self.queue.push_back(MicroOp::PullByte(StackSlot::DHi));
            }
            Jsr => {
                // PC-1 is computed in `resolve_pre_indirect`; pushed via
                // `PushValueHigh`/`PushValueLow` like PEA/PEI/PER, since
                // there is no register that holds PC-1 to push byte-by-byte.
                self.queue.push_back(MicroOp::PushValueHigh);
                self.queue.push_back(MicroOp::PushValueLow);
            }
            Jsl => {
                self.queue.push_back(MicroOp::PushByte(StackSlot::Pbr));
                self.queue.push_back(MicroOp::PushValueHigh);
                self.queue.push_back(MicroOp::PushValueLow);
            }
            Rts => {
                self.queue.push_back(MicroOp::Internal);
                self.queue.push_back(MicroOp::Internal);
                self.queue.push_back(MicroOp::PullByte(StackSlot::PcLo));
                self.queue.push_back(MicroOp::PullByte(StackSlot::PcHi));
            }
            Rtl => {
                self.queue.push_back(MicroOp::Internal);
                self.queue.push_back(MicroOp::PullByte(StackSlot::PcLo));
                self.queue.push_back(MicroOp::PullByte(StackSlot::PcHi));
                self.queue.push_back(MicroOp::PullByte(StackSlot::Pbr));
            }
            Rti => {
                self.queue.push_back(MicroOp::Internal);
                self.queue.push_back(MicroOp::PullByte(StackSlot::P));
                self.queue.push_back(MicroOp::PullByte(StackSlot::PcLo));
                self.queue.push_back(MicroOp::PullByte(StackSlot::PcHi));
                if !self.e {
                    self.queue.push_back(MicroOp::PullByte(StackSlot::Pbr));
                }
            }
            Pea | Per => {
                // Value computed once the operand bytes land; see
                // `resolve_pre_indirect`.
                self.queue.push_back(MicroOp::PushValueHigh);
                self.queue.push_back(MicroOp::PushValueLow);
            }
            Pei => {
                // Value is the word read through the direct-page pointer;
                // computed in `after_indirect_bytes`.
                self.queue.push_back(MicroOp::PushValueHigh);
                self.queue.push_back(MicroOp::PushValueLow);
            }
            Jmp | Jml => {}
            Mvn => {
                self.ctx.block_move = Some(BlockMoveDir::Increment);
                self.queue.push_back(MicroOp::BlockMoveIterate);
                self.queue.push_back(MicroOp::BlockMoveWrite);
                self.queue.push_back(MicroOp::Internal);
                self.queue.push_back(MicroOp::BlockMoveReschedule);
            }
            Mvp => {
                self.ctx.block_move = Some(BlockMoveDir::Decrement);
                self.queue.push_back(MicroOp::BlockMoveIterate);
                self.queue.push_back(MicroOp::BlockMoveWrite);
                self.queue.push_back(MicroOp::Internal);
                self.queue.push_back(MicroOp::BlockMoveReschedule);
            }
            _ => {}
        }
        let needs_execute = !matches!(
            info.mnemonic,
            Jmp | Jml | Mvn | Mvp | Mnemonic::Brl | Mnemonic::Bra | Mnemonic::Bcc | Mnemonic::Bcs
                | Mnemonic::Beq | Mnemonic::Bne | Mnemonic::Bmi | Mnemonic::Bpl | Mnemonic::Bvc
                | Mnemonic::Bvs
        );
        if needs_execute {
            self.queue.push_back(MicroOp::Execute);
        }
    }

    // ---- execute ------------------------------------------------------

    #[allow(clippy::too_many_lines)]
    fn execute(&mut self) {
        if self.ctx.interrupt.is_some() {
            // PC/PBR already loaded from the vector by FetchVectorHigh.
            self.status.insert(Status::I);
            self.status.remove(Status::D);
            return;
        }

        let Some(mnemonic) = self.ctx.mnemonic else { return };
        use Mnemonic as M;
        let width8 = self.ctx.width8;
        let mode = self.ctx.mode.expect("decoded");

        match mnemonic {
            M::Lda => {
                self.a = self.merged(self.a, self.ctx.value, width8);
                let v = self.a & self.mask(width8);
                self.set_nz(v, width8);
            }
            M::Ldx => {
                self.x = self.ctx.value & self.mask(width8);
                self.set_nz(self.x, width8);
            }
            M::Ldy => {
                self.y = self.ctx.value & self.mask(width8);
                self.set_nz(self.y, width8);
            }
            M::Sta => self.ctx.write_value = self.a,
            M::Stx => self.ctx.write_value = self.x,
            M::Sty => self.ctx.write_value = self.y,
            M::Stz => self.ctx.write_value = 0,
            M::Adc => {
                let carry = self.status.contains(Status::C);
                let decimal = self.status.contains(Status::D);
                let result = alu::adc(self.a, self.ctx.value, carry, decimal, width8, &mut self.status);
                self.a = self.merged(self.a, result, width8);
            }
            M::Sbc => {
                let carry = self.status.contains(Status::C);
                let decimal = self.status.contains(Status::D);
                let result = alu::sbc(self.a, self.ctx.value, carry, decimal, width8, &mut self.status);
                self.a = self.merged(self.a, result, width8);
            }
            M::And => {
                let result = (self.a & self.ctx.value) & self.mask(width8);
                self.a = self.merged(self.a, result, width8);
                self.set_nz(result, width8);
            }
            M::Ora => {
                let result = (self.a | self.ctx.value) & self.mask(width8);
                self.a = self.merged(self.a, result, width8);
                self.set_nz(result, width8);
            }
            M::Eor => {
                let result = (self.a ^ self.ctx.value) & self.mask(width8);
                self.a = self.merged(self.a, result, width8);
                self.set_nz(result, width8);
            }
            M::Cmp => alu::compare(self.a, self.ctx.value, width8, &mut self.status),
            M::Cpx => alu::compare(self.x, self.ctx.value, width8, &mut self.status),
            M::Cpy => alu::compare(self.y, self.ctx.value, width8, &mut self.status),
            M::Bit => {
                let immediate = matches!(mode, AddressingMode::Immediate);
                alu::bit(self.a, self.ctx.value, width8, immediate, &mut self.status);
            }
            M::Asl => self.shift_or_rmw(width8, mode, |v, w, s| alu::asl(v, w, s)),
            M::Lsr => self.shift_or_rmw(width8, mode, |v, w, s| alu::lsr(v, w, s)),
            M::Rol => {
                let c = self.status.contains(Status::C);
                self.shift_or_rmw(width8, mode, move |v, w, s| alu::rol(v, c, w, s));
            }
            M::Ror => {
                let c = self.status.contains(Status::C);
                self.shift_or_rmw(width8, mode, move |v, w, s| alu::ror(v, c, w, s));
            }
            M::Inc => {
                if matches!(mode, AddressingMode::Accumulator) {
                    let v = alu::inc(self.a, width8, &mut self.status);
                    self.a = self.merged(self.a, v, width8);
                } else {
                    self.ctx.write_value = alu::inc(self.ctx.value, width8, &mut self.status);
                }
            }
            M::Dec => {
                if matches!(mode, AddressingMode::Accumulator) {
                    let v = alu::dec(self.a, width8, &mut self.status);
                    self.a = self.merged(self.a, v, width8);
                } else {
                    self.ctx.write_value = alu::dec(self.ctx.value, width8, &mut self.status);
                }
            }
            M::Inx => {
                self.x = alu::inc(self.x, width8, &mut self.status);
            }
            M::Iny => {
                self.y = alu::inc(self.y, width8, &mut self.status);
            }
            M::Dex => {
                self.x = alu::dec(self.x, width8, &mut self.status);
            }
            M::Dey => {
                self.y = alu::dec(self.y, width8, &mut self.status);
            }
            M::Trb => self.ctx.write_value = alu::trb(self.a, self.ctx.value, width8, &mut self.status),
            M::Tsb => self.ctx.write_value = alu::tsb(self.a, self.ctx.value, width8, &mut self.status),
            M::Clc => self.status.remove(Status::C),
            M::Sec => self.status.insert(Status::C),
            M::Cli => self.status.remove(Status::I),
            M::Sei => self.status.insert(Status::I),
            M::Cld => self.status.remove(Status::D),
            M::Sed => self.status.insert(Status::D),
            M::Clv => self.status.remove(Status::V),
            M::Rep => self.status.remove(Status::from_bits_truncate(self.ctx.value as u8)),
            M::Sep => self.status.insert(Status::from_bits_truncate(self.ctx.value as u8)),
            M::Xce => {
                let carry = self.status.contains(Status::C);
                self.status.set(Status::C, self.e);
                self.e = carry;
                if self.e {
                    self.status.insert(Status::M | Status::X);
                    self.x &= 0xFF;
                    self.y &= 0xFF;
                    self.s = 0x0100 | (self.s & 0xFF);
                }
            }
            M::Tax => {
                self.x = self.a & self.mask(width8);
                self.set_nz(self.x, width8);
            }
            M::Tay => {
                self.y = self.a & self.mask(width8);
                self.set_nz(self.y, width8);
            }
            M::Txa => {
                let v = self.x & self.mask(width8);
                self.a = self.merged(self.a, v, width8);
                self.set_nz(v, width8);
            }
            M::Tya => {
                let v = self.y & self.mask(width8);
                self.a = self.merged(self.a, v, width8);
                self.set_nz(v, width8);
            }
            M::Tsx => {
                self.x = self.s & self.mask(width8);
                self.set_nz(self.x, width8);
            }
            M::Txs => {
                self.s = if self.e { 0x0100 | (self.x & 0xFF) } else { self.x };
            }
            M::Tyx => {
                self.x = self.y & self.mask(width8);
                self.set_nz(self.x, width8);
            }
            M::Txy => {
                self.y = self.x & self.mask(width8);
                self.set_nz(self.y, width8);
            }
            M::Tcd => {
                self.d = self.a;
                self.status.set_nz16(self.d);
            }
            M::Tdc => {
                self.a = self.d;
                self.status.set_nz16(self.a);
            }
            M::Tcs => {
                self.s = if self.e { 0x0100 | (self.a & 0xFF) } else { self.a };
            }
            M::Tsc => {
                self.a = self.s;
                self.status.set_nz16(self.a);
            }
            M::Xba => {
                self.a = (self.a >> 8) | (self.a << 8);
                self.status.set_nz8((self.a & 0xFF) as u8);
            }
            M::Bra | M::Bcc | M::Bcs | M::Beq | M::Bne | M::Bmi | M::Bpl | M::Bvc | M::Bvs | M::Brl => {
                unreachable!("branches resolve PC in resolve_pre_indirect and queue no Execute")
            }
            M::Jmp | M::Jml => {
                unreachable!("handled by apply_direct_jump at address resolution")
            }
            M::Jsr => {
                // PC-1 was already pushed from `ctx.write_value` by the
                // PushValueHigh/PushValueLow micro-ops `enqueue_body` queued.
                self.pc = self.ctx.eff_addr as u16;
            }
            M::Jsl => {
                self.pc = self.ctx.eff_addr as u16;
                self.pbr = (self.ctx.eff_addr >> 16) as u8;
            }
            M::Rts => self.pc = self.pc.wrapping_add(1),
            M::Rtl => self.pc = self.pc.wrapping_add(1),
            M::Rti => {
                // P/PC/PBR pulls already happened via the PullByte
                // micro-ops `enqueue_body` queued for this mnemonic.
            }
            M::Brk | M::Cop => unreachable!("handled by the ctx.interrupt early return above"),
            M::Wai => {
                self.state = self.state.apply(Event::Wai).unwrap_or(self.state);
            }
            M::Stp => {
                self.state = self.state.apply(Event::Stp).unwrap_or(self.state);
            }
            M::Nop | M::Wdm => {}
            M::Pha | M::Phx | M::Phy | M::Php | M::Phb | M::Phd | M::Phk | M::Pea | M::Pei
            | M::Per => {}
            M::Pla => {
                let v = self.a & self.mask(width8);
                self.set_nz(v, width8);
            }
            M::Plx => {
                self.set_nz(self.x, width8);
            }
            M::Ply => {
                self.set_nz(self.y, width8);
            }
            M::Plb => self.status.set_nz8(self.dbr),
            M::Pld => self.status.set_nz16(self.d),
            M::Plp => {}
            M::Mvn | M::Mvp => {
                unreachable!("block moves drive themselves via BlockMoveIterate/Write/Reschedule")
            }
        }
    }

    fn mask(&self, width8: bool) -> u16 {
        if width8 { 0x00FF } else { 0xFFFF }
    }

    fn merged(&self, old: u16, new_masked: u16, width8: bool) -> u16 {
        if width8 { (old & 0xFF00) | (new_masked & 0xFF) } else { new_masked }
    }

    fn set_nz(&mut self, value: u16, width8: bool) {
        if width8 {
            self.status.set_nz8((value & 0xFF) as u8);
        } else {
            self.status.set_nz16(value);
        }
    }

    fn shift_or_rmw(
        &mut self,
        width8: bool,
        mode: AddressingMode,
        f: impl FnOnce(u16, bool, &mut Status) -> u16,
    ) {
        if matches!(mode, AddressingMode::Accumulator) {
            let v = f(self.a, width8, &mut self.status);
            self.a = self.merged(self.a, v, width8);
        } else {
            self.ctx.write_value = f(self.ctx.value, width8, &mut self.status);
        }
    }

    /// MVN/MVP's four-cycle-per-iteration body (spec.md §4.5): read the
    /// source byte, write it at the destination and step both index
    /// registers and the DBR, one spare internal cycle, then decide whether
    /// to rewind PC by 3 and re-run the same instruction.
    fn block_move_read(&mut self, bus: &mut dyn Bus) -> Cycle {
        let src_bank = self.ctx.operand[1];
        let src_addr = (u32::from(src_bank) << 16) | u32::from(self.x);
        let byte = self.read(bus, src_addr);
        self.ctx.block_move_byte = byte;
        Cycle { kind: CycleKind::Read, address: src_addr, data: byte }
    }

    fn block_move_write(&mut self, bus: &mut dyn Bus) -> Cycle {
        let dir = self.ctx.block_move.expect("block move in flight");
        let dest_bank = self.ctx.operand[0];
        let dest_addr = (u32::from(dest_bank) << 16) | u32::from(self.y);
        let byte = self.ctx.block_move_byte;
        self.write(bus, dest_addr, byte);
        self.dbr = dest_bank;

        match dir {
            BlockMoveDir::Increment => {
                self.x = self.x.wrapping_add(1);
                self.y = self.y.wrapping_add(1);
            }
            BlockMoveDir::Decrement => {
                self.x = self.x.wrapping_sub(1);
                self.y = self.y.wrapping_sub(1);
            }
        }
        self.a = self.a.wrapping_sub(1);

        Cycle { kind: CycleKind::Write, address: dest_addr, data: byte }
    }

    fn block_move_reschedule(&mut self) -> Cycle {
        if self.a != 0xFFFF {
            self.pc = self.pc.wrapping_sub(3);
            self.queue.clear();
            self.queue.push_back(MicroOp::FetchDecode);
        }
        Cycle { kind: CycleKind::Internal, address: self.pc_address(), data: self.md }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Bus as BusTrait;

    struct RamBus {
        mem: Vec<u8>,
        irq: bool,
    }

    impl RamBus {
        fn new() -> Self {
            RamBus { mem: vec![0; 1 << 24], irq: false }
        }

        fn load(&mut self, addr: u32, bytes: &[u8]) {
            for (i, b) in bytes.iter().enumerate() {
                self.mem[addr as usize + i] = *b;
            }
        }
    }

    impl BusTrait for RamBus {
        fn read(&mut self, addr: Address) -> Option<u8> {
            Some(self.mem[addr as usize])
        }

        fn write(&mut self, addr: Address, value: u8) {
            self.mem[addr as usize] = value;
        }

        fn peek(&self, addr: Address) -> Option<u8> {
            Some(self.mem[addr as usize])
        }

        fn irq_line(&self) -> bool {
            self.irq
        }
    }

    fn run_reset(cpu: &mut Processor, bus: &mut RamBus) {
        cpu.enable(true).unwrap();
        while cpu.state() == ProcessorState::Resetting {
            cpu.tick(bus).unwrap();
        }
    }

    #[test]
    fn reset_loads_vector() {
        let mut bus = RamBus::new();
        bus.load(0xFFFC, &[0x00, 0x80]);
        let mut cpu = Processor::new();
        run_reset(&mut cpu, &mut bus);
        assert_eq!(cpu.pc, 0x8000);
        assert_eq!(cpu.pbr, 0x00);
        assert_eq!(cpu.state(), ProcessorState::Running);
    }

    #[test]
    fn disable_clears_registers() {
        let mut bus = RamBus::new();
        bus.load(0xFFFC, &[0x00, 0x80]);
        bus.load(0x8000, &[0x18, 0xFB, 0xA9, 0x12, 0xA2, 0x34]); // CLC; XCE; LDA #$12; LDX #$34
        let mut cpu = Processor::new();
        run_reset(&mut cpu, &mut bus);
        for _ in 0..10 {
            cpu.tick(&mut bus).unwrap();
        }
        assert_ne!(cpu.a, 0);
        cpu.disable().unwrap();
        assert_eq!(cpu.state(), ProcessorState::Disabled);
        assert_eq!(cpu.a, 0);
        assert_eq!(cpu.x, 0);
        assert_eq!(cpu.y, 0);
        assert_eq!(cpu.pc, 0);
        assert!(cpu.e);
    }

    #[test]
    fn assert_reset_from_disabled_clears_axy_like_a_cold_reset() {
        let mut bus = RamBus::new();
        bus.load(0xFFFC, &[0x00, 0x80]);
        let mut cpu = Processor::new();
        cpu.a = 0x1234;
        cpu.x = 0x5678;
        cpu.y = 0x9ABC;
        assert_eq!(cpu.state(), ProcessorState::Disabled);
        cpu.assert_reset().unwrap();
        assert_eq!(cpu.a, 0);
        assert_eq!(cpu.x, 0);
        assert_eq!(cpu.y, 0);
        assert_eq!(cpu.state(), ProcessorState::Resetting);
    }

    #[test]
    fn load_store_sanity_reaches_stopped_with_expected_registers() {
        let mut bus = RamBus::new();
        bus.load(0xFFFC, &[0x00, 0x80]);
        // CLC; XCE; LDA #$12; LDX #$34; LDY #$56; STP
        bus.load(0x8000, &[0x18, 0xFB, 0xA9, 0x12, 0xA2, 0x34, 0xA0, 0x56, 0xDB]);
        let mut cpu = Processor::new();
        run_reset(&mut cpu, &mut bus);
        for _ in 0..200 {
            if cpu.state() == ProcessorState::Stopped {
                break;
            }
            cpu.tick(&mut bus).unwrap();
        }
        assert_eq!(cpu.state(), ProcessorState::Stopped);
        assert_eq!(cpu.a & 0xFF, 0x12);
        assert_eq!(cpu.x & 0xFF, 0x34);
        assert_eq!(cpu.y & 0xFF, 0x56);
        assert!(!cpu.e);
    }

    #[test]
    fn mvn_copies_block() {
        let mut bus = RamBus::new();
        bus.load(0xFFFC, &[0x00, 0x80]);
        let mut source = [0u8; 32];
        for (i, b) in source.iter_mut().enumerate() {
            *b = if i % 2 == 0 { 0x0F } else { 0xF0 };
        }
        bus.load(0x8100, &source);
        // CLC; XCE; REP #$30; LDA #$001F; LDX #$8100; LDY #$0200; MVN $00,$00; STP
        bus.load(
            0x8000,
            &[
                0x18, 0xFB, 0xC2, 0x30, 0xA9, 0x1F, 0x00, 0xA2, 0x00, 0x81, 0xA0, 0x00, 0x02, 0x54,
                0x00, 0x00, 0xDB,
            ],
        );
        let mut cpu = Processor::new();
        run_reset(&mut cpu, &mut bus);
        for _ in 0..2000 {
            if cpu.state() == ProcessorState::Stopped {
                break;
            }
            cpu.tick(&mut bus).unwrap();
        }
        assert_eq!(cpu.state(), ProcessorState::Stopped);
        assert_eq!(cpu.a, 0xFFFF);
        for i in 0..32u32 {
            assert_eq!(bus.mem[0x0200 + i as usize], source[i as usize]);
        }
    }

    #[test]
    fn nmi_in_native_mode_pushes_three_bytes_and_loads_vector() {
        let mut bus = RamBus::new();
        bus.load(0xFFFC, &[0x00, 0x80]);
        bus.load(0xFFEA, &[0x00, 0x90]);
        bus.load(0x8000, &[0x18, 0xFB, 0xEA]); // CLC; XCE; NOP
        let mut cpu = Processor::new();
        run_reset(&mut cpu, &mut bus);
        cpu.tick(&mut bus).unwrap(); // CLC
        cpu.tick(&mut bus).unwrap();
        cpu.tick(&mut bus).unwrap(); // XCE
        cpu.tick(&mut bus).unwrap();
        let sp_before = cpu.s;
        cpu.issue_nmi();
        for _ in 0..7 {
            cpu.tick(&mut bus).unwrap();
        }
        assert_eq!(cpu.pc, 0x9000);
        assert_eq!(cpu.pbr, 0);
        assert!(cpu.status.contains(Status::I));
        assert!(!cpu.status.contains(Status::D));
        assert_eq!(sp_before.wrapping_sub(cpu.s), 4);
    }

    #[test]
    fn irq_ignored_when_interrupt_disable_set() {
        let mut bus = RamBus::new();
        bus.load(0xFFFC, &[0x00, 0x80]);
        bus.load(0x8000, &[0xEA, 0xEA, 0xEA]); // NOP NOP NOP
        let mut cpu = Processor::new();
        run_reset(&mut cpu, &mut bus);
        assert!(cpu.status.contains(Status::I));
        bus.irq = true;
        let pc_before = cpu.pc;
        let sp_before = cpu.s;
        for _ in 0..2 {
            cpu.tick(&mut bus).unwrap();
        }
        assert_eq!(cpu.s, sp_before);
        assert_eq!(cpu.pc, pc_before.wrapping_add(1));
    }

    #[test]
    fn wai_wakes_on_irq_even_when_interrupt_disable_set() {
        let mut bus = RamBus::new();
        bus.load(0xFFFC, &[0x00, 0x80]);
        bus.load(0x8000, &[0xCB, 0xEA]); // WAI; NOP
        let mut cpu = Processor::new();
        run_reset(&mut cpu, &mut bus);
        for _ in 0..10 {
            cpu.tick(&mut bus).unwrap();
            if cpu.state() == ProcessorState::Waiting {
                break;
            }
        }
        assert_eq!(cpu.state(), ProcessorState::Waiting);
        let sp_before = cpu.s;
        bus.irq = true;
        cpu.tick(&mut bus).unwrap();
        assert_eq!(cpu.state(), ProcessorState::Running);
        assert_eq!(cpu.s, sp_before);
    }

    #[test]
    fn adc_decimal_scenario_matches_spec() {
        let mut bus = RamBus::new();
        bus.load(0xFFFC, &[0x00, 0x80]);
        bus.load(0x8000, &[0x18, 0xFB, 0xF8, 0xA9, 0x25, 0x69, 0x47]); // CLC;XCE;SED;LDA #$25;ADC #$47
        let mut cpu = Processor::new();
        run_reset(&mut cpu, &mut bus);
        for _ in 0..60 {
            cpu.tick(&mut bus).unwrap();
        }
        assert_eq!(cpu.a & 0xFF, 0x72);
        assert!(!cpu.status.contains(Status::C));
        assert!(!cpu.status.contains(Status::N));
        assert!(!cpu.status.contains(Status::Z));
    }

    #[test]
    fn brk_fetches_signature_byte_and_costs_seven_cycles() {
        let mut bus = RamBus::new();
        bus.load(0xFFFC, &[0x00, 0x80]);
        bus.load(0xFFFE, &[0x00, 0x90]); // BRK/IRQ vector, shared in emulation mode
        bus.load(0x8000, &[0x00, 0xEA]); // BRK <signature byte>; NOP
        let mut cpu = Processor::new();
        run_reset(&mut cpu, &mut bus);
        let sp_before = cpu.s;
        let cycles_before = cpu.cycles;
        for _ in 0..7 {
            cpu.tick(&mut bus).unwrap();
        }
        assert_eq!(cpu.cycles - cycles_before, 7);
        assert_eq!(cpu.pc, 0x9000);
        assert_eq!(sp_before.wrapping_sub(cpu.s), 3);
        // The pushed PC must be the address past the signature byte (0x8002),
        // not PC-1 the way JSR pushes: the signature byte is fetched and
        // discarded before the push sequence begins.
        assert_eq!(bus.mem[sp_before as usize], 0x80);
        assert_eq!(bus.mem[(sp_before - 1) as usize], 0x02);
    }

    #[test]
    fn jsr_pushes_pc_minus_one_and_rts_returns_to_the_byte_after_jsr() {
        let mut bus = RamBus::new();
        bus.load(0xFFFC, &[0x00, 0x80]);
        // CLC; XCE; JSR $8010; STP
        bus.load(0x8000, &[0x18, 0xFB, 0x20, 0x10, 0x80, 0xDB]);
        // RTS
        bus.load(0x8010, &[0x60]);
        let mut cpu = Processor::new();
        run_reset(&mut cpu, &mut bus);
        cpu.tick(&mut bus).unwrap(); // CLC
        cpu.tick(&mut bus).unwrap();
        cpu.tick(&mut bus).unwrap(); // XCE
        cpu.tick(&mut bus).unwrap();
        let sp_before_call = cpu.s;
        for _ in 0..6 {
            cpu.tick(&mut bus).unwrap(); // JSR $8010
        }
        assert_eq!(cpu.pc, 0x8010);
        assert_eq!(sp_before_call.wrapping_sub(cpu.s), 2);
        // JSR pushes PC-1 (the address of its own last byte, 0x8004), not
        // PC itself (0x8005) — RTS's +1 on pull depends on this.
        assert_eq!(bus.mem[sp_before_call as usize], 0x80);
        assert_eq!(bus.mem[(sp_before_call - 1) as usize], 0x04);
        for _ in 0..200 {
            if cpu.state() == ProcessorState::Stopped {
                break;
            }
            cpu.tick(&mut bus).unwrap();
        }
        assert_eq!(cpu.state(), ProcessorState::Stopped);
        assert_eq!(cpu.pc, 0x8006);
        assert_eq!(cpu.s, sp_before_call);
    }

    #[test]
    fn stopped_tick_is_idempotent() {
        let mut bus = RamBus::new();
        bus.load(0xFFFC, &[0x00, 0x80]);
        bus.load(0x8000, &[0xDB]); // STP
        let mut cpu = Processor::new();
        run_reset(&mut cpu, &mut bus);
        for _ in 0..10 {
            cpu.tick(&mut bus).unwrap();
            if cpu.state() == ProcessorState::Stopped {
                break;
            }
        }
        let cycles_at_stop = cpu.cycles;
        cpu.tick(&mut bus).unwrap();
        cpu.tick(&mut bus).unwrap();
        assert_eq!(cpu.cycles, cycles_at_stop + 2);
        assert_eq!(cpu.state(), ProcessorState::Stopped);
    }
}
