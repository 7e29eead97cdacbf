//! Instruction disassembly for [`crate::machine::Machine::on_new_instruction`].
//!
//! Grounded on `rustynes-cpu::trace::CpuTracer::disassemble`'s per-mode match
//! arms, generalized from the 6502's 13 modes to the 65816's 25 and
//! simplified to side-effect-free `peek`s (no register mutation, unlike a
//! real fetch) since this only runs for trace formatting, never for
//! execution.

use w65816_cpu::addressing::AddressingMode;
use w65816_cpu::bus::Bus;
use w65816_cpu::cpu::Processor;
use w65816_cpu::opcodes::OPCODE_TABLE;

use crate::mapper::Mapper;

/// Disassemble the instruction the processor is about to fetch, in
/// `AAAA BB MNEM operand` form (address, opcode byte, mnemonic, raw operand
/// bytes as hex). Uses [`Bus::peek`], so it never disturbs device state
/// (UART RX, ROM `bad_write_count`) the way a real fetch would.
#[must_use]
pub fn disassemble_at(processor: &Processor, mapper: &Mapper) -> String {
    let addr = processor.current_address();
    let Some(opcode) = mapper.peek(addr) else {
        return format!("{addr:06X}  ??            open bus");
    };
    let info = OPCODE_TABLE[opcode as usize];
    let operand_len = operand_byte_count(info.mode);

    let mut operand_bytes = Vec::with_capacity(operand_len);
    for i in 0..operand_len {
        operand_bytes.push(mapper.peek(addr.wrapping_add(1 + i as u32)).unwrap_or(0));
    }

    let raw: String = std::iter::once(format!("{opcode:02X}"))
        .chain(operand_bytes.iter().map(|b| format!("{b:02X}")))
        .collect::<Vec<_>>()
        .join(" ");

    let mnemonic = format!("{:?}", info.mnemonic).to_uppercase();
    let operand = format_operand(info.mode, &operand_bytes);

    format!("{addr:06X}  {raw:<12}{mnemonic} {operand}")
}

/// Operand byte count for disassembly purposes. Differs from
/// [`AddressingMode::operand_bytes`] only in that [`AddressingMode::Immediate`]
/// is rendered at its base 1-byte width: a static disassembler has no M/X
/// context to decide 8 vs 16 bits without the surrounding mnemonic, and
/// getting that exactly right is outside what a trace line needs.
fn operand_byte_count(mode: AddressingMode) -> usize {
    mode.operand_bytes()
}

fn format_operand(mode: AddressingMode, bytes: &[u8]) -> String {
    use AddressingMode::{
        AbsoluteIndexedIndirectX, AbsoluteIndexedX, AbsoluteIndexedY, AbsoluteIndirect,
        AbsoluteIndirectLong, AbsoluteLong, AbsoluteLongIndexedX, Accumulator, BlockMove, Direct,
        DirectIndexedIndirectX, DirectIndexedX, DirectIndexedY, DirectIndirect,
        DirectIndirectIndexedY, DirectIndirectLong, DirectIndirectLongIndexedY, Immediate,
        Implied, PcRelative, PcRelativeLong, Stack, StackRelative, StackRelativeIndirectIndexedY,
    };
    match mode {
        Implied | Stack | Accumulator => String::new(),
        Immediate => format!("#${:02X}", bytes.first().copied().unwrap_or(0)),
        Direct => format!("${:02X}", bytes[0]),
        DirectIndexedX => format!("${:02X},X", bytes[0]),
        DirectIndexedY => format!("${:02X},Y", bytes[0]),
        DirectIndirect => format!("(${:02X})", bytes[0]),
        DirectIndexedIndirectX => format!("(${:02X},X)", bytes[0]),
        DirectIndirectIndexedY => format!("(${:02X}),Y", bytes[0]),
        DirectIndirectLong => format!("[${:02X}]", bytes[0]),
        DirectIndirectLongIndexedY => format!("[${:02X}],Y", bytes[0]),
        StackRelative => format!("${:02X},S", bytes[0]),
        StackRelativeIndirectIndexedY => format!("(${:02X},S),Y", bytes[0]),
        PcRelative => format!("${:+}", bytes[0] as i8),
        PcRelativeLong => format!("${:+}", word16(bytes) as i16),
        AddressingMode::Absolute => format!("${:04X}", word16(bytes)),
        AbsoluteIndexedX => format!("${:04X},X", word16(bytes)),
        AbsoluteIndexedY => format!("${:04X},Y", word16(bytes)),
        AbsoluteIndirect => format!("(${:04X})", word16(bytes)),
        AbsoluteIndirectLong => format!("[${:04X}]", word16(bytes)),
        AbsoluteIndexedIndirectX => format!("(${:04X},X)", word16(bytes)),
        AbsoluteLong => format!("${:06X}", word24(bytes)),
        AbsoluteLongIndexedX => format!("${:06X},X", word24(bytes)),
        BlockMove => format!("${:02X},${:02X}", bytes[0], bytes[1]),
    }
}

fn word16(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

fn word24(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Ram;

    #[test]
    fn disassembles_an_immediate_lda() {
        let mut mapper = Mapper::new();
        mapper.add("ram0", "ram", Box::new(Ram::new(0x1_0000)), 0, 0, 0x1_0000).unwrap();
        mapper.write(0x8000, 0xA9); // LDA #imm
        mapper.write(0x8001, 0x42);

        let mut processor = Processor::new();
        processor.enable(false).unwrap();
        processor.load_snapshot(w65816_cpu::ProcessorSnapshot {
            a: 0,
            x: 0,
            y: 0,
            d: 0,
            s: 0x01FF,
            dbr: 0,
            pbr: 0,
            pc: 0x8000,
            p: 0,
            e: true,
            cycles: 0,
        });

        let text = disassemble_at(&processor, &mapper);
        assert!(text.contains("LDA"));
        assert!(text.contains("#$42"));
    }

    #[test]
    fn open_bus_fetch_is_reported() {
        let mapper = Mapper::new();
        let processor = Processor::new();
        let text = disassemble_at(&processor, &mapper);
        assert!(text.contains("open bus"));
    }
}
