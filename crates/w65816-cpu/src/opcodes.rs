//! Static opcode and addressing-mode lookup table.
//!
//! `OPCODE_TABLE` maps every one of the 256 opcode bytes to its mnemonic,
//! addressing mode, and base cycle count (the count for the narrowest
//! operand width, not taken, no page/bank crossing). [`crate::cpu::Processor`]
//! adjusts the count at dispatch time for the conditions spec.md §4.3 lists:
//! direct-page `DL≠0`, 16-bit index crossing, branch page-cross in
//! emulation mode, decimal-mode adjust cycles, and block-move iteration.
//!
//! All 256 opcode positions are assigned; the 65816 (unlike the NMOS 6502)
//! has no illegal/undocumented opcodes. `WDM` (`$42`) is WDC's reserved
//! two-byte, two-cycle opcode for future expansion and future co-processor
//! signaling; it behaves as a NOP that consumes one operand byte.

use crate::addressing::AddressingMode;

/// An instruction mnemonic. Several 65816-only mnemonics (`BRL`, `JML`,
/// `JSL`, `MVN`, `MVP`, `PEA`, `PEI`, `PER`, `PHB`, `PHD`, `PHK`, `PHX`,
/// `PHY`, `PLB`, `PLD`, `PLX`, `PLY`, `REP`, `SEP`, `STZ`, `TCD`, `TCS`,
/// `TDC`, `TSC`, `TXY`, `TYX`, `WDM`, `XBA`, `XCE`) have no 6502 ancestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Mnemonic {
    Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Bra, Brk, Brl, Bvc, Bvs,
    Clc, Cld, Cli, Clv, Cmp, Cop, Cpx, Cpy,
    Dec, Dex, Dey,
    Eor,
    Inc, Inx, Iny,
    Jml, Jmp, Jsl, Jsr,
    Lda, Ldx, Ldy, Lsr,
    Mvn, Mvp,
    Nop,
    Ora,
    Pea, Pei, Per, Pha, Phb, Phd, Phk, Php, Phx, Phy, Pla, Plb, Pld, Plp, Plx, Ply,
    Rep, Rol, Ror, Rti, Rtl, Rts,
    Sbc, Sec, Sed, Sei, Sep, Sta, Stp, Stx, Sty, Stz,
    Tax, Tay, Tcd, Tcs, Tdc, Trb, Tsb, Tsc, Tsx, Txa, Txs, Txy, Tya, Tyx,
    Wai, Wdm,
    Xba, Xce,
}

/// One row of the static opcode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    /// The instruction mnemonic.
    pub mnemonic: Mnemonic,
    /// The addressing mode used to fetch/store the operand.
    pub mode: AddressingMode,
    /// Base cycle count (8-bit operand width, branch not taken, no
    /// page/bank crossing, no decimal-mode adjust).
    pub base_cycles: u8,
}

const fn op(mnemonic: Mnemonic, mode: AddressingMode, base_cycles: u8) -> OpcodeInfo {
    OpcodeInfo { mnemonic, mode, base_cycles }
}

#[rustfmt::skip]
pub static OPCODE_TABLE: [OpcodeInfo; 256] = {
    use AddressingMode::{
        Absolute as ABS, AbsoluteIndexedIndirectX as AXI, AbsoluteIndexedX as ABX,
        AbsoluteIndexedY as ABY, AbsoluteIndirect as AIN, AbsoluteIndirectLong as AIL,
        AbsoluteLong as ABL, AbsoluteLongIndexedX as ALX, Accumulator as ACC, BlockMove as BLK,
        Direct as DIR, DirectIndexedIndirectX as DXI, DirectIndexedX as DPX,
        DirectIndexedY as DPY, DirectIndirect as DIN, DirectIndirectIndexedY as DIY,
        DirectIndirectLong as DIL, DirectIndirectLongIndexedY as DLY, Immediate as IMM,
        Implied as IMP, PcRelative as REL, PcRelativeLong as RLG, Stack as STK,
        StackRelative as SR, StackRelativeIndirectIndexedY as SRY,
    };
    use Mnemonic::{
        Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Bra, Brk, Brl, Bvc, Bvs, Clc, Cld,
        Cli, Clv, Cmp, Cop, Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx, Iny, Jml, Jmp, Jsl, Jsr,
        Lda, Ldx, Ldy, Lsr, Mvn, Mvp, Nop, Ora, Pea, Pei, Per, Pha, Phb, Phd, Phk, Php, Phx,
        Phy, Pla, Plb, Pld, Plp, Plx, Ply, Rep, Rol, Ror, Rti, Rtl, Rts, Sbc, Sec, Sed, Sei,
        Sep, Sta, Stp, Stx, Sty, Stz, Tax, Tay, Tcd, Tcs, Tdc, Trb, Tsb, Tsc, Tsx, Txa, Txs,
        Txy, Tya, Tyx, Wai, Wdm, Xba, Xce,
    };
    [
        // 0x00-0x0F
        op(Brk, STK, 7), op(Ora, DXI, 6), op(Cop, STK, 7), op(Ora, SR, 4),
        op(Tsb, DIR, 5), op(Ora, DIR, 3), op(Asl, DIR, 5), op(Ora, DIL, 6),
        op(Php, STK, 3), op(Ora, IMM, 2), op(Asl, ACC, 2), op(Phd, STK, 4),
        op(Tsb, ABS, 6), op(Ora, ABS, 4), op(Asl, ABS, 6), op(Ora, ABL, 5),
        // 0x10-0x1F
        op(Bpl, REL, 2), op(Ora, DIY, 5), op(Ora, DIN, 5), op(Ora, SRY, 7),
        op(Trb, DIR, 5), op(Ora, DPX, 4), op(Asl, DPX, 6), op(Ora, DLY, 6),
        op(Clc, IMP, 2), op(Ora, ABY, 4), op(Inc, ACC, 2), op(Tcs, IMP, 2),
        op(Trb, ABS, 6), op(Ora, ABX, 4), op(Asl, ABX, 7), op(Ora, ALX, 5),
        // 0x20-0x2F
        op(Jsr, ABS, 6), op(And, DXI, 6), op(Jsl, ABL, 8), op(And, SR, 4),
        op(Bit, DIR, 3), op(And, DIR, 3), op(Rol, DIR, 5), op(And, DIL, 6),
        op(Plp, STK, 4), op(And, IMM, 2), op(Rol, ACC, 2), op(Pld, STK, 5),
        op(Bit, ABS, 4), op(And, ABS, 4), op(Rol, ABS, 6), op(And, ABL, 5),
        // 0x30-0x3F
        op(Bmi, REL, 2), op(And, DIY, 5), op(And, DIN, 5), op(And, SRY, 7),
        op(Bit, DPX, 4), op(And, DPX, 4), op(Rol, DPX, 6), op(And, DLY, 6),
        op(Sec, IMP, 2), op(And, ABY, 4), op(Dec, ACC, 2), op(Tsc, IMP, 2),
        op(Bit, ABX, 4), op(And, ABX, 4), op(Rol, ABX, 7), op(And, ALX, 5),
        // 0x40-0x4F
        op(Rti, STK, 6), op(Eor, DXI, 6), op(Wdm, IMM, 2), op(Eor, SR, 4),
        op(Mvp, BLK, 7), op(Eor, DIR, 3), op(Lsr, DIR, 5), op(Eor, DIL, 6),
        op(Pha, STK, 3), op(Eor, IMM, 2), op(Lsr, ACC, 2), op(Phk, STK, 3),
        op(Jmp, ABS, 3), op(Eor, ABS, 4), op(Lsr, ABS, 6), op(Eor, ABL, 5),
        // 0x50-0x5F
        op(Bvc, REL, 2), op(Eor, DIY, 5), op(Eor, DIN, 5), op(Eor, SRY, 7),
        op(Mvn, BLK, 7), op(Eor, DPX, 4), op(Lsr, DPX, 6), op(Eor, DLY, 6),
        op(Cli, IMP, 2), op(Eor, ABY, 4), op(Phy, STK, 3), op(Tcd, IMP, 2),
        op(Jml, ABL, 4), op(Eor, ABX, 4), op(Lsr, ABX, 7), op(Eor, ALX, 5),
        // 0x60-0x6F
        op(Rts, STK, 6), op(Adc, DXI, 6), op(Per, RLG, 6), op(Adc, SR, 4),
        op(Stz, DIR, 3), op(Adc, DIR, 3), op(Ror, DIR, 5), op(Adc, DIL, 6),
        op(Pla, STK, 4), op(Adc, IMM, 2), op(Ror, ACC, 2), op(Rtl, STK, 6),
        op(Jmp, AIN, 5), op(Adc, ABS, 4), op(Ror, ABS, 6), op(Adc, ABL, 5),
        // 0x70-0x7F
        op(Bvs, REL, 2), op(Adc, DIY, 5), op(Adc, DIN, 5), op(Adc, SRY, 7),
        op(Stz, DPX, 4), op(Adc, DPX, 4), op(Ror, DPX, 6), op(Adc, DLY, 6),
        op(Sei, IMP, 2), op(Adc, ABY, 4), op(Ply, STK, 4), op(Tdc, IMP, 2),
        op(Jmp, AXI, 6), op(Adc, ABX, 4), op(Ror, ABX, 7), op(Adc, ALX, 5),
        // 0x80-0x8F
        op(Bra, REL, 3), op(Sta, DXI, 6), op(Brl, RLG, 4), op(Sta, SR, 4),
        op(Sty, DIR, 3), op(Sta, DIR, 3), op(Stx, DIR, 3), op(Sta, DIL, 6),
        op(Dey, IMP, 2), op(Bit, IMM, 2), op(Txa, IMP, 2), op(Phb, STK, 3),
        op(Sty, ABS, 4), op(Sta, ABS, 4), op(Stx, ABS, 4), op(Sta, ABL, 5),
        // 0x90-0x9F
        op(Bcc, REL, 2), op(Sta, DIY, 6), op(Sta, DIN, 5), op(Sta, SRY, 7),
        op(Sty, DPX, 4), op(Sta, DPX, 4), op(Stx, DPY, 4), op(Sta, DLY, 6),
        op(Tya, IMP, 2), op(Sta, ABY, 5), op(Txs, IMP, 2), op(Txy, IMP, 2),
        op(Stz, ABS, 4), op(Sta, ABX, 5), op(Stz, ABX, 5), op(Sta, ALX, 5),
        // 0xA0-0xAF
        op(Ldy, IMM, 2), op(Lda, DXI, 6), op(Ldx, IMM, 2), op(Lda, SR, 4),
        op(Ldy, DIR, 3), op(Lda, DIR, 3), op(Ldx, DIR, 3), op(Lda, DIL, 6),
        op(Tay, IMP, 2), op(Lda, IMM, 2), op(Tax, IMP, 2), op(Plb, STK, 4),
        op(Ldy, ABS, 4), op(Lda, ABS, 4), op(Ldx, ABS, 4), op(Lda, ABL, 5),
        // 0xB0-0xBF
        op(Bcs, REL, 2), op(Lda, DIY, 5), op(Lda, DIN, 5), op(Lda, SRY, 7),
        op(Ldy, DPX, 4), op(Lda, DPX, 4), op(Ldx, DPY, 4), op(Lda, DLY, 6),
        op(Clv, IMP, 2), op(Lda, ABY, 4), op(Tsx, IMP, 2), op(Tyx, IMP, 2),
        op(Ldy, ABX, 4), op(Lda, ABX, 4), op(Ldx, ABY, 4), op(Lda, ALX, 5),
        // 0xC0-0xCF
        op(Cpy, IMM, 2), op(Cmp, DXI, 6), op(Rep, IMM, 3), op(Cmp, SR, 4),
        op(Cpy, DIR, 3), op(Cmp, DIR, 3), op(Dec, DIR, 5), op(Cmp, DIL, 6),
        op(Iny, IMP, 2), op(Cmp, IMM, 2), op(Dex, IMP, 2), op(Wai, IMP, 3),
        op(Cpy, ABS, 4), op(Cmp, ABS, 4), op(Dec, ABS, 6), op(Cmp, ABL, 5),
        // 0xD0-0xDF
        op(Bne, REL, 2), op(Cmp, DIY, 5), op(Cmp, DIN, 5), op(Cmp, SRY, 7),
        op(Pei, DIN, 6), op(Cmp, DPX, 4), op(Dec, DPX, 6), op(Cmp, DLY, 6),
        op(Cld, IMP, 2), op(Cmp, ABY, 4), op(Phx, STK, 3), op(Stp, IMP, 3),
        op(Jml, AIL, 6), op(Cmp, ABX, 4), op(Dec, ABX, 7), op(Cmp, ALX, 5),
        // 0xE0-0xEF
        op(Cpx, IMM, 2), op(Sbc, DXI, 6), op(Sep, IMM, 3), op(Sbc, SR, 4),
        op(Cpx, DIR, 3), op(Sbc, DIR, 3), op(Inc, DIR, 5), op(Sbc, DIL, 6),
        op(Inx, IMP, 2), op(Sbc, IMM, 2), op(Nop, IMP, 2), op(Xba, IMP, 3),
        op(Cpx, ABS, 4), op(Sbc, ABS, 4), op(Inc, ABS, 6), op(Sbc, ABL, 5),
        // 0xF0-0xFF
        op(Beq, REL, 2), op(Sbc, DIY, 5), op(Sbc, DIN, 5), op(Sbc, SRY, 7),
        op(Pea, ABS, 5), op(Sbc, DPX, 4), op(Inc, DPX, 6), op(Sbc, DLY, 6),
        op(Sed, IMP, 2), op(Sbc, ABY, 4), op(Plx, STK, 4), op(Xce, IMP, 2),
        op(Jsr, AXI, 8), op(Sbc, ABX, 4), op(Inc, ABX, 7), op(Sbc, ALX, 5),
    ]
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_256_entries() {
        assert_eq!(OPCODE_TABLE.len(), 256);
    }

    #[test]
    fn brk_is_seven_cycles_stack_mode() {
        let info = OPCODE_TABLE[0x00];
        assert_eq!(info.mnemonic, Mnemonic::Brk);
        assert_eq!(info.mode, AddressingMode::Stack);
        assert_eq!(info.base_cycles, 7);
    }

    #[test]
    fn wdm_is_a_two_cycle_one_operand_nop_like_opcode() {
        let info = OPCODE_TABLE[0x42];
        assert_eq!(info.mnemonic, Mnemonic::Wdm);
        assert_eq!(info.mode, AddressingMode::Immediate);
        assert_eq!(info.base_cycles, 2);
    }

    #[test]
    fn jsl_is_eight_cycles_absolute_long() {
        let info = OPCODE_TABLE[0x22];
        assert_eq!(info.mnemonic, Mnemonic::Jsl);
        assert_eq!(info.mode, AddressingMode::AbsoluteLong);
        assert_eq!(info.base_cycles, 8);
    }

    #[test]
    fn mvn_and_mvp_use_block_move_mode() {
        assert_eq!(OPCODE_TABLE[0x54].mnemonic, Mnemonic::Mvn);
        assert_eq!(OPCODE_TABLE[0x44].mnemonic, Mnemonic::Mvp);
        assert_eq!(OPCODE_TABLE[0x54].mode, AddressingMode::BlockMove);
        assert_eq!(OPCODE_TABLE[0x44].mode, AddressingMode::BlockMove);
    }
}
