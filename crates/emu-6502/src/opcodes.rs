//! 6502 opcode table.
//!
//! A flat 256-entry table built when the CPU is constructed. The regular
//! `aaabbbcc` groups (the eight `cc=01` ALU instructions and the `cc=10`
//! read-modify-write shifts) are generated by iterating the mode field;
//! everything else is listed by hand. Slots left empty are undocumented
//! opcodes and trap as undefined.

/// Operand addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndirectX,
    IndirectY,
    Relative,
}

impl Mode {
    /// Instruction length in bytes including the opcode.
    #[must_use]
    pub const fn length(self) -> u8 {
        match self {
            Mode::Implied | Mode::Accumulator => 1,
            Mode::Immediate
            | Mode::ZeroPage
            | Mode::ZeroPageX
            | Mode::ZeroPageY
            | Mode::IndirectX
            | Mode::IndirectY
            | Mode::Relative => 2,
            Mode::Absolute | Mode::AbsoluteX | Mode::AbsoluteY | Mode::Indirect => 3,
        }
    }
}

/// Instruction semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Adc,
    And,
    Asl,
    Bcc,
    Bcs,
    Beq,
    Bit,
    Bmi,
    Bne,
    Bpl,
    Brk,
    Bvc,
    Bvs,
    Clc,
    Cld,
    Cli,
    Clv,
    Cmp,
    Cpx,
    Cpy,
    Dec,
    Dex,
    Dey,
    Eor,
    Inc,
    Inx,
    Iny,
    Jmp,
    Jsr,
    Lda,
    Ldx,
    Ldy,
    Lsr,
    Nop,
    Ora,
    Pha,
    Php,
    Pla,
    Plp,
    Rol,
    Ror,
    Rti,
    Rts,
    Sbc,
    Sec,
    Sed,
    Sei,
    Sta,
    Stx,
    Sty,
    Tax,
    Tay,
    Tsx,
    Txa,
    Txs,
    Tya,
}

impl Op {
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Op::Adc => "ADC",
            Op::And => "AND",
            Op::Asl => "ASL",
            Op::Bcc => "BCC",
            Op::Bcs => "BCS",
            Op::Beq => "BEQ",
            Op::Bit => "BIT",
            Op::Bmi => "BMI",
            Op::Bne => "BNE",
            Op::Bpl => "BPL",
            Op::Brk => "BRK",
            Op::Bvc => "BVC",
            Op::Bvs => "BVS",
            Op::Clc => "CLC",
            Op::Cld => "CLD",
            Op::Cli => "CLI",
            Op::Clv => "CLV",
            Op::Cmp => "CMP",
            Op::Cpx => "CPX",
            Op::Cpy => "CPY",
            Op::Dec => "DEC",
            Op::Dex => "DEX",
            Op::Dey => "DEY",
            Op::Eor => "EOR",
            Op::Inc => "INC",
            Op::Inx => "INX",
            Op::Iny => "INY",
            Op::Jmp => "JMP",
            Op::Jsr => "JSR",
            Op::Lda => "LDA",
            Op::Ldx => "LDX",
            Op::Ldy => "LDY",
            Op::Lsr => "LSR",
            Op::Nop => "NOP",
            Op::Ora => "ORA",
            Op::Pha => "PHA",
            Op::Php => "PHP",
            Op::Pla => "PLA",
            Op::Plp => "PLP",
            Op::Rol => "ROL",
            Op::Ror => "ROR",
            Op::Rti => "RTI",
            Op::Rts => "RTS",
            Op::Sbc => "SBC",
            Op::Sec => "SEC",
            Op::Sed => "SED",
            Op::Sei => "SEI",
            Op::Sta => "STA",
            Op::Stx => "STX",
            Op::Sty => "STY",
            Op::Tax => "TAX",
            Op::Tay => "TAY",
            Op::Tsx => "TSX",
            Op::Txa => "TXA",
            Op::Txs => "TXS",
            Op::Tya => "TYA",
        }
    }

    /// Instructions that only read their operand pay a cycle when indexing
    /// crosses a page. Stores and read-modify-write always take the long
    /// path, which is already in their base count.
    #[must_use]
    pub const fn pays_page_penalty(self) -> bool {
        matches!(
            self,
            Op::Adc | Op::And | Op::Cmp | Op::Eor | Op::Lda | Op::Ldx | Op::Ldy | Op::Ora | Op::Sbc
        )
    }
}

/// One table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeEntry {
    /// For diagnostics only.
    pub mnemonic: &'static str,
    pub length: u8,
    /// Cycles before page-cross and branch penalties.
    pub cycles: u8,
    pub mode: Mode,
    pub op: Op,
}

/// The full 6502 opcode table.
#[derive(Debug, Clone)]
pub struct OpcodeTable {
    entries: [Option<OpcodeEntry>; 256],
}

/// `cc=01` group, indexed by `aaa`.
const ALU_GROUP: [Op; 8] = [
    Op::Ora,
    Op::And,
    Op::Eor,
    Op::Adc,
    Op::Sta,
    Op::Lda,
    Op::Cmp,
    Op::Sbc,
];

/// `cc=01` modes and read cycle counts, indexed by `bbb`.
const ALU_MODES: [(Mode, u8); 8] = [
    (Mode::IndirectX, 6),
    (Mode::ZeroPage, 3),
    (Mode::Immediate, 2),
    (Mode::Absolute, 4),
    (Mode::IndirectY, 5),
    (Mode::ZeroPageX, 4),
    (Mode::AbsoluteY, 4),
    (Mode::AbsoluteX, 4),
];

/// `cc=10` read-modify-write modes, indexed by `bbb`.
const RMW_MODES: [Option<(Mode, u8)>; 8] = [
    None,
    Some((Mode::ZeroPage, 5)),
    Some((Mode::Accumulator, 2)),
    Some((Mode::Absolute, 6)),
    None,
    Some((Mode::ZeroPageX, 6)),
    None,
    Some((Mode::AbsoluteX, 7)),
];

impl Default for OpcodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl OpcodeTable {
    #[must_use]
    pub fn new() -> Self {
        let mut table = Self {
            entries: [None; 256],
        };
        table.alu_group();
        table.rmw_group();
        table.index_register_group();
        table.branches();
        table.singles();
        table
    }

    #[must_use]
    pub fn get(&self, opcode: u8) -> Option<&OpcodeEntry> {
        self.entries[usize::from(opcode)].as_ref()
    }

    /// Every defined slot, in opcode order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &OpcodeEntry)> {
        (0..=255u8).filter_map(|opcode| self.get(opcode).map(|entry| (opcode, entry)))
    }

    fn register(&mut self, opcode: u8, op: Op, mode: Mode, cycles: u8) {
        self.entries[usize::from(opcode)] = Some(OpcodeEntry {
            mnemonic: op.mnemonic(),
            length: mode.length(),
            cycles,
            mode,
            op,
        });
    }

    fn alu_group(&mut self) {
        for (aaa, op) in (0u8..).zip(ALU_GROUP) {
            for (bbb, (mode, cycles)) in (0u8..).zip(ALU_MODES) {
                let opcode = (aaa << 5) | (bbb << 2) | 0b01;
                match (op, mode) {
                    (Op::Sta, Mode::Immediate) => {}
                    (Op::Sta, Mode::AbsoluteX | Mode::AbsoluteY) => {
                        self.register(opcode, op, mode, 5);
                    }
                    (Op::Sta, Mode::IndirectY) => self.register(opcode, op, mode, 6),
                    _ => self.register(opcode, op, mode, cycles),
                }
            }
        }
    }

    fn rmw_group(&mut self) {
        let ops = [
            (0u8, Op::Asl),
            (1, Op::Rol),
            (2, Op::Lsr),
            (3, Op::Ror),
            (6, Op::Dec),
            (7, Op::Inc),
        ];
        for (aaa, op) in ops {
            for (bbb, slot) in (0u8..).zip(RMW_MODES) {
                let Some((mode, cycles)) = slot else { continue };
                // DEC A / INC A don't exist on NMOS; $CA/$EA are DEX/NOP.
                if mode == Mode::Accumulator && matches!(op, Op::Dec | Op::Inc) {
                    continue;
                }
                self.register((aaa << 5) | (bbb << 2) | 0b10, op, mode, cycles);
            }
        }
    }

    fn index_register_group(&mut self) {
        use Mode::{Absolute, AbsoluteX, AbsoluteY, Immediate, ZeroPage, ZeroPageX, ZeroPageY};

        let entries = [
            (0xA2, Op::Ldx, Immediate, 2),
            (0xA6, Op::Ldx, ZeroPage, 3),
            (0xB6, Op::Ldx, ZeroPageY, 4),
            (0xAE, Op::Ldx, Absolute, 4),
            (0xBE, Op::Ldx, AbsoluteY, 4),
            (0x86, Op::Stx, ZeroPage, 3),
            (0x96, Op::Stx, ZeroPageY, 4),
            (0x8E, Op::Stx, Absolute, 4),
            (0xA0, Op::Ldy, Immediate, 2),
            (0xA4, Op::Ldy, ZeroPage, 3),
            (0xB4, Op::Ldy, ZeroPageX, 4),
            (0xAC, Op::Ldy, Absolute, 4),
            (0xBC, Op::Ldy, AbsoluteX, 4),
            (0x84, Op::Sty, ZeroPage, 3),
            (0x94, Op::Sty, ZeroPageX, 4),
            (0x8C, Op::Sty, Absolute, 4),
            (0xE0, Op::Cpx, Immediate, 2),
            (0xE4, Op::Cpx, ZeroPage, 3),
            (0xEC, Op::Cpx, Absolute, 4),
            (0xC0, Op::Cpy, Immediate, 2),
            (0xC4, Op::Cpy, ZeroPage, 3),
            (0xCC, Op::Cpy, Absolute, 4),
            (0x24, Op::Bit, ZeroPage, 3),
            (0x2C, Op::Bit, Absolute, 4),
        ];
        for (opcode, op, mode, cycles) in entries {
            self.register(opcode, op, mode, cycles);
        }
    }

    fn branches(&mut self) {
        // xxy10000: xx selects the flag, y the value that takes the branch.
        let ops = [
            Op::Bpl,
            Op::Bmi,
            Op::Bvc,
            Op::Bvs,
            Op::Bcc,
            Op::Bcs,
            Op::Bne,
            Op::Beq,
        ];
        for (i, op) in (0u8..).zip(ops) {
            self.register((i << 5) | 0x10, op, Mode::Relative, 2);
        }
    }

    fn singles(&mut self) {
        use Mode::{Absolute, Implied, Indirect};

        let entries = [
            (0x00, Op::Brk, Implied, 7),
            (0x08, Op::Php, Implied, 3),
            (0x18, Op::Clc, Implied, 2),
            (0x20, Op::Jsr, Absolute, 6),
            (0x28, Op::Plp, Implied, 4),
            (0x38, Op::Sec, Implied, 2),
            (0x40, Op::Rti, Implied, 6),
            (0x48, Op::Pha, Implied, 3),
            (0x4C, Op::Jmp, Absolute, 3),
            (0x58, Op::Cli, Implied, 2),
            (0x60, Op::Rts, Implied, 6),
            (0x68, Op::Pla, Implied, 4),
            (0x6C, Op::Jmp, Indirect, 5),
            (0x78, Op::Sei, Implied, 2),
            (0x88, Op::Dey, Implied, 2),
            (0x8A, Op::Txa, Implied, 2),
            (0x98, Op::Tya, Implied, 2),
            (0x9A, Op::Txs, Implied, 2),
            (0xA8, Op::Tay, Implied, 2),
            (0xAA, Op::Tax, Implied, 2),
            (0xB8, Op::Clv, Implied, 2),
            (0xBA, Op::Tsx, Implied, 2),
            (0xC8, Op::Iny, Implied, 2),
            (0xCA, Op::Dex, Implied, 2),
            (0xD8, Op::Cld, Implied, 2),
            (0xE8, Op::Inx, Implied, 2),
            (0xEA, Op::Nop, Implied, 2),
            (0xF8, Op::Sed, Implied, 2),
        ];
        for (opcode, op, mode, cycles) in entries {
            self.register(opcode, op, mode, cycles);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_instruction_set_is_complete() {
        let table = OpcodeTable::new();
        assert_eq!(table.iter().count(), 151);
        for (opcode, entry) in table.iter() {
            assert!(!entry.mnemonic.is_empty(), "{opcode:02X}");
            assert!(entry.cycles >= 2, "{opcode:02X}");
            assert_eq!(entry.length, entry.mode.length(), "{opcode:02X}");
        }
    }

    #[test]
    fn generated_groups_land_on_the_right_opcodes() {
        let table = OpcodeTable::new();
        let check = |opcode: u8, mnemonic: &str, mode: Mode, cycles: u8| {
            let entry = table.get(opcode).unwrap();
            assert_eq!((entry.mnemonic, entry.mode, entry.cycles), (mnemonic, mode, cycles));
        };

        check(0xA9, "LDA", Mode::Immediate, 2);
        check(0xB1, "LDA", Mode::IndirectY, 5);
        check(0x91, "STA", Mode::IndirectY, 6);
        check(0x9D, "STA", Mode::AbsoluteX, 5);
        check(0x61, "ADC", Mode::IndirectX, 6);
        check(0xFD, "SBC", Mode::AbsoluteX, 4);
        check(0x0A, "ASL", Mode::Accumulator, 2);
        check(0x7E, "ROR", Mode::AbsoluteX, 7);
        check(0xC6, "DEC", Mode::ZeroPage, 5);
        check(0xFE, "INC", Mode::AbsoluteX, 7);
        check(0xF0, "BEQ", Mode::Relative, 2);
        check(0x10, "BPL", Mode::Relative, 2);
        check(0x6C, "JMP", Mode::Indirect, 5);
    }

    #[test]
    fn undocumented_slots_are_empty() {
        let table = OpcodeTable::new();
        for opcode in [0x02, 0x03, 0x1A, 0x80, 0x89, 0x9E, 0xA3, 0xEB, 0xFF] {
            assert!(table.get(opcode).is_none(), "{opcode:02X}");
        }
    }
}
