//! Z80 opcode table.
//!
//! Seven 256-entry pages laid end to end: unprefixed, CB, DD, ED, FD,
//! DDCB and FDCB. Families are generated from the x/y/z/p/q fields of the
//! opcode byte. The DD and FD pages are derived from the unprefixed page by
//! substituting IX or IY for HL.

use std::fmt;

use crate::registers::Index;

/// An opcode prefix, selecting a page of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    Cb,
    Dd,
    Ed,
    Fd,
    DdCb,
    FdCb,
}

impl Prefix {
    const fn page(self) -> usize {
        match self {
            Self::Cb => 1,
            Self::Dd => 2,
            Self::Ed => 3,
            Self::Fd => 4,
            Self::DdCb => 5,
            Self::FdCb => 6,
        }
    }

    /// The prefix bytes as they appear in memory.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Cb => 0xCB,
            Self::Dd => 0xDD,
            Self::Ed => 0xED,
            Self::Fd => 0xFD,
            Self::DdCb => 0xDDCB,
            Self::FdCb => 0xFDCB,
        }
    }

    const fn len(self) -> u8 {
        match self {
            Self::DdCb | Self::FdCb => 2,
            _ => 1,
        }
    }
}

const PAGES: usize = 7;

// ============================================================================
// Operands
// ============================================================================

/// 8-bit operand. `Mem` is the byte at the resolved address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum R8 {
    B,
    C,
    D,
    E,
    H,
    L,
    Mem,
    A,
    /// High byte of IX or IY.
    IdxH,
    /// Low byte of IX or IY.
    IdxL,
}

impl R8 {
    const TABLE: [Self; 8] = [
        Self::B,
        Self::C,
        Self::D,
        Self::E,
        Self::H,
        Self::L,
        Self::Mem,
        Self::A,
    ];

    const fn from_code(code: u8) -> Self {
        Self::TABLE[(code & 7) as usize]
    }

    /// H and L become the index halves under DD/FD.
    const fn indexed(self) -> Self {
        match self {
            Self::H => Self::IdxH,
            Self::L => Self::IdxL,
            other => other,
        }
    }
}

/// 16-bit register pair. `Hl` is HL, IX or IY depending on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum R16 {
    Bc,
    De,
    Hl,
    Sp,
    Af,
}

impl R16 {
    /// BC, DE, HL, SP
    const fn rp(p: u8) -> Self {
        match p & 3 {
            0 => Self::Bc,
            1 => Self::De,
            2 => Self::Hl,
            _ => Self::Sp,
        }
    }

    /// BC, DE, HL, AF
    const fn rp2(p: u8) -> Self {
        match p & 3 {
            0 => Self::Bc,
            1 => Self::De,
            2 => Self::Hl,
            _ => Self::Af,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Nz,
    Z,
    Nc,
    C,
    Po,
    Pe,
    P,
    M,
}

impl Cond {
    const TABLE: [Self; 8] = [
        Self::Nz,
        Self::Z,
        Self::Nc,
        Self::C,
        Self::Po,
        Self::Pe,
        Self::P,
        Self::M,
    ];

    const fn from_code(code: u8) -> Self {
        Self::TABLE[(code & 7) as usize]
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Nz => "NZ",
            Self::Z => "Z",
            Self::Nc => "NC",
            Self::C => "C",
            Self::Po => "PO",
            Self::Pe => "PE",
            Self::P => "P",
            Self::M => "M",
        }
    }
}

/// Accumulator operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alu {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

impl Alu {
    const TABLE: [Self; 8] = [
        Self::Add,
        Self::Adc,
        Self::Sub,
        Self::Sbc,
        Self::And,
        Self::Xor,
        Self::Or,
        Self::Cp,
    ];

    const fn name(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Adc => "ADC",
            Self::Sub => "SUB",
            Self::Sbc => "SBC",
            Self::And => "AND",
            Self::Xor => "XOR",
            Self::Or => "OR",
            Self::Cp => "CP",
        }
    }
}

/// CB-page rotates and shifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rot {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Sll,
    Srl,
}

impl Rot {
    const TABLE: [Self; 8] = [
        Self::Rlc,
        Self::Rrc,
        Self::Rl,
        Self::Rr,
        Self::Sla,
        Self::Sra,
        Self::Sll,
        Self::Srl,
    ];

    const fn name(self) -> &'static str {
        match self {
            Self::Rlc => "RLC",
            Self::Rrc => "RRC",
            Self::Rl => "RL",
            Self::Rr => "RR",
            Self::Sla => "SLA",
            Self::Sra => "SRA",
            Self::Sll => "SLL",
            Self::Srl => "SRL",
        }
    }
}

/// Block instruction families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOp {
    Ld,
    Cp,
    In,
    Out,
}

/// One element of a block instruction, and whether it repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub op: BlockOp,
    pub decrement: bool,
    pub repeat: bool,
}

impl Block {
    const fn name(self) -> &'static str {
        match (self.op, self.decrement, self.repeat) {
            (BlockOp::Ld, false, false) => "LDI",
            (BlockOp::Ld, false, true) => "LDIR",
            (BlockOp::Ld, true, false) => "LDD",
            (BlockOp::Ld, true, true) => "LDDR",
            (BlockOp::Cp, false, false) => "CPI",
            (BlockOp::Cp, false, true) => "CPIR",
            (BlockOp::Cp, true, false) => "CPD",
            (BlockOp::Cp, true, true) => "CPDR",
            (BlockOp::In, false, false) => "INI",
            (BlockOp::In, false, true) => "INIR",
            (BlockOp::In, true, false) => "IND",
            (BlockOp::In, true, true) => "INDR",
            (BlockOp::Out, false, false) => "OUTI",
            (BlockOp::Out, false, true) => "OTIR",
            (BlockOp::Out, true, false) => "OUTD",
            (BlockOp::Out, true, true) => "OTDR",
        }
    }
}

// ============================================================================
// Entries
// ============================================================================

/// How the operand is resolved before the operation runs.
///
/// Immediate words and relative targets land in the CPU's address latch;
/// immediate bytes land in its operand latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Implied,
    Imm8,
    Imm16,
    /// Signed displacement from the next instruction.
    Relative,
    /// Address from HL.
    Hl,
    /// Address from HL plus an immediate byte (`LD (HL),n`).
    HlImm8,
    /// `(IX+d)`: fetch the displacement.
    Indexed,
    /// `(IX+d),n`
    IndexedImm8,
    /// DDCB/FDCB: displacement was fetched with the prefix.
    IndexedCb,
}

impl Mode {
    /// Bytes fetched after the opcode.
    const fn operand_bytes(self) -> u8 {
        match self {
            Self::Implied | Self::Hl => 0,
            // DDCB/FDCB count the displacement here although it precedes the
            // opcode byte.
            Self::Imm8 | Self::Relative | Self::HlImm8 | Self::Indexed | Self::IndexedCb => 1,
            Self::Imm16 | Self::IndexedImm8 => 2,
        }
    }

    /// Indexed forms, whose address is IX/IY plus a displacement.
    pub(crate) const fn is_indexed(self) -> bool {
        matches!(
            self,
            Self::Indexed | Self::IndexedImm8 | Self::IndexedCb
        )
    }
}

/// What an instruction does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Nop,
    Halt,
    Di,
    Ei,

    // 8-bit loads
    Ld8 { dst: R8, src: R8 },
    Ld8Imm(R8),
    /// `LD A,(BC)` / `LD A,(DE)`
    LdAFromPair(R16),
    /// `LD (BC),A` / `LD (DE),A`
    LdPairFromA(R16),
    LdAAbs,
    LdAbsA,
    LdAI,
    LdAR,
    LdIA,
    LdRA,

    // 16-bit loads and exchanges
    Ld16Imm(R16),
    Ld16FromAbs(R16),
    LdAbsFrom16(R16),
    LdSpHl,
    Push(R16),
    Pop(R16),
    ExAfAf,
    ExDeHl,
    Exx,
    ExSpHl,

    // Arithmetic
    Alu8 { op: Alu, src: R8 },
    Alu8Imm(Alu),
    Inc8(R8),
    Dec8(R8),
    Inc16(R16),
    Dec16(R16),
    Add16(R16),
    Adc16(R16),
    Sbc16(R16),
    Daa,
    Cpl,
    Neg,
    Ccf,
    Scf,

    // Rotates, shifts and bits
    /// `RLCA`, `RRCA`, `RLA`, `RRA`
    RotA(Rot),
    /// `copy` is the undocumented DDCB register that also receives the result.
    Rot { op: Rot, r: R8, copy: Option<R8> },
    Bit { bit: u8, r: R8 },
    Res { bit: u8, r: R8, copy: Option<R8> },
    Set { bit: u8, r: R8, copy: Option<R8> },
    Rld,
    Rrd,

    // Control flow
    Jp(Option<Cond>),
    JpHl,
    Jr(Option<Cond>),
    Djnz,
    Call(Option<Cond>),
    Ret(Option<Cond>),
    Reti,
    Retn,
    Rst(u8),

    // I/O
    InAImm,
    /// `IN r,(C)`; `None` only sets flags.
    InReg(Option<R8>),
    OutImmA,
    /// `OUT (C),r`; `None` writes zero.
    OutReg(Option<R8>),
    Block(Block),
    Im(u8),
}

impl Op {
    /// Substitute the index halves for H and L.
    fn indexed(self) -> Self {
        match self {
            Self::Ld8 { dst, src } => Self::Ld8 {
                dst: dst.indexed(),
                src: src.indexed(),
            },
            Self::Ld8Imm(r) => Self::Ld8Imm(r.indexed()),
            Self::Alu8 { op, src } => Self::Alu8 {
                op,
                src: src.indexed(),
            },
            Self::Inc8(r) => Self::Inc8(r.indexed()),
            Self::Dec8(r) => Self::Dec8(r.indexed()),
            other => other,
        }
    }
}

/// One slot of the opcode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeEntry {
    /// Base mnemonic, e.g. `LD`. For diagnostics only; see the `Display`
    /// impl for the full form.
    pub name: &'static str,
    /// Instruction length in bytes, prefixes included.
    pub length: u8,
    /// T-states, prefixes included, before conditional and repeat
    /// extensions.
    pub cycles: u8,
    pub mode: Mode,
    pub op: Op,
    /// Pair standing in for HL.
    pub index: Index,
}

// ============================================================================
// Table
// ============================================================================

/// The complete instruction set.
pub struct OpcodeTable {
    entries: Box<[Option<OpcodeEntry>]>,
}

impl Default for OpcodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl OpcodeTable {
    #[must_use]
    pub fn new() -> Self {
        let mut table = Self {
            entries: vec![None; PAGES * 256].into_boxed_slice(),
        };
        for opcode in 0..=0xFF_u8 {
            if let Some(def) = unprefixed(opcode) {
                table.insert(None, opcode, def, Index::Hl);
                table.insert(Some(Prefix::Dd), opcode, def.with_index(), Index::Ix);
                table.insert(Some(Prefix::Fd), opcode, def.with_index(), Index::Iy);
            }
            table.insert(Some(Prefix::Cb), opcode, bit_page(opcode), Index::Hl);
            table.insert(Some(Prefix::DdCb), opcode, indexed_bit_page(opcode), Index::Ix);
            table.insert(Some(Prefix::FdCb), opcode, indexed_bit_page(opcode), Index::Iy);
            table.insert(Some(Prefix::Ed), opcode, extended(opcode), Index::Hl);
        }
        table
    }

    fn insert(&mut self, prefix: Option<Prefix>, opcode: u8, def: Def, index: Index) {
        let prefix_len = prefix.map_or(0, Prefix::len);
        self.entries[slot(prefix, opcode)] = Some(OpcodeEntry {
            name: def.name,
            length: prefix_len + 1 + def.mode.operand_bytes(),
            cycles: def.cycles,
            mode: def.mode,
            op: def.op,
            index,
        });
    }

    /// Entry for `opcode` on the page selected by `prefix`, or `None` if the
    /// slot is undefined.
    #[must_use]
    pub fn get(&self, prefix: Option<Prefix>, opcode: u8) -> Option<&OpcodeEntry> {
        self.entries[slot(prefix, opcode)].as_ref()
    }

    /// Defined entries of one page.
    pub fn page(&self, prefix: Option<Prefix>) -> impl Iterator<Item = (u8, &OpcodeEntry)> {
        let base = slot(prefix, 0);
        self.entries[base..base + 256]
            .iter()
            .enumerate()
            .filter_map(|(opcode, entry)| entry.as_ref().map(|e| (opcode as u8, e)))
    }
}

fn slot(prefix: Option<Prefix>, opcode: u8) -> usize {
    prefix.map_or(0, Prefix::page) * 256 + usize::from(opcode)
}

/// Table row before the prefix-dependent fields are filled in.
#[derive(Clone, Copy)]
struct Def {
    name: &'static str,
    cycles: u8,
    mode: Mode,
    op: Op,
}

const fn def(name: &'static str, cycles: u8, mode: Mode, op: Op) -> Def {
    Def {
        name,
        cycles,
        mode,
        op,
    }
}

impl Def {
    /// The DD/FD form: `(HL)` becomes `(IX+d)` at +12 T-states (+9 with an
    /// immediate byte); anything else pays 4 T-states for the prefix.
    fn with_index(self) -> Self {
        match self.mode {
            Mode::Hl => Self {
                cycles: self.cycles + 12,
                mode: Mode::Indexed,
                ..self
            },
            Mode::HlImm8 => Self {
                cycles: self.cycles + 9,
                mode: Mode::IndexedImm8,
                ..self
            },
            _ => Self {
                cycles: self.cycles + 4,
                op: self.op.indexed(),
                ..self
            },
        }
    }
}

// ============================================================================
// Page builders
// ============================================================================

/// x = bits 7-6, y = bits 5-3, z = bits 2-0, p = y >> 1, q = y & 1
const fn fields(opcode: u8) -> (u8, u8, u8, u8, u8) {
    let y = (opcode >> 3) & 7;
    (opcode >> 6, y, opcode & 7, y >> 1, y & 1)
}

fn unprefixed(opcode: u8) -> Option<Def> {
    use Mode::{Hl, HlImm8, Imm16, Imm8, Implied, Relative};

    let (x, y, z, p, q) = fields(opcode);
    let r_mode = |r: R8| if r == R8::Mem { Hl } else { Implied };

    let def = match (x, z) {
        (0, 0) => match y {
            0 => def("NOP", 4, Implied, Op::Nop),
            1 => def("EX", 4, Implied, Op::ExAfAf),
            2 => def("DJNZ", 8, Relative, Op::Djnz),
            3 => def("JR", 12, Relative, Op::Jr(None)),
            _ => def("JR", 7, Relative, Op::Jr(Some(Cond::from_code(y - 4)))),
        },
        (0, 1) if q == 0 => def("LD", 10, Imm16, Op::Ld16Imm(R16::rp(p))),
        (0, 1) => def("ADD", 11, Implied, Op::Add16(R16::rp(p))),
        (0, 2) => match (q, p) {
            (0, 0) => def("LD", 7, Implied, Op::LdPairFromA(R16::Bc)),
            (0, 1) => def("LD", 7, Implied, Op::LdPairFromA(R16::De)),
            (0, 2) => def("LD", 16, Imm16, Op::LdAbsFrom16(R16::Hl)),
            (0, _) => def("LD", 13, Imm16, Op::LdAbsA),
            (_, 0) => def("LD", 7, Implied, Op::LdAFromPair(R16::Bc)),
            (_, 1) => def("LD", 7, Implied, Op::LdAFromPair(R16::De)),
            (_, 2) => def("LD", 16, Imm16, Op::Ld16FromAbs(R16::Hl)),
            _ => def("LD", 13, Imm16, Op::LdAAbs),
        },
        (0, 3) if q == 0 => def("INC", 6, Implied, Op::Inc16(R16::rp(p))),
        (0, 3) => def("DEC", 6, Implied, Op::Dec16(R16::rp(p))),
        (0, 4 | 5) => {
            let r = R8::from_code(y);
            let (name, op) = if z == 4 {
                ("INC", Op::Inc8(r))
            } else {
                ("DEC", Op::Dec8(r))
            };
            if r == R8::Mem {
                def(name, 11, Hl, op)
            } else {
                def(name, 4, Implied, op)
            }
        }
        (0, 6) => {
            let r = R8::from_code(y);
            if r == R8::Mem {
                def("LD", 10, HlImm8, Op::Ld8Imm(r))
            } else {
                def("LD", 7, Imm8, Op::Ld8Imm(r))
            }
        }
        (0, _) => match y {
            0 => def("RLCA", 4, Implied, Op::RotA(Rot::Rlc)),
            1 => def("RRCA", 4, Implied, Op::RotA(Rot::Rrc)),
            2 => def("RLA", 4, Implied, Op::RotA(Rot::Rl)),
            3 => def("RRA", 4, Implied, Op::RotA(Rot::Rr)),
            4 => def("DAA", 4, Implied, Op::Daa),
            5 => def("CPL", 4, Implied, Op::Cpl),
            6 => def("SCF", 4, Implied, Op::Scf),
            _ => def("CCF", 4, Implied, Op::Ccf),
        },

        (1, 6) if y == 6 => def("HALT", 4, Implied, Op::Halt),
        (1, _) => {
            let (dst, src) = (R8::from_code(y), R8::from_code(z));
            let mode = if dst == R8::Mem { Hl } else { r_mode(src) };
            let cycles = if mode == Hl { 7 } else { 4 };
            def("LD", cycles, mode, Op::Ld8 { dst, src })
        }

        (2, _) => {
            let (op, src) = (Alu::TABLE[y as usize], R8::from_code(z));
            let cycles = if src == R8::Mem { 7 } else { 4 };
            def(op.name(), cycles, r_mode(src), Op::Alu8 { op, src })
        }

        (_, 0) => def("RET", 5, Implied, Op::Ret(Some(Cond::from_code(y)))),
        (_, 1) => match (q, p) {
            (0, _) => def("POP", 10, Implied, Op::Pop(R16::rp2(p))),
            (_, 0) => def("RET", 10, Implied, Op::Ret(None)),
            (_, 1) => def("EXX", 4, Implied, Op::Exx),
            (_, 2) => def("JP", 4, Implied, Op::JpHl),
            _ => def("LD", 6, Implied, Op::LdSpHl),
        },
        (_, 2) => def("JP", 10, Imm16, Op::Jp(Some(Cond::from_code(y)))),
        (_, 3) => match y {
            0 => def("JP", 10, Imm16, Op::Jp(None)),
            1 => return None, // CB prefix
            2 => def("OUT", 11, Imm8, Op::OutImmA),
            3 => def("IN", 11, Imm8, Op::InAImm),
            4 => def("EX", 19, Implied, Op::ExSpHl),
            5 => def("EX", 4, Implied, Op::ExDeHl),
            6 => def("DI", 4, Implied, Op::Di),
            _ => def("EI", 4, Implied, Op::Ei),
        },
        (_, 4) => def("CALL", 10, Imm16, Op::Call(Some(Cond::from_code(y)))),
        (_, 5) => match (q, p) {
            (0, _) => def("PUSH", 11, Implied, Op::Push(R16::rp2(p))),
            (_, 0) => def("CALL", 17, Imm16, Op::Call(None)),
            _ => return None, // DD, ED, FD prefixes
        },
        (_, 6) => {
            let op = Alu::TABLE[y as usize];
            def(op.name(), 7, Imm8, Op::Alu8Imm(op))
        }
        _ => def("RST", 11, Implied, Op::Rst(y * 8)),
    };
    Some(def)
}

fn bit_page(opcode: u8) -> Def {
    let (x, y, z, _, _) = fields(opcode);
    let r = R8::from_code(z);
    let mem = r == R8::Mem;
    let mode = if mem { Mode::Hl } else { Mode::Implied };
    let rmw = if mem { 15 } else { 8 };

    match x {
        0 => {
            let op = Rot::TABLE[y as usize];
            def(op.name(), rmw, mode, Op::Rot { op, r, copy: None })
        }
        1 => def("BIT", if mem { 12 } else { 8 }, mode, Op::Bit { bit: y, r }),
        2 => def("RES", rmw, mode, Op::Res { bit: y, r, copy: None }),
        _ => def("SET", rmw, mode, Op::Set { bit: y, r, copy: None }),
    }
}

/// DDCB/FDCB. Every form works on `(IX+d)`; the undocumented register
/// forms also copy the result into a register.
fn indexed_bit_page(opcode: u8) -> Def {
    let (x, y, z, _, _) = fields(opcode);
    let r = R8::Mem;
    let copy = (z != 6).then(|| R8::from_code(z));
    let mode = Mode::IndexedCb;

    match x {
        0 => {
            let op = Rot::TABLE[y as usize];
            def(op.name(), 23, mode, Op::Rot { op, r, copy })
        }
        1 => def("BIT", 20, mode, Op::Bit { bit: y, r }),
        2 => def("RES", 23, mode, Op::Res { bit: y, r, copy }),
        _ => def("SET", 23, mode, Op::Set { bit: y, r, copy }),
    }
}

/// ED page. Slots with no instruction behave as an 8 T-state `NOP` that
/// leaves the following byte to be fetched as a fresh opcode.
fn extended(opcode: u8) -> Def {
    use Mode::{Hl, Imm16, Implied};

    let (x, y, z, p, q) = fields(opcode);
    match (x, z) {
        (1, 0) => {
            let r = (y != 6).then(|| R8::from_code(y));
            def("IN", 12, Implied, Op::InReg(r))
        }
        (1, 1) => {
            let r = (y != 6).then(|| R8::from_code(y));
            def("OUT", 12, Implied, Op::OutReg(r))
        }
        (1, 2) if q == 0 => def("SBC", 15, Implied, Op::Sbc16(R16::rp(p))),
        (1, 2) => def("ADC", 15, Implied, Op::Adc16(R16::rp(p))),
        (1, 3) if q == 0 => def("LD", 20, Imm16, Op::LdAbsFrom16(R16::rp(p))),
        (1, 3) => def("LD", 20, Imm16, Op::Ld16FromAbs(R16::rp(p))),
        (1, 4) => def("NEG", 8, Implied, Op::Neg),
        (1, 5) if y == 1 => def("RETI", 14, Implied, Op::Reti),
        (1, 5) => def("RETN", 14, Implied, Op::Retn),
        (1, 6) => {
            let mode = [0, 0, 1, 2, 0, 0, 1, 2][y as usize];
            def("IM", 8, Implied, Op::Im(mode))
        }
        (1, _) => match y {
            0 => def("LD", 9, Implied, Op::LdIA),
            1 => def("LD", 9, Implied, Op::LdRA),
            2 => def("LD", 9, Implied, Op::LdAI),
            3 => def("LD", 9, Implied, Op::LdAR),
            4 => def("RRD", 18, Hl, Op::Rrd),
            5 => def("RLD", 18, Hl, Op::Rld),
            _ => def("NOP", 8, Implied, Op::Nop),
        },
        (2, 0..=3) if y >= 4 => {
            let block = Block {
                op: [BlockOp::Ld, BlockOp::Cp, BlockOp::In, BlockOp::Out][z as usize],
                decrement: y & 1 != 0,
                repeat: y >= 6,
            };
            def(block.name(), 16, Implied, Op::Block(block))
        }
        _ => def("NOP", 8, Implied, Op::Nop),
    }
}

// ============================================================================
// Disassembly
// ============================================================================

impl OpcodeEntry {
    fn r8(&self, r: R8) -> String {
        let ix = self.index.name();
        match r {
            R8::B => "B".into(),
            R8::C => "C".into(),
            R8::D => "D".into(),
            R8::E => "E".into(),
            R8::H => "H".into(),
            R8::L => "L".into(),
            R8::A => "A".into(),
            R8::IdxH => format!("{ix}H"),
            R8::IdxL => format!("{ix}L"),
            R8::Mem if self.index == Index::Hl => "(HL)".into(),
            R8::Mem => format!("({ix}+d)"),
        }
    }

    fn r16(&self, rr: R16) -> &'static str {
        match rr {
            R16::Bc => "BC",
            R16::De => "DE",
            R16::Hl => self.index.name(),
            R16::Sp => "SP",
            R16::Af => "AF",
        }
    }

    fn operands(&self) -> String {
        let cond = |c: Option<Cond>, rest: &str| match c {
            Some(c) if rest.is_empty() => c.name().to_string(),
            Some(c) => format!("{},{rest}", c.name()),
            None => rest.to_string(),
        };
        let copy = |copy: Option<R8>| copy.map_or(String::new(), |r| format!(",{}", self.r8(r)));

        match self.op {
            Op::Ld8 { dst, src } => format!("{},{}", self.r8(dst), self.r8(src)),
            Op::Ld8Imm(r) => format!("{},n", self.r8(r)),
            Op::LdAFromPair(rr) => format!("A,({})", self.r16(rr)),
            Op::LdPairFromA(rr) => format!("({}),A", self.r16(rr)),
            Op::LdAAbs => "A,(nn)".into(),
            Op::LdAbsA => "(nn),A".into(),
            Op::LdAI => "A,I".into(),
            Op::LdAR => "A,R".into(),
            Op::LdIA => "I,A".into(),
            Op::LdRA => "R,A".into(),
            Op::Ld16Imm(rr) => format!("{},nn", self.r16(rr)),
            Op::Ld16FromAbs(rr) => format!("{},(nn)", self.r16(rr)),
            Op::LdAbsFrom16(rr) => format!("(nn),{}", self.r16(rr)),
            Op::LdSpHl => format!("SP,{}", self.index.name()),
            Op::Push(rr) | Op::Pop(rr) | Op::Inc16(rr) | Op::Dec16(rr) => self.r16(rr).into(),
            Op::ExAfAf => "AF,AF'".into(),
            Op::ExDeHl => "DE,HL".into(),
            Op::ExSpHl => format!("(SP),{}", self.index.name()),
            Op::Alu8 { op, src } => match op {
                Alu::Add | Alu::Adc | Alu::Sbc => format!("A,{}", self.r8(src)),
                _ => self.r8(src),
            },
            Op::Alu8Imm(op) => match op {
                Alu::Add | Alu::Adc | Alu::Sbc => "A,n".into(),
                _ => "n".into(),
            },
            Op::Inc8(r) | Op::Dec8(r) => self.r8(r),
            Op::Add16(rr) | Op::Adc16(rr) | Op::Sbc16(rr) => {
                format!("{},{}", self.index.name(), self.r16(rr))
            }
            Op::Rot { r, copy: c, .. } => format!("{}{}", self.r8(r), copy(c)),
            Op::Bit { bit, r } => format!("{bit},{}", self.r8(r)),
            Op::Res { bit, r, copy: c } | Op::Set { bit, r, copy: c } => {
                format!("{bit},{}{}", self.r8(r), copy(c))
            }
            Op::Jp(c) | Op::Call(c) => cond(c, "nn"),
            Op::JpHl => format!("({})", self.index.name()),
            Op::Jr(c) => cond(c, "e"),
            Op::Djnz => "e".into(),
            Op::Ret(c) => cond(c, ""),
            Op::Rst(n) => format!("{n:02X}H"),
            Op::InAImm => "A,(n)".into(),
            Op::InReg(r) => format!("{},(C)", r.map_or("F".into(), |r| self.r8(r))),
            Op::OutImmA => "(n),A".into(),
            Op::OutReg(r) => format!("(C),{}", r.map_or("0".into(), |r| self.r8(r))),
            Op::Im(mode) => mode.to_string(),
            _ => String::new(),
        }
    }
}

impl fmt::Display for OpcodeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operands = self.operands();
        if operands.is_empty() {
            f.write_str(self.name)
        } else {
            write!(f, "{} {operands}", self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(prefix: Option<Prefix>, opcode: u8) -> OpcodeEntry {
        *OpcodeTable::new()
            .get(prefix, opcode)
            .unwrap_or_else(|| panic!("{opcode:02X} undefined"))
    }

    #[test]
    fn page_sizes() {
        let table = OpcodeTable::new();
        // Four prefix bytes are not instructions on the main page, and DD/FD
        // inherit the same gaps.
        assert_eq!(table.page(None).count(), 252);
        assert_eq!(table.page(Some(Prefix::Dd)).count(), 252);
        assert_eq!(table.page(Some(Prefix::Fd)).count(), 252);
        assert_eq!(table.page(Some(Prefix::Cb)).count(), 256);
        assert_eq!(table.page(Some(Prefix::DdCb)).count(), 256);
        assert_eq!(table.page(Some(Prefix::FdCb)).count(), 256);
        assert_eq!(table.page(Some(Prefix::Ed)).count(), 256);
    }

    #[test]
    fn every_entry_is_named_and_sized() {
        let table = OpcodeTable::new();
        for prefix in [
            None,
            Some(Prefix::Cb),
            Some(Prefix::Dd),
            Some(Prefix::Ed),
            Some(Prefix::Fd),
            Some(Prefix::DdCb),
            Some(Prefix::FdCb),
        ] {
            for (opcode, e) in table.page(prefix) {
                assert!(!e.name.is_empty(), "{prefix:?} {opcode:02X}");
                assert!((1..=4).contains(&e.length), "{prefix:?} {opcode:02X}");
                assert!(e.cycles >= 4, "{prefix:?} {opcode:02X}");
            }
        }
    }

    #[test]
    fn documented_timings() {
        assert_eq!(entry(None, 0x00).cycles, 4);
        assert_eq!(entry(None, 0x01).cycles, 10);
        assert_eq!(entry(None, 0x36).cycles, 10);
        assert_eq!(entry(None, 0x7E).cycles, 7);
        assert_eq!(entry(None, 0xCD).cycles, 17);
        assert_eq!(entry(None, 0xE3).cycles, 19);
        assert_eq!(entry(Some(Prefix::Cb), 0x06).cycles, 15);
        assert_eq!(entry(Some(Prefix::Cb), 0x46).cycles, 12);
        assert_eq!(entry(Some(Prefix::Ed), 0xB0).cycles, 16);
        assert_eq!(entry(Some(Prefix::Ed), 0x43).cycles, 20);
        assert_eq!(entry(Some(Prefix::Dd), 0x21).cycles, 14);
        assert_eq!(entry(Some(Prefix::Dd), 0x7E).cycles, 19);
        assert_eq!(entry(Some(Prefix::Dd), 0x34).cycles, 23);
        assert_eq!(entry(Some(Prefix::Dd), 0x36).cycles, 19);
        assert_eq!(entry(Some(Prefix::Dd), 0xE9).cycles, 8);
        assert_eq!(entry(Some(Prefix::DdCb), 0x46).cycles, 20);
        assert_eq!(entry(Some(Prefix::DdCb), 0x06).cycles, 23);
    }

    #[test]
    fn lengths_include_prefixes() {
        assert_eq!(entry(None, 0x3E).length, 2);
        assert_eq!(entry(Some(Prefix::Dd), 0x36).length, 4);
        assert_eq!(entry(Some(Prefix::Fd), 0x7E).length, 3);
        assert_eq!(entry(Some(Prefix::Ed), 0x4B).length, 4);
        assert_eq!(entry(Some(Prefix::DdCb), 0xC6).length, 4);
    }

    #[test]
    fn index_substitution() {
        // LD H,(IX+d) keeps the real H.
        assert_eq!(
            entry(Some(Prefix::Dd), 0x66).op,
            Op::Ld8 { dst: R8::H, src: R8::Mem }
        );
        // LD H,L becomes LD IXH,IXL.
        assert_eq!(
            entry(Some(Prefix::Dd), 0x65).op,
            Op::Ld8 { dst: R8::IdxH, src: R8::IdxL }
        );
        assert_eq!(entry(Some(Prefix::Fd), 0x24).op, Op::Inc8(R8::IdxH));
        assert_eq!(entry(Some(Prefix::Fd), 0x24).index, Index::Iy);
    }

    #[test]
    fn ed_gaps_are_eight_cycle_nops() {
        let table = OpcodeTable::new();
        for opcode in [0x00, 0x3F, 0x77, 0x7F, 0x80, 0xA4, 0xC0, 0xDD, 0xED, 0xFD, 0xFF] {
            let e = table.get(Some(Prefix::Ed), opcode).copied();
            let e = e.unwrap_or_else(|| panic!("ED {opcode:02X} undefined"));
            assert_eq!((e.name, e.cycles, e.length, e.op), ("NOP", 8, 2, Op::Nop));
        }
        for opcode in [0xCB, 0xDD, 0xED, 0xFD] {
            assert!(table.get(None, opcode).is_none());
        }
    }

    #[test]
    fn disassembly() {
        assert_eq!(entry(None, 0x78).to_string(), "LD A,B");
        assert_eq!(entry(None, 0x20).to_string(), "JR NZ,e");
        assert_eq!(entry(None, 0xC9).to_string(), "RET");
        assert_eq!(entry(Some(Prefix::Dd), 0x86).to_string(), "ADD A,(IX+d)");
        assert_eq!(entry(Some(Prefix::Fd), 0x6F).to_string(), "LD IYL,A");
        assert_eq!(entry(Some(Prefix::DdCb), 0x00).to_string(), "RLC (IX+d),B");
        assert_eq!(entry(Some(Prefix::Ed), 0xB0).to_string(), "LDIR");
        assert_eq!(entry(Some(Prefix::Ed), 0x70).to_string(), "IN F,(C)");
    }
}
