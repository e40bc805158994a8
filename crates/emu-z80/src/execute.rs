//! Instruction execution.
//!
//! Runs on the last T-state of an instruction, once addressing has filled
//! `addr` and `operand`. Conditional branches that are taken and block
//! instructions that repeat extend the instruction rather than completing
//! it here.

#![allow(clippy::verbose_bit_mask)]

use emu_core::{AddressBus, CpuError};

use crate::Z80;
use crate::alu::{self, AluResult};
use crate::cpu::Continuation;
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, parity};
use crate::opcodes::{Alu, Block, BlockOp, Cond, Op, R8, R16};

/// Extra T-states for each repeated element of a block instruction.
const BLOCK_REPEAT_CYCLES: u32 = 21;

impl Z80 {
    pub(crate) fn execute(&mut self) -> Result<(), CpuError> {
        match self.entry.op {
            Op::Nop => {}
            Op::Halt => self.regs.halted = true,
            Op::Di => {
                self.regs.iff1 = false;
                self.regs.iff2 = false;
            }
            Op::Ei => {
                self.regs.iff1 = true;
                self.regs.iff2 = true;
                self.after_ei = true;
            }

            // === 8-bit loads ===
            Op::Ld8 { dst, src } => {
                let value = self.reg8(src);
                self.set_reg8(dst, value);
            }
            Op::Ld8Imm(r) => self.set_reg8(r, self.operand),
            Op::LdAFromPair(rr) => {
                let addr = self.reg16(rr);
                self.regs.a = self.read_byte(addr);
            }
            Op::LdPairFromA(rr) => {
                let addr = self.reg16(rr);
                self.write_byte(addr, self.regs.a);
            }
            Op::LdAAbs => self.regs.a = self.read_byte(self.addr),
            Op::LdAbsA => self.write_byte(self.addr, self.regs.a),
            Op::LdAI => {
                self.regs.a = self.regs.i;
                self.ld_a_special_flags();
            }
            Op::LdAR => {
                self.regs.a = self.regs.r;
                self.ld_a_special_flags();
            }
            Op::LdIA => self.regs.i = self.regs.a,
            Op::LdRA => self.regs.r = self.regs.a,

            // === 16-bit loads and exchanges ===
            Op::Ld16Imm(rr) => self.set_reg16(rr, self.addr),
            Op::Ld16FromAbs(rr) => {
                let value = self.read_word(self.addr);
                self.set_reg16(rr, value);
            }
            Op::LdAbsFrom16(rr) => self.write_word(self.addr, self.reg16(rr)),
            Op::LdSpHl => self.regs.sp = self.reg16(R16::Hl),
            Op::Push(rr) => self.push_word(self.reg16(rr)),
            Op::Pop(rr) => {
                let value = self.pop_word();
                self.set_reg16(rr, value);
            }
            Op::ExAfAf => self.regs.swap_af(),
            // Always the real HL, even under DD/FD.
            Op::ExDeHl => {
                let de = self.regs.de();
                self.regs.set_de(self.regs.hl());
                self.regs.set_hl(de);
            }
            Op::Exx => self.regs.exx(),
            Op::ExSpHl => {
                let sp = self.regs.sp;
                let value = self.read_word(sp);
                self.write_word(sp, self.reg16(R16::Hl));
                self.set_reg16(R16::Hl, value);
            }

            // === Arithmetic ===
            Op::Alu8 { op, src } => {
                let value = self.reg8(src);
                self.accumulate(op, value);
            }
            Op::Alu8Imm(op) => self.accumulate(op, self.operand),
            Op::Inc8(r) => {
                let value = self.reg8(r);
                let result = alu::inc8(self.tables, value, self.regs.f);
                self.store(r, result);
            }
            Op::Dec8(r) => {
                let value = self.reg8(r);
                let result = alu::dec8(self.tables, value, self.regs.f);
                self.store(r, result);
            }
            Op::Inc16(rr) => self.set_reg16(rr, self.reg16(rr).wrapping_add(1)),
            Op::Dec16(rr) => self.set_reg16(rr, self.reg16(rr).wrapping_sub(1)),
            Op::Add16(rr) => {
                let (value, flags) = alu::add16(self.reg16(R16::Hl), self.reg16(rr));
                self.set_reg16(R16::Hl, value);
                self.regs.f = (self.regs.f & (SF | ZF | PF)) | flags;
            }
            Op::Adc16(rr) => {
                let carry = self.regs.f & CF != 0;
                let (value, flags) = alu::adc16(self.reg16(R16::Hl), self.reg16(rr), carry);
                self.set_reg16(R16::Hl, value);
                self.regs.f = flags;
            }
            Op::Sbc16(rr) => {
                let carry = self.regs.f & CF != 0;
                let (value, flags) = alu::sbc16(self.reg16(R16::Hl), self.reg16(rr), carry);
                self.set_reg16(R16::Hl, value);
                self.regs.f = flags;
            }
            Op::Daa => {
                let result = alu::daa(self.tables, self.regs.a, self.regs.f);
                self.store(R8::A, result);
            }
            Op::Cpl => {
                self.regs.a = !self.regs.a;
                self.regs.f =
                    (self.regs.f & (SF | ZF | PF | CF)) | HF | NF | (self.regs.a & (YF | XF));
            }
            Op::Neg => {
                let result = alu::alu8(self.tables, Alu::Sub, 0, self.regs.a, 0);
                self.store(R8::A, result);
            }
            Op::Ccf => {
                let carry = self.regs.f & CF;
                self.regs.f = (self.regs.f & (SF | ZF | PF))
                    | (self.regs.a & (YF | XF))
                    | if carry != 0 { HF } else { CF };
            }
            Op::Scf => {
                self.regs.f = (self.regs.f & (SF | ZF | PF)) | (self.regs.a & (YF | XF)) | CF;
            }

            // === Rotates, shifts and bits ===
            Op::RotA(op) => {
                let result = alu::rotate_a(op, self.regs.a, self.regs.f);
                self.store(R8::A, result);
            }
            Op::Rot { op, r, copy } => {
                let value = self.reg8(r);
                let result = alu::rotate(self.tables, op, value, self.regs.f);
                self.store(r, result);
                if let Some(copy) = copy {
                    self.set_reg8(copy, result.value);
                }
            }
            Op::Bit { bit, r } => {
                let value = self.reg8(r);
                let tested = value & (1 << bit);
                // Y and X leak from the address high byte on the indexed forms.
                let xy = if self.entry.mode.is_indexed() {
                    (self.addr >> 8) as u8
                } else {
                    value
                };
                self.regs.f = (self.regs.f & CF)
                    | HF
                    | (self.tables.sz53p[usize::from(tested)] & !(YF | XF))
                    | (xy & (YF | XF));
            }
            Op::Res { bit, r, copy } => {
                let value = self.reg8(r) & !(1 << bit);
                self.set_reg8(r, value);
                if let Some(copy) = copy {
                    self.set_reg8(copy, value);
                }
            }
            Op::Set { bit, r, copy } => {
                let value = self.reg8(r) | (1 << bit);
                self.set_reg8(r, value);
                if let Some(copy) = copy {
                    self.set_reg8(copy, value);
                }
            }
            Op::Rld => {
                let mem = self.read_byte(self.addr);
                let a = self.regs.a;
                self.regs.a = (a & 0xF0) | (mem >> 4);
                self.write_byte(self.addr, (mem << 4) | (a & 0x0F));
                self.regs.f = self.tables.sz53p[usize::from(self.regs.a)] | (self.regs.f & CF);
            }
            Op::Rrd => {
                let mem = self.read_byte(self.addr);
                let a = self.regs.a;
                self.regs.a = (a & 0xF0) | (mem & 0x0F);
                self.write_byte(self.addr, (a << 4) | (mem >> 4));
                self.regs.f = self.tables.sz53p[usize::from(self.regs.a)] | (self.regs.f & CF);
            }

            // === Control flow ===
            Op::Jp(cond) => {
                if self.holds(cond) {
                    self.regs.pc = self.addr;
                }
            }
            Op::JpHl => self.regs.pc = self.reg16(R16::Hl),
            Op::Jr(None) => self.regs.pc = self.addr,
            Op::Jr(Some(cond)) => {
                if self.condition(cond) {
                    self.take_branch(5, self.addr);
                }
            }
            Op::Djnz => {
                self.regs.b = self.regs.b.wrapping_sub(1);
                if self.regs.b != 0 {
                    self.take_branch(5, self.addr);
                }
            }
            Op::Call(None) => {
                self.push_word(self.regs.pc);
                self.regs.pc = self.addr;
            }
            Op::Call(Some(cond)) => {
                if self.condition(cond) {
                    self.push_word(self.regs.pc);
                    self.take_branch(7, self.addr);
                }
            }
            Op::Ret(None) => self.regs.pc = self.pop_word(),
            Op::Ret(Some(cond)) => {
                if self.condition(cond) {
                    let target = self.pop_word();
                    self.take_branch(6, target);
                }
            }
            Op::Reti | Op::Retn => {
                self.regs.iff1 = self.regs.iff2;
                self.regs.pc = self.pop_word();
            }
            Op::Rst(vector) => {
                self.push_word(self.regs.pc);
                self.regs.pc = u16::from(vector);
            }

            // === I/O ===
            Op::InAImm => self.regs.a = self.port_in(self.operand)?,
            Op::InReg(r) => {
                let value = self.port_in(self.regs.c)?;
                if let Some(r) = r {
                    self.set_reg8(r, value);
                }
                self.regs.f = (self.regs.f & CF) | self.tables.sz53p[usize::from(value)];
            }
            Op::OutImmA => self.port_out(self.operand, self.regs.a)?,
            Op::OutReg(r) => {
                let value = match r {
                    Some(r) => self.reg8(r),
                    None => 0,
                };
                self.port_out(self.regs.c, value)?;
            }
            Op::Block(block) => self.block(block)?,
            Op::Im(mode) => self.regs.im = mode,
        }
        Ok(())
    }

    // ========================================================================
    // Operand access
    // ========================================================================

    fn reg8(&mut self, r: R8) -> u8 {
        let index = self.regs.index(self.entry.index);
        match r {
            R8::B => self.regs.b,
            R8::C => self.regs.c,
            R8::D => self.regs.d,
            R8::E => self.regs.e,
            R8::H => self.regs.h,
            R8::L => self.regs.l,
            R8::A => self.regs.a,
            R8::IdxH => (index >> 8) as u8,
            R8::IdxL => index as u8,
            R8::Mem => self.read_byte(self.addr),
        }
    }

    fn set_reg8(&mut self, r: R8, value: u8) {
        let index = self.regs.index(self.entry.index);
        match r {
            R8::B => self.regs.b = value,
            R8::C => self.regs.c = value,
            R8::D => self.regs.d = value,
            R8::E => self.regs.e = value,
            R8::H => self.regs.h = value,
            R8::L => self.regs.l = value,
            R8::A => self.regs.a = value,
            R8::IdxH => {
                let pair = (index & 0x00FF) | (u16::from(value) << 8);
                self.regs.set_index(self.entry.index, pair);
            }
            R8::IdxL => {
                let pair = (index & 0xFF00) | u16::from(value);
                self.regs.set_index(self.entry.index, pair);
            }
            R8::Mem => self.write_byte(self.addr, value),
        }
    }

    /// `Hl` is whichever of HL, IX and IY the page selects.
    fn reg16(&self, rr: R16) -> u16 {
        match rr {
            R16::Bc => self.regs.bc(),
            R16::De => self.regs.de(),
            R16::Hl => self.regs.index(self.entry.index),
            R16::Sp => self.regs.sp,
            R16::Af => self.regs.af(),
        }
    }

    fn set_reg16(&mut self, rr: R16, value: u16) {
        match rr {
            R16::Bc => self.regs.set_bc(value),
            R16::De => self.regs.set_de(value),
            R16::Hl => self.regs.set_index(self.entry.index, value),
            R16::Sp => self.regs.sp = value,
            R16::Af => self.regs.set_af(value),
        }
    }

    fn store(&mut self, r: R8, result: AluResult) {
        self.set_reg8(r, result.value);
        self.regs.f = result.flags;
    }

    fn accumulate(&mut self, op: Alu, value: u8) {
        let result = alu::alu8(self.tables, op, self.regs.a, value, self.regs.f);
        self.store(R8::A, result);
    }

    fn ld_a_special_flags(&mut self) {
        let iff2 = if self.regs.iff2 { PF } else { 0 };
        self.regs.f = (self.regs.f & CF) | self.tables.sz53[usize::from(self.regs.a)] | iff2;
    }

    // ========================================================================
    // Branches
    // ========================================================================

    fn condition(&self, cond: Cond) -> bool {
        let f = self.regs.f;
        match cond {
            Cond::Nz => f & ZF == 0,
            Cond::Z => f & ZF != 0,
            Cond::Nc => f & CF == 0,
            Cond::C => f & CF != 0,
            Cond::Po => f & PF == 0,
            Cond::Pe => f & PF != 0,
            Cond::P => f & SF == 0,
            Cond::M => f & SF != 0,
        }
    }

    fn holds(&self, cond: Option<Cond>) -> bool {
        cond.is_none_or(|c| self.condition(c))
    }

    /// Extend the instruction by `extra` T-states and load PC at the end.
    fn take_branch(&mut self, extra: u32, target: u16) {
        self.max_cycles += extra;
        self.continuation = Some(Continuation::Jump(target));
    }

    // ========================================================================
    // Ports and block instructions
    // ========================================================================

    fn port_in(&mut self, port: u8) -> Result<u8, CpuError> {
        let pc = self.instruction_pc();
        self.io.read(port, pc)
    }

    fn port_out(&mut self, port: u8, value: u8) -> Result<(), CpuError> {
        let pc = self.instruction_pc();
        self.io.write(port, value, pc)
    }

    /// One element of a block instruction. A repeating form that has more
    /// to do extends itself by 21 T-states and runs again at their end.
    fn block(&mut self, block: Block) -> Result<(), CpuError> {
        let delta: u16 = if block.decrement { 0xFFFF } else { 1 };
        let hl = self.regs.hl();

        let more = match block.op {
            BlockOp::Ld => {
                let value = self.read_byte(hl);
                let de = self.regs.de();
                self.write_byte(de, value);
                self.regs.set_hl(hl.wrapping_add(delta));
                self.regs.set_de(de.wrapping_add(delta));
                let bc = self.regs.bc().wrapping_sub(1);
                self.regs.set_bc(bc);

                let n = value.wrapping_add(self.regs.a);
                self.regs.f = (self.regs.f & (SF | ZF | CF))
                    | (n & XF)
                    | if n & 0x02 != 0 { YF } else { 0 }
                    | if bc != 0 { PF } else { 0 };
                bc != 0
            }
            BlockOp::Cp => {
                let value = self.read_byte(hl);
                let a = self.regs.a;
                let result = a.wrapping_sub(value);
                let half = (a & 0x0F) < (value & 0x0F);
                self.regs.set_hl(hl.wrapping_add(delta));
                let bc = self.regs.bc().wrapping_sub(1);
                self.regs.set_bc(bc);

                let n = result.wrapping_sub(u8::from(half));
                self.regs.f = (self.regs.f & CF)
                    | NF
                    | (self.tables.sz53[usize::from(result)] & (SF | ZF))
                    | if half { HF } else { 0 }
                    | (n & XF)
                    | if n & 0x02 != 0 { YF } else { 0 }
                    | if bc != 0 { PF } else { 0 };
                bc != 0 && result != 0
            }
            BlockOp::In => {
                let value = self.port_in(self.regs.c)?;
                self.write_byte(hl, value);
                self.regs.set_hl(hl.wrapping_add(delta));
                self.regs.b = self.regs.b.wrapping_sub(1);
                let k = u16::from(value) + u16::from(self.regs.c.wrapping_add(delta as u8));
                self.io_block_flags(value, k);
                self.regs.b != 0
            }
            BlockOp::Out => {
                let value = self.read_byte(hl);
                self.regs.b = self.regs.b.wrapping_sub(1);
                self.port_out(self.regs.c, value)?;
                self.regs.set_hl(hl.wrapping_add(delta));
                let k = u16::from(value) + u16::from(self.regs.l);
                self.io_block_flags(value, k);
                self.regs.b != 0
            }
        };

        if block.repeat && more {
            self.max_cycles += BLOCK_REPEAT_CYCLES;
            self.continuation = Some(Continuation::Repeat);
        }
        Ok(())
    }

    fn io_block_flags(&mut self, value: u8, k: u16) {
        let b = self.regs.b;
        let mut f = self.tables.sz53[usize::from(b)];
        if value & 0x80 != 0 {
            f |= NF;
        }
        if k > 0xFF {
            f |= HF | CF;
        }
        if parity((k as u8 & 0x07) ^ b) {
            f |= PF;
        }
        self.regs.f = f;
    }
}
