//! Instruction semantics.
//!
//! `execute` runs on the last cycle of an instruction, once the addressing
//! engine has resolved `self.addr`. Branches that are taken extend the
//! instruction and leave the PC update to a continuation cycle.

use emu_core::{AddressBus, CpuError};

use crate::config::BrkPolicy;
use crate::cpu::IRQ_VECTOR;
use crate::flags::{C, D, I, N, V, Z};
use crate::opcodes::{Mode, Op};
use crate::{Mos6502, Status};

impl Mos6502 {
    pub(crate) fn execute(&mut self) -> Result<(), CpuError> {
        match self.entry.op {
            // ================================================================
            // Loads, stores, transfers
            // ================================================================
            Op::Lda => {
                self.regs.a = self.operand();
                self.regs.p.update_nz(self.regs.a);
            }
            Op::Ldx => {
                self.regs.x = self.operand();
                self.regs.p.update_nz(self.regs.x);
            }
            Op::Ldy => {
                self.regs.y = self.operand();
                self.regs.p.update_nz(self.regs.y);
            }
            Op::Sta => self.write_byte(self.addr, self.regs.a),
            Op::Stx => self.write_byte(self.addr, self.regs.x),
            Op::Sty => self.write_byte(self.addr, self.regs.y),
            Op::Tax => {
                self.regs.x = self.regs.a;
                self.regs.p.update_nz(self.regs.x);
            }
            Op::Tay => {
                self.regs.y = self.regs.a;
                self.regs.p.update_nz(self.regs.y);
            }
            Op::Txa => {
                self.regs.a = self.regs.x;
                self.regs.p.update_nz(self.regs.a);
            }
            Op::Tya => {
                self.regs.a = self.regs.y;
                self.regs.p.update_nz(self.regs.a);
            }
            Op::Tsx => {
                self.regs.x = self.regs.s();
                self.regs.p.update_nz(self.regs.x);
            }
            Op::Txs => self.regs.set_s(self.regs.x),

            // ================================================================
            // Arithmetic and logic
            // ================================================================
            Op::Adc => {
                let value = self.operand();
                self.adc(value);
            }
            Op::Sbc => {
                let value = self.operand();
                self.sbc(value);
            }
            Op::And => {
                self.regs.a &= self.operand();
                self.regs.p.update_nz(self.regs.a);
            }
            Op::Ora => {
                self.regs.a |= self.operand();
                self.regs.p.update_nz(self.regs.a);
            }
            Op::Eor => {
                self.regs.a ^= self.operand();
                self.regs.p.update_nz(self.regs.a);
            }
            Op::Cmp => {
                let value = self.operand();
                self.compare(self.regs.a, value);
            }
            Op::Cpx => {
                let value = self.operand();
                self.compare(self.regs.x, value);
            }
            Op::Cpy => {
                let value = self.operand();
                self.compare(self.regs.y, value);
            }
            Op::Bit => {
                let value = self.operand();
                self.regs.p.set_if(Z, self.regs.a & value == 0);
                self.regs.p.set_if(N, value & 0x80 != 0);
                self.regs.p.set_if(V, value & 0x40 != 0);
            }

            // ================================================================
            // Read-modify-write
            // ================================================================
            Op::Asl => {
                let value = self.operand();
                self.regs.p.set_if(C, value & 0x80 != 0);
                self.store_nz(value << 1);
            }
            Op::Lsr => {
                let value = self.operand();
                self.regs.p.set_if(C, value & 0x01 != 0);
                self.store_nz(value >> 1);
            }
            Op::Rol => {
                let value = self.operand();
                let carry_in = self.regs.p.carry();
                self.regs.p.set_if(C, value & 0x80 != 0);
                self.store_nz((value << 1) | carry_in);
            }
            Op::Ror => {
                let value = self.operand();
                let carry_in = self.regs.p.carry() << 7;
                self.regs.p.set_if(C, value & 0x01 != 0);
                self.store_nz((value >> 1) | carry_in);
            }
            Op::Inc => {
                let value = self.operand().wrapping_add(1);
                self.store_nz(value);
            }
            Op::Dec => {
                let value = self.operand().wrapping_sub(1);
                self.store_nz(value);
            }
            Op::Inx => {
                self.regs.x = self.regs.x.wrapping_add(1);
                self.regs.p.update_nz(self.regs.x);
            }
            Op::Iny => {
                self.regs.y = self.regs.y.wrapping_add(1);
                self.regs.p.update_nz(self.regs.y);
            }
            Op::Dex => {
                self.regs.x = self.regs.x.wrapping_sub(1);
                self.regs.p.update_nz(self.regs.x);
            }
            Op::Dey => {
                self.regs.y = self.regs.y.wrapping_sub(1);
                self.regs.p.update_nz(self.regs.y);
            }

            // ================================================================
            // Flags
            // ================================================================
            Op::Clc => self.regs.p.set_if(C, false),
            Op::Sec => self.regs.p.set_if(C, true),
            Op::Cli => self.regs.p.set_if(I, false),
            Op::Sei => self.regs.p.set_if(I, true),
            Op::Cld => self.regs.p.set_if(D, false),
            Op::Sed => self.regs.p.set_if(D, true),
            Op::Clv => self.regs.p.set_if(V, false),

            // ================================================================
            // Branches and jumps
            // ================================================================
            Op::Bpl => self.branch(!self.regs.p.is_set(N)),
            Op::Bmi => self.branch(self.regs.p.is_set(N)),
            Op::Bvc => self.branch(!self.regs.p.is_set(V)),
            Op::Bvs => self.branch(self.regs.p.is_set(V)),
            Op::Bcc => self.branch(!self.regs.p.is_set(C)),
            Op::Bcs => self.branch(self.regs.p.is_set(C)),
            Op::Bne => self.branch(!self.regs.p.is_set(Z)),
            Op::Beq => self.branch(self.regs.p.is_set(Z)),
            Op::Jmp => self.regs.pc = self.addr,
            Op::Jsr => {
                // Pushes the address of the JSR's last byte.
                self.push_word(self.regs.pc.wrapping_sub(1));
                self.regs.pc = self.addr;
            }
            Op::Rts => self.regs.pc = self.pop_word().wrapping_add(1),
            Op::Rti => {
                let p = self.pop();
                self.regs.p = Status::pulled(p);
                self.regs.pc = self.pop_word();
            }
            Op::Brk => return self.brk(),

            // ================================================================
            // Stack
            // ================================================================
            Op::Pha => self.push(self.regs.a),
            Op::Php => self.push(self.regs.p.pushed(true)),
            Op::Pla => {
                self.regs.a = self.pop();
                self.regs.p.update_nz(self.regs.a);
            }
            Op::Plp => {
                let p = self.pop();
                self.regs.p = Status::pulled(p);
            }

            Op::Nop => {}
        }
        Ok(())
    }

    fn operand(&mut self) -> u8 {
        if self.entry.mode == Mode::Accumulator {
            self.regs.a
        } else {
            self.read_byte(self.addr)
        }
    }

    /// Write back a read-modify-write result and set N/Z from it.
    fn store_nz(&mut self, value: u8) {
        if self.entry.mode == Mode::Accumulator {
            self.regs.a = value;
        } else {
            self.write_byte(self.addr, value);
        }
        self.regs.p.update_nz(value);
    }

    fn compare(&mut self, register: u8, value: u8) {
        self.regs.p.set_if(C, register >= value);
        self.regs.p.update_nz(register.wrapping_sub(value));
    }

    /// A taken branch costs one more cycle, two if the target is on another
    /// page. The PC moves on the final cycle.
    fn branch(&mut self, taken: bool) {
        if taken {
            self.max_cycles += 1 + u8::from(self.page_crossed);
            self.branch_target = Some(self.addr);
        }
    }

    fn brk(&mut self) -> Result<(), CpuError> {
        match self.config.brk {
            BrkPolicy::Trap => Err(CpuError::Break {
                pc: self.instruction_pc,
            }),
            BrkPolicy::Interrupt => {
                // Skip the padding byte.
                self.push_word(self.regs.pc.wrapping_add(1));
                self.push(self.regs.p.pushed(true));
                self.regs.p.set_if(I, true);
                self.regs.pc = self.read_word(IRQ_VECTOR);
                Ok(())
            }
        }
    }

    // ========================================================================
    // Arithmetic
    // ========================================================================

    pub(crate) fn adc(&mut self, value: u8) {
        if self.config.decimal_mode && self.regs.p.is_set(D) {
            self.adc_decimal(value);
        } else {
            self.adc_binary(value);
        }
    }

    pub(crate) fn sbc(&mut self, value: u8) {
        if self.config.decimal_mode && self.regs.p.is_set(D) {
            self.sbc_decimal(value);
        } else {
            self.adc_binary(!value);
        }
    }

    fn adc_binary(&mut self, value: u8) {
        let a = self.regs.a;
        let sum = u16::from(a) + u16::from(value) + u16::from(self.regs.p.carry());
        let result = sum as u8;

        self.regs.p.set_if(C, sum > 0xFF);
        self.regs.p.set_if(V, (a ^ result) & (value ^ result) & 0x80 != 0);
        self.regs.a = result;
        self.regs.p.update_nz(result);
    }

    /// NMOS decimal add. Z comes from the binary sum; N and V come from the
    /// intermediate result after the low-nibble fixup.
    fn adc_decimal(&mut self, value: u8) {
        let a = u16::from(self.regs.a);
        let b = u16::from(value);
        let carry = u16::from(self.regs.p.carry());

        let mut lo = (a & 0x0F) + (b & 0x0F) + carry;
        if lo > 9 {
            lo += 6;
        }
        let mut hi = (a >> 4) + (b >> 4) + u16::from(lo > 0x0F);

        let binary = (a + b + carry) as u8;
        let intermediate = (hi << 4) as u8;
        self.regs.p.set_if(Z, binary == 0);
        self.regs.p.set_if(N, intermediate & 0x80 != 0);
        self.regs
            .p
            .set_if(V, (intermediate ^ self.regs.a) & !(self.regs.a ^ value) & 0x80 != 0);

        if hi > 9 {
            hi += 6;
        }
        self.regs.p.set_if(C, hi > 0x0F);
        self.regs.a = ((hi << 4) | (lo & 0x0F)) as u8;
    }

    /// NMOS decimal subtract. All flags follow the binary result.
    fn sbc_decimal(&mut self, value: u8) {
        let a = self.regs.a;
        let borrow = i16::from(1 - self.regs.p.carry());

        let binary = i16::from(a) - i16::from(value) - borrow;
        self.regs.p.set_if(C, binary >= 0);
        self.regs.p.set_if(Z, binary as u8 == 0);
        self.regs.p.set_if(N, binary & 0x80 != 0);
        self.regs.p.set_if(
            V,
            (i16::from(a) ^ binary) & (i16::from(a) ^ i16::from(value)) & 0x80 != 0,
        );

        let mut lo = i16::from(a & 0x0F) - i16::from(value & 0x0F) - borrow;
        let mut hi = i16::from(a >> 4) - i16::from(value >> 4);
        if lo < 0 {
            lo -= 6;
            hi -= 1;
        }
        if hi < 0 {
            hi -= 6;
        }
        self.regs.a = ((hi << 4) as u8) | ((lo & 0x0F) as u8);
    }

    // ========================================================================
    // Stack
    // ========================================================================

    pub(crate) fn push(&mut self, value: u8) {
        let addr = self.regs.push();
        self.write_byte(addr, value);
    }

    pub(crate) fn push_word(&mut self, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.push(hi);
        self.push(lo);
    }

    fn pop(&mut self) -> u8 {
        let addr = self.regs.pop();
        self.read_byte(addr)
    }

    fn pop_word(&mut self) -> u16 {
        let lo = self.pop();
        let hi = self.pop();
        u16::from_le_bytes([lo, hi])
    }
}
