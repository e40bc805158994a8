//! Addressing engine.
//!
//! Each call resolves one cycle's worth of the operand address. `self.step`
//! counts the sub-steps already taken for the current instruction; a mode
//! that needs several bus reads advances through them on successive
//! cycles.

use emu_core::AddressBus;

use crate::Mos6502;
use crate::opcodes::Mode;

impl Mos6502 {
    /// Run one addressing sub-step. Returns true once `self.addr` holds the
    /// effective address (or, for accumulator/implied modes, immediately).
    pub(crate) fn address_step(&mut self) -> bool {
        let step = self.step;
        self.step += 1;

        match (self.entry.mode, step) {
            (Mode::Implied | Mode::Accumulator, _) => true,

            (Mode::Immediate, _) => {
                self.addr = self.regs.pc;
                self.regs.pc = self.regs.pc.wrapping_add(1);
                true
            }

            (Mode::ZeroPage, _) => {
                self.addr = u16::from(self.fetch_byte());
                true
            }

            (Mode::ZeroPageX | Mode::ZeroPageY, 0) => {
                self.pointer = self.fetch_byte();
                false
            }
            (Mode::ZeroPageX, _) => {
                // Stays on the zero page.
                self.addr = u16::from(self.pointer.wrapping_add(self.regs.x));
                true
            }
            (Mode::ZeroPageY, _) => {
                self.addr = u16::from(self.pointer.wrapping_add(self.regs.y));
                true
            }

            (
                Mode::Absolute | Mode::AbsoluteX | Mode::AbsoluteY | Mode::Indirect,
                0,
            ) => {
                self.addr = u16::from(self.fetch_byte());
                false
            }
            (Mode::Absolute, _) => {
                self.addr |= u16::from(self.fetch_byte()) << 8;
                true
            }
            (Mode::AbsoluteX, _) => {
                let base = self.addr | (u16::from(self.fetch_byte()) << 8);
                self.index(base, self.regs.x);
                true
            }
            (Mode::AbsoluteY, _) => {
                let base = self.addr | (u16::from(self.fetch_byte()) << 8);
                self.index(base, self.regs.y);
                true
            }

            (Mode::Indirect, 1) => {
                self.addr |= u16::from(self.fetch_byte()) << 8;
                false
            }
            (Mode::Indirect, 2) => {
                self.operand = self.read_byte(self.addr);
                false
            }
            (Mode::Indirect, _) => {
                // NMOS bug: the pointer's high byte comes from the same page.
                let hi_addr = (self.addr & 0xFF00) | (self.addr.wrapping_add(1) & 0x00FF);
                let hi = self.read_byte(hi_addr);
                self.addr = u16::from_le_bytes([self.operand, hi]);
                true
            }

            (Mode::IndirectX | Mode::IndirectY, 0) => {
                self.pointer = self.fetch_byte();
                false
            }
            (Mode::IndirectX, 1) => {
                self.pointer = self.pointer.wrapping_add(self.regs.x);
                false
            }
            (Mode::IndirectX, 2) => {
                self.addr = u16::from(self.read_byte(u16::from(self.pointer)));
                false
            }
            (Mode::IndirectX, _) => {
                let hi = self.read_byte(u16::from(self.pointer.wrapping_add(1)));
                self.addr |= u16::from(hi) << 8;
                true
            }
            (Mode::IndirectY, 1) => {
                self.addr = u16::from(self.read_byte(u16::from(self.pointer)));
                false
            }
            (Mode::IndirectY, _) => {
                let hi = self.read_byte(u16::from(self.pointer.wrapping_add(1)));
                let base = self.addr | (u16::from(hi) << 8);
                self.index(base, self.regs.y);
                true
            }

            (Mode::Relative, _) => {
                let offset = self.fetch_byte() as i8;
                let target = self.regs.pc.wrapping_add_signed(i16::from(offset));
                self.page_crossed = (target ^ self.regs.pc) & 0xFF00 != 0;
                self.addr = target;
                true
            }
        }
    }

    /// Add an index register, charging the page-cross cycle to read-type
    /// instructions.
    fn index(&mut self, base: u16, index: u8) {
        self.addr = base.wrapping_add(u16::from(index));
        self.page_crossed = (base ^ self.addr) & 0xFF00 != 0;
        if self.page_crossed && self.entry.op.pays_page_penalty() {
            self.max_cycles += 1;
        }
    }
}
