//! Operand resolution, one sub-step per T-state.

use emu_core::AddressBus;

use crate::Z80;
use crate::opcodes::Mode;

impl Z80 {
    /// Run one addressing sub-step. Returns true once `self.addr` and
    /// `self.operand` hold everything the operation needs.
    pub(crate) fn address_step(&mut self) -> bool {
        let step = self.step;
        self.step += 1;

        match (self.entry.mode, step) {
            (Mode::Implied, _) => true,

            (Mode::Imm8, _) => {
                self.operand = self.fetch_byte();
                true
            }

            (Mode::Imm16, 0) => {
                self.addr = u16::from(self.fetch_byte());
                false
            }
            (Mode::Imm16, _) => {
                self.addr |= u16::from(self.fetch_byte()) << 8;
                true
            }

            (Mode::Relative, _) => {
                let offset = self.fetch_byte() as i8;
                self.addr = self.regs.pc.wrapping_add_signed(i16::from(offset));
                true
            }

            (Mode::Hl, _) => {
                self.addr = self.regs.hl();
                true
            }
            (Mode::HlImm8, _) => {
                self.addr = self.regs.hl();
                self.operand = self.fetch_byte();
                true
            }

            (Mode::Indexed, _) => {
                self.displacement = self.fetch_byte() as i8;
                self.addr = self.indexed_address();
                true
            }
            (Mode::IndexedImm8, 0) => {
                self.displacement = self.fetch_byte() as i8;
                self.addr = self.indexed_address();
                false
            }
            (Mode::IndexedImm8, _) => {
                self.operand = self.fetch_byte();
                true
            }

            (Mode::IndexedCb, _) => {
                self.addr = self.indexed_address();
                true
            }
        }
    }

    fn indexed_address(&self) -> u16 {
        self.regs
            .index(self.entry.index)
            .wrapping_add_signed(i16::from(self.displacement))
    }
}
