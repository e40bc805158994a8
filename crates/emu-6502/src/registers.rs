//! 6502 register file.

use crate::flags::{I, R};
use crate::Status;

/// 6502 registers.
///
/// The stack pointer is kept as a full 16-bit address. Every stack access
/// goes through [`push`](Self::push)/[`pop`](Self::pop), which keep it inside
/// page 1 ($0100-$01FF), wrapping $0100 -> $01FF on push and back on pop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub p: Status,
    pub sp: u16,
    pub pc: u16,
}

impl Default for Registers {
    fn default() -> Self {
        Self::power_on()
    }
}

impl Registers {
    /// Power-on values: A, X and Y zero, SP at $01FD, I set.
    #[must_use]
    pub const fn power_on() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            p: Status(R | I),
            sp: 0x01FD,
            pc: 0,
        }
    }

    /// The 8-bit S register as seen by TSX.
    #[must_use]
    pub const fn s(&self) -> u8 {
        self.sp as u8
    }

    /// Load S (TXS).
    pub fn set_s(&mut self, value: u8) {
        self.sp = 0x0100 | u16::from(value);
    }

    /// Address to write the next pushed byte to. Decrements SP.
    pub fn push(&mut self) -> u16 {
        let addr = 0x0100 | (self.sp & 0x00FF);
        self.sp = 0x0100 | (self.sp.wrapping_sub(1) & 0x00FF);
        addr
    }

    /// Increments SP and returns the address to pull from.
    pub fn pop(&mut self) -> u16 {
        self.sp = 0x0100 | (self.sp.wrapping_add(1) & 0x00FF);
        self.sp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_wraps_inside_page_one() {
        let mut regs = Registers::power_on();
        regs.sp = 0x0100;
        assert_eq!(regs.push(), 0x0100);
        assert_eq!(regs.sp, 0x01FF);
        assert_eq!(regs.pop(), 0x0100);

        regs.sp = 0x01FF;
        assert_eq!(regs.pop(), 0x0100);
    }

    #[test]
    fn stray_stack_pointer_is_pulled_back_into_page_one() {
        let mut regs = Registers::power_on();
        regs.sp = 0x0342;
        assert_eq!(regs.push(), 0x0142);
        assert_eq!(regs.sp, 0x0141);
    }

    #[test]
    fn s_is_low_byte() {
        let mut regs = Registers::power_on();
        regs.set_s(0x80);
        assert_eq!(regs.sp, 0x0180);
        assert_eq!(regs.s(), 0x80);
    }
}
