//! 6502 status register (P).

use std::fmt;

/// Carry.
pub const C: u8 = 0x01;
/// Zero.
pub const Z: u8 = 0x02;
/// IRQ disable.
pub const I: u8 = 0x04;
/// Decimal mode.
pub const D: u8 = 0x08;
/// Break. Only meaningful in a copy of P pushed by BRK/PHP.
pub const B: u8 = 0x10;
/// Reserved, always reads as 1.
pub const R: u8 = 0x20;
/// Overflow.
pub const V: u8 = 0x40;
/// Negative.
pub const N: u8 = 0x80;

const LETTERS: [(u8, char); 8] = [
    (N, 'N'),
    (V, 'V'),
    (R, 'R'),
    (B, 'B'),
    (D, 'D'),
    (I, 'I'),
    (Z, 'Z'),
    (C, 'C'),
];

/// Processor status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status(pub u8);

impl Default for Status {
    fn default() -> Self {
        Self(R)
    }
}

impl Status {
    #[must_use]
    pub const fn is_set(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    pub fn set_if(&mut self, flag: u8, condition: bool) {
        if condition {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
    }

    pub fn update_nz(&mut self, value: u8) {
        self.set_if(N, value & 0x80 != 0);
        self.set_if(Z, value == 0);
    }

    /// The byte pushed to the stack. BRK and PHP push with B set, hardware
    /// interrupts with B clear.
    #[must_use]
    pub const fn pushed(self, brk: bool) -> u8 {
        if brk {
            self.0 | R | B
        } else {
            (self.0 | R) & !B
        }
    }

    /// Status loaded by PLP/RTI. B does not exist in the register itself.
    #[must_use]
    pub const fn pulled(value: u8) -> Self {
        Self((value | R) & !B)
    }

    #[must_use]
    pub const fn carry(self) -> u8 {
        self.0 & C
    }
}

impl fmt::Display for Status {
    /// `NVRBDIZC`, with `-` for each clear bit.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, letter) in LETTERS {
            let c = if self.is_set(flag) { letter } else { '-' };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}
