//! Z80 register set.

/// Which 16-bit pair stands in for HL in the current instruction.
///
/// DD selects IX and FD selects IY; every other page uses HL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Index {
    #[default]
    Hl,
    Ix,
    Iy,
}

impl Index {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Hl => "HL",
            Self::Ix => "IX",
            Self::Iy => "IY",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    // Main registers
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,

    // Alternate registers
    pub a_alt: u8,
    pub f_alt: u8,
    pub b_alt: u8,
    pub c_alt: u8,
    pub d_alt: u8,
    pub e_alt: u8,
    pub h_alt: u8,
    pub l_alt: u8,

    pub ix: u16,
    pub iy: u16,
    pub sp: u16,
    pub pc: u16,
    /// Interrupt vector base for IM 2.
    pub i: u8,
    /// Memory refresh counter. Bit 7 is only changed by `LD R,A`.
    pub r: u8,

    // Interrupt state
    pub iff1: bool,
    pub iff2: bool,
    pub im: u8,

    pub halted: bool,
}

impl Registers {
    /// Values after /RESET: AF and SP all ones, interrupts off, IM 0.
    #[must_use]
    pub fn power_on() -> Self {
        Self {
            a: 0xFF,
            f: 0xFF,
            sp: 0xFFFF,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn af(&self) -> u16 {
        (self.a as u16) << 8 | self.f as u16
    }

    #[must_use]
    pub const fn bc(&self) -> u16 {
        (self.b as u16) << 8 | self.c as u16
    }

    #[must_use]
    pub const fn de(&self) -> u16 {
        (self.d as u16) << 8 | self.e as u16
    }

    #[must_use]
    pub const fn hl(&self) -> u16 {
        (self.h as u16) << 8 | self.l as u16
    }

    pub fn set_af(&mut self, value: u16) {
        [self.a, self.f] = value.to_be_bytes();
    }

    pub fn set_bc(&mut self, value: u16) {
        [self.b, self.c] = value.to_be_bytes();
    }

    pub fn set_de(&mut self, value: u16) {
        [self.d, self.e] = value.to_be_bytes();
    }

    pub fn set_hl(&mut self, value: u16) {
        [self.h, self.l] = value.to_be_bytes();
    }

    /// HL, IX or IY.
    #[must_use]
    pub const fn index(&self, index: Index) -> u16 {
        match index {
            Index::Hl => self.hl(),
            Index::Ix => self.ix,
            Index::Iy => self.iy,
        }
    }

    pub fn set_index(&mut self, index: Index, value: u16) {
        match index {
            Index::Hl => self.set_hl(value),
            Index::Ix => self.ix = value,
            Index::Iy => self.iy = value,
        }
    }

    /// `EX AF,AF'`
    pub fn swap_af(&mut self) {
        std::mem::swap(&mut self.a, &mut self.a_alt);
        std::mem::swap(&mut self.f, &mut self.f_alt);
    }

    /// `EXX`: swap BC, DE and HL with their shadows.
    pub fn exx(&mut self) {
        std::mem::swap(&mut self.b, &mut self.b_alt);
        std::mem::swap(&mut self.c, &mut self.c_alt);
        std::mem::swap(&mut self.d, &mut self.d_alt);
        std::mem::swap(&mut self.e, &mut self.e_alt);
        std::mem::swap(&mut self.h, &mut self.h_alt);
        std::mem::swap(&mut self.l, &mut self.l_alt);
    }

    /// Bump the low seven bits of R, as every M1 cycle does.
    pub fn refresh(&mut self) {
        self.r = (self.r & 0x80) | (self.r.wrapping_add(1) & 0x7F);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_compose_from_halves() {
        let mut regs = Registers::default();
        regs.set_bc(0x1234);
        assert_eq!((regs.b, regs.c), (0x12, 0x34));
        regs.set_af(0xABCD);
        assert_eq!(regs.af(), 0xABCD);
        regs.set_index(Index::Hl, 0x5678);
        assert_eq!((regs.h, regs.l), (0x56, 0x78));
        regs.set_index(Index::Iy, 0x9ABC);
        assert_eq!(regs.index(Index::Iy), 0x9ABC);
    }

    #[test]
    fn refresh_keeps_bit_seven() {
        let mut regs = Registers {
            r: 0xFF,
            ..Registers::default()
        };
        regs.refresh();
        assert_eq!(regs.r, 0x80);
        regs.r = 0x7F;
        regs.refresh();
        assert_eq!(regs.r, 0x00);
    }

    #[test]
    fn exchanges_swap_shadow_bank() {
        let mut regs = Registers::default();
        regs.set_hl(0x1111);
        regs.h_alt = 0x22;
        regs.exx();
        assert_eq!(regs.h, 0x22);
        assert_eq!(regs.h_alt, 0x11);

        regs.a = 1;
        regs.a_alt = 2;
        regs.swap_af();
        assert_eq!((regs.a, regs.a_alt), (2, 1));
    }
}
