//! ALU operations for the Z80.
//!
//! 8-bit results come straight from the precomputed [`FlagTables`]; 16-bit
//! arithmetic is computed in closed form.

#![allow(clippy::verbose_bit_mask)] // Clearer to read mask comparisons.

use crate::flags::{CF, FlagTables, HF, NF, PF, SF, XF, YF, ZF, arith_index, daa_index};
use crate::opcodes::{Alu, Rot};

/// Result of an ALU operation with flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    pub value: u8,
    pub flags: u8,
}

/// `A op value` for the eight accumulator operations. `CP` leaves A
/// unchanged and takes Y and X from the operand.
#[must_use]
pub fn alu8(t: &FlagTables, op: Alu, a: u8, b: u8, f: u8) -> AluResult {
    let carry = f & CF != 0;
    match op {
        Alu::Add => AluResult {
            value: a.wrapping_add(b),
            flags: t.add[arith_index(a, b, false)],
        },
        Alu::Adc => AluResult {
            value: a.wrapping_add(b).wrapping_add(u8::from(carry)),
            flags: t.add[arith_index(a, b, carry)],
        },
        Alu::Sub => AluResult {
            value: a.wrapping_sub(b),
            flags: t.sub[arith_index(a, b, false)],
        },
        Alu::Sbc => AluResult {
            value: a.wrapping_sub(b).wrapping_sub(u8::from(carry)),
            flags: t.sub[arith_index(a, b, carry)],
        },
        Alu::And => {
            let value = a & b;
            AluResult {
                value,
                flags: t.sz53p[usize::from(value)] | HF,
            }
        }
        Alu::Xor => {
            let value = a ^ b;
            AluResult {
                value,
                flags: t.sz53p[usize::from(value)],
            }
        }
        Alu::Or => {
            let value = a | b;
            AluResult {
                value,
                flags: t.sz53p[usize::from(value)],
            }
        }
        Alu::Cp => AluResult {
            value: a,
            flags: (t.sub[arith_index(a, b, false)] & !(YF | XF)) | (b & (YF | XF)),
        },
    }
}

/// `INC r`; carry is preserved from `f`.
#[must_use]
pub fn inc8(t: &FlagTables, value: u8, f: u8) -> AluResult {
    AluResult {
        value: value.wrapping_add(1),
        flags: (f & CF) | t.inc[usize::from(value)],
    }
}

/// `DEC r`; carry is preserved from `f`.
#[must_use]
pub fn dec8(t: &FlagTables, value: u8, f: u8) -> AluResult {
    AluResult {
        value: value.wrapping_sub(1),
        flags: (f & CF) | t.dec[usize::from(value)],
    }
}

#[must_use]
pub fn daa(t: &FlagTables, a: u8, f: u8) -> AluResult {
    let entry = t.daa[daa_index(a, f)];
    AluResult {
        value: (entry >> 8) as u8,
        flags: entry as u8,
    }
}

/// CB-page rotates and shifts. All of them set S, Z, Y, X and P from the
/// result, clear H and N, and put the bit shifted out in C.
#[must_use]
pub fn rotate(t: &FlagTables, op: Rot, value: u8, f: u8) -> AluResult {
    let carry_in = f & CF;
    let (result, carry_out) = match op {
        Rot::Rlc => (value.rotate_left(1), value >> 7),
        Rot::Rrc => (value.rotate_right(1), value & 1),
        Rot::Rl => ((value << 1) | carry_in, value >> 7),
        Rot::Rr => ((value >> 1) | (carry_in << 7), value & 1),
        Rot::Sla => (value << 1, value >> 7),
        Rot::Sra => ((value >> 1) | (value & 0x80), value & 1),
        // Undocumented: shifts a 1 into bit 0.
        Rot::Sll => ((value << 1) | 1, value >> 7),
        Rot::Srl => (value >> 1, value & 1),
    };
    AluResult {
        value: result,
        flags: t.sz53p[usize::from(result)] | carry_out,
    }
}

/// The accumulator-only rotates `RLCA`, `RRCA`, `RLA` and `RRA`. S, Z and P
/// are preserved.
#[must_use]
pub fn rotate_a(op: Rot, a: u8, f: u8) -> AluResult {
    let carry_in = f & CF;
    let (result, carry_out) = match op {
        Rot::Rlc => (a.rotate_left(1), a >> 7),
        Rot::Rrc => (a.rotate_right(1), a & 1),
        Rot::Rl => ((a << 1) | carry_in, a >> 7),
        _ => ((a >> 1) | (carry_in << 7), a & 1),
    };
    AluResult {
        value: result,
        flags: (f & (SF | ZF | PF)) | (result & (YF | XF)) | carry_out,
    }
}

/// 16-bit add for HL/IX/IY. S, Z and P/V are left to the caller.
#[must_use]
pub fn add16(a: u16, b: u16) -> (u16, u8) {
    let result32 = u32::from(a) + u32::from(b);
    let result = result32 as u16;

    let mut flags = ((result >> 8) as u8) & (YF | XF);

    // Half-carry from bit 11
    if (a & 0x0FFF) + (b & 0x0FFF) > 0x0FFF {
        flags |= HF;
    }
    if result32 > 0xFFFF {
        flags |= CF;
    }

    (result, flags)
}

/// 16-bit add with carry for HL.
#[must_use]
pub fn adc16(a: u16, b: u16, carry: bool) -> (u16, u8) {
    let c = u16::from(carry);
    let result32 = u32::from(a) + u32::from(b) + u32::from(c);
    let result = result32 as u16;

    let mut flags = ((result >> 8) as u8) & (YF | XF);
    if result & 0x8000 != 0 {
        flags |= SF;
    }
    if result == 0 {
        flags |= ZF;
    }
    if (a & 0x0FFF) + (b & 0x0FFF) + c > 0x0FFF {
        flags |= HF;
    }
    if (a ^ b) & 0x8000 == 0 && (a ^ result) & 0x8000 != 0 {
        flags |= PF;
    }
    if result32 > 0xFFFF {
        flags |= CF;
    }

    (result, flags)
}

/// 16-bit subtract with borrow for HL.
#[must_use]
pub fn sbc16(a: u16, b: u16, carry: bool) -> (u16, u8) {
    let c = u16::from(carry);
    let result = a.wrapping_sub(b).wrapping_sub(c);

    let mut flags = NF | (((result >> 8) as u8) & (YF | XF));
    if result & 0x8000 != 0 {
        flags |= SF;
    }
    if result == 0 {
        flags |= ZF;
    }
    // Borrow from bit 12
    if (a & 0x0FFF) < (b & 0x0FFF) + c {
        flags |= HF;
    }
    if (a ^ b) & 0x8000 != 0 && (b ^ result) & 0x8000 == 0 {
        flags |= PF;
    }
    if u32::from(a) < u32::from(b) + u32::from(c) {
        flags |= CF;
    }

    (result, flags)
}
