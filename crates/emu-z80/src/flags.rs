//! Z80 flag register bits and precomputed flag tables.
//!
//! The tables are built once per process from closed-form formulas and
//! shared read-only by every CPU instance.

use std::sync::OnceLock;

/// Sign flag (bit 7) - set if result is negative.
pub const SF: u8 = 0b1000_0000;

/// Zero flag (bit 6) - set if result is zero.
pub const ZF: u8 = 0b0100_0000;

/// Undocumented flag (bit 5) - copy of bit 5 of result.
pub const YF: u8 = 0b0010_0000;

/// Half-carry flag (bit 4) - carry from bit 3 to bit 4.
pub const HF: u8 = 0b0001_0000;

/// Undocumented flag (bit 3) - copy of bit 3 of result.
pub const XF: u8 = 0b0000_1000;

/// Parity/Overflow flag (bit 2) - parity or overflow depending on instruction.
pub const PF: u8 = 0b0000_0100;

/// Add/Subtract flag (bit 1) - set if last operation was subtraction.
pub const NF: u8 = 0b0000_0010;

/// Carry flag (bit 0) - carry out of bit 7.
pub const CF: u8 = 0b0000_0001;

/// Flag letters from bit 7 down to bit 0.
pub(crate) const LETTERS: [(u8, char); 8] = [
    (SF, 'S'),
    (ZF, 'Z'),
    (YF, 'Y'),
    (HF, 'H'),
    (XF, 'X'),
    (PF, 'P'),
    (NF, 'N'),
    (CF, 'C'),
];

/// Render F as `SZYHXPNC`, with `-` for each clear bit.
#[must_use]
pub fn render(f: u8) -> String {
    LETTERS
        .iter()
        .map(|&(flag, letter)| if f & flag != 0 { letter } else { '-' })
        .collect()
}

/// Compute parity of a byte (true if even number of 1 bits).
#[must_use]
pub const fn parity(value: u8) -> bool {
    value.count_ones().is_multiple_of(2)
}

/// Build flags byte for common arithmetic results.
#[must_use]
pub const fn sz53(value: u8) -> u8 {
    let mut f = 0;
    if value == 0 {
        f |= ZF;
    }
    if value & 0x80 != 0 {
        f |= SF;
    }
    f |= value & (YF | XF);
    f
}

/// Build flags byte with parity.
#[must_use]
pub const fn sz53p(value: u8) -> u8 {
    let mut f = sz53(value);
    if parity(value) {
        f |= PF;
    }
    f
}

/// Index into [`FlagTables::add`] and [`FlagTables::sub`].
#[must_use]
pub const fn arith_index(a: u8, b: u8, carry: bool) -> usize {
    (carry as usize) << 16 | (a as usize) << 8 | b as usize
}

/// Index into [`FlagTables::daa`] from A and the C, H and N flags.
#[must_use]
pub const fn daa_index(a: u8, f: u8) -> usize {
    a as usize | ((f & CF) as usize) << 8 | (((f & HF) != 0) as usize) << 9 | (((f & NF) != 0) as usize) << 10
}

/// Flag results for every input of the 8-bit ALU.
pub struct FlagTables {
    /// S, Z, Y and X of a value.
    pub sz53: [u8; 256],
    /// As `sz53` plus even parity in P/V.
    pub sz53p: [u8; 256],
    /// Flags of `a + b + carry`, indexed by [`arith_index`].
    pub add: Box<[u8]>,
    /// Flags of `a - b - carry`, indexed by [`arith_index`].
    pub sub: Box<[u8]>,
    /// Flags of `INC` on a value, carry excluded.
    pub inc: [u8; 256],
    /// Flags of `DEC` on a value, carry excluded.
    pub dec: [u8; 256],
    /// `DAA` result in the high byte and flags in the low byte, indexed
    /// by [`daa_index`].
    pub daa: Box<[u16]>,
}

static TABLES: OnceLock<FlagTables> = OnceLock::new();

/// The process-wide tables, built on first use.
pub fn tables() -> &'static FlagTables {
    TABLES.get_or_init(FlagTables::build)
}

impl FlagTables {
    fn build() -> Self {
        let mut sz53_table = [0; 256];
        let mut sz53p_table = [0; 256];
        let mut inc = [0; 256];
        let mut dec = [0; 256];
        for value in 0..=0xFF_u8 {
            let i = usize::from(value);
            sz53_table[i] = sz53(value);
            sz53p_table[i] = sz53p(value);

            let up = value.wrapping_add(1);
            inc[i] = sz53(up)
                | if value & 0x0F == 0x0F { HF } else { 0 }
                | if value == 0x7F { PF } else { 0 };

            let down = value.wrapping_sub(1);
            dec[i] = sz53(down)
                | NF
                | if value & 0x0F == 0x00 { HF } else { 0 }
                | if value == 0x80 { PF } else { 0 };
        }

        let mut add = vec![0; 0x2_0000].into_boxed_slice();
        let mut sub = vec![0; 0x2_0000].into_boxed_slice();
        for carry in [false, true] {
            for a in 0..=0xFF_u8 {
                for b in 0..=0xFF_u8 {
                    let i = arith_index(a, b, carry);
                    add[i] = add_flags(a, b, carry);
                    sub[i] = sub_flags(a, b, carry);
                }
            }
        }

        let mut daa = vec![0; 0x800].into_boxed_slice();
        for (i, slot) in daa.iter_mut().enumerate() {
            let a = i as u8;
            let f = ((i >> 8) & 1) as u8 * CF
                | ((i >> 9) & 1) as u8 * HF
                | ((i >> 10) & 1) as u8 * NF;
            let (result, flags) = daa_of(a, f);
            *slot = u16::from(result) << 8 | u16::from(flags);
        }

        Self {
            sz53: sz53_table,
            sz53p: sz53p_table,
            add,
            sub,
            inc,
            dec,
            daa,
        }
    }
}

fn add_flags(a: u8, b: u8, carry: bool) -> u8 {
    let c = u8::from(carry);
    let wide = u16::from(a) + u16::from(b) + u16::from(c);
    let result = wide as u8;

    let mut flags = sz53(result);
    if (a & 0x0F) + (b & 0x0F) + c > 0x0F {
        flags |= HF;
    }
    // Both operands same sign, result different.
    if (a ^ b) & 0x80 == 0 && (a ^ result) & 0x80 != 0 {
        flags |= PF;
    }
    if wide > 0xFF {
        flags |= CF;
    }
    flags
}

fn sub_flags(a: u8, b: u8, carry: bool) -> u8 {
    let c = u8::from(carry);
    let result = a.wrapping_sub(b).wrapping_sub(c);

    let mut flags = sz53(result) | NF;
    if (a & 0x0F) < (b & 0x0F) + c {
        flags |= HF;
    }
    // Operands differ in sign, result has the subtrahend's sign.
    if (a ^ b) & 0x80 != 0 && (b ^ result) & 0x80 == 0 {
        flags |= PF;
    }
    if u16::from(a) < u16::from(b) + u16::from(c) {
        flags |= CF;
    }
    flags
}

fn daa_of(a: u8, f: u8) -> (u8, u8) {
    let nf = f & NF != 0;
    let cf = f & CF != 0;
    let hf = f & HF != 0;

    let mut correction = 0;
    let mut carry = cf;
    if hf || a & 0x0F > 9 {
        correction |= 0x06;
    }
    if cf || a > 0x99 {
        correction |= 0x60;
        carry = true;
    }

    let result = if nf {
        a.wrapping_sub(correction)
    } else {
        a.wrapping_add(correction)
    };
    let half = if nf {
        hf && a & 0x0F < 6
    } else {
        a & 0x0F > 9
    };

    let flags = sz53p(result)
        | if nf { NF } else { 0 }
        | if carry { CF } else { 0 }
        | if half { HF } else { 0 };
    (result, flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_shared() {
        assert!(std::ptr::eq(tables(), tables()));
    }

    #[test]
    fn add_table_spot_checks() {
        let t = tables();
        // 0x7F + 1 overflows into the sign bit.
        assert_eq!(t.add[arith_index(0x7F, 0x01, false)], SF | HF | PF);
        // 0xFF + 1 wraps to zero with carry.
        assert_eq!(t.add[arith_index(0xFF, 0x01, false)], ZF | HF | CF);
        // 0xFF + 0 + carry behaves the same.
        assert_eq!(t.add[arith_index(0xFF, 0x00, true)], ZF | HF | CF);
    }

    #[test]
    fn sub_table_spot_checks() {
        let t = tables();
        assert_eq!(t.sub[arith_index(0x00, 0x01, false)], SF | YF | HF | XF | NF | CF);
        assert_eq!(t.sub[arith_index(0x80, 0x01, false)], YF | HF | XF | PF | NF);
        assert_eq!(t.sub[arith_index(0x42, 0x42, false)], ZF | NF);
    }

    #[test]
    fn inc_dec_tables() {
        let t = tables();
        assert_eq!(t.inc[0x7F], SF | HF | PF);
        assert_eq!(t.inc[0xFF], ZF | HF);
        assert_eq!(t.dec[0x80], YF | HF | XF | PF | NF);
        assert_eq!(t.dec[0x01], ZF | NF);
    }

    #[test]
    fn daa_after_bcd_add() {
        // 0x15 + 0x27 = 0x3C, adjusted to 0x42.
        let entry = tables().daa[daa_index(0x3C, 0)];
        assert_eq!(entry >> 8, 0x42);
        assert_eq!(entry as u8 & CF, 0);

        // 0x99 + 0x01 = 0x9A -> 0x00 with carry.
        let entry = tables().daa[daa_index(0x9A, 0)];
        assert_eq!(entry >> 8, 0x00);
        assert_eq!(entry as u8 & (ZF | CF), ZF | CF);
    }

    #[test]
    fn daa_after_bcd_subtract() {
        // 0x42 - 0x15 = 0x2D with half borrow, adjusted to 0x27.
        let entry = tables().daa[daa_index(0x2D, NF | HF)];
        assert_eq!(entry >> 8, 0x27);
        assert_ne!(entry as u8 & NF, 0);
    }

    #[test]
    fn render_letters() {
        assert_eq!(render(0xFF), "SZYHXPNC");
        assert_eq!(render(ZF | CF), "-Z-----C");
    }
}
