//! 6502 configuration.

/// What the BRK instruction does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrkPolicy {
    /// BRK stops emulation with `CpuError::Break`. Conformance ROMs use BRK
    /// as an end-of-test sentinel, so this is the default.
    #[default]
    Trap,
    /// BRK runs the software interrupt sequence: push PC+2 and P with B set,
    /// set I, jump through $FFFE.
    Interrupt,
}

/// Configuration for constructing a [`Mos6502`](crate::Mos6502).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mos6502Config {
    pub brk: BrkPolicy,
    /// Honour the D flag in ADC/SBC. The NES 2A03 has this wired off.
    pub decimal_mode: bool,
}

impl Default for Mos6502Config {
    fn default() -> Self {
        Self {
            brk: BrkPolicy::Trap,
            decimal_mode: true,
        }
    }
}
