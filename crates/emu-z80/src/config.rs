//! Z80 configuration.

/// Configuration for constructing a [`Z80`](crate::Z80).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Z80Config {
    /// PC after reset. The chip starts at 0x0000; test harnesses often
    /// start at 0x0100.
    pub reset_pc: u16,
}
