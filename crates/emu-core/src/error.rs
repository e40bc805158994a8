//! Error types.
//!
//! `CpuError` values are fatal: the instruction in flight cannot complete and
//! the host should stop calling `emulate_cycle`. Bus and loader errors are
//! reported during machine setup, before execution starts.

use std::fmt;

/// Direction of a Z80-style port access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    /// `IN` family.
    In,
    /// `OUT` family.
    Out,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::In => write!(f, "input"),
            Self::Out => write!(f, "output"),
        }
    }
}

/// Fatal CPU trap returned from the per-cycle driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CpuError {
    /// The opcode table has no entry for the fetched byte(s).
    UndefinedOpcode {
        /// Address of the first byte of the instruction.
        pc: u16,
        /// Prefix byte(s) preceding the opcode, if any (e.g. `0xED`, `0xDDCB`).
        prefix: Option<u16>,
        /// Final opcode byte.
        opcode: u8,
    },
    /// IN/OUT to a port with no registered handler.
    UnhandledPort {
        port: u8,
        pc: u16,
        direction: PortDirection,
    },
    /// An interrupt was accepted in a mode that is not emulated.
    UnsupportedInterruptMode { mode: u8, pc: u16 },
    /// BRK executed while configured to trap.
    Break { pc: u16 },
}

impl fmt::Display for CpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UndefinedOpcode {
                pc,
                prefix: Some(prefix),
                opcode,
            } => {
                if *prefix > 0xFF {
                    write!(f, "PC {pc:04X}: undefined opcode {prefix:04X} {opcode:02X}")
                } else {
                    write!(f, "PC {pc:04X}: undefined opcode {prefix:02X} {opcode:02X}")
                }
            }
            Self::UndefinedOpcode {
                pc,
                prefix: None,
                opcode,
            } => write!(f, "PC {pc:04X}: undefined opcode {opcode:02X}"),
            Self::UnhandledPort {
                port,
                pc,
                direction,
            } => write!(f, "PC {pc:04X}: no {direction} handler for port {port:02X}"),
            Self::UnsupportedInterruptMode { mode, pc } => {
                write!(f, "PC {pc:04X}: interrupt mode {mode} is not supported")
            }
            Self::Break { pc } => write!(f, "PC {pc:04X}: BRK"),
        }
    }
}

impl std::error::Error for CpuError {}

/// Error registering a handler range on the memory bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// `start` is above `end`.
    InvalidRange { start: u16, end: u16 },
    /// Every handler index has been handed out.
    HandlersExhausted,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRange { start, end } => {
                write!(f, "invalid handler range {start:04X}-{end:04X}")
            }
            Self::HandlersExhausted => write!(f, "no handler indices left"),
        }
    }
}

impl std::error::Error for BusError {}

/// Error parsing a segmented program image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// A block header or body runs past the end of the input.
    Truncated {
        /// Offset of the block header in the input.
        offset: usize,
        /// Bytes the block needs from `offset`.
        needed: usize,
        /// Bytes actually left from `offset`.
        available: usize,
    },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated {
                offset,
                needed,
                available,
            } => write!(
                f,
                "segment at offset {offset} needs {needed} bytes, only {available} left"
            ),
        }
    }
}

impl std::error::Error for LoadError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_opcode_message_includes_prefix() {
        let err = CpuError::UndefinedOpcode {
            pc: 0x1234,
            prefix: Some(0xED),
            opcode: 0xFF,
        };
        assert_eq!(err.to_string(), "PC 1234: undefined opcode ED FF");

        let err = CpuError::UndefinedOpcode {
            pc: 0x0200,
            prefix: None,
            opcode: 0x02,
        };
        assert_eq!(err.to_string(), "PC 0200: undefined opcode 02");
    }

    #[test]
    fn port_error_names_direction() {
        let err = CpuError::UnhandledPort {
            port: 0xFE,
            pc: 0x8000,
            direction: PortDirection::In,
        };
        assert_eq!(err.to_string(), "PC 8000: no input handler for port FE");
    }
}
