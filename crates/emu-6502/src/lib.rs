//! Cycle-accurate NMOS 6502 core.
//!
//! [`Mos6502`] owns an [`emu_core::MemoryBus`] and advances one clock cycle
//! per [`emu_core::Cpu::emulate_cycle`] call. The 151 documented opcodes are
//! implemented; the undocumented ones are fatal `UndefinedOpcode` errors.

mod addressing;
mod config;
mod cpu;
mod execute;
pub mod flags;
mod opcodes;
mod registers;

pub use config::{BrkPolicy, Mos6502Config};
pub use cpu::Mos6502;
pub use flags::Status;
pub use opcodes::{Mode, Op, OpcodeEntry, OpcodeTable};
pub use registers::Registers;
