//! Cycle-accurate Zilog Z80 core.
//!
//! [`Z80`] owns an [`emu_core::MemoryBus`] plus a separate 256-port
//! [`IoPorts`] space and advances one T-state per
//! [`emu_core::Cpu::emulate_cycle`] call. All documented instructions and
//! the common undocumented ones (index halves, `SLL`, DDCB register copies)
//! are implemented. ED slots with no instruction run as 8 T-state `NOP`s.
//! Interrupt modes 1 and 2 are supported; an IRQ accepted in mode 0 is a
//! fatal `UnsupportedInterruptMode` error.

mod addressing;
mod alu;
mod config;
mod cpu;
mod execute;
pub mod flags;
mod io;
mod opcodes;
mod registers;

pub use config::Z80Config;
pub use cpu::Z80;
pub use flags::{CF, HF, NF, PF, SF, XF, YF, ZF};
pub use io::IoPorts;
pub use opcodes::{Alu, Block, BlockOp, Cond, Mode, Op, OpcodeEntry, OpcodeTable, Prefix, R8, R16, Rot};
pub use registers::{Index, Registers};
