//! CPU driver traits.

use crate::bus::MemoryBus;
use crate::error::CpuError;
use crate::interrupt::InterruptSignal;

/// Where the per-cycle state machine is within an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CpuState {
    /// Next cycle fetches an opcode (or starts a pending interrupt).
    #[default]
    FetchOpcode,
    /// Resolving the operand address, one step per cycle.
    Addressing,
    /// Waiting for the instruction's last cycle, then executing it.
    Operation,
    /// Running a fixed-length interrupt acknowledge sequence.
    Interrupt,
}

impl CpuState {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FetchOpcode => "fetch",
            Self::Addressing => "addressing",
            Self::Operation => "operation",
            Self::Interrupt => "interrupt",
        }
    }
}

/// Something that owns a memory bus and a program counter.
///
/// Each architecture implements the three required methods; the memory
/// helpers come for free.
pub trait AddressBus {
    fn bus_mut(&mut self) -> &mut MemoryBus;

    /// Current program counter.
    fn pc(&self) -> u16;

    fn set_pc(&mut self, pc: u16);

    fn read_byte(&mut self, addr: u16) -> u8 {
        self.bus_mut().read_byte(addr)
    }

    fn write_byte(&mut self, addr: u16, value: u8) {
        self.bus_mut().write_byte(addr, value);
    }

    fn read_word(&mut self, addr: u16) -> u16 {
        self.bus_mut().read_word(addr)
    }

    fn write_word(&mut self, addr: u16, value: u16) {
        self.bus_mut().write_word(addr, value);
    }

    /// Read the byte at PC and advance PC.
    fn fetch_byte(&mut self) -> u8 {
        let pc = self.pc();
        self.set_pc(pc.wrapping_add(1));
        self.read_byte(pc)
    }

    /// Read the little-endian word at PC and advance PC by two.
    fn fetch_word(&mut self) -> u16 {
        let lo = self.fetch_byte();
        let hi = self.fetch_byte();
        u16::from_le_bytes([lo, hi])
    }
}

/// A CPU core advanced one clock cycle at a time.
pub trait Cpu: AddressBus {
    /// Advance exactly one clock cycle.
    ///
    /// An `Err` is fatal: the instruction in flight cannot complete.
    fn emulate_cycle(&mut self) -> Result<(), CpuError>;

    fn state(&self) -> CpuState;

    /// True between instructions: in [`CpuState::FetchOpcode`] with no
    /// partially fetched prefix.
    fn at_instruction_boundary(&self) -> bool {
        self.state() == CpuState::FetchOpcode
    }

    /// Load power-on register values and the reset program counter.
    fn reset(&mut self);

    /// Request an interrupt. Returns false if the request was masked and
    /// dropped.
    fn signal_interrupt(&mut self, signal: InterruptSignal) -> bool;

    /// Clock cycles executed since the last reset.
    fn total_cycles(&self) -> u64;

    /// Flag register rendered one letter per set bit, `-` for clear bits.
    fn status_string(&self) -> String;

    /// Run cycles until the current instruction (or interrupt sequence)
    /// completes. Returns the number of cycles taken.
    fn step(&mut self) -> Result<u64, CpuError> {
        let start = self.total_cycles();
        self.emulate_cycle()?;
        while !self.at_instruction_boundary() {
            self.emulate_cycle()?;
        }
        Ok(self.total_cycles() - start)
    }

    /// Run until PC equals `target` at an instruction boundary. Returns the
    /// number of cycles taken; returns immediately if already there.
    fn run_until(&mut self, target: u16) -> Result<u64, CpuError> {
        let start = self.total_cycles();
        while !(self.at_instruction_boundary() && self.pc() == target) {
            self.emulate_cycle()?;
        }
        Ok(self.total_cycles() - start)
    }
}
