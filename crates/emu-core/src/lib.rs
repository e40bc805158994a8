//! Core types for cycle-stepped 8-bit CPU emulation.
//!
//! A CPU owns a [`MemoryBus`] and advances one clock cycle per call to
//! [`Cpu::emulate_cycle`]. Peripherals map themselves into the address space
//! with [`MemoryBus::register_range`] and raise interrupts through an
//! [`InterruptLine`]. Fatal traps come back as [`CpuError`].

mod bus;
mod cpu;
mod error;
mod handlers;
mod interrupt;
mod loader;
mod observable;

pub use bus::{FnHandler, HandlerId, MemoryBus, MemoryHandler};
pub use cpu::{AddressBus, Cpu, CpuState};
pub use error::{BusError, CpuError, LoadError, PortDirection};
pub use handlers::{RamExtension, RomModule};
pub use interrupt::{InterruptLine, InterruptSignal, PendingSignals};
pub use loader::Segment;
pub use observable::{Observable, Value};
