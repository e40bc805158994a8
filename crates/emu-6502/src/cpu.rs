//! 6502 per-cycle state machine.
//!
//! Each `emulate_cycle()` advances exactly one CPU cycle:
//!
//! - fetch: take a pending interrupt, or read the opcode and look it up;
//! - addressing: one addressing sub-step per cycle until the operand
//!   address is known;
//! - operation: idle until the instruction's final cycle, then execute.
//!   A taken branch extends the instruction and the PC moves on the
//!   extra cycle;
//! - interrupt: seven cycles, then push PC and P and jump through the
//!   vector.

use log::{debug, log_enabled, trace, warn, Level};

use emu_core::{
    AddressBus, Cpu, CpuError, CpuState, InterruptLine, InterruptSignal, MemoryBus, Observable,
    Value,
};

use crate::config::Mos6502Config;
use crate::flags::{B, C, D, I, N, V, Z};
use crate::opcodes::{Mode, Op, OpcodeEntry, OpcodeTable};
use crate::Registers;

pub(crate) const NMI_VECTOR: u16 = 0xFFFA;
pub(crate) const RESET_VECTOR: u16 = 0xFFFC;
pub(crate) const IRQ_VECTOR: u16 = 0xFFFE;

/// Length of the IRQ/NMI/BRK acknowledge sequence.
const INTERRUPT_CYCLES: u8 = 7;

/// Placeholder entry before the first fetch.
const IDLE: OpcodeEntry = OpcodeEntry {
    mnemonic: "NOP",
    length: 1,
    cycles: 2,
    mode: Mode::Implied,
    op: Op::Nop,
};

/// The MOS 6502.
pub struct Mos6502 {
    pub regs: Registers,
    bus: MemoryBus,
    table: OpcodeTable,
    pub(crate) config: Mos6502Config,
    line: InterruptLine,

    // === Instruction in flight ===
    state: CpuState,
    opcode: u8,
    pub(crate) entry: OpcodeEntry,
    /// Address of the opcode byte.
    pub(crate) instruction_pc: u16,
    /// Cycle within the instruction; the opcode fetch is cycle 1.
    cycle: u8,
    /// Cycle on which the operation executes. Grows with penalties.
    pub(crate) max_cycles: u8,
    /// Addressing sub-steps taken so far.
    pub(crate) step: u8,
    /// Effective address.
    pub(crate) addr: u16,
    /// Zero-page pointer for indexed and indirect modes.
    pub(crate) pointer: u8,
    /// Scratch byte (low byte of an indirect jump target).
    pub(crate) operand: u8,
    pub(crate) page_crossed: bool,
    /// Set by a taken branch; applied on the continuation cycle.
    pub(crate) branch_target: Option<u16>,

    // === Interrupts ===
    nmi_pending: bool,
    irq_pending: bool,
    brk_pending: bool,
    servicing: InterruptSignal,

    total_cycles: u64,
}

impl Mos6502 {
    /// Create a CPU that owns `bus`. Registers hold power-on values; call
    /// [`reset`](Cpu::reset) once the reset vector is in place.
    #[must_use]
    pub fn new(bus: MemoryBus) -> Self {
        Self::with_config(bus, Mos6502Config::default())
    }

    #[must_use]
    pub fn with_config(bus: MemoryBus, config: Mos6502Config) -> Self {
        let line = bus.interrupt_line();
        Self {
            regs: Registers::power_on(),
            bus,
            table: OpcodeTable::new(),
            config,
            line,
            state: CpuState::FetchOpcode,
            opcode: 0,
            entry: IDLE,
            instruction_pc: 0,
            cycle: 0,
            max_cycles: 0,
            step: 0,
            addr: 0,
            pointer: 0,
            operand: 0,
            page_crossed: false,
            branch_target: None,
            nmi_pending: false,
            irq_pending: false,
            brk_pending: false,
            servicing: InterruptSignal::None,
            total_cycles: 0,
        }
    }

    #[must_use]
    pub fn bus(&self) -> &MemoryBus {
        &self.bus
    }

    #[must_use]
    pub fn config(&self) -> &Mos6502Config {
        &self.config
    }

    #[must_use]
    pub fn opcode_table(&self) -> &OpcodeTable {
        &self.table
    }

    /// Address of the instruction currently executing (or last executed).
    #[must_use]
    pub fn instruction_pc(&self) -> u16 {
        self.instruction_pc
    }

    /// Opcode byte of the current instruction.
    #[must_use]
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    // ========================================================================
    // State machine
    // ========================================================================

    fn fetch_opcode(&mut self) -> Result<(), CpuError> {
        if let Some(signal) = self.pending_interrupt() {
            self.begin_interrupt(signal);
            return Ok(());
        }

        self.instruction_pc = self.regs.pc;
        let opcode = self.fetch_byte();
        let entry = self
            .table
            .get(opcode)
            .copied()
            .ok_or(CpuError::UndefinedOpcode {
                pc: self.instruction_pc,
                prefix: None,
                opcode,
            })?;

        self.opcode = opcode;
        self.entry = entry;
        self.cycle = 1;
        self.max_cycles = entry.cycles;
        self.step = 0;
        self.addr = 0;
        self.pointer = 0;
        self.operand = 0;
        self.page_crossed = false;
        self.branch_target = None;
        self.state = CpuState::Addressing;
        Ok(())
    }

    fn address(&mut self) -> Result<(), CpuError> {
        self.cycle += 1;
        if self.address_step() {
            self.state = CpuState::Operation;
            self.operate_if_due()
        } else {
            Ok(())
        }
    }

    fn operate_if_due(&mut self) -> Result<(), CpuError> {
        if self.cycle < self.max_cycles {
            return Ok(());
        }

        if let Some(target) = self.branch_target.take() {
            self.regs.pc = target;
        } else {
            self.execute()?;
        }

        if self.cycle >= self.max_cycles {
            self.finish();
        }
        Ok(())
    }

    fn finish(&mut self) {
        self.state = CpuState::FetchOpcode;
        if log_enabled!(Level::Trace) {
            trace!(
                "{:04X} {:02X} {:<3} A={:02X} X={:02X} Y={:02X} SP={:04X} P={} cyc={}",
                self.instruction_pc,
                self.opcode,
                self.entry.mnemonic,
                self.regs.a,
                self.regs.x,
                self.regs.y,
                self.regs.sp,
                self.regs.p,
                self.total_cycles + 1,
            );
        }
    }

    // ========================================================================
    // Interrupts
    // ========================================================================

    fn pending_interrupt(&self) -> Option<InterruptSignal> {
        if self.nmi_pending {
            Some(InterruptSignal::Nmi)
        } else if self.brk_pending {
            Some(InterruptSignal::Brk)
        } else if self.irq_pending {
            Some(InterruptSignal::Irq)
        } else {
            None
        }
    }

    fn begin_interrupt(&mut self, signal: InterruptSignal) {
        self.servicing = signal;
        self.instruction_pc = self.regs.pc;
        self.cycle = 1;
        self.max_cycles = INTERRUPT_CYCLES;
        self.state = CpuState::Interrupt;
    }

    fn service_interrupt(&mut self) {
        let (vector, brk) = match self.servicing {
            InterruptSignal::Nmi => {
                self.nmi_pending = false;
                (NMI_VECTOR, false)
            }
            InterruptSignal::Brk => {
                self.brk_pending = false;
                (IRQ_VECTOR, true)
            }
            InterruptSignal::Irq | InterruptSignal::None => {
                self.irq_pending = false;
                (IRQ_VECTOR, false)
            }
        };

        self.push_word(self.regs.pc);
        self.push(self.regs.p.pushed(brk));
        self.regs.p.set_if(I, true);
        self.regs.pc = self.read_word(vector);
        self.servicing = InterruptSignal::None;
        self.state = CpuState::FetchOpcode;
        debug!(
            "6502 interrupt from {:04X} via {vector:04X} to {:04X}",
            self.instruction_pc, self.regs.pc
        );
    }

    fn drain_interrupt_line(&mut self) {
        if self.line.is_raised() {
            for signal in self.line.take() {
                self.signal_interrupt(signal);
            }
        }
    }
}

impl AddressBus for Mos6502 {
    fn bus_mut(&mut self) -> &mut MemoryBus {
        &mut self.bus
    }

    fn pc(&self) -> u16 {
        self.regs.pc
    }

    fn set_pc(&mut self, pc: u16) {
        self.regs.pc = pc;
    }
}

impl Cpu for Mos6502 {
    fn emulate_cycle(&mut self) -> Result<(), CpuError> {
        let result = match self.state {
            CpuState::FetchOpcode => self.fetch_opcode(),
            CpuState::Addressing => self.address(),
            CpuState::Operation => {
                self.cycle += 1;
                self.operate_if_due()
            }
            CpuState::Interrupt => {
                self.cycle += 1;
                if self.cycle >= self.max_cycles {
                    self.service_interrupt();
                }
                Ok(())
            }
        };

        self.total_cycles += 1;
        self.drain_interrupt_line();
        if let Err(err) = &result {
            warn!("6502 stopped: {err}");
        }
        result
    }

    fn state(&self) -> CpuState {
        self.state
    }

    fn reset(&mut self) {
        self.regs = Registers::power_on();
        self.regs.pc = self.read_word(RESET_VECTOR);
        self.state = CpuState::FetchOpcode;
        self.entry = IDLE;
        self.branch_target = None;
        self.nmi_pending = false;
        self.irq_pending = false;
        self.brk_pending = false;
        self.servicing = InterruptSignal::None;
        self.total_cycles = 0;
        self.line.take();
        debug!("6502 reset, PC={:04X}", self.regs.pc);
    }

    fn signal_interrupt(&mut self, signal: InterruptSignal) -> bool {
        match signal {
            InterruptSignal::Nmi => self.nmi_pending = true,
            InterruptSignal::Brk => self.brk_pending = true,
            InterruptSignal::Irq if !self.regs.p.is_set(I) => self.irq_pending = true,
            InterruptSignal::Irq | InterruptSignal::None => return false,
        }
        true
    }

    fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    fn status_string(&self) -> String {
        self.regs.p.to_string()
    }
}

const QUERY_PATHS: &[&str] = &[
    "pc",
    "a",
    "x",
    "y",
    "s",
    "sp",
    "p",
    "status",
    "flags.n",
    "flags.v",
    "flags.b",
    "flags.d",
    "flags.i",
    "flags.z",
    "flags.c",
    "opcode",
    "instruction_pc",
    "state",
    "cycles",
];

impl Observable for Mos6502 {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "pc" => Some(self.regs.pc.into()),
            "a" => Some(self.regs.a.into()),
            "x" => Some(self.regs.x.into()),
            "y" => Some(self.regs.y.into()),
            "s" => Some(self.regs.s().into()),
            "sp" => Some(self.regs.sp.into()),
            "p" => Some(self.regs.p.0.into()),
            "status" => Some(self.regs.p.to_string().into()),
            "flags.n" => Some(self.regs.p.is_set(N).into()),
            "flags.v" => Some(self.regs.p.is_set(V).into()),
            "flags.b" => Some(self.regs.p.is_set(B).into()),
            "flags.d" => Some(self.regs.p.is_set(D).into()),
            "flags.i" => Some(self.regs.p.is_set(I).into()),
            "flags.z" => Some(self.regs.p.is_set(Z).into()),
            "flags.c" => Some(self.regs.p.is_set(C).into()),
            "opcode" => Some(self.opcode.into()),
            "instruction_pc" => Some(self.instruction_pc.into()),
            "state" => Some(self.state.name().into()),
            "cycles" => Some(self.total_cycles.into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        QUERY_PATHS
    }
}
