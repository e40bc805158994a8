//! Z80 per-T-state state machine.
//!
//! Each `emulate_cycle()` advances one T-state. Prefix bytes are fetched
//! one per call while the state stays at fetch; the DDCB/FDCB forms also
//! fetch their displacement there, before the final opcode byte. Once the
//! entry is known the instruction runs through addressing and waits in
//! operation until its last T-state, where it executes.

use log::{debug, log_enabled, trace, warn, Level};

use emu_core::{
    AddressBus, Cpu, CpuError, CpuState, InterruptLine, InterruptSignal, MemoryBus, Observable,
    Value,
};

use crate::config::Z80Config;
use crate::flags::{self, CF, FlagTables, HF, NF, PF, SF, XF, YF, ZF};
use crate::io::IoPorts;
use crate::opcodes::{Mode, Op, OpcodeEntry, OpcodeTable, Prefix};
use crate::registers::{Index, Registers};

const NMI_ADDRESS: u16 = 0x0066;
const IM1_ADDRESS: u16 = 0x0038;

/// Stand-in entry before the first fetch, and the internal NOP a halted
/// CPU executes.
const IDLE: OpcodeEntry = OpcodeEntry {
    name: "NOP",
    length: 1,
    cycles: 4,
    mode: Mode::Implied,
    op: Op::Nop,
    index: Index::Hl,
};

/// Work left for the final T-state of an extended instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Continuation {
    /// Taken jump, call or return: load PC.
    Jump(u16),
    /// Repeating block instruction: run the next element.
    Repeat,
}

/// Interrupt being acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ack {
    Nmi,
    Im1,
    Im2,
}

impl Ack {
    const fn cycles(self) -> u32 {
        match self {
            Self::Nmi => 11,
            Self::Im1 => 13,
            Self::Im2 => 19,
        }
    }
}

/// The Zilog Z80.
pub struct Z80 {
    pub regs: Registers,
    bus: MemoryBus,
    pub(crate) io: IoPorts,
    table: OpcodeTable,
    pub(crate) tables: &'static FlagTables,
    config: Z80Config,
    line: InterruptLine,

    // === Decode ===
    state: CpuState,
    /// Prefix fetched so far; `None` at an instruction boundary.
    prefix: Option<Prefix>,
    /// DDCB/FDCB: the next byte is the displacement.
    fetching_displacement: bool,
    /// DD/FD bytes superseded by a later prefix, 4 T-states each.
    ignored_prefixes: u8,

    // === Instruction in flight ===
    page: Option<Prefix>,
    opcode: u8,
    pub(crate) entry: OpcodeEntry,
    instruction_pc: u16,
    cycle: u32,
    pub(crate) max_cycles: u32,
    pub(crate) step: u8,
    /// Effective address, immediate word or jump target.
    pub(crate) addr: u16,
    /// Immediate byte.
    pub(crate) operand: u8,
    pub(crate) displacement: i8,
    pub(crate) continuation: Option<Continuation>,

    // === Interrupts ===
    nmi_pending: bool,
    irq_pending: bool,
    /// Set by EI; blocks IRQ acceptance before the next instruction.
    pub(crate) after_ei: bool,
    servicing: Option<Ack>,
    /// Byte a peripheral places on the bus during IM 2 acknowledge.
    data_bus: u8,

    total_cycles: u64,
}

impl Z80 {
    /// Create a CPU that owns `bus`, with no I/O ports mapped. Registers
    /// hold power-on values and PC is `0x0000`.
    #[must_use]
    pub fn new(bus: MemoryBus) -> Self {
        Self::with_config(bus, Z80Config::default())
    }

    #[must_use]
    pub fn with_config(bus: MemoryBus, config: Z80Config) -> Self {
        let line = bus.interrupt_line();
        let mut regs = Registers::power_on();
        regs.pc = config.reset_pc;
        Self {
            regs,
            bus,
            io: IoPorts::new(),
            table: OpcodeTable::new(),
            tables: flags::tables(),
            config,
            line,
            state: CpuState::FetchOpcode,
            prefix: None,
            fetching_displacement: false,
            ignored_prefixes: 0,
            page: None,
            opcode: 0,
            entry: IDLE,
            instruction_pc: config.reset_pc,
            cycle: 0,
            max_cycles: 0,
            step: 0,
            addr: 0,
            operand: 0,
            displacement: 0,
            continuation: None,
            nmi_pending: false,
            irq_pending: false,
            after_ei: false,
            servicing: None,
            data_bus: 0xFF,
            total_cycles: 0,
        }
    }

    #[must_use]
    pub fn bus(&self) -> &MemoryBus {
        &self.bus
    }

    #[must_use]
    pub fn io(&self) -> &IoPorts {
        &self.io
    }

    /// Port space, for registering `IN`/`OUT` handlers.
    pub fn io_mut(&mut self) -> &mut IoPorts {
        &mut self.io
    }

    #[must_use]
    pub fn config(&self) -> &Z80Config {
        &self.config
    }

    #[must_use]
    pub fn opcode_table(&self) -> &OpcodeTable {
        &self.table
    }

    /// Address of the first byte (prefix included) of the current
    /// instruction.
    #[must_use]
    pub fn instruction_pc(&self) -> u16 {
        self.instruction_pc
    }

    /// Current instruction's page and final opcode byte.
    #[must_use]
    pub fn opcode(&self) -> (Option<Prefix>, u8) {
        (self.page, self.opcode)
    }

    /// Set the byte read from the data bus during an IM 2 acknowledge.
    pub fn set_data_bus(&mut self, value: u8) {
        self.data_bus = value;
    }

    // ========================================================================
    // State machine
    // ========================================================================

    fn fetch_opcode(&mut self) -> Result<(), CpuError> {
        if self.prefix.is_none() && !self.fetching_displacement {
            if let Some(ack) = self.acceptable_interrupt()? {
                self.begin_interrupt(ack);
                return Ok(());
            }
            self.after_ei = false;
            self.instruction_pc = self.regs.pc;
            self.cycle = 0;
            self.ignored_prefixes = 0;

            if self.regs.halted {
                self.regs.refresh();
                self.cycle = 1;
                self.start(None, 0x00, IDLE);
                return Ok(());
            }
        }

        self.cycle += 1;
        let byte = self.fetch_byte();

        if self.fetching_displacement {
            self.displacement = byte as i8;
            self.fetching_displacement = false;
            return Ok(());
        }

        let next = match (self.prefix, byte) {
            (None, 0xCB) => Some(Prefix::Cb),
            (Some(Prefix::Dd), 0xCB) => Some(Prefix::DdCb),
            (Some(Prefix::Fd), 0xCB) => Some(Prefix::FdCb),
            (None | Some(Prefix::Dd | Prefix::Fd), 0xDD) => Some(Prefix::Dd),
            (None | Some(Prefix::Dd | Prefix::Fd), 0xFD) => Some(Prefix::Fd),
            (None | Some(Prefix::Dd | Prefix::Fd), 0xED) => Some(Prefix::Ed),
            _ => None,
        };

        if let Some(next) = next {
            self.regs.refresh();
            let composite = matches!(next, Prefix::DdCb | Prefix::FdCb);
            if self.prefix.is_some() && !composite {
                self.ignored_prefixes += 1;
            }
            self.fetching_displacement = composite;
            self.prefix = Some(next);
            return Ok(());
        }

        let page = self.prefix.take();
        if !matches!(page, Some(Prefix::DdCb | Prefix::FdCb)) {
            self.regs.refresh();
        }
        let entry = self
            .table
            .get(page, byte)
            .copied()
            .ok_or(CpuError::UndefinedOpcode {
                pc: self.instruction_pc,
                prefix: page.map(Prefix::code),
                opcode: byte,
            })?;
        self.start(page, byte, entry);
        Ok(())
    }

    fn start(&mut self, page: Option<Prefix>, opcode: u8, entry: OpcodeEntry) {
        self.page = page;
        self.opcode = opcode;
        self.entry = entry;
        self.max_cycles = u32::from(entry.cycles) + 4 * u32::from(self.ignored_prefixes);
        self.step = 0;
        self.addr = 0;
        self.operand = 0;
        if entry.mode != Mode::IndexedCb {
            self.displacement = 0;
        }
        self.continuation = None;
        self.state = CpuState::Addressing;
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

        match self.continuation.take() {
            Some(Continuation::Jump(target)) => self.regs.pc = target,
            Some(Continuation::Repeat) | None => self.execute()?,
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
                "{:04X} {:<14} AF={:04X} BC={:04X} DE={:04X} HL={:04X} IX={:04X} IY={:04X} SP={:04X} {}",
                self.instruction_pc,
                self.entry.to_string(),
                self.regs.af(),
                self.regs.bc(),
                self.regs.de(),
                self.regs.hl(),
                self.regs.ix,
                self.regs.iy,
                self.regs.sp,
                flags::render(self.regs.f),
            );
        }
    }

    // ========================================================================
    // Interrupts
    // ========================================================================

    fn acceptable_interrupt(&self) -> Result<Option<Ack>, CpuError> {
        if self.nmi_pending {
            return Ok(Some(Ack::Nmi));
        }
        if !self.irq_pending || !self.regs.iff1 || self.after_ei {
            return Ok(None);
        }
        match self.regs.im {
            1 => Ok(Some(Ack::Im1)),
            2 => Ok(Some(Ack::Im2)),
            mode => Err(CpuError::UnsupportedInterruptMode {
                mode,
                pc: self.regs.pc,
            }),
        }
    }

    fn begin_interrupt(&mut self, ack: Ack) {
        self.regs.halted = false;
        self.regs.refresh();
        self.instruction_pc = self.regs.pc;
        self.cycle = 1;
        self.max_cycles = ack.cycles();
        self.servicing = Some(ack);
        self.state = CpuState::Interrupt;
    }

    fn service_interrupt(&mut self) {
        let Some(ack) = self.servicing.take() else {
            self.state = CpuState::FetchOpcode;
            return;
        };

        if ack == Ack::Nmi {
            self.nmi_pending = false;
            self.regs.iff1 = false;
        } else {
            self.irq_pending = false;
            self.regs.iff1 = false;
            self.regs.iff2 = false;
        }

        self.push_word(self.regs.pc);
        self.regs.pc = match ack {
            Ack::Nmi => NMI_ADDRESS,
            Ack::Im1 => IM1_ADDRESS,
            Ack::Im2 => {
                let vector = u16::from_be_bytes([self.regs.i, self.data_bus]);
                self.read_word(vector)
            }
        };
        self.state = CpuState::FetchOpcode;
        debug!(
            "Z80 {ack:?} from {:04X} to {:04X}",
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

    // ========================================================================
    // Stack
    // ========================================================================

    pub(crate) fn push_word(&mut self, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.write_byte(self.regs.sp, hi);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.write_byte(self.regs.sp, lo);
    }

    pub(crate) fn pop_word(&mut self) -> u16 {
        let lo = self.read_byte(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = self.read_byte(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        u16::from_le_bytes([lo, hi])
    }
}

impl AddressBus for Z80 {
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

impl Cpu for Z80 {
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
            warn!("Z80 stopped: {err}");
        }
        result
    }

    fn state(&self) -> CpuState {
        self.state
    }

    fn at_instruction_boundary(&self) -> bool {
        self.state == CpuState::FetchOpcode && self.prefix.is_none() && !self.fetching_displacement
    }

    fn reset(&mut self) {
        self.regs = Registers::power_on();
        self.regs.pc = self.config.reset_pc;
        self.state = CpuState::FetchOpcode;
        self.prefix = None;
        self.fetching_displacement = false;
        self.ignored_prefixes = 0;
        self.page = None;
        self.entry = IDLE;
        self.instruction_pc = self.regs.pc;
        self.continuation = None;
        self.nmi_pending = false;
        self.irq_pending = false;
        self.after_ei = false;
        self.servicing = None;
        self.total_cycles = 0;
        self.line.take();
        debug!("Z80 reset, PC={:04X}", self.regs.pc);
    }

    fn signal_interrupt(&mut self, signal: InterruptSignal) -> bool {
        match signal {
            InterruptSignal::Nmi => self.nmi_pending = true,
            InterruptSignal::Irq if self.regs.iff1 => self.irq_pending = true,
            // No software interrupt line on the Z80.
            InterruptSignal::Irq | InterruptSignal::Brk | InterruptSignal::None => return false,
        }
        true
    }

    fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    fn status_string(&self) -> String {
        flags::render(self.regs.f)
    }
}

/// All query paths supported by the Z80.
const Z80_QUERY_PATHS: &[&str] = &[
    // Main registers
    "a", "f", "b", "c", "d", "e", "h", "l",
    // Register pairs
    "af", "bc", "de", "hl",
    // Alternate registers
    "af'", "bc'", "de'", "hl'",
    // Index registers
    "ix", "iy", "ixh", "ixl", "iyh", "iyl",
    // Other registers
    "sp", "pc", "i", "r",
    // Flags
    "status", "flags.s", "flags.z", "flags.y", "flags.h",
    "flags.x", "flags.p", "flags.n", "flags.c",
    // Interrupt state
    "iff1", "iff2", "im",
    // CPU state
    "halted", "state", "cycles",
    // Current instruction
    "opcode", "instruction_pc",
];

impl Observable for Z80 {
    fn query(&self, path: &str) -> Option<Value> {
        let pair = |hi: u8, lo: u8| u16::from_be_bytes([hi, lo]);
        let flag = |bit: u8| Some(Value::from(self.regs.f & bit != 0));

        match path {
            "a" => Some(self.regs.a.into()),
            "f" => Some(self.regs.f.into()),
            "b" => Some(self.regs.b.into()),
            "c" => Some(self.regs.c.into()),
            "d" => Some(self.regs.d.into()),
            "e" => Some(self.regs.e.into()),
            "h" => Some(self.regs.h.into()),
            "l" => Some(self.regs.l.into()),

            "af" => Some(self.regs.af().into()),
            "bc" => Some(self.regs.bc().into()),
            "de" => Some(self.regs.de().into()),
            "hl" => Some(self.regs.hl().into()),

            "af'" => Some(pair(self.regs.a_alt, self.regs.f_alt).into()),
            "bc'" => Some(pair(self.regs.b_alt, self.regs.c_alt).into()),
            "de'" => Some(pair(self.regs.d_alt, self.regs.e_alt).into()),
            "hl'" => Some(pair(self.regs.h_alt, self.regs.l_alt).into()),

            "ix" => Some(self.regs.ix.into()),
            "iy" => Some(self.regs.iy.into()),
            "ixh" => Some(((self.regs.ix >> 8) as u8).into()),
            "ixl" => Some((self.regs.ix as u8).into()),
            "iyh" => Some(((self.regs.iy >> 8) as u8).into()),
            "iyl" => Some((self.regs.iy as u8).into()),

            "sp" => Some(self.regs.sp.into()),
            "pc" => Some(self.regs.pc.into()),
            "i" => Some(self.regs.i.into()),
            "r" => Some(self.regs.r.into()),

            "status" => Some(flags::render(self.regs.f).into()),
            "flags.s" => flag(SF),
            "flags.z" => flag(ZF),
            "flags.y" => flag(YF),
            "flags.h" => flag(HF),
            "flags.x" => flag(XF),
            "flags.p" => flag(PF),
            "flags.n" => flag(NF),
            "flags.c" => flag(CF),

            "iff1" => Some(self.regs.iff1.into()),
            "iff2" => Some(self.regs.iff2.into()),
            "im" => Some(self.regs.im.into()),

            "halted" => Some(self.regs.halted.into()),
            "state" => Some(self.state.name().into()),
            "cycles" => Some(self.total_cycles.into()),

            "opcode" => Some(self.opcode.into()),
            "instruction_pc" => Some(self.instruction_pc.into()),

            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        Z80_QUERY_PATHS
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use emu_core::PortDirection;

    use super::*;

    /// 64K of RAM with `program` at $0000.
    fn cpu_with(program: &[u8]) -> Z80 {
        let mut bus = MemoryBus::with_ram(0x1_0000);
        bus.load(0x0000, program);
        Z80::new(bus)
    }

    fn steps(cpu: &mut Z80, n: usize) -> Vec<u64> {
        (0..n).map(|_| cpu.step().unwrap()).collect()
    }

    #[test]
    fn test_power_on_state() {
        let cpu = cpu_with(&[]);
        assert_eq!(cpu.regs.af(), 0xFFFF);
        assert_eq!(cpu.regs.sp, 0xFFFF);
        assert_eq!(cpu.regs.pc, 0x0000);
        assert!(!cpu.regs.iff1);
        assert_eq!(cpu.regs.im, 0);
        assert!(cpu.at_instruction_boundary());
    }

    #[test]
    fn test_reset_uses_configured_pc() {
        let bus = MemoryBus::with_ram(0x1_0000);
        let mut cpu = Z80::with_config(bus, Z80Config { reset_pc: 0x0100 });
        cpu.regs.set_bc(0x1234);
        cpu.regs.iff1 = true;
        cpu.reset();
        assert_eq!(cpu.regs.pc, 0x0100);
        assert_eq!(cpu.regs.bc(), 0);
        assert!(!cpu.regs.iff1);
        assert_eq!(cpu.total_cycles(), 0);
    }

    #[test]
    fn test_nop_is_four_t_states() {
        let mut cpu = cpu_with(&[0x00]);
        let mut states = Vec::new();
        for _ in 0..4 {
            cpu.emulate_cycle().unwrap();
            states.push(cpu.state());
        }
        assert_eq!(
            states,
            vec![
                CpuState::Addressing,
                CpuState::Operation,
                CpuState::Operation,
                CpuState::FetchOpcode,
            ]
        );
        assert_eq!(cpu.regs.pc, 1);
    }

    #[test]
    fn test_ldir_copies_and_extends() {
        // LD HL,$1000 / LD DE,$2000 / LD BC,3 / LDIR
        let mut cpu = cpu_with(&[
            0x21, 0x00, 0x10, 0x11, 0x00, 0x20, 0x01, 0x03, 0x00, 0xED, 0xB0,
        ]);
        cpu.bus_mut().load(0x1000, &[0xAA, 0xBB, 0xCC]);

        assert_eq!(steps(&mut cpu, 3), vec![10, 10, 10]);
        assert_eq!(cpu.step().unwrap(), 16 + 21 * 2);

        assert_eq!(cpu.read_byte(0x2000), 0xAA);
        assert_eq!(cpu.read_byte(0x2002), 0xCC);
        assert_eq!(cpu.regs.bc(), 0);
        assert_eq!(cpu.regs.hl(), 0x1003);
        assert_eq!(cpu.regs.de(), 0x2003);
        assert_eq!(cpu.regs.f & PF, 0);
        assert_eq!(cpu.regs.pc, 11);
    }

    #[test]
    fn test_single_ldi_sets_pv_while_bc_remains() {
        // LD BC,2 / LDI
        let mut cpu = cpu_with(&[0x01, 0x02, 0x00, 0xED, 0xA0]);
        cpu.step().unwrap();
        assert_eq!(cpu.step().unwrap(), 16);
        assert_eq!(cpu.regs.bc(), 1);
        assert_ne!(cpu.regs.f & PF, 0);
    }

    #[test]
    fn test_cpir_stops_on_match() {
        // LD HL,$1000 / LD BC,8 / LD A,$33 / CPIR
        let mut cpu = cpu_with(&[
            0x21, 0x00, 0x10, 0x01, 0x08, 0x00, 0x3E, 0x33, 0xED, 0xB1,
        ]);
        cpu.bus_mut().load(0x1000, &[0x11, 0x22, 0x33, 0x44]);
        steps(&mut cpu, 3);

        assert_eq!(cpu.step().unwrap(), 16 + 21 * 2);
        assert_eq!(cpu.regs.hl(), 0x1003);
        assert_eq!(cpu.regs.bc(), 5);
        assert_ne!(cpu.regs.f & ZF, 0);
        assert_ne!(cpu.regs.f & PF, 0);
    }

    #[test]
    fn test_otir_writes_each_byte_to_port() {
        // LD HL,$1000 / LD BC,$0310 / OTIR
        let mut cpu = cpu_with(&[0x21, 0x00, 0x10, 0x01, 0x10, 0x03, 0xED, 0xB3]);
        cpu.bus_mut().load(0x1000, &[1, 2, 3]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        cpu.io_mut()
            .register_output(0x10, move |port, value| sink.borrow_mut().push((port, value)));

        steps(&mut cpu, 2);
        assert_eq!(cpu.step().unwrap(), 16 + 21 * 2);
        assert_eq!(*seen.borrow(), vec![(0x10, 1), (0x10, 2), (0x10, 3)]);
        assert_eq!(cpu.regs.b, 0);
        assert_ne!(cpu.regs.f & ZF, 0);
    }

    #[test]
    fn test_in_from_registered_port() {
        // IN A,($10) / LD C,$20 / IN B,(C)
        let mut cpu = cpu_with(&[0xDB, 0x10, 0x0E, 0x20, 0xED, 0x40]);
        cpu.io_mut().register_input(0x10, |_| 0x5A);
        cpu.io_mut().register_input(0x20, |port| port + 1);

        assert_eq!(cpu.step().unwrap(), 11);
        assert_eq!(cpu.regs.a, 0x5A);
        steps(&mut cpu, 1);
        assert_eq!(cpu.step().unwrap(), 12);
        assert_eq!(cpu.regs.b, 0x21);
        assert_eq!(cpu.regs.f & (SF | ZF | HF | NF), 0);
    }

    #[test]
    fn test_unhandled_port_is_fatal() {
        let mut cpu = cpu_with(&[0x00, 0xD3, 0x42]);
        cpu.step().unwrap();
        assert_eq!(
            cpu.step(),
            Err(CpuError::UnhandledPort {
                port: 0x42,
                pc: 0x0001,
                direction: PortDirection::Out,
            })
        );
    }

    #[test]
    fn test_ed_gap_runs_as_nop() {
        // ED 00 / ED DD / LD A,$42 / DD ED 7F
        let mut cpu = cpu_with(&[0xED, 0x00, 0xED, 0xDD, 0x3E, 0x42, 0xDD, 0xED, 0x7F]);
        let r = cpu.regs.r;
        assert_eq!(steps(&mut cpu, 4), vec![8, 8, 7, 12]);
        assert_eq!(cpu.regs.pc, 0x0009);
        assert_eq!(cpu.regs.a, 0x42, "DD after ED must not prefix the next opcode");
        assert_eq!(cpu.regs.r, r + 2 + 2 + 1 + 3);
    }

    #[test]
    fn test_daa_after_bcd_add() {
        // LD A,$15 / ADD A,$27 / DAA
        let mut cpu = cpu_with(&[0x3E, 0x15, 0xC6, 0x27, 0x27]);
        assert_eq!(steps(&mut cpu, 3), vec![7, 7, 4]);
        assert_eq!(cpu.regs.a, 0x42);
        assert_eq!(cpu.regs.f & CF, 0);
    }

    #[test]
    fn test_refresh_counts_prefixes() {
        // NOP / NOP / LD IX,$1234 / LD A,R
        let mut cpu = cpu_with(&[0x00, 0x00, 0xDD, 0x21, 0x34, 0x12, 0xED, 0x5F]);
        assert_eq!(steps(&mut cpu, 3), vec![4, 4, 14]);
        assert_eq!(cpu.regs.ix, 0x1234);
        assert_eq!(cpu.regs.r, 4);
        assert_eq!(cpu.step().unwrap(), 9);
        assert_eq!(cpu.regs.a, 6);
        // IFF2 is clear after power-on.
        assert_eq!(cpu.regs.f & PF, 0);
    }

    #[test]
    fn test_conditional_jump_timings() {
        // XOR A / JR Z,+2 / NOP / NOP / JR NZ,+2
        let mut cpu = cpu_with(&[0xAF, 0x28, 0x02, 0x00, 0x00, 0x20, 0x02]);
        assert_eq!(steps(&mut cpu, 3), vec![4, 12, 7]);
        assert_eq!(cpu.regs.pc, 7);
    }

    #[test]
    fn test_djnz_loop() {
        // LD B,3 / loop: DJNZ loop
        let mut cpu = cpu_with(&[0x06, 0x03, 0x10, 0xFE]);
        assert_eq!(steps(&mut cpu, 4), vec![7, 13, 13, 8]);
        assert_eq!(cpu.regs.b, 0);
        assert_eq!(cpu.regs.pc, 4);
    }

    #[test]
    fn test_conditional_call_and_return_timings() {
        // SCF / CALL C,$1000 / CALL NC,$1000
        let mut cpu = cpu_with(&[0x37, 0xDC, 0x00, 0x10, 0xD4, 0x00, 0x10]);
        // $1000: RET NZ / RET Z
        cpu.bus_mut().load(0x1000, &[0xC0, 0xC8]);

        assert_eq!(steps(&mut cpu, 2), vec![4, 17]);
        assert_eq!(cpu.regs.pc, 0x1000);
        assert_eq!(cpu.regs.sp, 0xFFFD);
        assert_eq!(cpu.read_word(0xFFFD), 0x0004);

        // Z is still set from the power-on F.
        assert_eq!(steps(&mut cpu, 2), vec![5, 11]);
        assert_eq!(cpu.regs.pc, 0x0004);
        assert_eq!(cpu.regs.sp, 0xFFFF);

        assert_eq!(cpu.step().unwrap(), 10);
        assert_eq!(cpu.regs.pc, 0x0007);
    }

    #[test]
    fn test_im2_vectors_through_table() {
        let mut cpu = cpu_with(&[0x00]);
        cpu.regs.im = 2;
        cpu.regs.iff1 = true;
        cpu.regs.iff2 = true;
        cpu.regs.i = 0x80;
        cpu.set_data_bus(0x10);
        cpu.write_word(0x8010, 0x1234);

        assert!(cpu.signal_interrupt(InterruptSignal::Irq));
        assert_eq!(cpu.step().unwrap(), 19);
        assert_eq!(cpu.regs.pc, 0x1234);
        assert_eq!(cpu.regs.sp, 0xFFFD);
        assert_eq!(cpu.read_word(0xFFFD), 0x0000);
        assert!(!cpu.regs.iff1);
        assert!(!cpu.regs.iff2);
    }

    #[test]
    fn test_im0_is_fatal() {
        let mut cpu = cpu_with(&[0x00]);
        cpu.regs.iff1 = true;
        assert!(cpu.signal_interrupt(InterruptSignal::Irq));
        assert_eq!(
            cpu.emulate_cycle(),
            Err(CpuError::UnsupportedInterruptMode { mode: 0, pc: 0 })
        );
    }

    #[test]
    fn test_irq_ignored_while_disabled() {
        let mut cpu = cpu_with(&[0x00, 0x00]);
        assert!(!cpu.signal_interrupt(InterruptSignal::Irq));
        assert!(!cpu.signal_interrupt(InterruptSignal::Brk));
        assert_eq!(steps(&mut cpu, 2), vec![4, 4]);
        assert_eq!(cpu.regs.pc, 2);
    }

    #[test]
    fn test_halt_until_interrupt() {
        // IM 1 / EI / HALT
        let mut cpu = cpu_with(&[0xED, 0x56, 0xFB, 0x76]);
        assert_eq!(steps(&mut cpu, 3), vec![8, 4, 4]);
        assert!(cpu.regs.halted);
        assert_eq!(cpu.regs.pc, 4);

        let r = cpu.regs.r;
        assert_eq!(steps(&mut cpu, 3), vec![4, 4, 4]);
        assert_eq!(cpu.regs.pc, 4);
        assert_eq!(cpu.regs.r, r + 3);

        assert!(cpu.signal_interrupt(InterruptSignal::Irq));
        assert_eq!(cpu.step().unwrap(), 13);
        assert!(!cpu.regs.halted);
        assert_eq!(cpu.regs.pc, 0x0038);
        assert_eq!(cpu.read_word(cpu.regs.sp), 0x0004);
    }

    #[test]
    fn test_ei_delays_acceptance_by_one_instruction() {
        // IM 1 / EI / NOP / NOP
        let mut cpu = cpu_with(&[0xED, 0x56, 0xFB, 0x00, 0x00]);
        steps(&mut cpu, 2);
        assert!(cpu.signal_interrupt(InterruptSignal::Irq));

        assert_eq!(cpu.step().unwrap(), 4);
        assert_eq!(cpu.regs.pc, 4);
        assert_eq!(cpu.step().unwrap(), 13);
        assert_eq!(cpu.regs.pc, 0x0038);
        assert_eq!(cpu.read_word(cpu.regs.sp), 0x0004);
    }

    #[test]
    fn test_nmi_from_peripheral_line() {
        let mut cpu = cpu_with(&[0x00, 0x00]);
        let line = cpu.bus().interrupt_line();
        line.raise(InterruptSignal::Nmi);

        assert_eq!(cpu.step().unwrap(), 4);
        assert_eq!(cpu.step().unwrap(), 11);
        assert_eq!(cpu.regs.pc, 0x0066);
        assert_eq!(cpu.read_word(cpu.regs.sp), 0x0001);
    }

    #[test]
    fn test_retn_restores_iff1() {
        // RETN at $0066
        let mut cpu = cpu_with(&[0x00]);
        cpu.bus_mut().load(0x0066, &[0xED, 0x45]);
        cpu.regs.iff1 = true;
        cpu.regs.iff2 = true;
        assert!(cpu.signal_interrupt(InterruptSignal::Nmi));

        assert_eq!(cpu.step().unwrap(), 11);
        assert!(!cpu.regs.iff1);
        assert!(cpu.regs.iff2);
        assert_eq!(cpu.step().unwrap(), 14);
        assert!(cpu.regs.iff1);
        assert_eq!(cpu.regs.pc, 0x0000);
    }

    #[test]
    fn test_superseded_index_prefix() {
        // DD FD 21 34 12: LD IY,$1234 with a dead DD in front
        let mut cpu = cpu_with(&[0xDD, 0xFD, 0x21, 0x34, 0x12]);
        cpu.emulate_cycle().unwrap();
        assert!(!cpu.at_instruction_boundary());

        assert_eq!(cpu.step().unwrap(), 17);
        assert_eq!(cpu.total_cycles(), 18);
        assert_eq!(cpu.regs.iy, 0x1234);
        assert_eq!(cpu.regs.ix, 0);
        assert_eq!(cpu.instruction_pc(), 0);
    }

    #[test]
    fn test_index_halves() {
        // LD IX,$1234 / LD A,IXH / LD IXL,$99
        let mut cpu = cpu_with(&[0xDD, 0x21, 0x34, 0x12, 0xDD, 0x7C, 0xDD, 0x2E, 0x99]);
        assert_eq!(steps(&mut cpu, 3), vec![14, 8, 11]);
        assert_eq!(cpu.regs.a, 0x12);
        assert_eq!(cpu.regs.ix, 0x1299);
        assert_eq!(cpu.regs.hl(), 0);
    }

    #[test]
    fn test_indexed_load_uses_displacement() {
        // LD IY,$2000 / LD (IY-2),$77 / LD H,(IY-2)
        let mut cpu = cpu_with(&[
            0xFD, 0x21, 0x00, 0x20, 0xFD, 0x36, 0xFE, 0x77, 0xFD, 0x66, 0xFE,
        ]);
        assert_eq!(steps(&mut cpu, 3), vec![14, 19, 19]);
        assert_eq!(cpu.read_byte(0x1FFE), 0x77);
        assert_eq!(cpu.regs.h, 0x77);
    }

    #[test]
    fn test_ddcb_rotate_copies_to_register() {
        // LD IX,$2000 / RLC (IX+5),B
        let mut cpu = cpu_with(&[0xDD, 0x21, 0x00, 0x20, 0xDD, 0xCB, 0x05, 0x00]);
        cpu.write_byte(0x2005, 0x81);
        let r = cpu.regs.r;

        assert_eq!(steps(&mut cpu, 2), vec![14, 23]);
        assert_eq!(cpu.read_byte(0x2005), 0x03);
        assert_eq!(cpu.regs.b, 0x03);
        assert_ne!(cpu.regs.f & CF, 0);
        assert_eq!(cpu.regs.pc, 8);
        // Two refreshes per instruction; the DDCB opcode byte adds none.
        assert_eq!(cpu.regs.r, r + 4);
    }

    #[test]
    fn test_bit_on_indexed_takes_xy_from_address() {
        // LD IX,$2800 / BIT 0,(IX+0)
        let mut cpu = cpu_with(&[0xDD, 0x21, 0x00, 0x28, 0xDD, 0xCB, 0x00, 0x46]);
        cpu.write_byte(0x2800, 0x00);
        assert_eq!(steps(&mut cpu, 2), vec![14, 20]);
        assert_eq!(cpu.regs.f & (YF | XF), 0x28 & (YF | XF));
        assert_ne!(cpu.regs.f & ZF, 0);
        assert_ne!(cpu.regs.f & HF, 0);
    }

    #[test]
    fn test_ex_de_hl_ignores_index_prefix() {
        // LD HL,$1111 / LD DE,$2222 / DD EB
        let mut cpu = cpu_with(&[0x21, 0x11, 0x11, 0x11, 0x22, 0x22, 0xDD, 0xEB]);
        cpu.regs.ix = 0x3333;
        assert_eq!(steps(&mut cpu, 3), vec![10, 10, 8]);
        assert_eq!(cpu.regs.hl(), 0x2222);
        assert_eq!(cpu.regs.de(), 0x1111);
        assert_eq!(cpu.regs.ix, 0x3333);
    }

    #[test]
    fn test_sixteen_bit_arithmetic_flags() {
        // LD HL,$7FFF / LD BC,1 / OR A / ADC HL,BC / SBC HL,BC
        let mut cpu = cpu_with(&[
            0x21, 0xFF, 0x7F, 0x01, 0x01, 0x00, 0xB7, 0xED, 0x4A, 0xED, 0x42,
        ]);
        assert_eq!(steps(&mut cpu, 4), vec![10, 10, 4, 15]);
        assert_eq!(cpu.regs.hl(), 0x8000);
        assert_ne!(cpu.regs.f & PF, 0);
        assert_ne!(cpu.regs.f & SF, 0);
        assert_eq!(cpu.step().unwrap(), 15);
        assert_eq!(cpu.regs.hl(), 0x7FFF);
        assert_ne!(cpu.regs.f & NF, 0);
    }

    #[test]
    fn test_push_pop_af() {
        // LD BC,$1234 / PUSH BC / POP AF
        let mut cpu = cpu_with(&[0x01, 0x34, 0x12, 0xC5, 0xF1]);
        assert_eq!(steps(&mut cpu, 3), vec![10, 11, 10]);
        assert_eq!(cpu.regs.af(), 0x1234);
        assert_eq!(cpu.regs.sp, 0xFFFF);
    }

    #[test]
    fn test_run_until_counts_t_states() {
        // LD B,2 / DJNZ $ / HALT
        let mut cpu = cpu_with(&[0x06, 0x02, 0x10, 0xFE, 0x76]);
        assert_eq!(cpu.run_until(0x0004).unwrap(), 7 + 13 + 8);
        assert_eq!(cpu.run_until(0x0004).unwrap(), 0);
    }

    #[test]
    fn test_status_string() {
        // XOR A
        let mut cpu = cpu_with(&[0xAF]);
        cpu.step().unwrap();
        assert_eq!(cpu.status_string(), "-Z---P--");
    }

    #[test]
    fn test_observable_paths() {
        let mut cpu = cpu_with(&[0x21, 0x34, 0x12]);
        cpu.step().unwrap();
        assert_eq!(cpu.query("hl"), Some(Value::U16(0x1234)));
        assert_eq!(cpu.query("h"), Some(Value::U8(0x12)));
        assert_eq!(cpu.query("flags.z"), Some(Value::Bool(true)));
        assert_eq!(cpu.query("state"), Some(Value::String("fetch".into())));
        assert_eq!(cpu.query("cycles"), Some(Value::U64(10)));
        assert_eq!(cpu.query("bogus"), None);
        for path in cpu.query_paths() {
            assert!(cpu.query(path).is_some(), "{path}");
        }
    }

    #[test]
    fn test_deterministic_replay() {
        let program = [0x3E, 0x15, 0xC6, 0x27, 0x27, 0x06, 0x03, 0x10, 0xFE, 0x76];
        let run = || {
            let mut cpu = cpu_with(&program);
            let cycles = cpu.run_until(0x0009).unwrap();
            (cycles, cpu.regs)
        };
        assert_eq!(run(), run());
    }
}
