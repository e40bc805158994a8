//! Flat 64K memory bus.
//!
//! Every address is routed through a 64K indirection table. Route 0 means
//! plain RAM; any other value names a registered handler. RAM is a single
//! contiguous window starting at a configurable offset, so a machine with
//! RAM at $8000-$BFFF does not need to allocate the whole address space.

use log::debug;

use crate::error::BusError;
use crate::interrupt::InterruptLine;

const ADDRESS_SPACE: usize = 0x1_0000;

/// A device mapped into the address space.
///
/// Handlers always receive the absolute address, not an offset into their
/// range.
pub trait MemoryHandler {
    /// Read a byte. May have side effects (clearing a status register,
    /// raising an interrupt).
    fn read(&mut self, addr: u16) -> u8;

    /// Write a byte.
    fn write(&mut self, addr: u16, value: u8);
}

/// Adapts a pair of closures into a [`MemoryHandler`].
pub struct FnHandler<R, W> {
    read: R,
    write: W,
}

impl<R, W> FnHandler<R, W>
where
    R: FnMut(u16) -> u8,
    W: FnMut(u16, u8),
{
    pub fn new(read: R, write: W) -> Self {
        Self { read, write }
    }
}

impl<R, W> MemoryHandler for FnHandler<R, W>
where
    R: FnMut(u16) -> u8,
    W: FnMut(u16, u8),
{
    fn read(&mut self, addr: u16) -> u8 {
        (self.read)(addr)
    }

    fn write(&mut self, addr: u16, value: u8) {
        (self.write)(addr, value);
    }
}

/// Index of a registered handler.
///
/// Indices start at 1 and are handed out in registration order. They are
/// never reused, even when every address of a range has been overridden by
/// later registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(u16);

impl HandlerId {
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }
}

struct HandlerSlot {
    start: u16,
    end: u16,
    handler: Box<dyn MemoryHandler>,
}

/// The memory bus owned by a CPU.
pub struct MemoryBus {
    /// Installed RAM, starting at `ram_offset`.
    ram: Vec<u8>,
    ram_offset: u16,
    /// Address -> handler index (0 = RAM).
    routes: Box<[u16]>,
    /// Handler index `n` lives at `handlers[n - 1]`.
    handlers: Vec<HandlerSlot>,
    interrupts: InterruptLine,
}

impl MemoryBus {
    /// Create a bus with no RAM and no handlers. Every read returns 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ram: Vec::new(),
            ram_offset: 0,
            routes: vec![0; ADDRESS_SPACE].into_boxed_slice(),
            handlers: Vec::new(),
            interrupts: InterruptLine::new(),
        }
    }

    /// Create a bus with `size` bytes of RAM starting at address 0.
    #[must_use]
    pub fn with_ram(size: usize) -> Self {
        let mut bus = Self::new();
        bus.install_ram(0, size);
        bus
    }

    /// Grow the RAM window by `size` bytes and move its base to `offset`.
    ///
    /// New bytes are zero. The window never extends past $FFFF.
    pub fn install_ram(&mut self, offset: u16, size: usize) {
        let limit = ADDRESS_SPACE - usize::from(offset);
        let len = (self.ram.len() + size).min(limit);
        self.ram.resize(len, 0);
        self.ram_offset = offset;
        debug!(
            "RAM window {offset:04X}-{:04X} ({len} bytes)",
            usize::from(offset) + len.saturating_sub(1)
        );
    }

    /// [`install_ram`](Self::install_ram) with the size given in kilobytes.
    pub fn install_ram_kb(&mut self, offset: u16, kb: usize) {
        self.install_ram(offset, kb * 1024);
    }

    /// Base address and length of the RAM window.
    #[must_use]
    pub fn ram_window(&self) -> (u16, usize) {
        (self.ram_offset, self.ram.len())
    }

    /// Route every address in `start..=end` to `handler`.
    ///
    /// Addresses already routed elsewhere are taken over; addresses of an
    /// earlier range outside `start..=end` keep their old route.
    pub fn register_handler(
        &mut self,
        start: u16,
        end: u16,
        handler: Box<dyn MemoryHandler>,
    ) -> Result<HandlerId, BusError> {
        if start > end {
            return Err(BusError::InvalidRange { start, end });
        }
        let index = u16::try_from(self.handlers.len() + 1)
            .map_err(|_| BusError::HandlersExhausted)?;

        self.handlers.push(HandlerSlot {
            start,
            end,
            handler,
        });
        for route in &mut self.routes[usize::from(start)..=usize::from(end)] {
            *route = index;
        }
        debug!("handler {index} mapped at {start:04X}-{end:04X}");
        Ok(HandlerId(index))
    }

    /// Route `start..=end` to a pair of closures.
    pub fn register_range<R, W>(
        &mut self,
        start: u16,
        end: u16,
        read: R,
        write: W,
    ) -> Result<HandlerId, BusError>
    where
        R: FnMut(u16) -> u8 + 'static,
        W: FnMut(u16, u8) + 'static,
    {
        self.register_handler(start, end, Box::new(FnHandler::new(read, write)))
    }

    /// Route a single address, typically a peripheral register.
    pub fn register_address<R, W>(
        &mut self,
        addr: u16,
        read: R,
        write: W,
    ) -> Result<HandlerId, BusError>
    where
        R: FnMut(u16) -> u8 + 'static,
        W: FnMut(u16, u8) + 'static,
    {
        self.register_range(addr, addr, read, write)
    }

    /// The handler currently serving `addr`, or `None` for RAM.
    #[must_use]
    pub fn route(&self, addr: u16) -> Option<HandlerId> {
        match self.routes[usize::from(addr)] {
            0 => None,
            index => Some(HandlerId(index)),
        }
    }

    /// The range a handler was registered with.
    #[must_use]
    pub fn handler_range(&self, id: HandlerId) -> Option<(u16, u16)> {
        let slot = self.handlers.get(usize::from(id.0).checked_sub(1)?)?;
        Some((slot.start, slot.end))
    }

    /// Number of handlers registered so far.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// A handle peripherals can use to raise interrupts on the owning CPU.
    #[must_use]
    pub fn interrupt_line(&self) -> InterruptLine {
        self.interrupts.clone()
    }

    pub fn read_byte(&mut self, addr: u16) -> u8 {
        match self.routes[usize::from(addr)] {
            0 => self.peek_ram(addr),
            index => self.handlers[usize::from(index - 1)].handler.read(addr),
        }
    }

    pub fn write_byte(&mut self, addr: u16, value: u8) {
        match self.routes[usize::from(addr)] {
            0 => self.poke_ram(addr, value),
            index => self.handlers[usize::from(index - 1)]
                .handler
                .write(addr, value),
        }
    }

    /// Little-endian word read; the high byte wraps from $FFFF to $0000.
    pub fn read_word(&mut self, addr: u16) -> u16 {
        let lo = self.read_byte(addr);
        let hi = self.read_byte(addr.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    /// Little-endian word write; the high byte wraps from $FFFF to $0000.
    pub fn write_word(&mut self, addr: u16, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.write_byte(addr, lo);
        self.write_byte(addr.wrapping_add(1), hi);
    }

    /// Read RAM directly, ignoring handlers. Outside the window this is 0.
    #[must_use]
    pub fn peek_ram(&self, addr: u16) -> u8 {
        self.ram_index(addr).map_or(0, |i| self.ram[i])
    }

    /// Write RAM directly, ignoring handlers. Outside the window this is a
    /// no-op.
    pub fn poke_ram(&mut self, addr: u16, value: u8) {
        if let Some(i) = self.ram_index(addr) {
            self.ram[i] = value;
        }
    }

    fn ram_index(&self, addr: u16) -> Option<usize> {
        let i = usize::from(addr).checked_sub(usize::from(self.ram_offset))?;
        (i < self.ram.len()).then_some(i)
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}
