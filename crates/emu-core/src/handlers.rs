//! Ready-made handlers for extra RAM and ROM windows.

use crate::bus::{HandlerId, MemoryBus, MemoryHandler};
use crate::error::BusError;

/// A block of RAM mapped outside the bus's main RAM window.
#[derive(Debug, Clone)]
pub struct RamExtension {
    base: u16,
    data: Vec<u8>,
}

impl RamExtension {
    /// `size` bytes of zeroed RAM at `base`, clamped to the address space.
    #[must_use]
    pub fn new(base: u16, size: usize) -> Self {
        let size = size.min(0x1_0000 - usize::from(base));
        Self {
            base,
            data: vec![0; size],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Map the extension onto the bus over its whole range.
    pub fn register(self, bus: &mut MemoryBus) -> Result<HandlerId, BusError> {
        let (start, end) = span(self.base, self.data.len())?;
        bus.register_handler(start, end, Box::new(self))
    }
}

impl MemoryHandler for RamExtension {
    fn read(&mut self, addr: u16) -> u8 {
        let i = usize::from(addr.wrapping_sub(self.base));
        self.data.get(i).copied().unwrap_or(0)
    }

    fn write(&mut self, addr: u16, value: u8) {
        let i = usize::from(addr.wrapping_sub(self.base));
        if let Some(byte) = self.data.get_mut(i) {
            *byte = value;
        }
    }
}

/// A read-only image mapped at a fixed address.
///
/// Bus writes are ignored. Use [`patch`](Self::patch) before registering to
/// modify the image (e.g. to skip a hardware check in a system ROM).
#[derive(Debug, Clone)]
pub struct RomModule {
    base: u16,
    image: Vec<u8>,
}

impl RomModule {
    #[must_use]
    pub fn new(base: u16, image: impl Into<Vec<u8>>) -> Self {
        let mut image = image.into();
        image.truncate(0x1_0000 - usize::from(base));
        Self { base, image }
    }

    /// Overwrite one byte of the image. Addresses outside it are ignored.
    pub fn patch(&mut self, addr: u16, value: u8) {
        let i = usize::from(addr.wrapping_sub(self.base));
        if let Some(byte) = self.image.get_mut(i) {
            *byte = value;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.image.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }

    pub fn register(self, bus: &mut MemoryBus) -> Result<HandlerId, BusError> {
        let (start, end) = span(self.base, self.image.len())?;
        bus.register_handler(start, end, Box::new(self))
    }
}

impl MemoryHandler for RomModule {
    fn read(&mut self, addr: u16) -> u8 {
        let i = usize::from(addr.wrapping_sub(self.base));
        self.image.get(i).copied().unwrap_or(0xFF)
    }

    fn write(&mut self, _addr: u16, _value: u8) {}
}

fn span(base: u16, len: usize) -> Result<(u16, u16), BusError> {
    let last = usize::from(base) + len;
    match last.checked_sub(1).map(u16::try_from) {
        Some(Ok(end)) if len > 0 => Ok((base, end)),
        _ => Err(BusError::InvalidRange {
            start: base,
            end: base.wrapping_add(len as u16).wrapping_sub(1),
        }),
    }
}
