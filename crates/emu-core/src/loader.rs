//! Program loaders.
//!
//! Two image formats are understood:
//!
//! - raw: the bytes are copied to consecutive addresses from a base address;
//! - segmented: repeated blocks of `addr: u16 LE`, `len: u16 LE`,
//!   `data: [u8; len]` until the input is exhausted (the cc65 `-t none`
//!   output format, used for pre-linked multi-segment images).
//!
//! Both write straight into the RAM window, bypassing handlers, so ROM
//! images mapped by handlers are not clobbered. Bytes that land outside the
//! window are dropped.

use log::debug;

use crate::bus::MemoryBus;
use crate::error::LoadError;

/// One block written by [`MemoryBus::load_segmented`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub addr: u16,
    pub len: u16,
}

impl MemoryBus {
    /// Copy a raw image into RAM at `base`, wrapping at $FFFF.
    pub fn load(&mut self, base: u16, data: &[u8]) {
        let mut addr = base;
        for &byte in data {
            self.poke_ram(addr, byte);
            addr = addr.wrapping_add(1);
        }
        debug!("loaded {} bytes at {base:04X}", data.len());
    }

    /// Load a segmented image, returning the blocks in file order.
    pub fn load_segmented(&mut self, data: &[u8]) -> Result<Vec<Segment>, LoadError> {
        let mut segments = Vec::new();
        let mut offset = 0;

        while offset < data.len() {
            let rest = &data[offset..];
            let header = rest.get(..4).ok_or(LoadError::Truncated {
                offset,
                needed: 4,
                available: rest.len(),
            })?;
            let addr = u16::from_le_bytes([header[0], header[1]]);
            let len = u16::from_le_bytes([header[2], header[3]]);

            let needed = 4 + usize::from(len);
            let body = rest.get(4..needed).ok_or(LoadError::Truncated {
                offset,
                needed,
                available: rest.len(),
            })?;
            self.load(addr, body);

            segments.push(Segment { addr, len });
            offset += needed;
        }

        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_load_wraps_and_skips_non_ram() {
        let mut bus = MemoryBus::with_ram(0x1_0000);
        bus.load(0xFFFE, &[1, 2, 3]);
        assert_eq!(bus.read_byte(0xFFFE), 1);
        assert_eq!(bus.read_byte(0xFFFF), 2);
        assert_eq!(bus.read_byte(0x0000), 3);

        let mut small = MemoryBus::with_ram(0x100);
        small.load(0x00FF, &[9, 9]);
        assert_eq!(small.read_byte(0x00FF), 9);
        assert_eq!(small.read_byte(0x0100), 0);
    }

    #[test]
    fn segmented_image_loads_every_block() {
        let image = [
            0x00, 0x02, 0x03, 0x00, 0xA9, 0x01, 0x60, // $0200: 3 bytes
            0xFC, 0xFF, 0x02, 0x00, 0x00, 0x02, // $FFFC: reset vector
        ];
        let mut bus = MemoryBus::with_ram(0x1_0000);
        let segments = bus.load_segmented(&image).unwrap();

        assert_eq!(
            segments,
            vec![
                Segment { addr: 0x0200, len: 3 },
                Segment { addr: 0xFFFC, len: 2 },
            ]
        );
        assert_eq!(bus.read_byte(0x0200), 0xA9);
        assert_eq!(bus.read_byte(0x0202), 0x60);
        assert_eq!(bus.read_word(0xFFFC), 0x0200);
    }

    #[test]
    fn empty_image_loads_nothing() {
        let mut bus = MemoryBus::with_ram(0x100);
        assert_eq!(bus.load_segmented(&[]).unwrap(), Vec::new());
    }

    #[test]
    fn truncated_block_is_reported() {
        let mut bus = MemoryBus::with_ram(0x1_0000);
        let image = [0x00, 0x10, 0x04, 0x00, 0xAA, 0xBB];
        assert_eq!(
            bus.load_segmented(&image),
            Err(LoadError::Truncated {
                offset: 0,
                needed: 8,
                available: 6
            })
        );

        let header_only = [0x00, 0x10, 0x01, 0x00, 0xAA, 0x00];
        assert_eq!(
            bus.load_segmented(&header_only),
            Err(LoadError::Truncated {
                offset: 5,
                needed: 4,
                available: 1
            })
        );
    }
}
