//! Z80 I/O port space.
//!
//! 256 byte-wide ports, separate from memory. Each port may have an input
//! handler, an output handler, or both. Ports are selected by the low byte
//! of the address the CPU drives; the high byte (A or B) is ignored.

use emu_core::{CpuError, PortDirection};

type InputFn = Box<dyn FnMut(u8) -> u8>;
type OutputFn = Box<dyn FnMut(u8, u8)>;

/// Port handlers.
pub struct IoPorts {
    inputs: Vec<Option<InputFn>>,
    outputs: Vec<Option<OutputFn>>,
}

impl Default for IoPorts {
    fn default() -> Self {
        Self::new()
    }
}

impl IoPorts {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inputs: std::iter::repeat_with(|| None).take(256).collect(),
            outputs: std::iter::repeat_with(|| None).take(256).collect(),
        }
    }

    /// Serve `IN` from `port`. The handler receives the port number.
    /// Replaces any earlier input handler for that port.
    pub fn register_input<F>(&mut self, port: u8, handler: F)
    where
        F: FnMut(u8) -> u8 + 'static,
    {
        log::debug!("input handler on port {port:02X}");
        self.inputs[usize::from(port)] = Some(Box::new(handler));
    }

    /// Receive `OUT` to `port` as `(port, value)`.
    pub fn register_output<F>(&mut self, port: u8, handler: F)
    where
        F: FnMut(u8, u8) + 'static,
    {
        log::debug!("output handler on port {port:02X}");
        self.outputs[usize::from(port)] = Some(Box::new(handler));
    }

    #[must_use]
    pub fn has_input(&self, port: u8) -> bool {
        self.inputs[usize::from(port)].is_some()
    }

    #[must_use]
    pub fn has_output(&self, port: u8) -> bool {
        self.outputs[usize::from(port)].is_some()
    }

    /// Read `port`. `pc` is reported if nothing is listening.
    pub fn read(&mut self, port: u8, pc: u16) -> Result<u8, CpuError> {
        match &mut self.inputs[usize::from(port)] {
            Some(handler) => Ok(handler(port)),
            None => Err(CpuError::UnhandledPort {
                port,
                pc,
                direction: PortDirection::In,
            }),
        }
    }

    pub fn write(&mut self, port: u8, value: u8, pc: u16) -> Result<(), CpuError> {
        match &mut self.outputs[usize::from(port)] {
            Some(handler) => {
                handler(port, value);
                Ok(())
            }
            None => Err(CpuError::UnhandledPort {
                port,
                pc,
                direction: PortDirection::Out,
            }),
        }
    }
}
