//! Interrupt requests and the shared interrupt line.

use std::cell::Cell;
use std::rc::Rc;

/// An interrupt request.
///
/// This is a request, not CPU state: the CPU decides on receipt whether to
/// latch it (NMI always, IRQ only while maskable interrupts are enabled) and
/// acts on latched requests at the next instruction boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterruptSignal {
    #[default]
    None,
    /// Maskable interrupt.
    Irq,
    /// Non-maskable interrupt.
    Nmi,
    /// Software interrupt (6502 BRK).
    Brk,
}

impl InterruptSignal {
    const fn bit(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Irq => 0x01,
            Self::Nmi => 0x02,
            Self::Brk => 0x04,
        }
    }
}

/// A cloneable handle peripherals use to raise interrupts.
///
/// Memory and port handlers run while the CPU is mutably borrowed, so they
/// cannot call `signal_interrupt` directly. Instead they keep a clone of the
/// bus's line and raise signals on it; the CPU drains the line at the end of
/// every cycle and feeds each signal through its normal masking rules.
#[derive(Debug, Clone, Default)]
pub struct InterruptLine {
    pending: Rc<Cell<u8>>,
}

impl InterruptLine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise a signal. Raising the same signal twice before it is drained
    /// has the same effect as raising it once.
    pub fn raise(&self, signal: InterruptSignal) {
        self.pending.set(self.pending.get() | signal.bit());
    }

    /// True if any signal is waiting to be drained.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.pending.get() != 0
    }

    /// Take every raised signal, clearing the line.
    pub fn take(&self) -> PendingSignals {
        PendingSignals(self.pending.replace(0))
    }
}

/// Signals drained from an [`InterruptLine`], yielded NMI first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSignals(u8);

impl Iterator for PendingSignals {
    type Item = InterruptSignal;

    fn next(&mut self) -> Option<InterruptSignal> {
        for signal in [
            InterruptSignal::Nmi,
            InterruptSignal::Brk,
            InterruptSignal::Irq,
        ] {
            if self.0 & signal.bit() != 0 {
                self.0 &= !signal.bit();
                return Some(signal);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_line() {
        let line = InterruptLine::new();
        let peripheral = line.clone();
        peripheral.raise(InterruptSignal::Irq);
        assert!(line.is_raised());

        let drained: Vec<_> = line.take().collect();
        assert_eq!(drained, vec![InterruptSignal::Irq]);
        assert!(!peripheral.is_raised());
    }

    #[test]
    fn nmi_drains_first() {
        let line = InterruptLine::new();
        line.raise(InterruptSignal::Irq);
        line.raise(InterruptSignal::Nmi);
        line.raise(InterruptSignal::None);

        let drained: Vec<_> = line.take().collect();
        assert_eq!(drained, vec![InterruptSignal::Nmi, InterruptSignal::Irq]);
    }
}
