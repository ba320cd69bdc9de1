//! Bus-activity latch shared between the interrupt handler and the driver.

use core::sync::atomic::{AtomicBool, Ordering};

/// Atomic flag raised by the CAN interrupt line.
///
/// The hosting environment wires the controller's interrupt output to an
/// edge-triggered handler that calls [`notify`](BusActivity::notify); the
/// receive path observes the flag on its next poll. Instances are meant to
/// live in a `static` and be shared by reference.
///
/// Several drivers may share one latch when their interrupt lines share a
/// handler. Any of them may then consume the notification; a spurious wake on
/// another bus's traffic is tolerated by design.
pub struct BusActivity(AtomicBool);

impl BusActivity {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Record bus activity. Safe to call from the interrupt handler.
    pub fn notify(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Has activity been seen since the last clear?
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Drop the pending notification.
    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Consume the notification, returning whether one was pending.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

impl Default for BusActivity {
    fn default() -> Self {
        Self::new()
    }
}
