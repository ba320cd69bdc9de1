//! Capability interface for the CAN controller peripheral.
//!
//! The register-level chip driver (SPI transactions, buffer management, bus
//! timing) lives outside this crate. The link layer only needs the
//! operations below, so the whole driver core can be exercised against a
//! simulated controller.

use arrayvec::ArrayVec;

/// Maximum payload of a classic CAN frame.
pub const MTU: usize = 8;

/// A raw frame as read from or handed to the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub id: u32,
    pub extended: bool,
    pub payload: ArrayVec<[u8; MTU]>,
}

/// Operating mode reported by the controller.
///
/// `ListenOnly` is the half-woken state some controllers enter after a
/// wake-on-activity interrupt: receiving but not acknowledging.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ControllerMode {
    Normal,
    Sleep,
    ListenOnly,
}

/// Direction of a controller-routed pin.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PinDirection {
    Input,
    Output,
}

/// Level of a digital pin.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PinLevel {
    Low,
    High,
}

/// Bus timing handed to [`CanController::initialize`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BusTiming {
    /// Nominal bit rate in kbit/s.
    pub bitrate_kbps: u16,
    /// Controller crystal frequency in MHz.
    pub oscillator_mhz: u8,
}

impl BusTiming {
    pub const fn new(bitrate_kbps: u16, oscillator_mhz: u8) -> Self {
        Self {
            bitrate_kbps,
            oscillator_mhz,
        }
    }
}

/// Contract the link driver requires from the CAN controller chip.
pub trait CanController {
    type Error;

    /// Bring the controller up on the bus with the given timing.
    fn initialize(&mut self, timing: BusTiming) -> Result<(), Self::Error>;

    /// Is a received frame waiting in the controller's buffers?
    fn receive_pending(&mut self) -> bool;

    /// Pull the next received frame out of the controller.
    fn read_frame(&mut self) -> Result<Frame, Self::Error>;

    /// Queue a frame for transmission and wait for the controller to take it.
    fn send_frame(&mut self, id: u32, extended: bool, data: &[u8]) -> Result<(), Self::Error>;

    /// Put the controller into its low-power mode.
    fn sleep(&mut self) -> Result<(), Self::Error>;

    /// Return the controller to normal operation.
    fn wake(&mut self) -> Result<(), Self::Error>;

    /// Current operating mode.
    fn mode(&mut self) -> ControllerMode;

    /// Let bus activity wake the controller out of sleep mode.
    fn set_wake_on_activity(&mut self, enabled: bool) -> Result<(), Self::Error>;

    /// Configure the direction of a pin routed through the controller.
    fn configure_pin(&mut self, pin: u8, direction: PinDirection) -> Result<(), Self::Error>;

    /// Drive a pin routed through the controller.
    fn write_pin(&mut self, pin: u8, level: PinLevel) -> Result<(), Self::Error>;
}
