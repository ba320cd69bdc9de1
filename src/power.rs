//! Sleep/wake policy for the controller and transceiver.
//!
//! Battery nodes power the CAN controller down between messages and rely on
//! wake-on-activity to come back. This module owns the controller's mode
//! transitions, the transceiver standby line, and the autosleep-on-idle
//! policy with its keep-awake window.

use embedded_hal::digital::v2::OutputPin;
use embedded_time::duration::{Generic, Milliseconds};
use embedded_time::{Clock, Instant};
use log::debug;

use crate::controller::{CanController, ControllerMode, PinDirection, PinLevel};
use crate::time;
use crate::PowerError;

/// How long the controller stays awake after the last bus activity unless
/// reconfigured. Must be comfortably longer than any wakeup-handshake delay
/// in use on the bus.
pub const DEFAULT_KEEP_AWAKE: Milliseconds<u32> = Milliseconds(400);

/// Wiring of the transceiver's standby (Rs) input.
pub enum StandbyLine<O> {
    /// Transceiver has no controllable standby input.
    None,
    /// Standby is driven by one of the CAN controller's own pins.
    Controller(u8),
    /// Standby is driven by a host GPIO.
    Host(O),
}

/// Placeholder output for configurations without a host-routed standby pin.
pub struct NoStandbyPin;

impl OutputPin for NoStandbyPin {
    type Error = core::convert::Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Owns the controller peripheral and drives its power state.
///
/// The sleep/awake state itself lives in the controller's mode register;
/// this struct adds the standby wiring and the idle-tracking needed for
/// autosleep.
pub struct PowerController<P, O, C: Clock> {
    controller: P,
    standby: StandbyLine<O>,
    autosleep: bool,
    keep_awake: Milliseconds<u32>,
    /// `None` means no activity since construction, which counts as idle.
    last_activity: Option<Instant<C>>,
}

impl<P, O, C> PowerController<P, O, C>
where
    P: CanController,
    O: OutputPin,
    C: Clock,
    Milliseconds<u32>: TryFrom<Generic<C::T>>,
{
    pub fn new(controller: P) -> Self {
        Self {
            controller,
            standby: StandbyLine::None,
            autosleep: false,
            keep_awake: DEFAULT_KEEP_AWAKE,
            last_activity: None,
        }
    }

    /// Access the underlying controller.
    pub fn controller_mut(&mut self) -> &mut P {
        &mut self.controller
    }

    /// Give the controller back.
    pub fn release(self) -> P {
        self.controller
    }

    /// True iff the controller reports its low-power mode.
    pub fn is_sleeping(&mut self) -> bool {
        self.controller.mode() == ControllerMode::Sleep
    }

    /// Put the controller, and the transceiver if wired, into standby.
    ///
    /// A no-op when the controller is already sleeping. On a controller
    /// failure the standby line is left untouched so the caller may retry.
    pub fn sleep(&mut self) -> Result<(), PowerError<P::Error, O::Error>> {
        if self.is_sleeping() {
            return Ok(());
        }
        debug!("entering sleep mode");
        self.controller.sleep().map_err(PowerError::Controller)?;
        self.drive_standby(PinLevel::High)
    }

    /// Bring the controller and transceiver back to normal operation.
    ///
    /// Always restarts the keep-awake window, even when already awake, so
    /// repeated calls extend it.
    pub fn wake(&mut self, now: Instant<C>) -> Result<(), PowerError<P::Error, O::Error>> {
        self.last_activity = Some(now);
        self.controller.wake().map_err(PowerError::Controller)?;
        self.drive_standby(PinLevel::Low)
    }

    /// Sleep if autosleep is on, nothing is waiting in the receive buffer,
    /// and the keep-awake window has run out.
    ///
    /// Invoked opportunistically after sends and after empty receive polls.
    pub fn maybe_autosleep(&mut self, now: Instant<C>) -> Result<(), PowerError<P::Error, O::Error>> {
        if !self.autosleep {
            return Ok(());
        }
        if self.controller.receive_pending() {
            return Ok(());
        }
        if !self.idle_expired(&now) {
            return Ok(());
        }
        self.sleep()
    }

    /// Update the autosleep policy and evaluate it right away, so enabling
    /// it on an already-idle bus sleeps immediately.
    pub fn set_autosleep(
        &mut self,
        enabled: bool,
        keep_awake: Milliseconds<u32>,
        now: Instant<C>,
    ) -> Result<(), PowerError<P::Error, O::Error>> {
        self.autosleep = enabled;
        self.keep_awake = keep_awake;
        self.maybe_autosleep(now)
    }

    /// Configure the transceiver standby wiring.
    ///
    /// Sets up the pin direction once for controller-routed wiring (host
    /// pins are outputs by type), then drives the line to match the current
    /// sleep state.
    pub fn set_standby_line(
        &mut self,
        line: StandbyLine<O>,
    ) -> Result<(), PowerError<P::Error, O::Error>> {
        if let StandbyLine::Controller(pin) = line {
            self.controller
                .configure_pin(pin, PinDirection::Output)
                .map_err(PowerError::Controller)?;
        }
        self.standby = line;
        let level = if self.is_sleeping() {
            PinLevel::High
        } else {
            PinLevel::Low
        };
        self.drive_standby(level)
    }

    /// Let bus activity wake the controller out of sleep mode.
    pub fn set_wake_on_activity(
        &mut self,
        enabled: bool,
    ) -> Result<(), PowerError<P::Error, O::Error>> {
        self.controller
            .set_wake_on_activity(enabled)
            .map_err(PowerError::Controller)
    }

    fn idle_expired(&self, now: &Instant<C>) -> bool {
        match &self.last_activity {
            Some(last) => time::elapsed_ms(last, now) > self.keep_awake,
            None => true,
        }
    }

    fn drive_standby(&mut self, level: PinLevel) -> Result<(), PowerError<P::Error, O::Error>> {
        match self.standby {
            StandbyLine::None => Ok(()),
            StandbyLine::Controller(pin) => self
                .controller
                .write_pin(pin, level)
                .map_err(PowerError::Controller),
            StandbyLine::Host(ref mut pin) => match level {
                PinLevel::High => pin.set_high().map_err(PowerError::StandbyPin),
                PinLevel::Low => pin.set_low().map_err(PowerError::StandbyPin),
            },
        }
    }
}
