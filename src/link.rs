//! Send/receive orchestration over the CAN controller.

use arrayvec::ArrayVec;
use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::digital::v2::{InputPin, OutputPin};
use embedded_time::duration::{Generic, Milliseconds};
use embedded_time::{Clock, Instant};
use log::{debug, warn};

use crate::activity::BusActivity;
use crate::address::AddressMeta;
use crate::controller::{BusTiming, CanController, MTU};
use crate::dedup::DuplicateFilter;
use crate::power::{PowerController, StandbyLine};
use crate::LinkError;

/// Opcode carried by the single-byte wakeup handshake frame. Both ends of a
/// link must agree on it.
pub const CMD_WAKE: u8 = 0x57;

/// Pause between the wakeup handshake and the real frame unless
/// reconfigured. Leaves the remote transceiver time to come out of standby.
pub const DEFAULT_HANDSHAKE_DELAY: Milliseconds<u32> = Milliseconds(200);

/// A received unit handed to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    pub meta: AddressMeta,
    pub payload: ArrayVec<[u8; MTU]>,
}

/// Interrupt-driven CAN link driver.
///
/// Ties the address codec, the duplicate filter and the power policy to a
/// [`CanController`]. The hosting environment wires the controller's
/// interrupt output to a falling-edge handler that calls
/// [`BusActivity::notify`] on the shared flag; [`receive`](Self::receive)
/// picks the notification up on its next poll.
pub struct LinkDriver<P, O, I, D, C: Clock> {
    power: PowerController<P, O, C>,
    filter: DuplicateFilter<C>,
    clock: C,
    delay: D,
    int_pin: I,
    activity: &'static BusActivity,
    timing: BusTiming,
    handshake_delay: Option<Milliseconds<u32>>,
}

impl<P, O, I, D, C> LinkDriver<P, O, I, D, C>
where
    P: CanController,
    O: OutputPin,
    I: InputPin,
    D: DelayMs<u32>,
    C: Clock,
    Milliseconds<u32>: TryFrom<Generic<C::T>>,
{
    /// Assemble a driver around an interrupt-wired controller.
    ///
    /// `int_pin` must read the same line the interrupt handler is attached
    /// to; it is polled to decide when the activity flag may be cleared.
    /// The controller is not touched until [`initialize`](Self::initialize).
    pub fn new(
        controller: P,
        int_pin: I,
        activity: &'static BusActivity,
        clock: C,
        delay: D,
        timing: BusTiming,
    ) -> Self {
        Self {
            power: PowerController::new(controller),
            filter: DuplicateFilter::new(),
            clock,
            delay,
            int_pin,
            activity,
            timing,
            handshake_delay: None,
        }
    }

    /// Bring the controller up on the bus with the timing given at
    /// construction.
    pub fn initialize(&mut self) -> Result<(), LinkError<P::Error, O::Error>> {
        self.power
            .controller_mut()
            .initialize(self.timing)
            .map_err(LinkError::Controller)
    }

    /// Encode an address and transmit a frame.
    ///
    /// Wakes the node first so it is reachable even if it had autoslept.
    /// With the wakeup handshake enabled a single-byte [`CMD_WAKE`] frame
    /// goes out first; its failure aborts the whole send without attempting
    /// the real frame. An autosleep opportunity runs afterwards regardless
    /// of the transmit outcome and never affects the reported result.
    pub fn send(
        &mut self,
        meta: &AddressMeta,
        payload: &[u8],
    ) -> Result<(), LinkError<P::Error, O::Error>> {
        let id = meta.encode()?;
        if payload.len() > MTU {
            return Err(LinkError::PayloadTooLarge);
        }

        let now = self.now()?;
        self.power.wake(now)?;

        if let Some(pause) = self.handshake_delay {
            if let Err(e) = self.power.controller_mut().send_frame(id, true, &[CMD_WAKE]) {
                warn!("wakeup handshake transmit failed");
                return Err(LinkError::Controller(e));
            }
            self.delay.delay_ms(pause.0);
        }

        let result = self
            .power
            .controller_mut()
            .send_frame(id, true, payload)
            .map_err(LinkError::Controller);

        self.autosleep_opportunity();
        result
    }

    /// Poll for a received packet.
    ///
    /// Consumes a pending activity notification by waking the node; the
    /// flag is cleared only once the interrupt line reads inactive again,
    /// so a still-asserted line leaves it set for the next poll. Returns
    /// `Ok(None)` when nothing is available or the frame was a suppressed
    /// duplicate.
    pub fn receive(&mut self) -> Result<Option<Packet>, LinkError<P::Error, O::Error>> {
        if self.activity.is_set() {
            // The controller may sit half-woken in listen-only mode after an
            // activity interrupt; a full wake is required either way.
            let now = self.now()?;
            self.power.wake(now)?;
            // Active-low line: high means no further message is pending.
            if matches!(self.int_pin.is_high(), Ok(true)) {
                self.activity.clear();
            }
        }

        if !self.power.controller_mut().receive_pending() {
            self.autosleep_opportunity();
            return Ok(None);
        }

        let frame = self
            .power
            .controller_mut()
            .read_frame()
            .map_err(LinkError::Controller)?;

        let now = self.now()?;
        if !self.filter.accept(frame.id, frame.payload.as_slice(), now) {
            return Ok(None);
        }

        Ok(Some(Packet {
            meta: AddressMeta::decode(frame.id),
            payload: frame.payload,
        }))
    }

    /// Manually put the node to sleep.
    pub fn sleep(&mut self) -> Result<(), LinkError<P::Error, O::Error>> {
        self.power.sleep().map_err(LinkError::from)
    }

    /// Manually wake the node, restarting the keep-awake window.
    pub fn wake(&mut self) -> Result<(), LinkError<P::Error, O::Error>> {
        let now = self.now()?;
        self.power.wake(now).map_err(LinkError::from)
    }

    pub fn is_sleeping(&mut self) -> bool {
        self.power.is_sleeping()
    }

    /// Enable or disable suppression of retransmitted duplicate frames.
    pub fn set_filter_duplicates(&mut self, enabled: bool) {
        self.filter.set_enabled(enabled);
    }

    /// Configure the wakeup handshake; `None` disables it.
    pub fn set_wakeup_handshake(&mut self, delay: Option<Milliseconds<u32>>) {
        self.handshake_delay = delay;
    }

    /// Update the autosleep policy, evaluating it immediately.
    pub fn set_autosleep(
        &mut self,
        enabled: bool,
        keep_awake: Milliseconds<u32>,
    ) -> Result<(), LinkError<P::Error, O::Error>> {
        let now = self.now()?;
        self.power
            .set_autosleep(enabled, keep_awake, now)
            .map_err(LinkError::from)
    }

    /// Configure the transceiver standby wiring.
    pub fn set_standby_line(
        &mut self,
        line: StandbyLine<O>,
    ) -> Result<(), LinkError<P::Error, O::Error>> {
        self.power.set_standby_line(line).map_err(LinkError::from)
    }

    /// Let bus activity wake the controller out of sleep mode.
    pub fn set_wake_on_activity(
        &mut self,
        enabled: bool,
    ) -> Result<(), LinkError<P::Error, O::Error>> {
        self.power.set_wake_on_activity(enabled).map_err(LinkError::from)
    }

    /// Access the underlying controller.
    pub fn controller_mut(&mut self) -> &mut P {
        self.power.controller_mut()
    }

    fn now(&self) -> Result<Instant<C>, LinkError<P::Error, O::Error>> {
        self.clock.try_now().map_err(LinkError::Clock)
    }

    /// Autosleep failures are deferred to the next idle check rather than
    /// surfaced; clock failures simply skip the check.
    fn autosleep_opportunity(&mut self) {
        if let Ok(now) = self.clock.try_now() {
            if self.power.maybe_autosleep(now).is_err() {
                debug!("autosleep attempt failed, deferring to next idle check");
            }
        }
    }
}
