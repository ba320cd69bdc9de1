//! Scripted stand-ins for the controller and host wiring.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use arrayvec::ArrayVec;
use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::digital::v2::{InputPin, OutputPin};

use crate::activity::BusActivity;
use crate::controller::{
    BusTiming, CanController, ControllerMode, Frame, PinDirection, PinLevel,
};

/// Leak a fresh activity flag so each test gets its own 'static one.
pub fn leak_activity() -> &'static BusActivity {
    Box::leak(Box::new(BusActivity::new()))
}

/// Simulated CAN controller with scriptable failures.
///
/// Errors are plain result codes, the way controller chips report them.
pub struct MockController {
    pub mode: ControllerMode,
    pub frames: VecDeque<Result<Frame, u8>>,
    pub sent: Vec<(u32, bool, Vec<u8>)>,
    /// Outcomes for upcoming `send_frame` calls; empty means success.
    pub send_results: VecDeque<Result<(), u8>>,
    pub sleep_result: Result<(), u8>,
    pub wake_result: Result<(), u8>,
    pub sleep_calls: usize,
    pub wake_calls: usize,
    pub pin_modes: Vec<(u8, PinDirection)>,
    pub pin_writes: Vec<(u8, PinLevel)>,
    pub initialized: Option<BusTiming>,
    pub wake_on_activity: Option<bool>,
}

impl MockController {
    pub fn new() -> Self {
        Self {
            mode: ControllerMode::Normal,
            frames: VecDeque::new(),
            sent: Vec::new(),
            send_results: VecDeque::new(),
            sleep_result: Ok(()),
            wake_result: Ok(()),
            sleep_calls: 0,
            wake_calls: 0,
            pin_modes: Vec::new(),
            pin_writes: Vec::new(),
            initialized: None,
            wake_on_activity: None,
        }
    }

    pub fn queue_frame(&mut self, id: u32, data: &[u8]) {
        let mut payload = ArrayVec::new();
        payload
            .try_extend_from_slice(data)
            .expect("mock frame payload over MTU");
        self.frames.push_back(Ok(Frame {
            id,
            extended: true,
            payload,
        }));
    }

    pub fn queue_read_error(&mut self, code: u8) {
        self.frames.push_back(Err(code));
    }
}

impl CanController for MockController {
    type Error = u8;

    fn initialize(&mut self, timing: BusTiming) -> Result<(), Self::Error> {
        self.initialized = Some(timing);
        Ok(())
    }

    fn receive_pending(&mut self) -> bool {
        !self.frames.is_empty()
    }

    fn read_frame(&mut self) -> Result<Frame, Self::Error> {
        self.frames.pop_front().unwrap_or(Err(0xFE))
    }

    fn send_frame(&mut self, id: u32, extended: bool, data: &[u8]) -> Result<(), Self::Error> {
        let result = self.send_results.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            self.sent.push((id, extended, data.to_vec()));
        }
        result
    }

    fn sleep(&mut self) -> Result<(), Self::Error> {
        self.sleep_calls += 1;
        if self.sleep_result.is_ok() {
            self.mode = ControllerMode::Sleep;
        }
        self.sleep_result
    }

    fn wake(&mut self) -> Result<(), Self::Error> {
        self.wake_calls += 1;
        if self.wake_result.is_ok() {
            self.mode = ControllerMode::Normal;
        }
        self.wake_result
    }

    fn mode(&mut self) -> ControllerMode {
        self.mode
    }

    fn set_wake_on_activity(&mut self, enabled: bool) -> Result<(), Self::Error> {
        self.wake_on_activity = Some(enabled);
        Ok(())
    }

    fn configure_pin(&mut self, pin: u8, direction: PinDirection) -> Result<(), Self::Error> {
        self.pin_modes.push((pin, direction));
        Ok(())
    }

    fn write_pin(&mut self, pin: u8, level: PinLevel) -> Result<(), Self::Error> {
        self.pin_writes.push((pin, level));
        Ok(())
    }
}

/// Output pin recording every level it is driven to. Clones share history.
#[derive(Clone, Default)]
pub struct MockOutputPin {
    history: Rc<RefCell<Vec<PinLevel>>>,
}

impl MockOutputPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn levels(&self) -> Vec<PinLevel> {
        self.history.borrow().clone()
    }
}

impl OutputPin for MockOutputPin {
    type Error = core::convert::Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.history.borrow_mut().push(PinLevel::Low);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.history.borrow_mut().push(PinLevel::High);
        Ok(())
    }
}

/// Input pin with an externally settable level. Clones share the level.
#[derive(Clone)]
pub struct MockInputPin {
    level: Rc<Cell<bool>>,
}

impl MockInputPin {
    pub fn new(high: bool) -> Self {
        Self {
            level: Rc::new(Cell::new(high)),
        }
    }

    pub fn set_level(&self, high: bool) {
        self.level.set(high);
    }
}

impl InputPin for MockInputPin {
    type Error = core::convert::Infallible;

    fn is_high(&self) -> Result<bool, Self::Error> {
        Ok(self.level.get())
    }

    fn is_low(&self) -> Result<bool, Self::Error> {
        Ok(!self.level.get())
    }
}

/// Delay provider that records requested pauses instead of blocking.
#[derive(Clone, Default)]
pub struct MockDelay {
    delays: Rc<RefCell<Vec<u32>>>,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<u32> {
        self.delays.borrow().clone()
    }
}

impl DelayMs<u32> for MockDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.delays.borrow_mut().push(ms);
    }
}
