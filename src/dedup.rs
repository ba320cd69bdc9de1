//! Receive-side suppression of retransmitted frames.
//!
//! When a sleeping node wakes it sits in listen-only mode for a moment and
//! does not acknowledge, so the transmitter repeats the identical frame a few
//! times until somebody on the bus is fully awake. Only the first copy inside
//! a short window should propagate upward.

use arrayvec::ArrayVec;
use embedded_time::duration::{Generic, Milliseconds};
use embedded_time::{Clock, Instant};
use log::debug;

use crate::controller::MTU;
use crate::time;

/// Frames identical to the last accepted one within this window are
/// considered retransmissions.
pub const DUPLICATE_WINDOW: Milliseconds<u32> = Milliseconds(20);

struct LastFrame<C: Clock> {
    id: u32,
    payload: ArrayVec<[u8; MTU]>,
    seen_at: Instant<C>,
}

/// Tracks the most recently accepted frame and rejects repeats of it.
pub struct DuplicateFilter<C: Clock> {
    enabled: bool,
    last: Option<LastFrame<C>>,
}

impl<C> DuplicateFilter<C>
where
    C: Clock,
    Milliseconds<u32>: TryFrom<Generic<C::T>>,
{
    pub fn new() -> Self {
        Self {
            enabled: false,
            last: None,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Decide whether an incoming frame should be delivered.
    ///
    /// Accepts when filtering is disabled, the identifier or payload differs
    /// from the last accepted frame, or more than [`DUPLICATE_WINDOW`] has
    /// passed since it. On acceptance the stored record is overwritten with
    /// this frame.
    pub fn accept(&mut self, id: u32, payload: &[u8], now: Instant<C>) -> bool {
        if !self.enabled {
            return true;
        }

        let duplicate = match &self.last {
            Some(last) => {
                last.id == id
                    && last.payload.as_slice() == payload
                    && time::elapsed_ms(&last.seen_at, &now) <= DUPLICATE_WINDOW
            }
            None => false,
        };

        if duplicate {
            debug!("duplicate frame {:#010x} suppressed", id);
            return false;
        }

        let mut snapshot = ArrayVec::new();
        let _ = snapshot.try_extend_from_slice(&payload[..payload.len().min(MTU)]);
        self.last = Some(LastFrame {
            id,
            payload: snapshot,
            seen_at: now,
        });
        true
    }
}

impl<C> Default for DuplicateFilter<C>
where
    C: Clock,
    Milliseconds<u32>: TryFrom<Generic<C::T>>,
{
    fn default() -> Self {
        Self::new()
    }
}
