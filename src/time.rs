//! Clock plumbing on top of `embedded-time`.

use embedded_time::duration::{Generic, Milliseconds};
use embedded_time::{Clock, Instant};

#[cfg(test)]
pub use test_clock::TestClock;

#[cfg(feature = "std")]
pub use std_clock::StdClock;

/// Milliseconds elapsed between two instants of the same clock.
///
/// Saturates: durations beyond the `u32` millisecond range come back as
/// `u32::MAX`, and `now` before `since` counts as no elapsed time.
pub(crate) fn elapsed_ms<C: Clock>(since: &Instant<C>, now: &Instant<C>) -> Milliseconds<u32>
where
    Milliseconds<u32>: TryFrom<Generic<C::T>>,
{
    match now.checked_duration_since(since) {
        Some(elapsed) => Milliseconds::<u32>::try_from(elapsed).unwrap_or(Milliseconds(u32::MAX)),
        None => Milliseconds(0),
    }
}


#[cfg(feature = "std")]
mod std_clock {
    use embedded_time::rate::Fraction;
    use embedded_time::{Clock, Instant};

    /// Monotonic millisecond clock backed by `std::time::Instant`.
    ///
    /// Instants are measured from the moment of construction.
    #[derive(Debug)]
    pub struct StdClock {
        epoch: std::time::Instant,
    }

    impl StdClock {
        pub fn new() -> Self {
            Self {
                epoch: std::time::Instant::now(),
            }
        }
    }

    impl Default for StdClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for StdClock {
        type T = u64;

        const SCALING_FACTOR: Fraction = Fraction::new(1, 1000);

        fn try_now(&self) -> Result<Instant<Self>, embedded_time::clock::Error> {
            Ok(Instant::new(self.epoch.elapsed().as_millis() as u64))
        }
    }
}
