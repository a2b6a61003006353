//! # Simulated Clock
//!
//! Virtual time for deterministic tests. The clock only moves when the
//! driver tells it to, so a timeout of a minute costs nothing to test.

use core_types::{Clock, Duration, Instant};
use std::cell::Cell;

/// Virtual monotonic clock
///
/// Shared by every instance of a simulation through `Rc`.
///
/// # Examples
///
/// ```
/// use core_types::{Clock, Duration, Instant};
/// use sim_frames::SimClock;
///
/// let clock = SimClock::new();
/// assert_eq!(clock.now(), Instant::ZERO);
///
/// clock.advance(Duration::from_millis(100));
/// assert_eq!(clock.now(), Instant::from_millis(100));
/// ```
#[derive(Debug, Default)]
pub struct SimClock {
    now: Cell<Instant>,
}

impl SimClock {
    /// Creates a clock at the epoch
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock starting at `start`
    pub fn starting_at(start: Instant) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }

    /// Moves the clock to `instant`
    ///
    /// Instants in the past are ignored; time never runs backwards.
    pub fn set(&self, instant: Instant) {
        if instant > self.now.get() {
            self.now.set(instant);
        }
    }
}

impl Clock for SimClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}
