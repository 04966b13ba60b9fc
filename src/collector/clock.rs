//! Clock sources for stamping key signals.

use crate::core::Timestamp;
use std::cell::Cell;
use std::time::Instant;

/// A source of monotonic timestamps.
pub trait Clock {
    /// Read the clock once. Millisecond and nanosecond values come from
    /// this single reading.
    fn now(&self) -> Timestamp;
}

/// Monotonic clock measured from the moment it was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        let elapsed = self.origin.elapsed().as_nanos();
        Timestamp::from_nanos(i64::try_from(elapsed).unwrap_or(i64::MAX))
    }
}

/// Hand-driven clock for tests, demos and scripted replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ns: Cell<i64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the clock at a given millisecond value.
    pub fn starting_at_ms(ms: i64) -> Self {
        Self {
            now_ns: Cell::new(ms * Timestamp::NANOS_PER_MILLI),
        }
    }

    pub fn set_ns(&self, ns: i64) {
        self.now_ns.set(ns);
    }

    pub fn advance_ns(&self, ns: i64) {
        self.now_ns.set(self.now_ns.get() + ns);
    }

    pub fn advance_ms(&self, ms: i64) {
        self.advance_ns(ms * Timestamp::NANOS_PER_MILLI);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_nanos(self.now_ns.get())
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let first = clock.now();
        let second = clock.now();
        assert!(second.ns() >= first.ns());
        assert!(second.ms() >= first.ms());
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::starting_at_ms(100);
        assert_eq!(clock.now().ms(), 100);

        clock.advance_ns(1_500_000);
        assert_eq!(clock.now().ns(), 101_500_000);
        assert_eq!(clock.now().ms(), 101);

        clock.advance_ms(9);
        assert_eq!(clock.now().ms(), 110);
    }
}
