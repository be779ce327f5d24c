//! Virtual-time holder for the simulation driver.
//!
//! A simpler cousin of a `SystemTime`-based event queue: there is exactly one
//! clock, time only ever moves forward, and advancing it is the only
//! suspension point in the whole simulation.

use std::fmt;
use std::ops::{Add, AddAssign};

use crate::error::SimError;

/// Simulation-time seconds since the start of a run.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct SimTime(pub f64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0.0);

    pub fn seconds(secs: f64) -> Self {
        SimTime(secs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}s", self.0)
    }
}

impl Add<f64> for SimTime {
    type Output = SimTime;
    fn add(self, rhs: f64) -> SimTime {
        SimTime(self.0 + rhs)
    }
}

impl AddAssign<f64> for SimTime {
    fn add_assign(&mut self, rhs: f64) {
        self.0 += rhs;
    }
}

/// Monotonic clock driving the event loop. `advance_to` is the only way time
/// moves; a regression is a fatal `TraceOrderError`.
#[derive(Debug, Default)]
pub struct Clock {
    now: SimTime,
}

impl Clock {
    pub fn new() -> Self {
        Clock { now: SimTime::ZERO }
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Advance to `t`. No-op if `t <= now`; fatal if `t` is actually in the past
    /// relative to a trace record that already committed (callers are expected
    /// to only ever call this with non-decreasing timestamps from the trace).
    pub fn advance_to(&mut self, t: SimTime) -> Result<(), SimError> {
        if t.0 < self.now.0 {
            return Err(SimError::TraceOrder {
                previous: self.now.0,
                got: t.0,
            });
        }
        self.now = t;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_forward() {
        let mut clock = Clock::new();
        clock.advance_to(SimTime(5.0)).unwrap();
        assert_eq!(clock.now(), SimTime(5.0));
    }

    #[test]
    fn same_timestamp_is_a_no_op() {
        let mut clock = Clock::new();
        clock.advance_to(SimTime(3.0)).unwrap();
        clock.advance_to(SimTime(3.0)).unwrap();
        assert_eq!(clock.now(), SimTime(3.0));
    }

    #[test]
    fn regression_is_a_fatal_trace_order_error() {
        let mut clock = Clock::new();
        clock.advance_to(SimTime(10.0)).unwrap();
        let err = clock.advance_to(SimTime(9.0)).unwrap_err();
        assert!(matches!(err, SimError::TraceOrder { previous, got } if previous == 10.0 && got == 9.0));
    }
}
