//! The tick clock.
//!
//! The tick counter is the only time value authoritative logic may read.
//! It starts at 0 (genesis), advances by exactly one per committed tick with
//! checked arithmetic, and never moves backwards. Wall-clock time only
//! decides *when* the scheduler calls the pipeline.

/// Errors that can occur during clock operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,
}

/// Monotonic tick counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickClock {
    /// Last committed tick.
    tick: u64,
}

impl TickClock {
    /// A clock at genesis (tick 0).
    pub const fn genesis() -> Self {
        Self { tick: 0 }
    }

    /// A clock resumed at a committed tick.
    pub const fn resume_at(tick: u64) -> Self {
        Self { tick }
    }

    /// Last committed tick.
    pub const fn current(&self) -> u64 {
        self.tick
    }

    /// The tick the next commit will produce.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] at `u64::MAX`.
    pub const fn peek_next(&self) -> Result<u64, ClockError> {
        match self.tick.checked_add(1) {
            Some(next) => Ok(next),
            None => Err(ClockError::TickOverflow),
        }
    }

    /// Advance by one tick and return the new value.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] at `u64::MAX`.
    pub const fn advance(&mut self) -> Result<u64, ClockError> {
        match self.peek_next() {
            Ok(next) => {
                self.tick = next;
                Ok(next)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_genesis() {
        assert_eq!(TickClock::genesis().current(), 0);
    }

    #[test]
    fn advance_increments_by_one() {
        let mut clock = TickClock::genesis();
        assert_eq!(clock.peek_next().unwrap(), 1);
        assert_eq!(clock.current(), 0);
        assert_eq!(clock.advance().unwrap(), 1);
        assert_eq!(clock.advance().unwrap(), 2);
        assert_eq!(clock.current(), 2);
    }

    #[test]
    fn overflow_is_an_error_and_leaves_clock_unchanged() {
        let mut clock = TickClock::resume_at(u64::MAX);
        assert_eq!(clock.advance(), Err(ClockError::TickOverflow));
        assert_eq!(clock.current(), u64::MAX);
    }
}
