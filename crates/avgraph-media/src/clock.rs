//! Pipeline clock.
//!
//! All pipeline timestamps (`pts_orig`, `pts_prog`, `pts_sys`, durations and
//! latencies) count ticks of [`CLOCK_FREQ`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Ticks per second of every pipeline timestamp.
pub const CLOCK_FREQ: u64 = 27_000_000;

/// Source of the current system time in [`CLOCK_FREQ`] ticks.
pub trait Clock: Send + Sync {
    /// Current time in ticks.
    fn now(&self) -> u64;
}

/// Monotonic wall clock counting from its creation.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a clock reading zero now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        let elapsed = self.origin.elapsed();
        elapsed.as_secs() * CLOCK_FREQ
            + u64::from(elapsed.subsec_nanos()) * (CLOCK_FREQ / 1_000_000) / 1000
    }
}

/// Clock advanced by hand, shared between clones.
///
/// Used by tests and by offline drivers that step time with the media.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    ticks: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock reading `start` ticks.
    pub fn new(start: u64) -> Self {
        Self {
            ticks: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Sets the absolute time.
    pub fn set(&self, ticks: u64) {
        self.ticks.store(ticks, Ordering::Release);
    }

    /// Moves the clock forward.
    pub fn advance(&self, ticks: u64) {
        self.ticks.fetch_add(ticks, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let clock = ManualClock::new(10);
        let other = clock.clone();
        clock.advance(5);
        assert_eq!(other.now(), 15);
        other.set(CLOCK_FREQ);
        assert_eq!(clock.now(), CLOCK_FREQ);
    }

    #[test]
    fn system_clock_never_goes_back() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
