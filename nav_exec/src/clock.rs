//! # Clock
//!
//! Time source for the control loop. The loop only ever measures elapsed time and sleeps, so a
//! fake clock advancing virtual time lets the loop be tested without real timing.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

pub trait Clock {
    /// Time elapsed since the clock was created.
    fn now(&self) -> Duration;

    /// Block for the given duration.
    fn sleep(&self, duration: Duration);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration)
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Clock which only advances when slept on, or when explicitly advanced.
    #[derive(Debug, Clone, Default)]
    pub struct FakeClock {
        inner: Arc<Mutex<Inner>>,
    }

    #[derive(Debug, Default)]
    struct Inner {
        now: Duration,
        sleeps: Vec<Duration>,
    }

    impl FakeClock {
        pub fn new() -> Self {
            Self::default()
        }

        /// Move virtual time forward without sleeping, simulating work done by the loop.
        pub fn advance(&self, duration: Duration) {
            self.inner.lock().unwrap().now += duration;
        }

        /// Every sleep requested so far.
        pub fn sleeps(&self) -> Vec<Duration> {
            self.inner.lock().unwrap().sleeps.clone()
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Duration {
            self.inner.lock().unwrap().now
        }

        fn sleep(&self, duration: Duration) {
            let mut inner = self.inner.lock().unwrap();
            inner.now += duration;
            inner.sleeps.push(duration);
        }
    }

    #[test]
    fn test_fake_clock() {
        let clock = FakeClock::new();
        clock.advance(Duration::from_millis(200));
        clock.sleep(Duration::from_millis(800));

        assert_eq!(clock.now(), Duration::from_secs(1));
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(800)]);
    }
}
