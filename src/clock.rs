// Time source and tick scheduling for the readiness poll loop
use std::time::{Duration, Instant};

/// Trait for abstracting time operations so polling can be tested without waiting
pub trait Clock: Send + Sync {
    /// Get the current instant
    fn now(&self) -> Instant;

    /// Sleep for the given duration
    fn sleep(&self, duration: Duration);
}

/// System clock implementation using real time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Fixed-interval ticks raced against a one-shot deadline.
///
/// Ticks are anchored to `started`, so time spent between ticks does not
/// push later ticks back. A tick landing exactly on the deadline loses.
#[derive(Debug, Clone, Copy)]
pub struct TickSchedule {
    started: Instant,
    deadline: Instant,
    interval: Duration,
}

impl TickSchedule {
    /// Returns `None` when `started + timeout` is not representable
    pub fn new(started: Instant, timeout: Duration, interval: Duration) -> Option<Self> {
        let deadline = started.checked_add(timeout)?;
        Some(Self {
            started,
            deadline,
            interval,
        })
    }

    /// Next instant to wake at: the next tick after `now`, capped at the deadline
    pub fn next_wake(&self, now: Instant) -> Instant {
        let elapsed = now.saturating_duration_since(self.started).as_nanos();
        let ticks = elapsed / self.interval.as_nanos().max(1) + 1;
        let offset = u32::try_from(ticks)
            .ok()
            .and_then(|ticks| self.interval.checked_mul(ticks));

        offset
            .and_then(|offset| self.started.checked_add(offset))
            .map_or(self.deadline, |tick| tick.min(self.deadline))
    }

    pub fn expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Clock that only moves when slept on or advanced by hand
    #[derive(Clone)]
    pub struct FakeClock {
        origin: Instant,
        current: Arc<Mutex<Instant>>,
    }

    impl Default for FakeClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl FakeClock {
        pub fn new() -> Self {
            let origin = Instant::now();
            Self {
                origin,
                current: Arc::new(Mutex::new(origin)),
            }
        }

        pub fn advance(&self, duration: Duration) {
            *self.current.lock().unwrap() += duration;
        }

        /// Fake time passed since the clock was created
        pub fn elapsed(&self) -> Duration {
            self.now() - self.origin
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            *self.current.lock().unwrap()
        }

        fn sleep(&self, duration: Duration) {
            self.advance(duration);
        }
    }
}
