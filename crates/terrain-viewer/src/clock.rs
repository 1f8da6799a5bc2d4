use std::time::{Duration, Instant};

/// Ticks per second of one window, kept within `[MIN, MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshRate(u32);

impl RefreshRate {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 120;

    pub fn new(rate: u32) -> Self {
        Self(rate.clamp(Self::MIN, Self::MAX))
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }

    pub fn faster(self) -> Self {
        Self::new(self.0.saturating_mul(2))
    }

    /// Integer halving, so 3 -> 1.
    pub fn slower(self) -> Self {
        Self::new(self.0 / 2)
    }

    pub fn interval(self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.0))
    }
}

/// Fixed-rate deadline for one window's ticks.
#[derive(Debug, Clone)]
pub struct FrameClock {
    rate: RefreshRate,
    next: Instant,
}

impl FrameClock {
    pub fn new(rate: RefreshRate, now: Instant) -> Self {
        Self {
            rate,
            next: now + rate.interval(),
        }
    }

    #[inline]
    pub fn rate(&self) -> RefreshRate {
        self.rate
    }

    #[inline]
    pub fn deadline(&self) -> Instant {
        self.next
    }

    /// Restarts the schedule at a new rate.
    pub fn restart(&mut self, rate: RefreshRate, now: Instant) {
        *self = Self::new(rate, now);
    }

    /// Consumes the current deadline if it has passed. A window that fell
    /// behind skips the missed ticks instead of bursting through them.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        let interval = self.rate.interval();
        self.next += interval;
        if self.next <= now {
            self.next = now + interval;
        }
        true
    }
}
