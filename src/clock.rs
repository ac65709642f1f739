//! Fixed-rate frame clock.

use std::time::{Duration, Instant};

/// Paces frame ticks at a fixed rate without accumulating drift.
#[derive(Debug, Clone)]
pub struct FrameClock {
    interval: Duration,
    next_tick: Instant,
    ticks: u64,
}

impl FrameClock {
    /// Clock ticking `rate_hz` times per second, first tick due at `now`.
    pub fn new(rate_hz: u32, now: Instant) -> Self {
        Self {
            interval: Duration::from_secs(1) / rate_hz.max(1),
            next_tick: now,
            ticks: 0,
        }
    }

    /// Time between ticks.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// When the next tick is due.
    pub fn next_deadline(&self) -> Instant {
        self.next_tick
    }

    /// Ticks fired so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Fire a tick if one is due. Missed ticks are skipped rather than
    /// replayed, so a stall produces one frame, not a burst.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next_tick {
            return false;
        }
        self.ticks += 1;
        self.next_tick += self.interval;
        if self.next_tick <= now {
            self.next_tick = now + self.interval;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixty_hz_interval() {
        let clock = FrameClock::new(60, Instant::now());
        assert_eq!(clock.interval(), Duration::from_nanos(16_666_666));
    }

    #[test]
    fn first_tick_is_immediate() {
        let start = Instant::now();
        let mut clock = FrameClock::new(60, start);
        assert!(clock.poll(start));
        assert!(!clock.poll(start));
        assert_eq!(clock.ticks(), 1);
    }

    #[test]
    fn ticks_follow_the_interval() {
        let start = Instant::now();
        let mut clock = FrameClock::new(10, start);
        assert!(clock.poll(start));
        assert!(!clock.poll(start + Duration::from_millis(50)));
        assert!(clock.poll(start + Duration::from_millis(100)));
        assert_eq!(clock.next_deadline(), start + Duration::from_millis(200));
    }

    #[test]
    fn stall_does_not_burst() {
        let start = Instant::now();
        let mut clock = FrameClock::new(10, start);
        clock.poll(start);

        let late = start + Duration::from_secs(2);
        assert!(clock.poll(late));
        assert!(!clock.poll(late));
        assert_eq!(clock.next_deadline(), late + Duration::from_millis(100));
    }

    #[test]
    fn zero_rate_is_treated_as_one() {
        let clock = FrameClock::new(0, Instant::now());
        assert_eq!(clock.interval(), Duration::from_secs(1));
    }
}
