//! # Sliding-Window Rate Limiter
//!
//! Caps outbound calls to an upstream provider at `max_calls` within any
//! window of `period`. `try_acquire` checks and records in one step, so
//! callers sharing a limiter behind a lock cannot both take the last slot.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Call timestamps within the trailing window.
#[derive(Debug, Clone)]
pub struct SlidingWindowLimiter {
    max_calls: usize,
    period: Duration,
    calls: VecDeque<Instant>,
}

impl SlidingWindowLimiter {
    /// A limiter admitting `max_calls` per `period`, at least one.
    #[must_use]
    pub fn new(max_calls: usize, period: Duration) -> Self {
        let max_calls = max_calls.max(1);
        Self {
            max_calls,
            period,
            calls: VecDeque::with_capacity(max_calls),
        }
    }

    /// Whether another call fits in the current window.
    pub fn is_allowed(&mut self) -> bool {
        self.is_allowed_at(Instant::now())
    }

    pub fn record_call(&mut self) {
        self.record_call_at(Instant::now());
    }

    /// How long until the oldest call leaves the window. Zero if a call is
    /// allowed now.
    pub fn time_until_next_call(&mut self) -> Duration {
        self.time_until_next_call_at(Instant::now())
    }

    /// Record a call if the window admits one, otherwise return how long
    /// until it will.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        self.try_acquire_at(Instant::now())
    }

    pub fn reset(&mut self) {
        self.calls.clear();
    }

    fn evict(&mut self, now: Instant) {
        while let Some(&oldest) = self.calls.front() {
            if now.duration_since(oldest) >= self.period {
                self.calls.pop_front();
            } else {
                break;
            }
        }
    }

    fn is_allowed_at(&mut self, now: Instant) -> bool {
        self.evict(now);
        self.calls.len() < self.max_calls
    }

    fn record_call_at(&mut self, now: Instant) {
        self.evict(now);
        self.calls.push_back(now);
    }

    fn try_acquire_at(&mut self, now: Instant) -> Result<(), Duration> {
        if self.is_allowed_at(now) {
            self.calls.push_back(now);
            return Ok(());
        }
        Err(self.time_until_next_call_at(now))
    }

    fn time_until_next_call_at(&mut self, now: Instant) -> Duration {
        if self.is_allowed_at(now) {
            return Duration::ZERO;
        }
        self.calls
            .front()
            .map(|&oldest| self.period.saturating_sub(now.duration_since(oldest)))
            .unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_max_calls() {
        let mut limiter = SlidingWindowLimiter::new(3, Duration::from_secs(60));
        let now = Instant::now();
        for _ in 0..3 {
            assert!(limiter.is_allowed_at(now));
            limiter.record_call_at(now);
        }
        assert!(!limiter.is_allowed_at(now));
    }

    #[test]
    fn window_slides() {
        let mut limiter = SlidingWindowLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();
        limiter.record_call_at(start);
        limiter.record_call_at(start + Duration::from_secs(30));

        assert!(!limiter.is_allowed_at(start + Duration::from_secs(59)));
        assert!(limiter.is_allowed_at(start + Duration::from_secs(60)));
    }

    #[test]
    fn wait_time_tracks_oldest_call() {
        let mut limiter = SlidingWindowLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();
        assert_eq!(limiter.time_until_next_call_at(start), Duration::ZERO);

        limiter.record_call_at(start);
        assert_eq!(
            limiter.time_until_next_call_at(start + Duration::from_secs(45)),
            Duration::from_secs(15)
        );
    }

    #[test]
    fn acquire_takes_the_last_slot_once() {
        let mut limiter = SlidingWindowLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();

        assert_eq!(limiter.try_acquire_at(start), Ok(()));
        assert_eq!(
            limiter.try_acquire_at(start + Duration::from_secs(20)),
            Err(Duration::from_secs(40))
        );
        assert_eq!(limiter.calls.len(), 1);
        assert_eq!(limiter.try_acquire_at(start + Duration::from_secs(60)), Ok(()));
    }

    #[test]
    fn zero_capacity_still_admits_one_call() {
        let mut limiter = SlidingWindowLimiter::new(0, Duration::from_secs(60));
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_err());
    }

    #[test]
    fn reset_clears_history() {
        let mut limiter = SlidingWindowLimiter::new(1, Duration::from_secs(60));
        limiter.record_call();
        assert!(!limiter.is_allowed());
        limiter.reset();
        assert!(limiter.is_allowed());
    }
}
