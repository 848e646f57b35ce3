use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A fixed-window request counter.
///
/// The count is an atomic so concurrent increments never lose updates. The
/// window start sits behind a mutex; [`reset_if_expired`](Self::reset_if_expired)
/// holds it across the check and the reset so two sweepers cannot both roll
/// the same window.
#[derive(Debug)]
pub struct WindowCounter {
    count: AtomicU64,
    window_start: Mutex<Instant>,
}

impl WindowCounter {
    /// Create an empty counter whose window opens at `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            count: AtomicU64::new(0),
            window_start: Mutex::new(now),
        }
    }

    /// Add one request and return the new count.
    pub fn increment(&self) -> u64 {
        self.count.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Zero the count and open a new window at `now`.
    pub fn reset(&self, now: Instant) {
        let mut start = self.window_start.lock().unwrap_or_else(PoisonError::into_inner);
        self.count.store(0, Ordering::Release);
        *start = now;
    }

    pub fn window_start(&self) -> Instant {
        *self.window_start.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Time since the current window opened. Zero if `now` precedes it.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.window_start())
    }

    pub fn is_expired(&self, now: Instant, window: Duration) -> bool {
        self.elapsed(now) >= window
    }

    /// Reset the counter if its window has run for at least `window`.
    ///
    /// Returns `true` when a reset happened.
    pub fn reset_if_expired(&self, now: Instant, window: Duration) -> bool {
        let mut start = self.window_start.lock().unwrap_or_else(PoisonError::into_inner);
        if now.saturating_duration_since(*start) < window {
            return false;
        }
        self.count.store(0, Ordering::Release);
        *start = now;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn increment_returns_new_count() {
        let counter = WindowCounter::new(Instant::now());
        assert_eq!(counter.get(), 0);
        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.increment(), 2);
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn reset_zeroes_and_restamps() {
        let start = Instant::now();
        let counter = WindowCounter::new(start);
        counter.increment();

        let later = start + Duration::from_secs(30);
        counter.reset(later);

        assert_eq!(counter.get(), 0);
        assert_eq!(counter.window_start(), later);
    }

    #[test]
    fn reset_if_expired_respects_window() {
        let start = Instant::now();
        let window = Duration::from_secs(60);
        let counter = WindowCounter::new(start);
        counter.increment();

        assert!(!counter.reset_if_expired(start + Duration::from_secs(59), window));
        assert_eq!(counter.get(), 1);

        // The boundary itself counts as expired.
        assert!(counter.reset_if_expired(start + window, window));
        assert_eq!(counter.get(), 0);
        assert_eq!(counter.window_start(), start + window);
    }

    #[test]
    fn elapsed_saturates_for_earlier_instants() {
        let start = Instant::now() + Duration::from_secs(5);
        let counter = WindowCounter::new(start);
        assert_eq!(counter.elapsed(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let counter = Arc::new(WindowCounter::new(Instant::now()));

        std::thread::scope(|s| {
            for _ in 0..8 {
                let counter = Arc::clone(&counter);
                s.spawn(move || {
                    for _ in 0..1_000 {
                        counter.increment();
                    }
                });
            }
        });

        assert_eq!(counter.get(), 8_000);
    }
}
