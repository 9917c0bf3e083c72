//! Trailing-edge debounce for parameter updates.
//!
//! Each push replaces the held value and restarts the delay; the value is
//! released once the input has been quiet for the whole delay. Time is
//! passed in explicitly so the caller decides which clock drives it.

use std::time::Duration;

/// Default quiet period before a parameter change is applied.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(12);

#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Duration)>,
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Hold `value`, replacing any earlier one. Returns the new deadline.
    pub fn push(&mut self, value: T, now: Duration) -> Duration {
        let deadline = now + self.delay;
        self.pending = Some((value, deadline));
        deadline
    }

    /// When the held value becomes due, if any.
    pub fn deadline(&self) -> Option<Duration> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Release the held value if its deadline has passed.
    pub fn poll(&mut self, now: Duration) -> Option<T> {
        let due = matches!(self.pending, Some((_, deadline)) if deadline <= now);
        if due {
            self.flush()
        } else {
            None
        }
    }

    /// Release the held value immediately.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }

    /// Drop the held value.
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}
