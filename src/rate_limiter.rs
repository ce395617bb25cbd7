use std::time::Duration;

/// Gate for best-effort side effects that should run at most once per
/// interval.
///
/// Time is passed in rather than read from a clock, so the same limiter works
/// on live device timestamps and on replayed traces.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// Minimum time between two accepted calls
    min_interval: Duration,

    /// Time of the last accepted call
    last_event_time: Option<Duration>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_event_time: None,
        }
    }

    pub fn from_millis(min_interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_interval_ms))
    }

    /// Returns true and restarts the interval if more than `min_interval` has
    /// passed since the last accepted call. The first call is always accepted,
    /// and so is a call whose time lies before the last accepted one.
    pub fn should_process(&mut self, now: Duration) -> bool {
        let due = match self.last_event_time {
            None => true,
            Some(last) if now < last => true,
            Some(last) => now - last > self.min_interval,
        };
        if due {
            self.last_event_time = Some(now);
        }
        due
    }
}
