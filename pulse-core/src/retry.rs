use rand::Rng;
use std::{thread, time::Duration};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts including the first one.
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

pub trait BackoffPolicy {
    /// The delay to wait after the given (1-based) attempt failed.
    fn delay_after_attempt(&self, attempt: u32) -> Duration;
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: DEFAULT_BASE_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn exponential_delay(&self, attempt: u32) -> Duration {
        let factor = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_backoff.saturating_mul(factor)
    }

    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl BackoffPolicy for RetryPolicy {
    // The jitter stays below one base unit, so consecutive
    // delays are strictly increasing.
    fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let exponential = self.exponential_delay(attempt);
        let base_nanos = self.base_backoff.as_nanos().min(u64::MAX as u128) as u64;
        if base_nanos == 0 {
            return exponential;
        }
        let jitter = rand::thread_rng().gen_range(0..base_nanos);
        exponential.saturating_add(Duration::from_nanos(jitter))
    }
}

/// Blocks the calling thread.
pub trait Pause {
    fn pause(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleep;

impl Pause for ThreadSleep {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

impl<P> Pause for &P
where
    P: Pause + ?Sized,
{
    fn pause(&self, duration: Duration) {
        (**self).pause(duration)
    }
}
