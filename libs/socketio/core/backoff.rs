//! Reconnection backoff
//!
//! Delay for attempt `n` is `base * factor^n`, capped at `max`, then moved
//! by a uniformly random offset of up to `jitter * delay` in either
//! direction. The result is always clamped back into `[base, max]`.

use rand::Rng;
use std::time::Duration;

/// Multiplicative growth factor used by the client
pub const DEFAULT_FACTOR: f64 = 2.0;

/// Jitter fraction used by the client
pub const DEFAULT_JITTER: f64 = 0.5;

/// Exponential backoff with jitter
///
/// `duration()` advances the attempt counter; only `reset()` brings it
/// back to zero.
#[derive(Debug, Clone)]
pub struct BackOff {
    attempts: u32,
    base: Duration,
    max: Duration,
    factor: f64,
    jitter: f64,
}

impl BackOff {
    /// Create a new backoff
    ///
    /// # Arguments
    /// * `base` - Delay before the first attempt
    /// * `max` - Ceiling for every delay (raised to `base` if smaller)
    /// * `factor` - Growth per attempt (values below 1 are treated as 1)
    /// * `jitter` - Random spread as a fraction of the delay, clamped to `[0, 1]`
    pub fn new(base: Duration, max: Duration, factor: f64, jitter: f64) -> Self {
        let factor = if factor.is_finite() && factor >= 1.0 { factor } else { 1.0 };
        let jitter = if jitter.is_finite() { jitter.clamp(0.0, 1.0) } else { 0.0 };

        Self {
            attempts: 0,
            base,
            max: max.max(base),
            factor,
            jitter,
        }
    }

    /// Delay for the current attempt; advances the attempt counter
    pub fn duration(&mut self) -> Duration {
        let raw = self.raw_nanos(self.attempts);
        self.attempts = self.attempts.saturating_add(1);

        let jittered = if self.jitter > 0.0 {
            let spread = self.jitter * raw;
            raw + rand::thread_rng().gen_range(-spread..=spread)
        } else {
            raw
        };

        self.clamp(jittered)
    }

    /// Pre-jitter delay for a given attempt count
    pub fn raw_delay(&self, attempts: u32) -> Duration {
        self.clamp(self.raw_nanos(attempts))
    }

    /// Number of delays handed out since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    fn raw_nanos(&self, attempts: u32) -> f64 {
        let exponent = attempts.min(i32::MAX as u32) as i32;
        let scaled = self.base.as_nanos() as f64 * self.factor.powi(exponent);
        let max = self.max.as_nanos() as f64;

        if scaled.is_finite() && scaled < max {
            scaled
        } else {
            max
        }
    }

    fn clamp(&self, nanos: f64) -> Duration {
        let base = self.base.as_nanos().min(u64::MAX as u128) as u64;
        let max = self.max.as_nanos().min(u64::MAX as u128) as u64;

        let nanos = if nanos.is_finite() && nanos > 0.0 {
            nanos.round().min(u64::MAX as f64) as u64
        } else {
            0
        };

        Duration::from_nanos(nanos.clamp(base, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_sequence_doubles_until_capped() {
        let backoff = BackOff::new(
            Duration::from_millis(100),
            Duration::from_millis(1000),
            2.0,
            0.0,
        );

        let delays: Vec<u128> = (0..6).map(|n| backoff.raw_delay(n).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
    }

    #[test]
    fn test_duration_advances_attempts() {
        let mut backoff = BackOff::new(Duration::from_millis(10), Duration::from_secs(1), 2.0, 0.0);

        assert_eq!(backoff.duration(), Duration::from_millis(10));
        assert_eq!(backoff.duration(), Duration::from_millis(20));
        assert_eq!(backoff.duration(), Duration::from_millis(40));
        assert_eq!(backoff.attempts(), 3);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut backoff = BackOff::new(Duration::from_millis(10), Duration::from_secs(1), 2.0, 0.0);
        backoff.duration();
        backoff.duration();

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.duration(), Duration::from_millis(10));
    }

    #[test]
    fn test_jittered_delay_stays_within_bounds() {
        let base = Duration::from_millis(50);
        let max = Duration::from_millis(400);
        let mut backoff = BackOff::new(base, max, DEFAULT_FACTOR, DEFAULT_JITTER);

        for _ in 0..200 {
            let delay = backoff.duration();
            assert!(delay >= base, "{:?} below base", delay);
            assert!(delay <= max, "{:?} above max", delay);
        }
    }

    #[test]
    fn test_huge_attempt_counts_do_not_overflow() {
        let backoff = BackOff::new(Duration::from_secs(1), Duration::from_secs(30), 2.0, 0.5);
        assert_eq!(backoff.raw_delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_max_below_base_is_raised() {
        let mut backoff = BackOff::new(Duration::from_secs(2), Duration::from_secs(1), 2.0, 0.5);
        assert_eq!(backoff.max(), Duration::from_secs(2));
        assert_eq!(backoff.duration(), Duration::from_secs(2));
    }
}
