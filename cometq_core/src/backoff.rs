//! Delay between long-poll attempts after transport failures.
//!
//! Under normal operation the server paces the poll loop by holding each
//! connect request open. When the transport itself keeps failing there is
//! nothing holding the loop back, so consecutive failures wait an
//! exponentially growing, jittered delay. A successful poll resets it.
//!
//! ```
//! use core::time::Duration;
//! use cometq_core::backoff::PollBackoff;
//!
//! let mut backoff = PollBackoff::new(Duration::from_millis(100), Duration::from_secs(1), 2, 0.0);
//! assert_eq!(backoff.next_delay(), Duration::from_millis(100));
//! assert_eq!(backoff.next_delay(), Duration::from_millis(200));
//! backoff.reset();
//! assert_eq!(backoff.next_delay(), Duration::from_millis(100));
//! ```

use core::time::Duration;

use rand::Rng;

/// Exponential backoff with proportional jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollBackoff {
    base: Duration,
    max: Duration,
    factor: u32,
    jitter: f64,
    failures: u32,
}

impl PollBackoff {
    /// `base * factor^n`, capped at `max`, scaled by a random factor in `[1 - jitter, 1 + jitter]`.
    #[must_use]
    pub const fn new(base: Duration, max: Duration, factor: u32, jitter: f64) -> Self {
        Self {
            base,
            max,
            factor,
            jitter,
            failures: 0,
        }
    }

    /// Delay to wait after the next failure.
    #[must_use]
    pub fn next_delay(&mut self) -> Duration {
        let delay = self
            .factor
            .checked_pow(self.failures)
            .and_then(|m| self.base.checked_mul(m))
            .map_or(self.max, |d| d.min(self.max));
        self.failures = self.failures.saturating_add(1);

        if self.jitter <= 0.0 {
            return delay;
        }
        let spread = self.jitter.min(1.0);
        delay.mul_f64(rand::thread_rng().gen_range(1.0 - spread..=1.0 + spread))
    }

    /// Forget previous failures.
    pub const fn reset(&mut self) {
        self.failures = 0;
    }

    /// Consecutive failures since the last reset.
    #[must_use]
    pub const fn failures(&self) -> u32 {
        self.failures
    }
}

impl Default for PollBackoff {
    /// 100ms doubling up to 30s, ±10% jitter.
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(30), 2, 0.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_capped() {
        let mut backoff =
            PollBackoff::new(Duration::from_millis(100), Duration::from_millis(500), 2, 0.0);

        let delays: Vec<_> = (0..5).map(|_| backoff.next_delay()).collect();
        assert_eq!(
            delays,
            [100, 200, 400, 500, 500].map(Duration::from_millis).to_vec()
        );
    }

    #[test]
    fn huge_exponents_saturate_at_max() {
        let mut backoff = PollBackoff::new(Duration::from_secs(1), Duration::from_secs(30), 10, 0.0);
        for _ in 0..64 {
            assert!(backoff.next_delay() <= Duration::from_secs(30));
        }
    }

    #[test]
    fn jitter_stays_in_bounds() {
        let mut backoff = PollBackoff::new(Duration::from_secs(1), Duration::from_secs(30), 2, 0.2);
        let d = backoff.next_delay();
        assert!(d >= Duration::from_millis(800));
        assert!(d <= Duration::from_millis(1200));
    }

    #[test]
    fn reset_starts_over() {
        let mut backoff = PollBackoff::default();
        let _ = backoff.next_delay();
        let _ = backoff.next_delay();
        assert_eq!(backoff.failures(), 2);
        backoff.reset();
        assert_eq!(backoff.failures(), 0);
    }
}
