use std::time::Duration;

use crate::Config;

/// Capped exponential reconnect delay: `min(base * 2^retry, cap)`.
///
/// With the defaults (1 s base, 30 s cap) consecutive failures wait
/// 1, 2, 4, 8, 16, 30, 30, ... seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.backoff_base, config.backoff_cap)
    }

    /// Delay before the reconnect following `retry` earlier failures.
    pub fn delay(&self, retry: u32) -> Duration {
        1u32.checked_shl(retry)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.cap, |delay| delay.min(self.cap))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sequence() {
        let backoff = Backoff::default();
        let delays: Vec<u128> = (0..8).map(|n| backoff.delay(n).as_millis()).collect();
        assert_eq!(
            delays,
            vec![1000, 2000, 4000, 8000, 16000, 30000, 30000, 30000]
        );
    }

    #[test]
    fn test_large_retry_counts_stay_capped() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(31), Duration::from_millis(30_000));
        assert_eq!(backoff.delay(32), Duration::from_millis(30_000));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn test_custom_base() {
        let backoff = Backoff::new(Duration::from_millis(10), Duration::from_millis(50));
        assert_eq!(backoff.delay(0), Duration::from_millis(10));
        assert_eq!(backoff.delay(2), Duration::from_millis(40));
        assert_eq!(backoff.delay(3), Duration::from_millis(50));
    }
}
