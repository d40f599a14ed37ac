//! Idle polling back-off

use std::time::Duration;

/// Multiplicative back-off between empty polls
///
/// Each empty poll sleeps the current interval and then grows it by
/// `factor`, capped at `max`. A poll that finds work resets it to `min`.
#[derive(Debug, Clone)]
pub struct PollBackoff {
    min: Duration,
    max: Duration,
    factor: f64,
    current: Duration,
}

impl PollBackoff {
    pub fn new(min: Duration, max: Duration, factor: f64) -> Self {
        Self {
            min,
            max,
            factor,
            current: min,
        }
    }

    /// Interval to sleep after an empty poll
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.factor)
            .map(|grown| grown.min(self.max))
            .unwrap_or(self.max);
        delay
    }

    /// Work was found; returns the minimum interval
    pub fn reset(&mut self) -> Duration {
        self.current = self.min;
        self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff() -> PollBackoff {
        PollBackoff::new(Duration::from_secs(1), Duration::from_secs(8), 1.5)
    }

    #[test]
    fn test_grows_multiplicatively() {
        let mut backoff = backoff();
        let delays: Vec<Duration> = (0..3).map(|_| backoff.next_delay()).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(1500),
                Duration::from_millis(2250),
            ]
        );
    }

    #[test]
    fn test_caps_at_max() {
        let mut backoff = backoff();
        for _ in 0..20 {
            backoff.next_delay();
        }
        assert_eq!(backoff.next_delay(), Duration::from_secs(8));
    }

    #[test]
    fn test_unrepresentable_growth_saturates_at_max() {
        let max = Duration::from_secs(u64::MAX);
        let mut huge = PollBackoff::new(Duration::from_secs(u64::MAX / 2), max, 1e9);
        huge.next_delay();
        assert_eq!(huge.next_delay(), max);

        let mut infinite =
            PollBackoff::new(Duration::from_secs(1), Duration::from_secs(8), f64::INFINITY);
        infinite.next_delay();
        assert_eq!(infinite.next_delay(), Duration::from_secs(8));
    }

    #[test]
    fn test_reset_after_work_found() {
        let mut backoff = backoff();
        backoff.next_delay();
        backoff.next_delay();
        backoff.next_delay();

        assert_eq!(backoff.reset(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }
}
