use std::time::Duration;

/// Lengthening of the polling interval after consecutive fetch failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Failures tolerated at the baseline interval.
    pub threshold: u32,
    pub multiplier: u32,
    pub max_interval: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy {
            threshold: 3,
            multiplier: 2,
            max_interval: Duration::from_millis(60_000),
        }
    }
}

impl BackoffPolicy {
    /// Interval to use after `error_count` consecutive failures.
    ///
    /// From the threshold on, each further failure multiplies the baseline
    /// once more. The result never exceeds `max_interval`, and never drops
    /// below `baseline`.
    pub fn interval_for(&self, baseline: Duration, error_count: u32) -> Duration {
        if error_count < self.threshold {
            return baseline;
        }
        let factor = self
            .multiplier
            .saturating_pow(error_count - self.threshold);
        baseline
            .saturating_mul(factor)
            .min(self.max_interval.max(baseline))
    }
}
