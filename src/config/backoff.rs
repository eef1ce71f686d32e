//! Back-off configuration for the server accept loop.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential back-off applied when `accept()` fails.
///
/// The delay starts at `initial_delay` and doubles on each consecutive
/// failure, capped at `max_delay`. A successful accept resets it.
///
/// # Default Values
/// - `initial_delay`: 10 milliseconds
/// - `max_delay`: 1 second
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay used for the first retry after an `accept()` failure.
    pub initial_delay: Duration,
    /// Maximum back-off delay once retries have increased exponentially.
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl BackoffConfig {
    /// Clamp delays to at least one millisecond and ensure
    /// `initial_delay <= max_delay`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use peerwire::config::BackoffConfig;
    ///
    /// let cfg = BackoffConfig {
    ///     initial_delay: Duration::from_millis(5),
    ///     max_delay: Duration::ZERO,
    /// };
    ///
    /// let normalized = cfg.normalized();
    /// assert_eq!(normalized.initial_delay, Duration::from_millis(1));
    /// assert_eq!(normalized.max_delay, Duration::from_millis(5));
    /// ```
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.initial_delay = self.initial_delay.max(Duration::from_millis(1));
        self.max_delay = self.max_delay.max(Duration::from_millis(1));
        if self.initial_delay > self.max_delay {
            std::mem::swap(&mut self.initial_delay, &mut self.max_delay);
        }
        self
    }

    /// Delay to use after a failure that followed `current`.
    #[must_use]
    pub fn next_delay(&self, current: Duration) -> Duration { (current * 2).min(self.max_delay) }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(10, 1000, 10, 1000)]
    #[case(0, 0, 1, 1)]
    #[case(500, 20, 20, 500)]
    fn normalized_orders_and_clamps(
        #[case] initial: u64,
        #[case] max: u64,
        #[case] want_initial: u64,
        #[case] want_max: u64,
    ) {
        let cfg = BackoffConfig {
            initial_delay: Duration::from_millis(initial),
            max_delay: Duration::from_millis(max),
        }
        .normalized();
        assert_eq!(cfg.initial_delay, Duration::from_millis(want_initial));
        assert_eq!(cfg.max_delay, Duration::from_millis(want_max));
    }

    #[rstest]
    fn delay_doubles_up_to_cap() {
        let cfg = BackoffConfig::default();
        let mut delay = cfg.initial_delay;
        let mut seen = Vec::new();
        for _ in 0..9 {
            delay = cfg.next_delay(delay);
            seen.push(delay.as_millis());
        }
        assert_eq!(seen, vec![20, 40, 80, 160, 320, 640, 1000, 1000, 1000]);
    }
}
