//! Exponential reconnection backoff

use std::time::Duration;

/// Default delay before the first reconnection attempt.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(500);

/// Default cap on the reconnection delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(5000);

/// Backoff bounds, as supplied by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: DEFAULT_INITIAL_DELAY,
            max: DEFAULT_MAX_DELAY,
        }
    }
}

/// Doubling delay capped at a maximum.
///
/// [`Backoff::next_delay`] hands out the current delay and then doubles it;
/// [`Backoff::reset`] returns to the initial delay after a successful open.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        // A cap below the initial delay would make the first delay exceed it
        let max = config.max.max(config.initial);
        Self {
            initial: config.initial,
            max,
            current: config.initial,
        }
    }

    /// Delay to wait before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    /// Delay the next call to [`Backoff::next_delay`] will return
    pub fn peek(&self) -> Duration {
        self.current
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_backoff_doubles_until_cap() {
        let mut backoff = Backoff::default();
        let delays: Vec<Duration> = (0..6).map(|_| backoff.next_delay()).collect();
        assert_eq!(
            delays,
            vec![ms(500), ms(1000), ms(2000), ms(4000), ms(5000), ms(5000)]
        );
    }

    #[test]
    fn test_backoff_reset_returns_to_initial() {
        let mut backoff = Backoff::default();
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.peek(), ms(2000));
        backoff.reset();
        assert_eq!(backoff.next_delay(), ms(500));
    }

    #[test]
    fn test_backoff_does_not_overflow() {
        let mut backoff = Backoff::new(BackoffConfig {
            initial: Duration::MAX / 2 + ms(1),
            max: Duration::MAX,
        });
        backoff.next_delay();
        assert_eq!(backoff.next_delay(), Duration::MAX);
    }

    #[test]
    fn test_backoff_cap_below_initial_is_raised() {
        let mut backoff = Backoff::new(BackoffConfig {
            initial: ms(800),
            max: ms(100),
        });
        assert_eq!(backoff.next_delay(), ms(800));
        assert_eq!(backoff.next_delay(), ms(800));
    }
}
