//! Reconnect backoff for push channel subscriptions.
//!
//! Each subscription loop owns its own [`ReconnectBackoff`], so independent
//! channels never share attempt counters.

use std::time::Duration;

use rand::Rng;

/// Reconnection tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Upper bound of the random extra delay, as a fraction of the base delay.
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(30_000),
            multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

/// Capped exponential backoff with jitter.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    policy: BackoffPolicy,
    current_delay_ms: u64,
    attempts: u32,
}

impl ReconnectBackoff {
    #[must_use]
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            current_delay_ms: as_ms(policy.initial_delay),
            attempts: 0,
        }
    }

    /// Number of delays handed out since the last reset.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Called on a confirmed subscription.
    pub fn reset(&mut self) {
        self.current_delay_ms = as_ms(self.policy.initial_delay);
        self.attempts = 0;
    }

    /// Delay before the next reconnect attempt, then grow the base delay.
    pub fn next_delay(&mut self) -> Duration {
        let base_delay = Duration::from_millis(self.current_delay_ms);
        let delay = base_delay + Duration::from_millis(self.jitter_ms(base_delay));

        let next_delay = (self.current_delay_ms as f64 * self.policy.multiplier) as u64;
        self.current_delay_ms = next_delay.min(as_ms(self.policy.max_delay));
        self.attempts = self.attempts.saturating_add(1);

        delay
    }

    fn jitter_ms(&self, base_delay: Duration) -> u64 {
        let jitter_range_ms = (base_delay.as_millis() as f64 * self.policy.jitter) as u64;
        if jitter_range_ms == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..=jitter_range_ms)
    }
}

fn as_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
