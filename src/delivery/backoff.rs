//! Exponential retry delay with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::DeliveryConfig;

/// Share of the computed delay added as random jitter, at most.
const JITTER_RATIO: f64 = 0.1;

/// Retry delay calculator.
#[derive(Debug, Clone)]
pub struct Backoff {
    /// Delay after the first failure.
    pub base: Duration,
    /// Upper bound before jitter.
    pub ceiling: Duration,
}

impl Backoff {
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        Self {
            base,
            ceiling: ceiling.max(base),
        }
    }

    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self::new(config.base_delay(), config.max_delay())
    }

    /// Delay without jitter after `failures` consecutive failures.
    ///
    /// Doubles per failure starting from `base` and saturates at `ceiling`.
    pub fn base_delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(failures - 1);
        self.base.saturating_mul(factor).min(self.ceiling)
    }

    /// Delay with up to 10% random jitter on top.
    pub fn delay(&self, failures: u32) -> Duration {
        let delay = self.base_delay(failures);
        let max_jitter_ms = delay.mul_f64(JITTER_RATIO).as_millis() as u64;
        if max_jitter_ms == 0 {
            return delay;
        }
        let jitter_ms = rand::thread_rng().gen_range(0..=max_jitter_ms);
        delay + Duration::from_millis(jitter_ms)
    }
}
