//! Failure classification and process-wide failure counters.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::DeliveryConfig;

/// Failure class of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCategory {
    /// Client-side timeout.
    Timeout,
    /// Connection refused, reset, DNS.
    Network,
    /// 5xx response.
    Server,
    /// 429 response.
    RateLimited,
    /// 4xx response other than 429.
    Client,
    /// Anything else; handled like a timeout.
    Unknown,
}

impl FailureCategory {
    pub const ALL: [FailureCategory; 6] = [
        Self::Timeout,
        Self::Network,
        Self::Server,
        Self::RateLimited,
        Self::Client,
        Self::Unknown,
    ];

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimited,
            400..=499 => Self::Client,
            500..=599 => Self::Server,
            _ => Self::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Client)
    }

    /// Permanent client errors say nothing about endpoint health.
    pub fn affects_health(&self) -> bool {
        !matches!(self, Self::Client)
    }

    /// Retry budget for this category, capped by `max_attempts`.
    pub fn retry_budget(&self, config: &DeliveryConfig) -> u32 {
        let budget = match self {
            Self::Timeout | Self::Network | Self::Unknown => config.network_max_attempts,
            Self::Server => config.server_max_attempts,
            Self::RateLimited => config.max_attempts,
            Self::Client => 0,
        };
        budget.min(config.max_attempts)
    }

    fn index(&self) -> usize {
        match self {
            Self::Timeout => 0,
            Self::Network => 1,
            Self::Server => 2,
            Self::RateLimited => 3,
            Self::Client => 4,
            Self::Unknown => 5,
        }
    }
}

/// Process-wide delivery health.
///
/// Unhealthy once consecutive failures exceed the threshold; any success
/// resets it. While unhealthy the retry queue is drained only after the
/// cooldown has elapsed since the last failure.
#[derive(Debug)]
pub struct FailureState {
    consecutive: AtomicU32,
    by_category: [AtomicU64; 6],
    last_failure: Mutex<Option<Instant>>,
    threshold: u32,
    cooldown: Duration,
}

impl FailureState {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            consecutive: AtomicU32::new(0),
            by_category: Default::default(),
            last_failure: Mutex::new(None),
            threshold,
            cooldown,
        }
    }

    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self::new(config.failure_threshold, config.cooldown())
    }

    pub fn record_success(&self) {
        let previous = self.consecutive.swap(0, Ordering::AcqRel);
        if previous > self.threshold {
            info!("Delivery recovered after {} consecutive failures", previous);
        }
    }

    pub fn record_failure(&self, category: FailureCategory) {
        self.by_category[category.index()].fetch_add(1, Ordering::Relaxed);
        if !category.affects_health() {
            return;
        }

        *self
            .last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        let consecutive = self.consecutive.fetch_add(1, Ordering::AcqRel) + 1;
        if consecutive == self.threshold.saturating_add(1) {
            warn!(
                consecutive,
                cooldown_secs = self.cooldown.as_secs(),
                "Delivery marked unhealthy"
            );
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.consecutive.load(Ordering::Acquire) <= self.threshold
    }

    /// Whether the retry queue may be drained now.
    pub fn can_drain(&self) -> bool {
        if self.is_healthy() {
            return true;
        }
        match *self.last_failure.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(at) => at.elapsed() >= self.cooldown,
            None => true,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive.load(Ordering::Acquire)
    }

    /// Total failures recorded for one category.
    pub fn count(&self, category: FailureCategory) -> u64 {
        self.by_category[category.index()].load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(FailureCategory::from_status(429), FailureCategory::RateLimited);
        assert_eq!(FailureCategory::from_status(401), FailureCategory::Client);
        assert_eq!(FailureCategory::from_status(404), FailureCategory::Client);
        assert_eq!(FailureCategory::from_status(503), FailureCategory::Server);
        assert_eq!(FailureCategory::from_status(302), FailureCategory::Unknown);
        assert!(FailureCategory::RateLimited.is_retryable());
        assert!(FailureCategory::Unknown.is_retryable());
        assert!(!FailureCategory::Client.is_retryable());
    }

    #[test]
    fn test_retry_budgets() {
        let config = DeliveryConfig::default();
        assert_eq!(FailureCategory::Network.retry_budget(&config), 8);
        assert_eq!(FailureCategory::Unknown.retry_budget(&config), 8);
        assert_eq!(FailureCategory::Server.retry_budget(&config), 3);
        assert_eq!(FailureCategory::RateLimited.retry_budget(&config), 10);
        assert_eq!(FailureCategory::Client.retry_budget(&config), 0);

        let tight = DeliveryConfig {
            max_attempts: 2,
            ..DeliveryConfig::default()
        };
        assert_eq!(FailureCategory::Network.retry_budget(&tight), 2);
    }

    #[test]
    fn test_success_resets_breaker() {
        let state = FailureState::new(2, Duration::from_secs(60));
        for _ in 0..3 {
            state.record_failure(FailureCategory::Server);
        }
        assert!(!state.is_healthy());
        assert!(!state.can_drain());

        state.record_success();
        assert!(state.is_healthy());
        assert_eq!(state.consecutive_failures(), 0);
        assert_eq!(state.count(FailureCategory::Server), 3);
    }

    #[test]
    fn test_client_errors_leave_health_alone() {
        let state = FailureState::new(0, Duration::from_secs(60));
        state.record_failure(FailureCategory::Client);
        assert!(state.is_healthy());
        assert_eq!(state.consecutive_failures(), 0);
        assert_eq!(state.count(FailureCategory::Client), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_reopens_draining() {
        let state = FailureState::new(1, Duration::from_secs(60));
        state.record_failure(FailureCategory::Timeout);
        state.record_failure(FailureCategory::Network);
        assert!(!state.can_drain());

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!state.can_drain());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(state.can_drain());
        assert!(!state.is_healthy());
    }
}
