//! Delivery Reliability Layer.
//!
//! Posts submissions, classifies failures, parks retryable ones in a bounded
//! queue and drains it with exponential backoff while the endpoint is healthy.

pub mod backoff;
pub mod failure;
pub mod queue;
pub mod transport;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::common::error::{DeliveryError, DeliveryResult};
use crate::config::DeliveryConfig;

use backoff::Backoff;
use failure::{FailureCategory, FailureState};
use queue::{QueuedDelivery, RetryQueue};
use transport::ResponseNotice;

pub use transport::{HttpTransport, OutboundRequest, Transport, SCREENSHOT_FILE_NAME};

/// What happened to a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Failed with a retryable error and parked in the retry queue.
    Queued,
    /// Permanent failure; not retried.
    Rejected,
    /// Retryable, but the retry queue was full.
    Dropped,
    /// Retryable, but the configured budget allows no retries.
    Exhausted,
}

/// Sends submissions and retries failed ones.
pub struct DeliveryService<T: Transport> {
    transport: T,
    config: DeliveryConfig,
    queue: Mutex<RetryQueue>,
    failures: FailureState,
    backoff: Backoff,
}

impl<T: Transport> DeliveryService<T> {
    pub fn new(transport: T, config: DeliveryConfig) -> Self {
        Self {
            queue: Mutex::new(RetryQueue::new(config.max_queue_size, config.max_age())),
            failures: FailureState::from_config(&config),
            backoff: Backoff::from_config(&config),
            transport,
            config,
        }
    }

    /// First delivery attempt for a new submission.
    pub async fn submit(&self, request: OutboundRequest) -> DeliveryOutcome {
        match self.attempt(&request).await {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(e) => {
                let category = e.category();
                if !category.is_retryable() {
                    warn!(
                        event_id = request.event_id,
                        "Delivery rejected permanently: {}", e
                    );
                    return DeliveryOutcome::Rejected;
                }
                if category.retry_budget(&self.config) == 0 {
                    warn!(
                        event_id = request.event_id,
                        ?category,
                        "Delivery failed and retries are disabled: {}", e
                    );
                    return DeliveryOutcome::Exhausted;
                }

                let next = Instant::now() + self.backoff.delay(1);
                let item = QueuedDelivery::new(request, &e, next);
                let event_id = item.request.event_id;
                match self.lock_queue().enqueue(item) {
                    Ok(()) => {
                        debug!(event_id, ?category, "Delivery queued for retry: {}", e);
                        DeliveryOutcome::Queued
                    }
                    Err(full) => {
                        warn!(event_id, "{}", full);
                        DeliveryOutcome::Dropped
                    }
                }
            }
        }
    }

    /// Retry every queued item whose time has come.
    ///
    /// Returns the number of attempts made. Skipped entirely while unhealthy
    /// and inside the cooldown.
    pub async fn drain_once(&self) -> usize {
        if !self.failures.can_drain() {
            debug!(
                consecutive = self.failures.consecutive_failures(),
                "Delivery unhealthy, retry queue paused"
            );
            return 0;
        }

        let mut attempts = 0;
        loop {
            let Some(mut item) = self.lock_queue().pop_ready(Instant::now()) else {
                break;
            };
            attempts += 1;
            item.attempts += 1;
            item.last_retry_at = Some(Instant::now());

            match self.attempt(&item.request).await {
                Ok(()) => {
                    self.lock_queue().release();
                    info!(
                        event_id = item.request.event_id,
                        retries = item.attempts,
                        "Queued delivery succeeded"
                    );
                }
                Err(e) => self.after_retry_failure(item, e),
            }

            if !self.failures.can_drain() {
                break;
            }
        }
        attempts
    }

    /// Drain the queue periodically until shutdown, then make one last pass.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.drain_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.drain_once().await;
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        let attempted = self.drain_once().await;
        let remaining = self.queue_len();
        info!(attempted, remaining, "Delivery worker stopped");
    }

    pub fn queue_len(&self) -> usize {
        self.lock_queue().len()
    }

    pub fn failures(&self) -> &FailureState {
        &self.failures
    }

    fn after_retry_failure(&self, mut item: QueuedDelivery, e: DeliveryError) {
        let category = e.category();
        item.failure = category;
        item.last_error = e.to_string();
        let event_id = item.request.event_id;

        if !category.is_retryable() {
            self.lock_queue().release();
            warn!(event_id, attempts = item.attempts, "Delivery rejected permanently: {}", e);
            return;
        }

        let budget = category.retry_budget(&self.config);
        if item.attempts >= budget {
            self.lock_queue().release();
            warn!(
                event_id,
                attempts = item.attempts,
                ?category,
                "Delivery abandoned after exhausting retries: {}",
                e
            );
            return;
        }

        let delay = self.backoff.delay(item.attempts + 1);
        item.next_attempt_at = Instant::now() + delay;
        debug!(
            event_id,
            attempts = item.attempts,
            delay_ms = delay.as_millis() as u64,
            "Retry failed: {}",
            e
        );
        self.lock_queue().requeue(item);
    }

    /// One HTTP exchange, recorded in the failure state.
    async fn attempt(&self, request: &OutboundRequest) -> DeliveryResult<()> {
        let result = match self.transport.post(request).await {
            Ok(response) if response.is_success() => {
                if let Some(notice) = ResponseNotice::parse(&response.body) {
                    if let Some(text) = notice.notice {
                        info!("Notice from endpoint: {}", text);
                    }
                    if let Some(text) = notice.rank_update {
                        info!("Rank update: {}", text);
                    }
                }
                Ok(())
            }
            Ok(response) => Err(DeliveryError::Status {
                status: response.status,
            }),
            Err(e) => Err(e),
        };

        match &result {
            Ok(()) => self.failures.record_success(),
            Err(e) => self.failures.record_failure(e.category()),
        }
        result
    }

    fn lock_queue(&self) -> MutexGuard<'_, RetryQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Failure counts worth reporting, in category order.
pub fn failure_summary(failures: &FailureState) -> Vec<(FailureCategory, u64)> {
    FailureCategory::ALL
        .into_iter()
        .map(|c| (c, failures.count(c)))
        .filter(|(_, n)| *n > 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    use transport::TransportResponse;

    /// Transport replaying scripted results and recording when it was called.
    #[derive(Default)]
    struct ScriptedTransport {
        script: Mutex<VecDeque<DeliveryResult<u16>>>,
        calls: Mutex<Vec<Instant>>,
        event_ids: Mutex<Vec<u64>>,
        /// Per-call latency, in call order; calls past the end answer at once.
        latencies: Mutex<VecDeque<Duration>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<DeliveryResult<u16>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                ..Self::default()
            }
        }

        fn with_latencies(self, latencies: Vec<Duration>) -> Self {
            *self.latencies.lock().unwrap() = latencies.into();
            self
        }

        fn calls(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }

        fn event_ids(&self) -> Vec<u64> {
            self.event_ids.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        async fn post(&self, request: &OutboundRequest) -> DeliveryResult<TransportResponse> {
            self.calls.lock().unwrap().push(Instant::now());
            self.event_ids.lock().unwrap().push(request.event_id);
            let next = self.script.lock().unwrap().pop_front().unwrap_or(Ok(200));
            let latency = self.latencies.lock().unwrap().pop_front();
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            next.map(|status| TransportResponse {
                status,
                body: String::new(),
            })
        }
    }

    fn request(event_id: u64) -> OutboundRequest {
        OutboundRequest {
            event_id,
            destination_ids: vec!["main".to_string()],
            payload_json: r#"{"content":"test"}"#.to_string(),
            screenshot: None,
        }
    }

    fn config() -> DeliveryConfig {
        DeliveryConfig {
            drain_interval_ms: 10,
            ..DeliveryConfig::default()
        }
    }

    async fn drain_until_empty<T: Transport>(service: &DeliveryService<T>, limit: usize) {
        for _ in 0..limit {
            if service.queue_len() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            service.drain_once().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_retried_with_growing_delay() {
        let service = DeliveryService::new(
            ScriptedTransport::new(vec![Ok(503), Ok(503), Ok(503), Ok(200)]),
            config(),
        );

        assert_eq!(service.submit(request(1)).await, DeliveryOutcome::Queued);
        assert_eq!(service.queue_len(), 1);

        drain_until_empty(&service, 2_000).await;

        let calls = service.transport.calls();
        assert_eq!(calls.len(), 4, "one attempt plus exactly three retries");
        assert_eq!(service.queue_len(), 0);

        let gaps: Vec<Duration> = calls.windows(2).map(|w| w[1] - w[0]).collect();
        assert!(gaps[0] >= Duration::from_secs(1));
        assert!(gaps[0] < gaps[1] && gaps[1] < gaps[2], "gaps {:?}", gaps);
        assert!(service.failures().is_healthy());
        assert_eq!(service.failures().count(FailureCategory::Server), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_is_not_queued() {
        let service = DeliveryService::new(ScriptedTransport::new(vec![Ok(401)]), config());

        assert_eq!(service.submit(request(1)).await, DeliveryOutcome::Rejected);
        assert_eq!(service.queue_len(), 0);
        assert_eq!(service.failures().count(FailureCategory::Client), 1);
        assert_eq!(service.failures().consecutive_failures(), 0);
        assert!(service.failures().is_healthy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_budget_exhausted() {
        let service = DeliveryService::new(
            ScriptedTransport::new((0..10).map(|_| Ok(500)).collect()),
            config(),
        );
        service.submit(request(1)).await;
        drain_until_empty(&service, 2_000).await;

        // First attempt plus server_max_attempts retries.
        assert_eq!(service.transport.calls().len(), 4);
        assert_eq!(service.queue_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_use_network_budget() {
        let timeout = || {
            Err(DeliveryError::Transport {
                category: FailureCategory::Timeout,
                message: "operation timed out".to_string(),
            })
        };
        let service = DeliveryService::new(
            ScriptedTransport::new((0..20).map(|_| timeout()).collect()),
            DeliveryConfig {
                failure_threshold: 100,
                ..config()
            },
        );
        service.submit(request(1)).await;
        drain_until_empty(&service, 40_000).await;

        assert_eq!(service.transport.calls().len(), 9);
        assert_eq!(service.failures().count(FailureCategory::Timeout), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_drops_new_failures() {
        let service = DeliveryService::new(
            ScriptedTransport::new(vec![Ok(503), Ok(503), Ok(503)]),
            DeliveryConfig {
                max_queue_size: 2,
                ..config()
            },
        );
        assert_eq!(service.submit(request(1)).await, DeliveryOutcome::Queued);
        assert_eq!(service.submit(request(2)).await, DeliveryOutcome::Queued);
        assert_eq!(service.submit(request(3)).await, DeliveryOutcome::Dropped);
        assert_eq!(service.queue_len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_failure_cannot_take_slot_of_retry_in_flight() {
        let service = DeliveryService::new(
            ScriptedTransport::new(vec![Ok(503), Ok(503), Ok(503)]).with_latencies(vec![
                Duration::ZERO,
                Duration::from_millis(100),
                Duration::ZERO,
            ]),
            DeliveryConfig {
                max_queue_size: 1,
                ..config()
            },
        );
        assert_eq!(service.submit(request(1)).await, DeliveryOutcome::Queued);
        tokio::time::sleep(Duration::from_secs(5)).await;

        let (attempted, outcome) = tokio::join!(service.drain_once(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            service.submit(request(2)).await
        });
        assert_eq!(attempted, 1);
        assert_eq!(outcome, DeliveryOutcome::Dropped);
        assert_eq!(service.queue_len(), 1);

        // The retried item kept its place and is delivered on the next pass.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(service.drain_once().await, 1);
        assert_eq!(service.queue_len(), 0);
        assert_eq!(service.transport.event_ids(), vec![1, 1, 2, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_budget_is_never_queued() {
        let service = DeliveryService::new(
            ScriptedTransport::new(vec![Ok(503), Ok(503)]),
            DeliveryConfig {
                max_attempts: 0,
                ..config()
            },
        );
        assert_eq!(service.submit(request(1)).await, DeliveryOutcome::Exhausted);
        assert_eq!(service.queue_len(), 0);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(service.drain_once().await, 0);
        assert_eq!(service.transport.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unhealthy_layer_waits_for_cooldown() {
        let service = DeliveryService::new(
            ScriptedTransport::new(vec![Ok(503), Ok(503), Ok(503)]),
            DeliveryConfig {
                failure_threshold: 2,
                cooldown_secs: 60,
                ..config()
            },
        );
        for id in 1..=3 {
            service.submit(request(id)).await;
        }
        assert!(!service.failures().is_healthy());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(service.drain_once().await, 0);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(service.drain_once().await > 0);
        assert!(service.failures().is_healthy());
        assert_eq!(service.queue_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_makes_final_pass_on_shutdown() {
        let service = Arc::new(DeliveryService::new(
            ScriptedTransport::new(vec![Ok(503)]),
            config(),
        ));
        service.submit(request(1)).await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(Arc::clone(&service).run(shutdown_rx));

        tokio::time::sleep(Duration::from_secs(5)).await;
        shutdown_tx.send(true).unwrap();
        worker.await.unwrap();

        assert_eq!(service.queue_len(), 0);
        assert_eq!(service.transport.calls().len(), 2);
    }

    #[test]
    fn test_failure_summary_skips_zero_counts() {
        let failures = FailureState::new(5, Duration::from_secs(60));
        failures.record_failure(FailureCategory::Server);
        failures.record_failure(FailureCategory::Server);
        failures.record_failure(FailureCategory::Client);
        assert_eq!(
            failure_summary(&failures),
            vec![(FailureCategory::Server, 2), (FailureCategory::Client, 1)]
        );
    }
}
