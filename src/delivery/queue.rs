//! Bounded FIFO of failed deliveries awaiting retry.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use crate::common::error::{DeliveryError, DeliveryResult};

use super::failure::FailureCategory;
use super::transport::OutboundRequest;

/// A failed delivery waiting for its next attempt.
#[derive(Debug, Clone)]
pub struct QueuedDelivery {
    pub request: OutboundRequest,
    /// Category of the most recent failure.
    pub failure: FailureCategory,
    pub last_error: String,
    /// Retries performed so far; the first attempt is not counted.
    pub attempts: u32,
    pub first_queued_at: Instant,
    pub last_retry_at: Option<Instant>,
    pub next_attempt_at: Instant,
}

impl QueuedDelivery {
    pub fn new(request: OutboundRequest, error: &DeliveryError, next_attempt_at: Instant) -> Self {
        Self {
            request,
            failure: error.category(),
            last_error: error.to_string(),
            attempts: 0,
            first_queued_at: Instant::now(),
            last_retry_at: None,
            next_attempt_at,
        }
    }

    pub fn age(&self) -> Duration {
        self.first_queued_at.elapsed()
    }
}

/// FIFO retry queue with a hard capacity. A full queue rejects, it never overwrites.
///
/// An item handed out by `pop_ready` keeps its slot until it is requeued or
/// released, so new failures cannot take the place of a retry in flight.
#[derive(Debug)]
pub struct RetryQueue {
    items: VecDeque<QueuedDelivery>,
    /// Items popped for a retry and not yet returned or released.
    in_flight: usize,
    capacity: usize,
    max_age: Duration,
}

impl RetryQueue {
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        Self {
            items: VecDeque::new(),
            in_flight: 0,
            capacity,
            max_age,
        }
    }

    /// Append at the tail.
    pub fn enqueue(&mut self, item: QueuedDelivery) -> DeliveryResult<()> {
        if self.items.len() + self.in_flight >= self.capacity {
            return Err(DeliveryError::QueueFull {
                capacity: self.capacity,
            });
        }
        self.items.push_back(item);
        Ok(())
    }

    /// Put a retried item back at the head, into the slot it held while in flight.
    pub fn requeue(&mut self, item: QueuedDelivery) {
        self.release();
        self.items.push_front(item);
    }

    /// Free the slot of a retried item that is done for good.
    pub fn release(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Pop the head if its retry time has come, claiming its slot until it is
    /// requeued or released.
    ///
    /// Items past the maximum age are dropped on the way without an attempt.
    pub fn pop_ready(&mut self, now: Instant) -> Option<QueuedDelivery> {
        while let Some(head) = self.items.front() {
            if now.duration_since(head.first_queued_at) >= self.max_age {
                if let Some(expired) = self.items.pop_front() {
                    warn!(
                        event_id = expired.request.event_id,
                        attempts = expired.attempts,
                        age_secs = expired.age().as_secs(),
                        "Dropping delivery older than {}h",
                        self.max_age.as_secs() / 3600
                    );
                }
                continue;
            }
            if head.next_attempt_at <= now {
                let item = self.items.pop_front();
                self.in_flight += 1;
                return item;
            }
            return None;
        }
        None
    }

    /// Items waiting for a retry, not counting those in flight.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
