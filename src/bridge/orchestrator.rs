//! Orchestrator that turns emitted events into deliveries.
//!
//! Routes each event, renders its payload, attaches a screenshot when one is
//! required and hands the request to the delivery service without waiting
//! for the network.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::common::error::DeliveryResult;
use crate::common::types::DomainEvent;
use crate::config::Config;
use crate::delivery::{DeliveryOutcome, DeliveryService, OutboundRequest, Transport};
use crate::game::screenshot::ScreenshotProvider;
use crate::router::SubmissionRouter;

use super::channels::PipelineChannels;
use super::formatter::TemplateSet;
use super::payload::WebhookPayload;

/// How long events emitted during shutdown are still accepted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Connects the router to the delivery layer.
pub struct Orchestrator<T: Transport, S: ScreenshotProvider> {
    router: SubmissionRouter,
    templates: TemplateSet,
    screenshots: S,
    delivery: Arc<DeliveryService<T>>,
}

impl<T: Transport, S: ScreenshotProvider> Orchestrator<T, S> {
    pub fn new(
        router: SubmissionRouter,
        templates: TemplateSet,
        screenshots: S,
        delivery: Arc<DeliveryService<T>>,
    ) -> Self {
        Self {
            router,
            templates,
            screenshots,
            delivery,
        }
    }

    pub fn from_config(config: &Config, screenshots: S, delivery: Arc<DeliveryService<T>>) -> Self {
        Self::new(
            SubmissionRouter::from_config(config),
            TemplateSet::new(&config.templates),
            screenshots,
            delivery,
        )
    }

    /// Route an event and build its outbound request.
    ///
    /// `Ok(None)` when no destination accepts the event.
    pub async fn prepare(&self, event: DomainEvent) -> DeliveryResult<Option<OutboundRequest>> {
        let Some(intent) = self.router.route(event) else {
            return Ok(None);
        };

        let screenshot = if intent.screenshot_required {
            let image = self.screenshots.capture().await;
            if image.is_none() {
                debug!(
                    event_id = intent.event.id,
                    "Screenshot required but unavailable, sending without"
                );
            }
            image
        } else {
            None
        };

        let content = self.templates.content(&intent.event);
        let payload = WebhookPayload::build(&intent, content, screenshot.is_some());
        Ok(Some(OutboundRequest {
            event_id: intent.event.id,
            destination_ids: intent.destination_ids,
            payload_json: payload.to_json()?,
            screenshot,
        }))
    }

    /// Prepare an event and start its delivery in the background.
    async fn dispatch(&self, event: DomainEvent, inflight: &mut JoinSet<(u64, DeliveryOutcome)>) {
        let event_id = event.id;
        match self.prepare(event).await {
            Ok(Some(request)) => {
                let delivery = Arc::clone(&self.delivery);
                inflight.spawn(async move {
                    let event_id = request.event_id;
                    (event_id, delivery.submit(request).await)
                });
            }
            Ok(None) => debug!(event_id, "No destination accepted event"),
            Err(e) => warn!(event_id, "Dropping event: {}", e),
        }
    }

    /// Process events until the channel closes, or until the shutdown grace
    /// period runs out. Waits for in-flight first attempts before returning.
    pub async fn run(self, channels: PipelineChannels) {
        let PipelineChannels {
            mut events_rx,
            mut shutdown_rx,
        } = channels;
        let mut inflight = JoinSet::new();
        let mut stopping = false;

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed(), if !stopping => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Orchestrator draining remaining events");
                        stopping = true;
                    }
                }
                event = events_rx.recv() => {
                    match event {
                        Some(event) => self.dispatch(event, &mut inflight).await,
                        None => {
                            if !stopping {
                                error!("Event channel closed unexpectedly");
                            }
                            break;
                        }
                    }
                }
                Some(joined) = inflight.join_next(), if !inflight.is_empty() => {
                    log_outcome(joined);
                }
                _ = tokio::time::sleep(SHUTDOWN_GRACE), if stopping => {
                    warn!("Shutdown grace period elapsed with the event channel still open");
                    break;
                }
            }
        }

        while let Some(joined) = inflight.join_next().await {
            log_outcome(joined);
        }
        let routed = self.router.history();
        info!(
            recent = routed.len(),
            last_event = ?routed.last().map(|r| r.event_id),
            "Orchestrator stopped"
        );
    }
}

fn log_outcome(joined: Result<(u64, DeliveryOutcome), tokio::task::JoinError>) {
    match joined {
        Ok((event_id, outcome)) => debug!(event_id, ?outcome, "First delivery attempt finished"),
        Err(e) => error!("Delivery task failed: {}", e),
    }
}
