//! Pipeline channel management.
//!
//! Groups the channels that connect the game session, the orchestrator and
//! the delivery worker.

use tokio::sync::{mpsc, watch};

use crate::common::types::DomainEvent;

/// Channels for the game session side.
pub struct SessionChannels {
    /// Sender for emitted events (correlator -> orchestrator).
    pub events_tx: mpsc::UnboundedSender<DomainEvent>,
    /// Receiver for the shutdown signal.
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Channels for the orchestrator.
pub struct PipelineChannels {
    /// Receiver for emitted events.
    pub events_rx: mpsc::UnboundedReceiver<DomainEvent>,
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Channels for the delivery worker.
///
/// It stops on its own signal so that submissions made while the pipeline
/// winds down still get a final drain pass.
pub struct DeliveryChannels {
    pub stop_rx: watch::Receiver<bool>,
}

/// Control channels for shutdown coordination.
pub struct ControlChannels {
    pub shutdown_tx: watch::Sender<bool>,
    pub delivery_stop_tx: watch::Sender<bool>,
}

impl ControlChannels {
    /// Another shutdown receiver, for a task spawned later.
    #[cfg(test)]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Tell every task to stop. Receivers that are already gone are fine.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Stop the delivery worker after its final drain pass.
    pub fn stop_delivery(&self) {
        let _ = self.delivery_stop_tx.send(true);
    }
}

/// Bundle of all pipeline channels.
pub struct ChannelBundle {
    pub session: SessionChannels,
    pub pipeline: PipelineChannels,
    pub delivery: DeliveryChannels,
    pub control: ControlChannels,
}

impl ChannelBundle {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (delivery_stop_tx, stop_rx) = watch::channel(false);

        Self {
            session: SessionChannels {
                events_tx,
                shutdown_rx: shutdown_rx.clone(),
            },
            pipeline: PipelineChannels {
                events_rx,
                shutdown_rx,
            },
            delivery: DeliveryChannels { stop_rx },
            control: ControlChannels {
                shutdown_tx,
                delivery_stop_tx,
            },
        }
    }
}

impl Default for ChannelBundle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_reaches_every_receiver() {
        let bundle = ChannelBundle::new();
        let mut session_rx = bundle.session.shutdown_rx.clone();
        let mut late_rx = bundle.control.subscribe();

        bundle.control.shutdown();
        session_rx.changed().await.unwrap();
        late_rx.changed().await.unwrap();
        assert!(*session_rx.borrow());
        assert!(*bundle.pipeline.shutdown_rx.borrow());
        assert!(!*bundle.delivery.stop_rx.borrow());

        bundle.control.stop_delivery();
        assert!(*bundle.delivery.stop_rx.borrow());
    }
}
