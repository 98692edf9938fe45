//! Game session loop.
//!
//! Plays the part of the host game loop: feed messages and ticks are handled
//! one at a time, in arrival order.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::common::error::Result;
use crate::common::messages::GameMessage;
use crate::correlator::EventCorrelator;
use crate::parser::{canonical_name, SignalParser};

use super::catalog::ItemCatalog;
use super::feed::FeedReader;

/// Why a session run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Shutdown,
    /// A finite feed reached its end.
    FeedEnded,
}

/// Drives the parser and correlator from the feed.
pub struct GameSession<C: ItemCatalog> {
    parser: SignalParser,
    correlator: EventCorrelator,
    catalog: C,
    tick_interval: Duration,
}

impl<C: ItemCatalog> GameSession<C> {
    pub fn new(correlator: EventCorrelator, catalog: C, tick_interval: Duration) -> Self {
        Self {
            parser: SignalParser::new(),
            correlator,
            catalog,
            tick_interval,
        }
    }

    /// Run until shutdown, the end of a finite feed, or a feed error.
    pub async fn run(
        &self,
        feed: &mut FeedReader,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Result<SessionEnd> {
        let mut ticks = tokio::time::interval(self.tick_interval);
        ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Session received shutdown signal");
                        return Ok(SessionEnd::Shutdown);
                    }
                }

                _ = ticks.tick() => {
                    self.correlator.on_tick();
                }

                message = feed.next_message() => {
                    match message? {
                        Some(message) => self.handle_message(message),
                        None => {
                            info!("Game feed ended");
                            return Ok(SessionEnd::FeedEnded);
                        }
                    }
                }
            }
        }
    }

    /// Handle one feed message.
    pub fn handle_message(&self, message: GameMessage) {
        match message {
            GameMessage::Chat { message } => {
                for signal in self.parser.parse_line(&message) {
                    debug!(kind = ?signal.kind(), subject = ?signal.subject, "Signal parsed");
                    self.correlator.on_signal(signal);
                }
            }
            GameMessage::Loot { source, items } => {
                let items = items
                    .into_iter()
                    .map(|(id, quantity)| self.catalog.describe(id, quantity))
                    .collect();
                self.correlator.on_loot(&source, items);
            }
            GameMessage::KillCount { source, count } => {
                self.correlator.on_external_count(&canonical_name(&source), count);
            }
        }
    }
}
