//! Submission Router.
//!
//! Decides which destinations receive an event and whether it needs a
//! screenshot, then folds every accepted destination into one intent so a
//! single delivery covers the whole fan-out.

pub mod filter;
pub mod history;

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::{debug, info};

use crate::common::types::{DomainEvent, EventCategory, EventKind, SubmissionIntent};
use crate::config::{Config, DestinationConfig, ScreenshotConfig};

use filter::IgnoreFilter;
use history::{RouteHistory, RoutedRecord};

/// Why a destination did not receive an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    CategoryDisabled,
    BelowThreshold,
    Ignored,
    ScreenshotUnavailable,
}

struct Destination {
    config: DestinationConfig,
    filter: IgnoreFilter,
}

/// Routes events to destinations.
pub struct SubmissionRouter {
    destinations: Vec<Destination>,
    policy: ScreenshotConfig,
    history: Mutex<RouteHistory>,
}

impl SubmissionRouter {
    pub fn new(
        destinations: Vec<DestinationConfig>,
        policy: ScreenshotConfig,
        history_size: usize,
    ) -> Self {
        let destinations = destinations
            .into_iter()
            .map(|config| {
                let filter = IgnoreFilter::new(config.ignore.clone());
                if filter.has_patterns() {
                    debug!(destination = %config.id, "Ignore filter active");
                }
                Destination { config, filter }
            })
            .collect();
        Self {
            destinations,
            policy,
            history: Mutex::new(RouteHistory::new(history_size)),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.destinations.clone(),
            config.screenshots.clone(),
            config.history_size,
        )
    }

    /// One intent per destination that accepts the event.
    pub fn route_each(&self, event: &Arc<DomainEvent>) -> Vec<SubmissionIntent> {
        let global = self.policy_requires_screenshot(event);

        self.destinations
            .iter()
            .filter_map(|dest| match self.check(dest, event, global) {
                Ok(screenshot_required) => Some(SubmissionIntent {
                    event: Arc::clone(event),
                    destination_ids: vec![dest.config.id.clone()],
                    screenshot_required,
                }),
                Err(reason) => {
                    debug!(
                        destination = %dest.config.id,
                        event_id = event.id,
                        ?reason,
                        "Destination skipped"
                    );
                    None
                }
            })
            .collect()
    }

    /// Route an event and fold the accepted destinations into one intent.
    ///
    /// Returns `None` when no destination accepts the event. Every routed
    /// event is recorded in the history.
    pub fn route(&self, event: DomainEvent) -> Option<SubmissionIntent> {
        let event = Arc::new(event);
        let intent = fold(self.route_each(&event))?;

        info!(
            event_id = event.id,
            category = %event.category(),
            destinations = ?intent.destination_ids,
            screenshot = intent.screenshot_required,
            "Event routed"
        );

        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RoutedRecord {
                event_id: event.id,
                category: event.category(),
                subject: event.subject().map(str::to_string),
                destination_ids: intent.destination_ids.clone(),
                screenshot: intent.screenshot_required,
                routed_at: Utc::now(),
            });

        Some(intent)
    }

    /// Most recently routed events, oldest first.
    pub fn history(&self) -> Vec<RoutedRecord> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recent()
    }

    /// Decide one destination. `Ok` carries the screenshot flag.
    fn check(
        &self,
        dest: &Destination,
        event: &DomainEvent,
        global_screenshot: bool,
    ) -> Result<bool, SkipReason> {
        let category = event.category();
        if !dest.config.accepts(category) {
            return Err(SkipReason::CategoryDisabled);
        }
        if !meets_threshold(&dest.config, event) {
            return Err(SkipReason::BelowThreshold);
        }
        if dest.filter.should_ignore(event) {
            return Err(SkipReason::Ignored);
        }

        let screenshot = global_screenshot || dest.config.wants_screenshot(category);
        if dest.config.screenshots_only && !(screenshot && self.capture_enabled()) {
            return Err(SkipReason::ScreenshotUnavailable);
        }
        Ok(screenshot)
    }

    /// True when a screenshot source is configured.
    fn capture_enabled(&self) -> bool {
        self.policy.path.is_some()
    }

    fn policy_requires_screenshot(&self, event: &DomainEvent) -> bool {
        match &event.kind {
            EventKind::Drop { .. } => self
                .policy
                .min_drop_value
                .is_some_and(|min| event.drop_value() >= min),
            EventKind::Kill(kill) => self.policy.personal_best && kill.personal_best,
            EventKind::LevelUp { level, .. } => {
                self.policy.min_level.is_some_and(|min| *level >= min)
            }
            EventKind::Pet { .. } => self.policy.pets,
            EventKind::CollectionLog { .. } => self.policy.collection_log,
            _ => false,
        }
    }
}

fn meets_threshold(dest: &DestinationConfig, event: &DomainEvent) -> bool {
    match (&event.kind, event.category()) {
        (_, EventCategory::Drop) => event.drop_value() >= dest.min_drop_value,
        (EventKind::LevelUp { level, .. }, _) => *level >= dest.min_level,
        _ => true,
    }
}

/// Fold per-destination intents for the same event into one carrying the union of ids.
pub fn fold(intents: Vec<SubmissionIntent>) -> Option<SubmissionIntent> {
    let mut intents = intents.into_iter();
    let mut folded = intents.next()?;
    for intent in intents {
        for id in intent.destination_ids {
            if !folded.destination_ids.contains(&id) {
                folded.destination_ids.push(id);
            }
        }
        folded.screenshot_required |= intent.screenshot_required;
    }
    Some(folded)
}
