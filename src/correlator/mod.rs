//! Event Correlator.
//!
//! Joins the count, duration and team-size messages of one kill into a single
//! [`DomainEvent`]. Each subject moves Empty -> Pending -> Emitted:
//!
//! - the first signal creates a [`PendingCorrelation`] and schedules a deferred flush;
//! - later signals merge into its slots;
//! - it is emitted once it has a count or a duration and `settle_ticks` ticks pass
//!   quietly, when a loot callback for the subject arrives, or when the flush fires.
//!
//! The flush task and the session loop can race for the same correlation; the
//! compare-and-set in [`PendingCorrelation::try_claim`] lets exactly one of them emit.

pub mod dedup;
pub mod pending;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::cache::KillCountCache;
use crate::common::types::{
    DomainEvent, DroppedItem, EventKind, NamedSignal, PartialSignal, SignalValue,
};
use crate::config::CorrelationConfig;
use crate::parser::names::{group_key, interpretations};

use dedup::DedupWindow;
use pending::{FlushHandle, Orphan, PendingCorrelation};

struct CorrelationState {
    pending: HashMap<String, PendingCorrelation>,
    /// Subject-less signals waiting for a subject.
    orphan: Option<Orphan>,
    /// Key of the correlation that most recently received a named signal.
    last_key: Option<String>,
    dedup: DedupWindow,
}

struct Shared {
    player: String,
    config: CorrelationConfig,
    cache: Arc<KillCountCache>,
    events_tx: mpsc::UnboundedSender<DomainEvent>,
    next_id: AtomicU64,
    state: Mutex<CorrelationState>,
}

/// Correlates partial signals into domain events.
#[derive(Clone)]
pub struct EventCorrelator {
    shared: Arc<Shared>,
}

impl EventCorrelator {
    pub fn new(
        player: impl Into<String>,
        config: CorrelationConfig,
        cache: Arc<KillCountCache>,
        events_tx: mpsc::UnboundedSender<DomainEvent>,
    ) -> Self {
        let dedup = DedupWindow::new(config.dedup_window());
        Self {
            shared: Arc::new(Shared {
                player: player.into(),
                config,
                cache,
                events_tx,
                next_id: AtomicU64::new(1),
                state: Mutex::new(CorrelationState {
                    pending: HashMap::new(),
                    orphan: None,
                    last_key: None,
                    dedup,
                }),
            }),
        }
    }

    /// Feed one parsed signal.
    ///
    /// Must be called from within a tokio runtime; new correlations spawn their
    /// deferred flush.
    pub fn on_signal(&self, signal: PartialSignal) {
        if let SignalValue::Name(named) = &signal.value {
            self.on_named(named.clone(), signal.subject);
            return;
        }

        let Some(subject) = signal.subject.clone() else {
            self.on_unnamed(&signal);
            return;
        };

        let key = group_key(&subject);
        let mut state = self.shared.lock_state();

        if let SignalValue::Count(count) = signal.value {
            if state.dedup.is_duplicate(&subject, &count.to_string()) {
                debug!(subject = %subject, count, "Dropping duplicate kill count");
                return;
            }
        }

        let orphan = take_live_orphan(&mut state, self.shared.config.flush_window());
        let shared = &self.shared;
        let pending = state.pending.entry(key.clone()).or_insert_with(|| {
            debug!(subject = %subject, "Opening correlation");
            let mut pending = PendingCorrelation::new(key.clone(), subject.clone());
            pending.set_flush(shared.schedule_flush(&key, pending.emission_guard()));
            pending
        });

        pending.merge(&signal);
        if let Some(orphan) = orphan {
            debug!(subject = %subject, "Attaching earlier subject-less signal");
            pending.slots.absorb(&orphan.slots);
        }
        state.last_key = Some(key);
    }

    /// Loot callback for `source`.
    ///
    /// A pending correlation for the same subject is emitted immediately under the
    /// loot's name, then the drop itself is emitted when it carries items.
    pub fn on_loot(&self, source: &str, items: Vec<DroppedItem>) {
        let source = crate::parser::canonical_name(source);
        let key = group_key(&source);

        let pending = self.shared.lock_state().pending.remove(&key);
        if let Some(mut pending) = pending {
            pending.cancel_flush();
            if pending.awaiting_resolution() {
                pending.resolved_name = Some(source.clone());
            }
            self.shared.emit_kill(pending, "loot received");
        }

        if items.is_empty() {
            return;
        }

        let kill_count = self.shared.cache.get(&source);
        self.shared.emit(EventKind::Drop {
            source,
            items,
            kill_count,
        });
    }

    /// Externally observed kill count.
    pub fn on_external_count(&self, source: &str, count: u32) {
        let stored = self.shared.cache.merge_max(source, count);
        debug!(subject = %source, observed = count, stored, "Merged external kill count");
    }

    /// Game tick. Emits correlations that have settled.
    pub fn on_tick(&self) {
        let settle_ticks = self.shared.config.settle_ticks;
        let settled: Vec<PendingCorrelation> = {
            let mut state = self.shared.lock_state();
            let mut ready = Vec::new();
            for pending in state.pending.values_mut() {
                if pending.has_required_slots() && !pending.awaiting_resolution() {
                    pending.quiet_ticks += 1;
                }
            }
            let keys: Vec<String> = state
                .pending
                .values()
                .filter(|p| {
                    p.quiet_ticks >= settle_ticks
                        && p.has_required_slots()
                        && !p.awaiting_resolution()
                })
                .map(|p| p.key.clone())
                .collect();
            for key in keys {
                if let Some(pending) = state.pending.remove(&key) {
                    ready.push(pending);
                }
            }
            ready
        };

        for mut pending in settled {
            pending.cancel_flush();
            self.shared.emit_kill(pending, "settled");
        }
    }

    /// Emit every pending correlation with whatever it holds.
    pub fn flush_all(&self) {
        let drained: Vec<PendingCorrelation> = {
            let mut state = self.shared.lock_state();
            if state.orphan.take().is_some() {
                debug!("Discarding subject-less signals at shutdown");
            }
            state.pending.drain().map(|(_, p)| p).collect()
        };
        for mut pending in drained {
            pending.cancel_flush();
            self.shared.emit_kill(pending, "shutdown");
        }
    }

    /// Number of open correlations.
    pub fn pending_count(&self) -> usize {
        self.shared.lock_state().pending.len()
    }

    fn on_unnamed(&self, signal: &PartialSignal) {
        let window = self.shared.config.flush_window();
        let mut state = self.shared.lock_state();

        let last_key = state.last_key.clone();
        if let Some(pending) = last_key.and_then(|key| state.pending.get_mut(&key)) {
            debug!(subject = %pending.subject(), "Attaching subject-less signal");
            pending.merge(signal);
            return;
        }

        let mut orphan = take_live_orphan(&mut state, window).unwrap_or(Orphan {
            slots: Default::default(),
            received_at: Instant::now(),
        });
        orphan.slots.merge(signal);
        state.orphan = Some(orphan);
    }

    fn on_named(&self, named: NamedSignal, subject: Option<String>) {
        let discriminator = match &named {
            NamedSignal::Quest => "quest".to_string(),
            NamedSignal::CollectionLog => "collection_log".to_string(),
            NamedSignal::Pet => "pet".to_string(),
            NamedSignal::CombatTask { tier } => format!("combat_task:{}", tier),
            NamedSignal::LevelUp { level } => format!("level:{}", level),
            NamedSignal::XpMilestone { xp } => format!("xp:{}", xp),
        };
        let dedup_subject = subject.clone().unwrap_or_default();
        if self
            .shared
            .lock_state()
            .dedup
            .is_duplicate(&dedup_subject, &discriminator)
        {
            debug!(subject = %dedup_subject, kind = %discriminator, "Dropping duplicate message");
            return;
        }

        let kind = match (named, subject) {
            (NamedSignal::Pet, name) => EventKind::Pet { name },
            (NamedSignal::Quest, Some(name)) => EventKind::Quest { name },
            (NamedSignal::CollectionLog, Some(item)) => EventKind::CollectionLog { item },
            (NamedSignal::CombatTask { tier }, Some(task)) => {
                EventKind::CombatAchievement { tier, task }
            }
            (NamedSignal::LevelUp { level }, Some(skill)) => EventKind::LevelUp { skill, level },
            (NamedSignal::XpMilestone { xp }, Some(skill)) => EventKind::XpMilestone { skill, xp },
            (named, None) => {
                debug!(?named, "Dropping message without a name");
                return;
            }
        };
        self.shared.emit(kind);
    }
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, CorrelationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule_flush(self: &Arc<Self>, key: &str, guard: Arc<AtomicBool>) -> FlushHandle {
        let shared = Arc::clone(self);
        let key = key.to_string();
        let window = self.config.flush_window();
        FlushHandle::new(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            shared.flush_expired(&key, &guard);
        }))
    }

    fn flush_expired(&self, key: &str, guard: &Arc<AtomicBool>) {
        let expired = {
            let mut state = self.lock_state();
            match state.pending.get(key) {
                Some(pending) if pending.is_guarded_by(guard) => state.pending.remove(key),
                _ => None,
            }
        };
        if let Some(pending) = expired {
            if pending.awaiting_resolution() {
                debug!(
                    subject = %pending.chat_name,
                    candidates = ?interpretations(&pending.chat_name),
                    "Raid difficulty unresolved at flush"
                );
            }
            self.emit_kill(pending, "flush window elapsed");
        }
    }

    fn emit_kill(&self, pending: PendingCorrelation, reason: &str) {
        if !pending.try_claim() {
            return;
        }

        let subject = pending.subject().to_string();
        let count = match pending.slots.count {
            Some(count) => Some(self.cache.merge_max(&subject, count)),
            None => self.cache.increment(&subject),
        };

        info!(
            subject = %subject,
            count = ?count,
            age_ms = pending.created_at.elapsed().as_millis() as u64,
            "Kill correlated ({})",
            reason
        );
        self.emit(EventKind::Kill(pending.details(count)));
    }

    fn emit(&self, kind: EventKind) {
        let event = DomainEvent {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            player: self.player.clone(),
            kind,
            occurred_at: Utc::now(),
        };
        debug!(id = event.id, category = %event.category(), "Emitting event");
        if self.events_tx.send(event).is_err() {
            error!("Event channel closed, dropping event");
        }
    }
}

fn take_live_orphan(
    state: &mut CorrelationState,
    window: std::time::Duration,
) -> Option<Orphan> {
    let orphan = state.orphan.take()?;
    if orphan.received_at.elapsed() < window {
        Some(orphan)
    } else {
        debug!("Discarding stale subject-less signals");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::common::types::{EventCategory, KillDetails};
    use crate::parser::SignalParser;

    struct Harness {
        correlator: EventCorrelator,
        cache: Arc<KillCountCache>,
        events_rx: mpsc::UnboundedReceiver<DomainEvent>,
        parser: SignalParser,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_config(CorrelationConfig::default())
        }

        fn with_config(config: CorrelationConfig) -> Self {
            let cache = Arc::new(KillCountCache::new(Duration::from_secs(3600), 64));
            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let correlator = EventCorrelator::new(
                "Zezima",
                config,
                Arc::clone(&cache),
                events_tx,
            );
            Self {
                correlator,
                cache,
                events_rx,
                parser: SignalParser::new(),
            }
        }

        fn chat(&self, line: &str) {
            for signal in self.parser.parse_line(line) {
                self.correlator.on_signal(signal);
            }
        }

        fn ticks(&self, n: u32) {
            for _ in 0..n {
                self.correlator.on_tick();
            }
        }

        fn drain(&mut self) -> Vec<DomainEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.events_rx.try_recv() {
                events.push(event);
            }
            events
        }
    }

    fn kill(event: &DomainEvent) -> &KillDetails {
        match &event.kind {
            EventKind::Kill(details) => details,
            other => panic!("expected a kill, got {:?}", other),
        }
    }

    const COUNT: &str = "Your Zulrah kill count is: 512.";
    const DURATION: &str = "Fight duration: 1:02.40. Personal best: 0:58.20";

    #[tokio::test(start_paused = true)]
    async fn test_count_then_duration_emits_once() {
        let mut h = Harness::new();
        h.chat(COUNT);
        h.ticks(1);
        h.chat(DURATION);
        h.ticks(1);
        assert!(h.drain().is_empty());
        h.ticks(1);

        let events = h.drain();
        assert_eq!(events.len(), 1);
        let details = kill(&events[0]);
        assert_eq!(details.subject, "Zulrah");
        assert_eq!(details.count, Some(512));
        assert_eq!(details.duration, Some(Duration::from_millis(62_400)));
        assert_eq!(details.best, Some(Duration::from_millis(58_200)));

        // The flush later finds nothing to emit.
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(h.drain().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_then_count_emits_once() {
        let mut h = Harness::new();
        h.chat(DURATION);
        h.chat(COUNT);
        h.ticks(2);

        let events = h.drain();
        assert_eq!(events.len(), 1);
        let details = kill(&events[0]);
        assert_eq!(details.count, Some(512));
        assert_eq!(details.duration, Some(Duration::from_millis(62_400)));
        assert_eq!(h.correlator.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_emits_partial_event() {
        let mut h = Harness::new();
        h.chat("Your Tombs of Amascut: Expert Mode kill count is: 40.");
        // No tick arrives, so only the flush can emit.
        tokio::time::sleep(Duration::from_secs(13)).await;

        let events = h.drain();
        assert_eq!(events.len(), 1);
        let details = kill(&events[0]);
        assert_eq!(details.subject, "Tombs of Amascut Expert Mode");
        assert_eq!(details.count, Some(40));
        assert_eq!(details.duration, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_count_inside_window_is_dropped() {
        let mut h = Harness::new();
        h.chat(COUNT);
        h.ticks(2);
        h.chat(COUNT);
        h.ticks(2);
        tokio::time::sleep(Duration::from_secs(13)).await;
        assert_eq!(h.drain().len(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        h.chat("Your Zulrah kill count is: 513.");
        h.ticks(2);
        assert_eq!(h.drain().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loot_short_circuits_and_resolves_raid_difficulty() {
        let mut h = Harness::new();
        h.chat("Your completed Theatre of Blood count is: 77.");
        h.chat("Theatre of Blood total completion time: 18:40.20 (new personal best)");
        // Ambiguous raids wait for the loot callback instead of settling.
        h.ticks(5);
        assert!(h.drain().is_empty());

        h.correlator.on_loot(
            "Theatre of Blood: Hard Mode",
            vec![DroppedItem {
                id: 22486,
                name: "Scythe of vitur (uncharged)".to_string(),
                quantity: 1,
                price: 900_000_000,
            }],
        );

        let events = h.drain();
        assert_eq!(events.len(), 2);
        let details = kill(&events[0]);
        assert_eq!(details.subject, "Theatre of Blood Hard Mode");
        assert_eq!(details.count, Some(77));
        assert!(details.personal_best);
        assert_eq!(events[1].category(), EventCategory::Drop);
        assert_eq!(
            events[1].kind,
            EventKind::Drop {
                source: "Theatre of Blood Hard Mode".to_string(),
                items: vec![DroppedItem {
                    id: 22486,
                    name: "Scythe of vitur (uncharged)".to_string(),
                    quantity: 1,
                    price: 900_000_000,
                }],
                kill_count: Some(77),
            }
        );

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(h.drain().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ambiguous_raid_waits_for_loot_without_settle_ticks() {
        let mut h = Harness::with_config(CorrelationConfig {
            settle_ticks: 0,
            ..CorrelationConfig::default()
        });
        h.chat("Your completed Theatre of Blood count is: 78.");
        h.ticks(3);
        assert!(h.drain().is_empty());
        assert_eq!(h.correlator.pending_count(), 1);

        h.correlator.on_loot("Theatre of Blood: Hard Mode", Vec::new());
        let events = h.drain();
        assert_eq!(kill(&events[0]).subject, "Theatre of Blood Hard Mode");
    }

    #[tokio::test(start_paused = true)]
    async fn test_ambiguous_raid_flushes_under_chat_name() {
        let mut h = Harness::new();
        h.chat("Congratulations - your raid is complete! Team size: 2 players Duration: 30:00");
        h.chat("Your completed Chambers of Xeric count is: 15.");
        tokio::time::sleep(Duration::from_secs(13)).await;

        let events = h.drain();
        assert_eq!(events.len(), 1);
        let details = kill(&events[0]);
        assert_eq!(details.subject, "Chambers of Xeric");
        assert_eq!(details.team_size, Some(2));
        assert_eq!(details.count, Some(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loot_without_pending_emits_drop_only() {
        let mut h = Harness::new();
        h.correlator.on_external_count("Vorkath", 1000);
        h.correlator.on_loot(
            "Vorkath",
            vec![DroppedItem {
                id: 11286,
                name: "Draconic visage".to_string(),
                quantity: 1,
                price: 3_000_000,
            }],
        );

        let events = h.drain();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0].kind,
            EventKind::Drop {
                kill_count: Some(1000),
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_kill_without_count_increments_cache() {
        let mut h = Harness::new();
        h.cache.merge_max("Sol Heredit", 9);
        h.chat("Colosseum duration: 24:11.40");
        h.ticks(2);

        let events = h.drain();
        assert_eq!(kill(&events[0]).count, Some(10));
        assert_eq!(h.cache.get("Sol Heredit"), Some(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_orphan_duration_joins_next_subject() {
        let mut h = Harness::new();
        h.chat("Fight duration: 2:00");
        h.chat("Your Vorkath kill count is: 300.");
        h.ticks(2);

        let events = h.drain();
        assert_eq!(events.len(), 1);
        let details = kill(&events[0]);
        assert_eq!(details.subject, "Vorkath");
        assert_eq!(details.duration, Some(Duration::from_secs(120)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_named_signals_emit_immediately_and_dedup() {
        let mut h = Harness::new();
        h.chat("Congratulations, you've completed a quest: Dragon Slayer II");
        h.chat("Congratulations, you've completed a quest: Dragon Slayer II");
        h.chat("You have a funny feeling like you're being followed.");

        let events = h.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].kind,
            EventKind::Quest {
                name: "Dragon Slayer II".to_string()
            }
        );
        assert_eq!(events[1].kind, EventKind::Pet { name: None });
        assert!(events[0].id < events[1].id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_all_emits_everything() {
        let mut h = Harness::new();
        h.chat(COUNT);
        h.chat("Your Vorkath kill count is: 300.");
        h.correlator.flush_all();
        assert_eq!(h.drain().len(), 2);
        assert_eq!(h.correlator.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_racing_flush_and_loot_emit_once() {
        let mut h = Harness::new();
        h.chat(COUNT);
        let correlator = h.correlator.clone();
        let racer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            correlator.on_loot("Zulrah", Vec::new());
        });
        tokio::time::sleep(Duration::from_secs(13)).await;
        racer.await.unwrap();

        assert_eq!(h.drain().len(), 1);
    }
}
