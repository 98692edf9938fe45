//! Pending correlation state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::common::types::{KillDetails, PartialSignal, SignalValue};

/// Handle to a scheduled deferred flush.
#[derive(Debug)]
pub struct FlushHandle(JoinHandle<()>);

impl FlushHandle {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self(handle)
    }

    /// Cancel the flush. A no-op when it already ran.
    pub fn cancel(&self) {
        self.0.abort();
    }
}

/// Slots that can be filled without knowing which subject they belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slots {
    pub count: Option<u32>,
    pub duration: Option<Duration>,
    pub best: Option<Duration>,
    pub new_record: bool,
    pub team_size: Option<u32>,
}

impl Slots {
    /// Merge a signal into the slots, last non-empty value wins.
    pub fn merge(&mut self, signal: &PartialSignal) {
        match &signal.value {
            SignalValue::Count(count) => self.count = Some(*count),
            SignalValue::Duration { time, best } => {
                self.duration = Some(*time);
                if best.is_some() {
                    self.best = *best;
                }
            }
            SignalValue::TeamSize(size) => self.team_size = Some(*size),
            SignalValue::Name(_) => {}
        }
        self.new_record |= signal.new_record;
    }

    /// Fill every empty slot from `other`.
    pub fn absorb(&mut self, other: &Slots) {
        self.count = self.count.or(other.count);
        self.duration = self.duration.or(other.duration);
        self.best = self.best.or(other.best);
        self.team_size = self.team_size.or(other.team_size);
        self.new_record |= other.new_record;
    }
}

/// Signals without a subject that arrived while nothing was pending.
#[derive(Debug, Clone)]
pub struct Orphan {
    pub slots: Slots,
    pub received_at: Instant,
}

/// Accumulator for one subject between its first signal and emission.
#[derive(Debug)]
pub struct PendingCorrelation {
    /// Correlation key, shared by every difficulty of a raid.
    pub key: String,
    /// Name as seen in chat; may be the shared name of a raid group.
    pub chat_name: String,
    /// Name known to identify the exact subject.
    pub resolved_name: Option<String>,
    pub slots: Slots,
    pub created_at: Instant,
    /// Ticks elapsed since the last merged signal.
    pub quiet_ticks: u64,
    emitted: Arc<AtomicBool>,
    flush: Option<FlushHandle>,
}

impl PendingCorrelation {
    pub fn new(key: impl Into<String>, chat_name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            chat_name: chat_name.into(),
            resolved_name: None,
            slots: Slots::default(),
            created_at: Instant::now(),
            quiet_ticks: 0,
            emitted: Arc::new(AtomicBool::new(false)),
            flush: None,
        }
    }

    pub fn merge(&mut self, signal: &PartialSignal) {
        if let Some(subject) = &signal.subject {
            if signal.ambiguous {
                self.chat_name = subject.clone();
            } else {
                self.resolved_name = Some(subject.clone());
            }
        }
        self.slots.merge(signal);
        self.quiet_ticks = 0;
    }

    /// Subject plus a count or a duration.
    pub fn has_required_slots(&self) -> bool {
        self.slots.count.is_some() || self.slots.duration.is_some()
    }

    /// True while the subject may still be one of several raid difficulties.
    pub fn awaiting_resolution(&self) -> bool {
        self.resolved_name.is_none() && crate::parser::names::is_ambiguous(&self.chat_name)
    }

    /// Best known name for the subject.
    pub fn subject(&self) -> &str {
        self.resolved_name.as_deref().unwrap_or(&self.chat_name)
    }

    pub fn set_flush(&mut self, handle: FlushHandle) {
        self.flush = Some(handle);
    }

    pub fn cancel_flush(&mut self) {
        if let Some(handle) = self.flush.take() {
            handle.cancel();
        }
    }

    /// Guard shared with the deferred flush task.
    pub fn emission_guard(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.emitted)
    }

    pub fn is_guarded_by(&self, guard: &Arc<AtomicBool>) -> bool {
        Arc::ptr_eq(&self.emitted, guard)
    }

    /// Claim the right to emit. Succeeds exactly once per correlation.
    pub fn try_claim(&self) -> bool {
        self.emitted
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn details(&self, count: Option<u32>) -> KillDetails {
        KillDetails {
            subject: self.subject().to_string(),
            count,
            duration: self.slots.duration,
            best: self.slots.best,
            personal_best: self.slots.new_record,
            team_size: self.slots.team_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(subject: Option<&str>, value: SignalValue, ambiguous: bool) -> PartialSignal {
        PartialSignal {
            subject: subject.map(str::to_string),
            value,
            ambiguous,
            new_record: false,
            raw: String::new(),
        }
    }

    #[test]
    fn test_later_signal_never_clears_filled_slot() {
        let mut slots = Slots::default();
        slots.merge(&signal(
            None,
            SignalValue::Duration {
                time: Duration::from_secs(80),
                best: Some(Duration::from_secs(70)),
            },
            false,
        ));
        slots.merge(&signal(
            None,
            SignalValue::Duration {
                time: Duration::from_secs(75),
                best: None,
            },
            false,
        ));
        assert_eq!(slots.duration, Some(Duration::from_secs(75)));
        assert_eq!(slots.best, Some(Duration::from_secs(70)));
    }

    #[test]
    fn test_absorb_keeps_existing_values() {
        let mut slots = Slots {
            count: Some(3),
            ..Slots::default()
        };
        slots.absorb(&Slots {
            count: Some(9),
            duration: Some(Duration::from_secs(60)),
            new_record: true,
            ..Slots::default()
        });
        assert_eq!(slots.count, Some(3));
        assert_eq!(slots.duration, Some(Duration::from_secs(60)));
        assert!(slots.new_record);
    }

    #[tokio::test]
    async fn test_ambiguous_name_does_not_resolve() {
        let mut pending = PendingCorrelation::new("Tombs of Amascut", "Tombs of Amascut");
        pending.merge(&signal(Some("Tombs of Amascut"), SignalValue::Count(10), true));
        assert!(pending.awaiting_resolution());
        assert_eq!(pending.subject(), "Tombs of Amascut");

        pending.merge(&signal(
            Some("Tombs of Amascut Expert Mode"),
            SignalValue::TeamSize(3),
            false,
        ));
        assert!(!pending.awaiting_resolution());
        assert_eq!(pending.subject(), "Tombs of Amascut Expert Mode");
    }

    #[tokio::test]
    async fn test_claim_succeeds_once() {
        let pending = PendingCorrelation::new("Zulrah", "Zulrah");
        let guard = pending.emission_guard();
        assert!(pending.is_guarded_by(&guard));
        assert!(pending.try_claim());
        assert!(!pending.try_claim());
    }
}
