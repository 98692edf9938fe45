//! Shared domain types used across the pipeline.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of information a [`PartialSignal`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Count,
    Duration,
    TeamSize,
    Name,
}

/// Single-shot signals that complete an event on their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamedSignal {
    Quest,
    CollectionLog,
    Pet,
    CombatTask { tier: String },
    LevelUp { level: u32 },
    XpMilestone { xp: u64 },
}

/// Value extracted from a single game message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalValue {
    Count(u32),
    Duration {
        time: Duration,
        best: Option<Duration>,
    },
    TeamSize(u32),
    Name(NamedSignal),
}

/// One fragment of information extracted from a single message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialSignal {
    /// Canonical subject (boss, activity, quest, item, skill), when the message names one.
    pub subject: Option<String>,
    pub value: SignalValue,
    /// Subject is a raid name shared by several difficulties.
    pub ambiguous: bool,
    /// The message announced a new personal best.
    pub new_record: bool,
    /// Source text after colour tags were stripped.
    pub raw: String,
}

impl PartialSignal {
    pub fn kind(&self) -> SignalKind {
        match self.value {
            SignalValue::Count(_) => SignalKind::Count,
            SignalValue::Duration { .. } => SignalKind::Duration,
            SignalValue::TeamSize(_) => SignalKind::TeamSize,
            SignalValue::Name(_) => SignalKind::Name,
        }
    }
}

/// Event category, also used as the `type` field of the outbound payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Drop,
    NpcKill,
    CombatAchievement,
    CollectionLog,
    Pet,
    Quest,
    XpUpdate,
    LevelUp,
}

impl EventCategory {
    pub const ALL: [EventCategory; 8] = [
        Self::Drop,
        Self::NpcKill,
        Self::CombatAchievement,
        Self::CollectionLog,
        Self::Pet,
        Self::Quest,
        Self::XpUpdate,
        Self::LevelUp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::NpcKill => "npc_kill",
            Self::CombatAchievement => "combat_achievement",
            Self::CollectionLog => "collection_log",
            Self::Pet => "pet",
            Self::Quest => "quest",
            Self::XpUpdate => "xp_update",
            Self::LevelUp => "level_up",
        }
    }

    /// Parse a category from its wire name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A boss kill or activity completion assembled from several signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillDetails {
    pub subject: String,
    pub count: Option<u32>,
    pub duration: Option<Duration>,
    pub best: Option<Duration>,
    pub personal_best: bool,
    pub team_size: Option<u32>,
}

/// A single item stack from a loot callback, priced through the item catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedItem {
    pub id: u32,
    pub name: String,
    pub quantity: u32,
    /// Unit price.
    pub price: u64,
}

impl DroppedItem {
    pub fn total_value(&self) -> u64 {
        self.price.saturating_mul(u64::from(self.quantity))
    }
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Kill(KillDetails),
    Drop {
        source: String,
        items: Vec<DroppedItem>,
        kill_count: Option<u32>,
    },
    CollectionLog {
        item: String,
    },
    Pet {
        name: Option<String>,
    },
    Quest {
        name: String,
    },
    CombatAchievement {
        tier: String,
        task: String,
    },
    LevelUp {
        skill: String,
        level: u32,
    },
    XpMilestone {
        skill: String,
        xp: u64,
    },
}

/// The emitted, complete unit handed to the router exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEvent {
    /// Monotonically assigned idempotency token.
    pub id: u64,
    pub player: String,
    pub kind: EventKind,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent {
    pub fn category(&self) -> EventCategory {
        match &self.kind {
            EventKind::Kill(_) => EventCategory::NpcKill,
            EventKind::Drop { .. } => EventCategory::Drop,
            EventKind::CollectionLog { .. } => EventCategory::CollectionLog,
            EventKind::Pet { .. } => EventCategory::Pet,
            EventKind::Quest { .. } => EventCategory::Quest,
            EventKind::CombatAchievement { .. } => EventCategory::CombatAchievement,
            EventKind::LevelUp { .. } => EventCategory::LevelUp,
            EventKind::XpMilestone { .. } => EventCategory::XpUpdate,
        }
    }

    /// Main name the event is about.
    pub fn subject(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Kill(kill) => Some(&kill.subject),
            EventKind::Drop { source, .. } => Some(source),
            EventKind::CollectionLog { item } => Some(item),
            EventKind::Pet { name } => name.as_deref(),
            EventKind::Quest { name } => Some(name),
            EventKind::CombatAchievement { task, .. } => Some(task),
            EventKind::LevelUp { skill, .. } | EventKind::XpMilestone { skill, .. } => Some(skill),
        }
    }

    /// Summed value of a drop; zero for every other category.
    pub fn drop_value(&self) -> u64 {
        match &self.kind {
            EventKind::Drop { items, .. } => items
                .iter()
                .map(DroppedItem::total_value)
                .fold(0u64, |acc, v| acc.saturating_add(v)),
            _ => 0,
        }
    }
}

/// A routed event bound to one or more destinations.
#[derive(Debug, Clone)]
pub struct SubmissionIntent {
    pub event: Arc<DomainEvent>,
    pub destination_ids: Vec<String>,
    pub screenshot_required: bool,
}

/// Format a duration the way the game prints it (`m:ss` or `h:mm:ss`, with hundredths when present).
pub fn format_game_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    let centis = duration.subsec_millis() / 10;

    let mut out = if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    };
    if centis > 0 {
        out.push_str(&format!(".{:02}", centis));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EventKind) -> DomainEvent {
        DomainEvent {
            id: 1,
            player: "Zezima".to_string(),
            kind,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn test_category_wire_names() {
        for category in EventCategory::ALL {
            assert_eq!(EventCategory::from_name(category.as_str()), Some(category));
        }
        assert_eq!(EventCategory::from_name(" NPC_KILL "), Some(EventCategory::NpcKill));
        assert_eq!(EventCategory::from_name("loot"), None);
    }

    #[test]
    fn test_drop_value_sums_stacks() {
        let drop = event(EventKind::Drop {
            source: "Zulrah".to_string(),
            items: vec![
                DroppedItem {
                    id: 12934,
                    name: "Zulrah's scales".to_string(),
                    quantity: 500,
                    price: 150,
                },
                DroppedItem {
                    id: 12922,
                    name: "Tanzanite fang".to_string(),
                    quantity: 1,
                    price: 1_500_000,
                },
            ],
            kill_count: None,
        });
        assert_eq!(drop.drop_value(), 1_575_000);
        assert_eq!(drop.category(), EventCategory::Drop);
        assert_eq!(drop.subject(), Some("Zulrah"));
    }

    #[test]
    fn test_drop_value_saturates() {
        let stack = |id| DroppedItem {
            id,
            name: "Coins".to_string(),
            quantity: u32::MAX,
            price: u64::MAX / 2,
        };
        let drop = event(EventKind::Drop {
            source: "Zulrah".to_string(),
            items: vec![stack(995), stack(996)],
            kill_count: None,
        });
        assert_eq!(drop.drop_value(), u64::MAX);
    }

    #[test]
    fn test_format_game_duration() {
        assert_eq!(format_game_duration(Duration::from_secs(83)), "1:23");
        assert_eq!(format_game_duration(Duration::from_millis(83_400)), "1:23.40");
        assert_eq!(format_game_duration(Duration::from_secs(3723)), "1:02:03");
    }
}
