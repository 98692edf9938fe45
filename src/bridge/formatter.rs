//! Content templates for outbound notifications.
//!
//! Supports placeholders: %player, %subject, %count, %time, %best, %value,
//! %level, %items, %team

use std::collections::HashMap;

use crate::common::types::{format_game_duration, DomainEvent, EventCategory, EventKind};

/// Default template for each category.
pub fn default_template(category: EventCategory) -> &'static str {
    match category {
        EventCategory::Drop => "%player received %items from %subject (%value gp)",
        EventCategory::NpcKill => "%player has defeated %subject with a completion count of %count",
        EventCategory::CombatAchievement => "%player completed a %level combat task: %subject",
        EventCategory::CollectionLog => "%player added %subject to their collection log",
        EventCategory::Pet => "%player has a funny feeling like they're being followed: %subject",
        EventCategory::Quest => "%player has completed a quest: %subject",
        EventCategory::XpUpdate => "%player reached %value XP in %subject",
        EventCategory::LevelUp => "%player reached level %level in %subject",
    }
}

/// Formatter that substitutes placeholders in one template.
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    format: String,
}

impl MessageFormatter {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
        }
    }

    pub fn for_category(category: EventCategory) -> Self {
        Self::new(default_template(category))
    }

    /// Substitute every placeholder. Placeholders with no value for this
    /// event become empty.
    pub fn format(&self, ctx: &FormatContext) -> String {
        let text = self
            .format
            .replace("%player", &ctx.player)
            .replace("%subject", &ctx.subject)
            .replace("%count", &ctx.count)
            .replace("%time", &ctx.time)
            .replace("%best", &ctx.best)
            .replace("%value", &ctx.value)
            .replace("%level", &ctx.level)
            .replace("%items", &ctx.items)
            .replace("%team", &ctx.team);
        collapse_whitespace(&text)
    }
}

/// Placeholder values for one event.
#[derive(Debug, Clone, Default)]
pub struct FormatContext {
    pub player: String,
    pub subject: String,
    pub count: String,
    pub time: String,
    pub best: String,
    pub value: String,
    pub level: String,
    pub items: String,
    pub team: String,
}

impl FormatContext {
    pub fn new(player: impl Into<String>) -> Self {
        Self {
            player: player.into(),
            ..Default::default()
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_count(mut self, count: Option<u32>) -> Self {
        self.count = count.map(|c| c.to_string()).unwrap_or_default();
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Build the context for an emitted event.
    pub fn from_event(event: &DomainEvent) -> Self {
        let ctx = Self::new(event.player.clone()).with_subject(event.subject().unwrap_or_default());
        match &event.kind {
            EventKind::Kill(kill) => {
                let mut ctx = ctx.with_count(kill.count);
                ctx.time = kill.duration.map(format_game_duration).unwrap_or_default();
                ctx.best = kill.best.map(format_game_duration).unwrap_or_default();
                ctx.team = kill.team_size.map(team_label).unwrap_or_default();
                ctx
            }
            EventKind::Drop {
                items, kill_count, ..
            } => {
                let mut ctx = ctx
                    .with_count(*kill_count)
                    .with_value(format_number(event.drop_value()));
                ctx.items = items
                    .iter()
                    .map(|item| {
                        if item.quantity > 1 {
                            format!("{} x {}", format_number(u64::from(item.quantity)), item.name)
                        } else {
                            item.name.clone()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                ctx
            }
            EventKind::CombatAchievement { tier, .. } => ctx.with_level(tier.clone()),
            EventKind::LevelUp { level, .. } => ctx.with_level(level.to_string()),
            EventKind::XpMilestone { xp, .. } => ctx.with_value(format_number(*xp)),
            EventKind::Pet { name } if name.is_none() => ctx.with_subject("unknown pet"),
            EventKind::CollectionLog { .. } | EventKind::Pet { .. } | EventKind::Quest { .. } => ctx,
        }
    }
}

/// Per-category formatters, with configured templates taking precedence over defaults.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    formatters: HashMap<EventCategory, MessageFormatter>,
}

impl TemplateSet {
    /// Unknown category names are ignored; validation reports them.
    pub fn new(templates: &HashMap<String, String>) -> Self {
        let mut formatters: HashMap<EventCategory, MessageFormatter> = EventCategory::ALL
            .into_iter()
            .map(|c| (c, MessageFormatter::for_category(c)))
            .collect();
        for (name, template) in templates {
            if let Some(category) = EventCategory::from_name(name) {
                formatters.insert(category, MessageFormatter::new(template.clone()));
            }
        }
        Self { formatters }
    }

    /// Render the content line for an event.
    pub fn content(&self, event: &DomainEvent) -> String {
        let ctx = FormatContext::from_event(event);
        match self.formatters.get(&event.category()) {
            Some(formatter) => formatter.format(&ctx),
            None => MessageFormatter::for_category(event.category()).format(&ctx),
        }
    }
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self::new(&HashMap::new())
    }
}

/// `1575000` -> `1,575,000`.
pub fn format_number(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn team_label(size: u32) -> String {
    match size {
        1 => "Solo".to_string(),
        n => format!("{} players", n),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{DroppedItem, KillDetails};
    use chrono::Utc;
    use std::time::Duration;

    fn event(kind: EventKind) -> DomainEvent {
        DomainEvent {
            id: 1,
            player: "Zezima".to_string(),
            kind,
            occurred_at: Utc::now(),
        }
    }

    fn kill() -> DomainEvent {
        event(EventKind::Kill(KillDetails {
            subject: "Vorkath".to_string(),
            count: Some(412),
            duration: Some(Duration::from_millis(84_600)),
            best: Some(Duration::from_secs(75)),
            personal_best: false,
            team_size: Some(1),
        }))
    }

    #[test]
    fn test_default_kill_template() {
        let templates = TemplateSet::default();
        assert_eq!(
            templates.content(&kill()),
            "Zezima has defeated Vorkath with a completion count of 412"
        );
    }

    #[test]
    fn test_custom_template_overrides_default() {
        let mut config = HashMap::new();
        config.insert(
            "npc_kill".to_string(),
            "%player: %subject #%count in %time (best %best, %team)".to_string(),
        );
        config.insert("not_a_category".to_string(), "%player".to_string());
        let templates = TemplateSet::new(&config);
        assert_eq!(
            templates.content(&kill()),
            "Zezima: Vorkath #412 in 1:24.60 (best 1:15, Solo)"
        );
    }

    #[test]
    fn test_drop_items_and_value() {
        let drop = event(EventKind::Drop {
            source: "Zulrah".to_string(),
            items: vec![
                DroppedItem {
                    id: 12922,
                    name: "Tanzanite fang".to_string(),
                    quantity: 1,
                    price: 1_500_000,
                },
                DroppedItem {
                    id: 12934,
                    name: "Zulrah's scales".to_string(),
                    quantity: 500,
                    price: 150,
                },
            ],
            kill_count: Some(88),
        });
        assert_eq!(
            TemplateSet::default().content(&drop),
            "Zezima received Tanzanite fang, 500 x Zulrah's scales from Zulrah (1,575,000 gp)"
        );
    }

    #[test]
    fn test_missing_values_collapse() {
        let formatter = MessageFormatter::new("%player killed %subject %count");
        let ctx = FormatContext::new("Zezima").with_subject("Scorpia").with_count(None);
        assert_eq!(formatter.format(&ctx), "Zezima killed Scorpia");
    }

    #[test]
    fn test_level_and_xp() {
        let level = event(EventKind::LevelUp {
            skill: "Slayer".to_string(),
            level: 99,
        });
        assert_eq!(
            TemplateSet::default().content(&level),
            "Zezima reached level 99 in Slayer"
        );
        let xp = event(EventKind::XpMilestone {
            skill: "Mining".to_string(),
            xp: 50_000_000,
        });
        assert_eq!(
            TemplateSet::default().content(&xp),
            "Zezima reached 50,000,000 XP in Mining"
        );
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_575_000), "1,575,000");
    }
}
