//! Outbound webhook payload.

use serde::Serialize;

use crate::common::types::{format_game_duration, EventKind, SubmissionIntent};
use crate::delivery::SCREENSHOT_FILE_NAME;

use super::formatter::format_number;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookPayload {
    pub content: String,
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Embed {
    pub title: String,
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl EmbedField {
    fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
            inline: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

impl WebhookPayload {
    /// Build the payload for a routed intent.
    ///
    /// The first field is always `type`; `with_image` points the embed at the
    /// attached screenshot part.
    pub fn build(intent: &SubmissionIntent, content: String, with_image: bool) -> Self {
        let event = &intent.event;
        let mut fields = vec![
            EmbedField::new("type", event.category().as_str()),
            EmbedField::new("player", event.player.clone()),
        ];

        match &event.kind {
            EventKind::Kill(kill) => {
                fields.push(EmbedField::new("boss", kill.subject.clone()));
                if let Some(count) = kill.count {
                    fields.push(EmbedField::new("count", count.to_string()));
                }
                if let Some(time) = kill.duration {
                    fields.push(EmbedField::new("time", format_game_duration(time)));
                }
                if let Some(best) = kill.best {
                    fields.push(EmbedField::new("best", format_game_duration(best)));
                }
                fields.push(EmbedField::new("personal_best", kill.personal_best.to_string()));
                if let Some(team) = kill.team_size {
                    fields.push(EmbedField::new("team_size", team.to_string()));
                }
            }
            EventKind::Drop {
                source,
                items,
                kill_count,
            } => {
                fields.push(EmbedField::new("source", source.clone()));
                for item in items {
                    fields.push(EmbedField {
                        name: "item".to_string(),
                        value: format!("{} x {} ({})", item.quantity, item.name, item.id),
                        inline: false,
                    });
                }
                fields.push(EmbedField::new("value", format_number(event.drop_value())));
                if let Some(count) = kill_count {
                    fields.push(EmbedField::new("count", count.to_string()));
                }
            }
            EventKind::CollectionLog { item } => {
                fields.push(EmbedField::new("item", item.clone()));
            }
            EventKind::Pet { name } => {
                fields.push(EmbedField::new(
                    "pet",
                    name.clone().unwrap_or_else(|| "unknown".to_string()),
                ));
            }
            EventKind::Quest { name } => {
                fields.push(EmbedField::new("quest", name.clone()));
            }
            EventKind::CombatAchievement { tier, task } => {
                fields.push(EmbedField::new("tier", tier.clone()));
                fields.push(EmbedField::new("task", task.clone()));
            }
            EventKind::LevelUp { skill, level } => {
                fields.push(EmbedField::new("skill", skill.clone()));
                fields.push(EmbedField::new("level", level.to_string()));
            }
            EventKind::XpMilestone { skill, xp } => {
                fields.push(EmbedField::new("skill", skill.clone()));
                fields.push(EmbedField::new("xp", xp.to_string()));
            }
        }

        fields.push(EmbedField::new("event_id", event.id.to_string()));
        fields.push(EmbedField::new("group_ids", intent.destination_ids.join(",")));
        fields.push(EmbedField::new("occurred_at", event.occurred_at.to_rfc3339()));

        Self {
            content,
            embeds: vec![Embed {
                title: title(&event.kind),
                fields,
                image: with_image.then(|| EmbedImage {
                    url: format!("attachment://{}", SCREENSHOT_FILE_NAME),
                }),
            }],
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn title(kind: &EventKind) -> String {
    match kind {
        EventKind::Kill(kill) if kill.personal_best => format!("New personal best: {}", kill.subject),
        EventKind::Kill(kill) => format!("Kill: {}", kill.subject),
        EventKind::Drop { source, .. } => format!("Loot from {}", source),
        EventKind::CollectionLog { item } => format!("Collection log: {}", item),
        EventKind::Pet { .. } => "Pet".to_string(),
        EventKind::Quest { name } => format!("Quest complete: {}", name),
        EventKind::CombatAchievement { tier, .. } => format!("Combat task ({})", tier),
        EventKind::LevelUp { skill, level } => format!("{} level {}", skill, level),
        EventKind::XpMilestone { skill, .. } => format!("{} XP milestone", skill),
    }
}
