//! Signal Parser.
//!
//! Turns one line of game text into zero or more [`PartialSignal`]s. Parsing
//! holds no state between lines; malformed numbers are logged and the signal
//! is dropped so nothing downstream ever sees a parse failure.

pub mod duration;
pub mod names;
pub mod patterns;

use fancy_regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::common::types::{NamedSignal, PartialSignal, SignalValue};
use duration::{parse_count, parse_game_duration, parse_large_count};
use patterns::{DurationPattern, DurationSubject, NamedKind, NamedPattern};

pub use names::canonical_name;

/// Compiled regex families for game chat.
#[derive(Debug, Clone)]
pub struct SignalParser {
    primary_count: Vec<Regex>,
    secondary_count: Vec<Regex>,
    durations: Vec<DurationPattern>,
    personal_best: Regex,
    team_size: Vec<Regex>,
    named: Vec<NamedPattern>,
    markup: Regex,
}

impl Default for SignalParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalParser {
    pub fn new() -> Self {
        Self {
            primary_count: patterns::primary_count_patterns(),
            secondary_count: patterns::secondary_count_patterns(),
            durations: patterns::duration_patterns(),
            personal_best: patterns::personal_best_pattern(),
            team_size: patterns::team_size_patterns(),
            named: patterns::named_patterns(),
            markup: patterns::markup_pattern(),
        }
    }

    /// Extract every signal a line carries.
    ///
    /// A raid completion line can carry a duration and a team size at once; the
    /// team size then inherits the duration's subject.
    pub fn parse_line(&self, line: &str) -> Vec<PartialSignal> {
        let text = self.strip_markup(line);
        if text.is_empty() {
            return Vec::new();
        }

        let mut signals = Vec::new();

        if let Some(signal) = self.match_count(&text) {
            signals.push(signal);
        }

        let duration = self.match_duration(&text);
        let duration_subject = duration.as_ref().and_then(|s| s.subject.clone());
        let duration_ambiguous = duration.as_ref().is_some_and(|s| s.ambiguous);
        if let Some(signal) = duration {
            signals.push(signal);
        }

        if let Some(size) = self.match_team_size(&text) {
            signals.push(PartialSignal {
                subject: duration_subject,
                value: SignalValue::TeamSize(size),
                ambiguous: duration_ambiguous,
                new_record: false,
                raw: text.clone(),
            });
        }

        if let Some(signal) = self.match_named(&text) {
            signals.push(signal);
        }

        signals
    }

    /// Remove colour/image tags and collapse whitespace.
    fn strip_markup(&self, line: &str) -> String {
        let stripped = self.markup.replace_all(line, " ");
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn match_count(&self, text: &str) -> Option<PartialSignal> {
        let caps = first_match(&self.primary_count, text)
            .or_else(|| first_match(&self.secondary_count, text))?;

        let name = canonical_name(caps.name("name")?.as_str());
        let count = match parse_count(caps.name("count")?.as_str()) {
            Ok(count) => count,
            Err(e) => {
                debug!(subject = %name, "Dropping count signal: {}", e);
                return None;
            }
        };

        Some(PartialSignal {
            ambiguous: names::is_ambiguous(&name),
            subject: Some(name),
            value: SignalValue::Count(count),
            new_record: false,
            raw: text.to_string(),
        })
    }

    fn match_duration(&self, text: &str) -> Option<PartialSignal> {
        let (pattern, caps) = self.durations.iter().find_map(|p| {
            captures(&p.regex, text).map(|caps| (p, caps))
        })?;

        let subject = match pattern.subject {
            DurationSubject::Captured => caps.name("name").map(|m| canonical_name(m.as_str())),
            DurationSubject::Fixed(name) => Some(name.to_string()),
            DurationSubject::Unnamed => None,
        };

        let time_text = caps.name("time")?.as_str();
        let time = match parse_game_duration(time_text) {
            Ok(time) => time,
            Err(e) => {
                debug!(subject = ?subject, "Dropping duration signal: {}", e);
                return None;
            }
        };

        let new_record = text.to_lowercase().contains("new personal best");
        let best = if new_record {
            Some(time)
        } else {
            captures(&self.personal_best, text)
                .and_then(|c| c.name("best").map(|m| m.as_str().to_string()))
                .and_then(|best| match parse_game_duration(&best) {
                    Ok(best) => Some(best),
                    Err(e) => {
                        debug!("Ignoring personal best: {}", e);
                        None
                    }
                })
        };

        Some(PartialSignal {
            ambiguous: subject.as_deref().is_some_and(names::is_ambiguous),
            subject,
            value: SignalValue::Duration { time, best },
            new_record,
            raw: text.to_string(),
        })
    }

    fn match_team_size(&self, text: &str) -> Option<u32> {
        let caps = first_match(&self.team_size, text)?;
        let size = caps.name("size")?.as_str();
        if size.eq_ignore_ascii_case("solo") {
            return Some(1);
        }
        match parse_count(size) {
            Ok(size) => Some(size),
            Err(e) => {
                debug!("Dropping team size signal: {}", e);
                None
            }
        }
    }

    fn match_named(&self, text: &str) -> Option<PartialSignal> {
        let (pattern, caps) = self
            .named
            .iter()
            .find_map(|p| captures(&p.regex, text).map(|caps| (p, caps)))?;

        let name = caps.name("name").map(|m| m.as_str().trim().to_string());
        let signal = match pattern.kind {
            NamedKind::CollectionLog => NamedSignal::CollectionLog,
            NamedKind::Quest => NamedSignal::Quest,
            NamedKind::Pet => NamedSignal::Pet,
            NamedKind::CombatTask => NamedSignal::CombatTask {
                tier: caps.name("tier").map(|m| m.as_str().to_string()).unwrap_or_default(),
            },
            NamedKind::LevelUp => {
                let text_level = caps.name("level")?.as_str();
                match parse_count(text_level) {
                    Ok(level) => NamedSignal::LevelUp { level },
                    Err(e) => {
                        debug!("Dropping level signal: {}", e);
                        return None;
                    }
                }
            }
            NamedKind::XpMilestone => match parse_large_count(caps.name("xp")?.as_str()) {
                Ok(xp) => NamedSignal::XpMilestone { xp },
                Err(e) => {
                    debug!("Dropping xp signal: {}", e);
                    return None;
                }
            },
        };

        Some(PartialSignal {
            subject: name,
            value: SignalValue::Name(signal),
            ambiguous: false,
            new_record: false,
            raw: text.to_string(),
        })
    }
}

/// Captures of the first pattern in `family` that matches.
fn first_match<'t>(family: &[Regex], text: &'t str) -> Option<Captures<'t>> {
    family.iter().find_map(|regex| captures(regex, text))
}

fn captures<'t>(regex: &Regex, text: &'t str) -> Option<Captures<'t>> {
    match regex.captures(text) {
        Ok(caps) => caps,
        Err(e) => {
            warn!("Regex evaluation error for pattern '{}': {}", regex.as_str(), e);
            None
        }
    }
}
