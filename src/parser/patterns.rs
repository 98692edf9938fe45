//! Regex families for game chat messages.
//!
//! Each family is an ordered list; the first pattern that matches a line wins,
//! so boss-specific phrasings are declared before generic fallbacks.

use fancy_regex::Regex;

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("chat patterns are literals covered by tests")
}

/// Duration phrasing: text shared by every duration message.
const TIME: &str = r"(?P<time>\d[\d:.]*\d)";

/// Where a duration pattern gets its subject from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationSubject {
    /// The `name` capture group.
    Captured,
    /// A fixed subject implied by the phrasing.
    Fixed(&'static str),
    /// The message does not name its subject.
    Unnamed,
}

/// A duration/personal-best phrasing.
#[derive(Debug, Clone)]
pub struct DurationPattern {
    pub regex: Regex,
    pub subject: DurationSubject,
}

/// Single-shot message families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedKind {
    CollectionLog,
    Quest,
    CombatTask,
    Pet,
    LevelUp,
    XpMilestone,
}

#[derive(Debug, Clone)]
pub struct NamedPattern {
    pub kind: NamedKind,
    pub regex: Regex,
}

/// "Your X kill count is: N" style. Captures `name` and `count`.
pub fn primary_count_patterns() -> Vec<Regex> {
    vec![pattern(r"^Your (?P<name>.+?) kill count is:? (?P<count>[\d,]+)")]
}

/// "Your completed/subdued X count is: N" style. Captures `name` and `count`.
pub fn secondary_count_patterns() -> Vec<Regex> {
    vec![
        pattern(r"^Your (?P<name>Barrows|Lunar) chest count is:? (?P<count>[\d,]+)"),
        pattern(r"^Your (?P<name>(?:Corrupted )?Gauntlet) completion count is:? (?P<count>[\d,]+)"),
        pattern(r"^Your (?:completed|subdued) (?P<name>.+?) count is:? (?P<count>[\d,]+)"),
        pattern(r"^Your (?P<name>.+?) (?:success|completion|harvest|rift closed) count is:? (?P<count>[\d,]+)"),
    ]
}

/// Duration and personal-best phrasings. Captures `time` and sometimes `name`.
pub fn duration_patterns() -> Vec<DurationPattern> {
    vec![
        DurationPattern {
            regex: pattern(&format!(
                r"Congratulations - your raid is complete!.*?Duration:\s*{}",
                TIME
            )),
            subject: DurationSubject::Fixed("Chambers of Xeric"),
        },
        DurationPattern {
            regex: pattern(&format!(
                r"(?P<name>Theatre of Blood(?:: (?:Hard|Entry) Mode)?) total completion time:\s*{}",
                TIME
            )),
            subject: DurationSubject::Captured,
        },
        DurationPattern {
            regex: pattern(&format!(
                r"(?P<name>Tombs of Amascut(?:: (?:Expert|Entry) Mode)?) total completion time:\s*{}",
                TIME
            )),
            subject: DurationSubject::Captured,
        },
        DurationPattern {
            regex: pattern(&format!(r"Colosseum duration:\s*{}", TIME)),
            subject: DurationSubject::Fixed("Sol Heredit"),
        },
        DurationPattern {
            regex: pattern(&format!(r"Corrupted challenge duration:\s*{}", TIME)),
            subject: DurationSubject::Fixed("Corrupted Hunllef"),
        },
        DurationPattern {
            regex: pattern(&format!(r"Challenge duration:\s*{}", TIME)),
            subject: DurationSubject::Fixed("Crystalline Hunllef"),
        },
        DurationPattern {
            regex: pattern(&format!(r"(?:Fight duration|Duration):\s*{}", TIME)),
            subject: DurationSubject::Unnamed,
        },
    ]
}

/// "Personal best: 1:23" tail of a duration message.
pub fn personal_best_pattern() -> Regex {
    pattern(r"Personal best:\s*(?P<best>\d[\d:.]*\d)")
}

/// Team size phrasings. Captures `size`.
pub fn team_size_patterns() -> Vec<Regex> {
    vec![
        pattern(r"Team size:\s*(?P<size>Solo|\d+)(?: players?)?"),
        pattern(r"Party size:\s*(?P<size>Solo|\d+)"),
    ]
}

/// Single-shot phrasings. Captures `name` plus `tier`, `level` or `xp` where relevant.
pub fn named_patterns() -> Vec<NamedPattern> {
    vec![
        NamedPattern {
            kind: NamedKind::CollectionLog,
            regex: pattern(r"^New item added to your collection log: (?P<name>.+?)\.?$"),
        },
        NamedPattern {
            kind: NamedKind::Quest,
            regex: pattern(r"^Congratulations, you've completed a quest: (?P<name>.+?)\.?$"),
        },
        NamedPattern {
            kind: NamedKind::CombatTask,
            regex: pattern(
                r"^Congratulations, you've completed an? (?P<tier>\w+) combat task: (?P<name>.+?)(?: \(\d+ points?\))?\.?$",
            ),
        },
        NamedPattern {
            kind: NamedKind::Pet,
            regex: pattern(
                r"^You (?:have a funny feeling like you|feel something weird sneaking into your backpack)",
            ),
        },
        NamedPattern {
            kind: NamedKind::LevelUp,
            regex: pattern(
                r"^Congratulations, you've just advanced your (?P<name>[A-Za-z]+) level\. You are now level (?P<level>\d+)",
            ),
        },
        NamedPattern {
            kind: NamedKind::XpMilestone,
            regex: pattern(r"^Congratulations, your (?P<name>[A-Za-z]+) XP has reached (?P<xp>[\d,]+)"),
        },
    ]
}

/// Colour, image and line-break tags embedded in chat text.
pub fn markup_pattern() -> Regex {
    pattern(r"<[^>]*>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(primary_count_patterns().len(), 1);
        assert_eq!(secondary_count_patterns().len(), 4);
        assert_eq!(duration_patterns().len(), 7);
        assert_eq!(team_size_patterns().len(), 2);
        assert_eq!(named_patterns().len(), 6);
        let _ = personal_best_pattern();
        let _ = markup_pattern();
    }

    #[test]
    fn test_specific_duration_declared_before_generic() {
        let patterns = duration_patterns();
        let line = "Corrupted challenge duration: 6:30. Personal best: 5:59.";
        let first = patterns
            .iter()
            .find(|p| p.regex.is_match(line).unwrap_or(false))
            .unwrap();
        assert_eq!(first.subject, DurationSubject::Fixed("Corrupted Hunllef"));
    }

    #[test]
    fn test_time_capture_excludes_trailing_period() {
        let patterns = duration_patterns();
        let generic = patterns.last().unwrap();
        let caps = generic.regex.captures("Fight duration: 1:23.").unwrap().unwrap();
        assert_eq!(&caps["time"], "1:23");
    }
}
