//! Subject name canonicalization.
//!
//! Chat messages, loot callbacks and external count stores all name the same
//! boss in different ways. Every subject goes through [`canonical_name`] so a
//! boss is never tracked under two keys.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Alias (lowercase) -> canonical subject name.
const SYNONYMS: &[(&str, &str)] = &[
    // Chambers of Xeric
    ("cox", "Chambers of Xeric"),
    ("chambers of xeric", "Chambers of Xeric"),
    ("raids 1", "Chambers of Xeric"),
    ("cox cm", "Chambers of Xeric Challenge Mode"),
    ("chambers of xeric challenge mode", "Chambers of Xeric Challenge Mode"),
    ("chambers of xeric: challenge mode", "Chambers of Xeric Challenge Mode"),
    ("chambers of xeric (challenge mode)", "Chambers of Xeric Challenge Mode"),
    // Theatre of Blood
    ("tob", "Theatre of Blood"),
    ("theatre of blood", "Theatre of Blood"),
    ("raids 2", "Theatre of Blood"),
    ("hmt", "Theatre of Blood Hard Mode"),
    ("tob hm", "Theatre of Blood Hard Mode"),
    ("theatre of blood hard mode", "Theatre of Blood Hard Mode"),
    ("theatre of blood: hard mode", "Theatre of Blood Hard Mode"),
    ("theatre of blood (hard mode)", "Theatre of Blood Hard Mode"),
    ("theatre of blood entry mode", "Theatre of Blood Entry Mode"),
    ("theatre of blood: entry mode", "Theatre of Blood Entry Mode"),
    ("theatre of blood (entry mode)", "Theatre of Blood Entry Mode"),
    ("theatre of blood: story mode", "Theatre of Blood Entry Mode"),
    // Tombs of Amascut
    ("toa", "Tombs of Amascut"),
    ("tombs of amascut", "Tombs of Amascut"),
    ("raids 3", "Tombs of Amascut"),
    ("toa expert", "Tombs of Amascut Expert Mode"),
    ("tombs of amascut expert mode", "Tombs of Amascut Expert Mode"),
    ("tombs of amascut: expert mode", "Tombs of Amascut Expert Mode"),
    ("toa entry", "Tombs of Amascut Entry Mode"),
    ("tombs of amascut entry mode", "Tombs of Amascut Entry Mode"),
    ("tombs of amascut: entry mode", "Tombs of Amascut Entry Mode"),
    // Gauntlet
    ("gauntlet", "Crystalline Hunllef"),
    ("the gauntlet", "Crystalline Hunllef"),
    ("crystalline hunllef", "Crystalline Hunllef"),
    ("corrupted gauntlet", "Corrupted Hunllef"),
    ("the corrupted gauntlet", "Corrupted Hunllef"),
    ("corrupted hunllef", "Corrupted Hunllef"),
    // Chests and minigames
    ("barrows", "Barrows Chests"),
    ("barrows chest", "Barrows Chests"),
    ("barrows chests", "Barrows Chests"),
    ("lunar", "Lunar Chests"),
    ("lunar chest", "Lunar Chests"),
    ("lunar chests", "Lunar Chests"),
    ("moons of peril", "Lunar Chests"),
    ("colosseum", "Sol Heredit"),
    ("fortis colosseum", "Sol Heredit"),
    ("sol heredit", "Sol Heredit"),
    ("gotr", "Guardians of the Rift"),
    ("guardians of the rift", "Guardians of the Rift"),
    ("rift", "Guardians of the Rift"),
    ("wintertodt", "Wintertodt"),
    ("tempoross", "Tempoross"),
    // Bosses with common abbreviations
    ("nightmare", "Nightmare"),
    ("the nightmare", "Nightmare"),
    ("phosani's nightmare", "Phosani's Nightmare"),
    ("pnm", "Phosani's Nightmare"),
    ("hueycoatl", "The Hueycoatl"),
    ("the hueycoatl", "The Hueycoatl"),
    ("royal titan", "Royal Titans"),
    ("royal titans", "Royal Titans"),
    ("the royal titans", "Royal Titans"),
    ("kq", "Kalphite Queen"),
    ("kalphite queen", "Kalphite Queen"),
    ("kbd", "King Black Dragon"),
    ("king black dragon", "King Black Dragon"),
    ("corp", "Corporeal Beast"),
    ("corporeal beast", "Corporeal Beast"),
    ("sire", "Abyssal Sire"),
    ("abyssal sire", "Abyssal Sire"),
    ("hydra", "Alchemical Hydra"),
    ("alchemical hydra", "Alchemical Hydra"),
    ("jad", "TzTok-Jad"),
    ("tztok-jad", "TzTok-Jad"),
    ("zuk", "TzKal-Zuk"),
    ("tzkal-zuk", "TzKal-Zuk"),
    ("muspah", "Phantom Muspah"),
    ("phantom muspah", "Phantom Muspah"),
    ("whisperer", "The Whisperer"),
    ("the whisperer", "The Whisperer"),
    ("leviathan", "The Leviathan"),
    ("the leviathan", "The Leviathan"),
    ("vorkath", "Vorkath"),
    ("zulrah", "Zulrah"),
    ("kree'arra", "Kree'arra"),
    ("amoxliatl", "Amoxliatl"),
    // Echo variants count towards the base boss
    ("amoxliatl (echo)", "Amoxliatl"),
    ("the hueycoatl (echo)", "The Hueycoatl"),
    ("kree'arra (echo)", "Kree'arra"),
    ("vorkath (echo)", "Vorkath"),
    ("zulrah (echo)", "Zulrah"),
    ("the nightmare (echo)", "Nightmare"),
    ("the leviathan (echo)", "The Leviathan"),
    ("sol heredit (echo)", "Sol Heredit"),
];

/// Raids whose completion messages do not reveal the difficulty.
///
/// The first entry of each group is the name the shared chat string resolves to.
const AMBIGUOUS_GROUPS: &[&[&str]] = &[
    &["Chambers of Xeric", "Chambers of Xeric Challenge Mode"],
    &[
        "Theatre of Blood",
        "Theatre of Blood Hard Mode",
        "Theatre of Blood Entry Mode",
    ],
    &[
        "Tombs of Amascut",
        "Tombs of Amascut Expert Mode",
        "Tombs of Amascut Entry Mode",
    ],
];

fn synonyms() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| SYNONYMS.iter().copied().collect())
}

/// Map a colloquial or variant subject name to its canonical form.
///
/// Names missing from the table are returned trimmed, with their original casing.
pub fn canonical_name(raw: &str) -> String {
    let trimmed = raw.trim();
    match synonyms().get(trimmed.to_lowercase().as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => trimmed.to_string(),
    }
}

/// Every interpretation a canonical subject may stand for.
///
/// Returns a single-element slice for unambiguous names.
pub fn interpretations(canonical: &str) -> Vec<&str> {
    match AMBIGUOUS_GROUPS.iter().find(|group| group.contains(&canonical)) {
        Some(group) => group.to_vec(),
        None => vec![canonical],
    }
}

/// Correlation key for a canonical subject: the shared name of its difficulty group.
pub fn group_key(canonical: &str) -> String {
    AMBIGUOUS_GROUPS
        .iter()
        .find(|group| group.contains(&canonical))
        .map(|group| group[0].to_string())
        .unwrap_or_else(|| canonical.to_string())
}

/// True when the name is the shared chat string of a raid difficulty group.
pub fn is_ambiguous(canonical: &str) -> bool {
    AMBIGUOUS_GROUPS.iter().any(|group| group[0] == canonical)
}
