//! Numeric and duration text parsing.

use std::time::Duration;

use crate::common::error::ParseError;

/// Parse a count such as `1,234`.
pub fn parse_count(text: &str) -> Result<u32, ParseError> {
    let digits: String = text.chars().filter(|c| *c != ',').collect();
    digits.parse().map_err(|_| ParseError::MalformedCount {
        text: text.to_string(),
    })
}

/// Parse a large count such as `13,034,431`.
pub fn parse_large_count(text: &str) -> Result<u64, ParseError> {
    let digits: String = text.chars().filter(|c| *c != ',').collect();
    digits.parse().map_err(|_| ParseError::MalformedCount {
        text: text.to_string(),
    })
}

/// Parse a game duration: `m:ss`, `h:mm:ss`, optionally followed by `.f` fractional seconds.
pub fn parse_game_duration(text: &str) -> Result<Duration, ParseError> {
    let malformed = || ParseError::MalformedDuration {
        text: text.to_string(),
    };

    let (clock, fraction) = match text.split_once('.') {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (text, None),
    };

    let parts: Vec<&str> = clock.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(malformed());
    }

    let mut seconds: u64 = 0;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return Err(malformed());
        }
        let value: u64 = part.parse().map_err(|_| malformed())?;
        // Every field after the leading one is a base-60 digit pair.
        if i > 0 && (value >= 60 || part.len() != 2) {
            return Err(malformed());
        }
        seconds = seconds.checked_mul(60).and_then(|s| s.checked_add(value)).ok_or_else(malformed)?;
    }

    let millis = match fraction {
        None => 0,
        Some(f) if !f.is_empty() && f.len() <= 3 && f.chars().all(|c| c.is_ascii_digit()) => {
            let padded = format!("{:0<3}", f);
            padded.parse::<u64>().map_err(|_| malformed())?
        }
        Some(_) => return Err(malformed()),
    };

    Ok(Duration::from_secs(seconds) + Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("5"), Ok(5));
        assert_eq!(parse_count("1,234"), Ok(1234));
        assert!(parse_count("99999999999").is_err());
        assert!(parse_count("").is_err());
    }

    #[test]
    fn test_parse_large_count() {
        assert_eq!(parse_large_count("13,034,431"), Ok(13_034_431));
    }

    #[test]
    fn test_parse_minutes_seconds() {
        assert_eq!(parse_game_duration("1:23"), Ok(Duration::from_secs(83)));
        assert_eq!(parse_game_duration("0:59"), Ok(Duration::from_secs(59)));
    }

    #[test]
    fn test_parse_hours() {
        assert_eq!(parse_game_duration("1:02:03"), Ok(Duration::from_secs(3723)));
    }

    #[test]
    fn test_parse_fraction() {
        assert_eq!(parse_game_duration("26:12.60"), Ok(Duration::from_millis(1_572_600)));
        assert_eq!(parse_game_duration("0:55.4"), Ok(Duration::from_millis(55_400)));
    }

    #[test]
    fn test_malformed_durations() {
        for text in ["", "83", "1:7", "1:60", "a:bc", "1:23.", "1:23.4567", "1:2:3:4"] {
            assert!(
                matches!(parse_game_duration(text), Err(ParseError::MalformedDuration { .. })),
                "'{}' should be rejected",
                text
            );
        }
    }
}
