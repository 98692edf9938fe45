//! Inbound messages from the game feed.
//!
//! The host client writes one JSON object per line; plain text lines are
//! treated as chat messages.

use serde::Deserialize;

/// A message from the game feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameMessage {
    /// A line of game-produced chat text.
    Chat { message: String },
    /// A reward/loot event completed with (item id, quantity) pairs.
    Loot {
        source: String,
        #[serde(default)]
        items: Vec<(u32, u32)>,
    },
    /// A kill count observed by an external store.
    KillCount { source: String, count: u32 },
}

impl GameMessage {
    /// Decode a feed line. Non-JSON lines become chat messages; blank lines are skipped.
    pub fn decode(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if line.starts_with('{') {
            match serde_json::from_str(line) {
                Ok(message) => return Some(message),
                Err(e) => {
                    tracing::debug!("Feed line is not a known JSON message ({}), treating as chat", e);
                }
            }
        }
        Some(Self::Chat {
            message: line.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_chat_json() {
        let msg = GameMessage::decode(r#"{"type":"chat","message":"Your Zulrah kill count is: 5."}"#);
        assert_eq!(
            msg,
            Some(GameMessage::Chat {
                message: "Your Zulrah kill count is: 5.".to_string()
            })
        );
    }

    #[test]
    fn test_decode_loot() {
        let msg = GameMessage::decode(r#"{"type":"loot","source":"Vorkath","items":[[11286,1],[995,20000]]}"#);
        assert_eq!(
            msg,
            Some(GameMessage::Loot {
                source: "Vorkath".to_string(),
                items: vec![(11286, 1), (995, 20000)],
            })
        );
    }

    #[test]
    fn test_decode_kill_count() {
        let msg = GameMessage::decode(r#"{"type":"kill_count","source":"Zulrah","count":512}"#);
        assert_eq!(
            msg,
            Some(GameMessage::KillCount {
                source: "Zulrah".to_string(),
                count: 512
            })
        );
    }

    #[test]
    fn test_plain_line_is_chat() {
        assert_eq!(
            GameMessage::decode("  Fight duration: 1:23.  "),
            Some(GameMessage::Chat {
                message: "Fight duration: 1:23.".to_string()
            })
        );
        assert_eq!(GameMessage::decode("   "), None);
    }

    #[test]
    fn test_unknown_json_falls_back_to_chat() {
        let line = r#"{"type":"unknown"}"#;
        assert_eq!(
            GameMessage::decode(line),
            Some(GameMessage::Chat {
                message: line.to_string()
            })
        );
    }
}
