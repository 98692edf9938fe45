//! Short-window duplicate suppression.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Multi-part team encounters whose identical messages legitimately repeat.
pub const REPEATABLE_SUBJECTS: &[&str] = &["Royal Titans", "Lunar Chests"];

/// Remembers (subject, discriminator) pairs seen within a window.
#[derive(Debug)]
pub struct DedupWindow {
    window: Duration,
    seen: HashMap<(String, String), Instant>,
}

impl DedupWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: HashMap::new(),
        }
    }

    /// Record the pair and report whether it was already seen inside the window.
    pub fn is_duplicate(&mut self, subject: &str, discriminator: &str) -> bool {
        let now = Instant::now();
        let window = self.window;
        self.seen.retain(|_, seen_at| now.duration_since(*seen_at) < window);

        if REPEATABLE_SUBJECTS.contains(&subject) {
            return false;
        }

        let key = (subject.to_string(), discriminator.to_string());
        if self.seen.contains_key(&key) {
            return true;
        }
        self.seen.insert(key, now);
        false
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.seen.len()
    }
}
