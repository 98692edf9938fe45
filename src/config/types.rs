//! Configuration type definitions.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::common::types::EventCategory;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Player identity attached to every event.
    pub player: String,
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub correlation: CorrelationConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub screenshots: ScreenshotConfig,
    #[serde(default)]
    pub destinations: Vec<DestinationConfig>,
    /// Content templates keyed by category wire name.
    #[serde(default)]
    pub templates: HashMap<String, String>,
    /// Item catalog keyed by item id.
    #[serde(default)]
    pub items: HashMap<String, ItemConfig>,
    /// Path of the game feed; stdin when absent.
    pub feed: Option<String>,
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

/// Webhook endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

/// Retry queue, backoff and circuit breaker settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    /// Hard ceiling on retries for any failure category.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Retry budget for timeouts and connection errors.
    #[serde(default = "default_network_max_attempts")]
    pub network_max_attempts: u32,
    /// Retry budget for 5xx responses.
    #[serde(default = "default_server_max_attempts")]
    pub server_max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Consecutive failures before the layer is marked unhealthy.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: u64,
    #[serde(default = "default_drain_interval_ms")]
    pub drain_interval_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
            max_attempts: default_max_attempts(),
            network_max_attempts: default_network_max_attempts(),
            server_max_attempts: default_server_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown_secs(),
            max_age_hours: default_max_age_hours(),
            drain_interval_ms: default_drain_interval_ms(),
        }
    }
}

impl DeliveryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_hours * 3600)
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }
}

/// Event correlation timing.
#[derive(Debug, Clone, Deserialize)]
pub struct CorrelationConfig {
    /// Deferred flush delay after the first signal for a subject.
    #[serde(default = "default_flush_window_secs")]
    pub flush_window_secs: u64,
    /// Quiet ticks required before a complete correlation is emitted.
    #[serde(default = "default_settle_ticks")]
    pub settle_ticks: u64,
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            flush_window_secs: default_flush_window_secs(),
            settle_ticks: default_settle_ticks(),
            dedup_window_secs: default_dedup_window_secs(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl CorrelationConfig {
    pub fn flush_window(&self) -> Duration {
        Duration::from_secs(self.flush_window_secs)
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.dedup_window_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Kill-count cache bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            capacity: default_cache_capacity(),
        }
    }
}

/// Global screenshot policy.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScreenshotConfig {
    /// File the host client writes its latest capture to.
    pub path: Option<String>,
    #[serde(default)]
    pub personal_best: bool,
    /// Drops at or above this value require a screenshot.
    pub min_drop_value: Option<u64>,
    /// Level-ups at or above this level require a screenshot.
    pub min_level: Option<u32>,
    #[serde(default)]
    pub pets: bool,
    #[serde(default)]
    pub collection_log: bool,
}

/// One submission destination (a group on the receiving service).
#[derive(Debug, Clone, Deserialize)]
pub struct DestinationConfig {
    pub id: String,
    /// Enabled categories by wire name; empty means all.
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub min_drop_value: u64,
    #[serde(default)]
    pub min_level: u32,
    /// Categories for which this destination always wants a screenshot.
    #[serde(default)]
    pub screenshot_categories: Vec<String>,
    /// Only accept events that come with a screenshot.
    #[serde(default)]
    pub screenshots_only: bool,
    /// Regex patterns for subjects and item names to ignore.
    pub ignore: Option<Vec<String>>,
}

impl DestinationConfig {
    /// Destination with every category enabled and no thresholds.
    #[cfg(test)]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            categories: Vec::new(),
            min_drop_value: 0,
            min_level: 0,
            screenshot_categories: Vec::new(),
            screenshots_only: false,
            ignore: None,
        }
    }

    pub fn accepts(&self, category: EventCategory) -> bool {
        self.categories.is_empty()
            || self
                .categories
                .iter()
                .any(|c| EventCategory::from_name(c) == Some(category))
    }

    pub fn wants_screenshot(&self, category: EventCategory) -> bool {
        self.screenshot_categories
            .iter()
            .any(|c| EventCategory::from_name(c) == Some(category))
    }
}

/// Item catalog entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemConfig {
    pub name: String,
    #[serde(default)]
    pub price: u64,
}

fn default_history_size() -> usize {
    50
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_queue_size() -> usize {
    100
}

fn default_max_attempts() -> u32 {
    10
}

fn default_network_max_attempts() -> u32 {
    8
}

fn default_server_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    300_000
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_max_age_hours() -> u64 {
    24
}

fn default_drain_interval_ms() -> u64 {
    1_000
}

fn default_flush_window_secs() -> u64 {
    12
}

fn default_settle_ticks() -> u64 {
    2
}

fn default_dedup_window_secs() -> u64 {
    5
}

fn default_tick_interval_ms() -> u64 {
    600
}

fn default_cache_ttl_secs() -> u64 {
    6 * 3600
}

fn default_cache_capacity() -> usize {
    256
}
