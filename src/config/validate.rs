//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use std::collections::HashSet;

use fancy_regex::Regex;

use crate::common::error::ConfigError;
use crate::common::types::EventCategory;
use crate::config::types::Config;

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.player.trim().is_empty() {
        errors.push("player is required".to_string());
    }

    // Endpoint
    let url = config.endpoint.url.trim();
    if url.is_empty() {
        errors.push("endpoint.url is required".to_string());
    } else if !url.starts_with("http://") && !url.starts_with("https://") {
        errors.push(format!("endpoint.url '{}' must start with http:// or https://", url));
    }
    if config.endpoint.timeout_secs == 0 {
        errors.push("endpoint.timeout_secs must be non-zero".to_string());
    }

    // Delivery
    let delivery = &config.delivery;
    if delivery.max_queue_size == 0 {
        errors.push("delivery.max_queue_size must be non-zero".to_string());
    }
    if delivery.base_delay_ms == 0 {
        errors.push("delivery.base_delay_ms must be non-zero".to_string());
    }
    if delivery.base_delay_ms > delivery.max_delay_ms {
        errors.push(format!(
            "delivery.base_delay_ms ({}) exceeds delivery.max_delay_ms ({})",
            delivery.base_delay_ms, delivery.max_delay_ms
        ));
    }
    if delivery.failure_threshold == 0 {
        errors.push("delivery.failure_threshold must be non-zero".to_string());
    }
    if delivery.max_age_hours == 0 {
        errors.push("delivery.max_age_hours must be non-zero".to_string());
    }

    // Correlation
    if config.correlation.flush_window_secs == 0 {
        errors.push("correlation.flush_window_secs must be non-zero".to_string());
    }
    if config.correlation.tick_interval_ms == 0 {
        errors.push("correlation.tick_interval_ms must be non-zero".to_string());
    }

    if config.cache.capacity == 0 {
        errors.push("cache.capacity must be non-zero".to_string());
    }

    // Templates must name known categories
    for key in config.templates.keys() {
        if EventCategory::from_name(key).is_none() {
            errors.push(format!("templates.{} is not a known event category", key));
        }
    }

    // Items must be keyed by numeric id
    for key in config.items.keys() {
        if key.parse::<u32>().is_err() {
            errors.push(format!("items.\"{}\" must be a numeric item id", key));
        }
    }

    // Destinations
    let mut seen_ids = HashSet::new();
    for (i, destination) in config.destinations.iter().enumerate() {
        if destination.id.trim().is_empty() {
            errors.push(format!("destinations[{}].id is required", i));
        } else if !seen_ids.insert(destination.id.as_str()) {
            errors.push(format!(
                "destinations[{}].id '{}' is duplicated",
                i, destination.id
            ));
        }

        let categories = destination
            .categories
            .iter()
            .map(|c| ("categories", c))
            .chain(
                destination
                    .screenshot_categories
                    .iter()
                    .map(|c| ("screenshot_categories", c)),
            );
        for (field, category) in categories {
            if EventCategory::from_name(category).is_none() {
                errors.push(format!(
                    "destinations[{}].{} has unknown category '{}'",
                    i, field, category
                ));
            }
        }

        if let Some(ref patterns) = destination.ignore {
            for (j, pattern) in patterns.iter().enumerate() {
                if Regex::new(pattern).is_err() {
                    errors.push(format!(
                        "destinations[{}].ignore[{}] is not a valid regex: '{}'",
                        i, j, pattern
                    ));
                }
            }
        }
    }

    if config.destinations.is_empty() {
        errors.push("destinations is empty - no event would ever be delivered".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}
