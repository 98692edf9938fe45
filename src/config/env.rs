//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `LOOTBRIDGE_PLAYER` - Player name attached to events
//! - `LOOTBRIDGE_ENDPOINT_URL` - Webhook endpoint URL
//! - `LOOTBRIDGE_FEED` - Path of the game feed
//! - `LOOTBRIDGE_SCREENSHOT_PATH` - File the host client writes captures to

use std::env;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "LOOTBRIDGE";

/// Apply environment variable overrides to a config.
///
/// Lets the endpoint URL (which usually embeds a secret) live outside the config file.
pub fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(player) = env::var(format!("{}_PLAYER", ENV_PREFIX)) {
        config.player = player;
    }

    if let Ok(url) = env::var(format!("{}_ENDPOINT_URL", ENV_PREFIX)) {
        config.endpoint.url = url;
    }

    if let Ok(feed) = env::var(format!("{}_FEED", ENV_PREFIX)) {
        config.feed = Some(feed);
    }

    if let Ok(path) = env::var(format!("{}_SCREENSHOT_PATH", ENV_PREFIX)) {
        config.screenshots.path = Some(path);
    }

    config
}

/// Get the config file path from environment or use default.
///
/// Checks `LOOTBRIDGE_CONFIG` environment variable, otherwise returns "lootbridge.conf".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "lootbridge.conf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parser::load_config_str;

    #[test]
    fn test_env_prefix() {
        assert_eq!(ENV_PREFIX, "LOOTBRIDGE");
    }

    #[test]
    fn test_get_config_path_default() {
        env::remove_var("LOOTBRIDGE_CONFIG");
        assert_eq!(get_config_path(), "lootbridge.conf");
    }

    #[test]
    fn test_apply_env_overrides() {
        env::remove_var("LOOTBRIDGE_PLAYER");
        env::remove_var("LOOTBRIDGE_FEED");
        env::set_var("LOOTBRIDGE_ENDPOINT_URL", "https://override.example/hook");

        let config = load_config_str(
            r#"
            player = "Zezima"
            endpoint { url = "https://example.com/hook" }
            "#,
        )
        .unwrap();
        let result = apply_env_overrides(config);
        env::remove_var("LOOTBRIDGE_ENDPOINT_URL");

        assert_eq!(result.player, "Zezima");
        assert_eq!(result.endpoint.url, "https://override.example/hook");
        assert!(result.feed.is_none());
    }
}
