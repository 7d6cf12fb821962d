use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level host configuration, read from `config.json` in the user data directory.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HostConfig {
    #[serde(default)]
    pub bus: EventBusConfig,
    /// Per-extension switches keyed by extension name
    #[serde(default)]
    pub extensions: HashMap<String, ExtensionConfig>,
}

impl HostConfig {
    /// Extensions without an entry are enabled.
    pub fn is_extension_enabled(&self, name: &str) -> bool {
        self.extensions
            .get(name)
            .map(|config| config.enabled)
            .unwrap_or(true)
    }
}

/// Dispatch behaviour of the event bus
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EventBusConfig {
    /// Reject subscriptions for event types that were never registered
    #[serde(default)]
    pub strict_event_types: bool,
    /// Isolate handler panics instead of unwinding through `publish`
    #[serde(default = "default_true")]
    pub catch_panics: bool,
    /// Warn when a single handler takes longer than this many milliseconds
    #[serde(default)]
    pub slow_handler_warn_ms: Option<u64>,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            strict_event_types: false,
            catch_panics: true,
            slow_handler_warn_ms: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtensionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: HostConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.bus, EventBusConfig::default());
        assert!(config.bus.catch_panics);
        assert!(config.extensions.is_empty());
    }

    #[test]
    fn test_partial_bus_config() {
        let config: HostConfig = serde_json::from_str(
            r#"{
                "bus": { "strict_event_types": true, "slow_handler_warn_ms": 25 },
                "extensions": { "metrics": { "enabled": false }, "chat": {} }
            }"#,
        )
        .unwrap();

        assert!(config.bus.strict_event_types);
        assert!(config.bus.catch_panics);
        assert_eq!(config.bus.slow_handler_warn_ms, Some(25));
        assert!(!config.is_extension_enabled("metrics"));
        assert!(config.is_extension_enabled("chat"));
        assert!(config.is_extension_enabled("unlisted"));
    }

    #[test]
    fn test_unknown_bus_keys_are_ignored() {
        let config: HostConfig = serde_json::from_str(
            r#"{ "bus": { "skip_revoked_in_flight": false, "catch_panics": false } }"#,
        )
        .unwrap();
        assert!(!config.bus.catch_panics);
        assert_eq!(
            config.bus,
            EventBusConfig {
                catch_panics: false,
                ..Default::default()
            }
        );
    }
}
