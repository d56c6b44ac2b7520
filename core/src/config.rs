//! Plugin-wide settings.
//!
//! Hosts usually run with the defaults. A host that embeds the plugin on a
//! different platform, or wants its own message prefix, passes a JSON object
//! with any subset of the fields.

use serde::Deserialize;

use crate::error::EncodingError;

/// Settings shared by every action of one plugin instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PluginConfig {
    /// Platform name reported by unsupported-operation failures.
    pub platform: String,
    /// Prefix prepended to every message the plugin itself generates.
    pub message_prefix: String,
    /// Message used when the transport fails without saying why.
    pub fallback_error: String,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            platform: "windows".to_string(),
            message_prefix: "advanced-http".to_string(),
            fallback_error: "advanced-http: please check console for error messages".to_string(),
        }
    }
}

impl PluginConfig {
    /// Parse a config object. Missing fields keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self, EncodingError> {
        serde_json::from_str(raw).map_err(|e| EncodingError::new(format!("invalid config: {e}")))
    }

    pub(crate) fn prefixed(&self, message: &str) -> String {
        if self.message_prefix.is_empty() {
            message.to_string()
        } else {
            format!("{}: {message}", self.message_prefix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config = PluginConfig::from_json(r#"{"platform":"uwp"}"#).unwrap();
        assert_eq!(config.platform, "uwp");
        assert_eq!(config.message_prefix, "advanced-http");
    }

    #[test]
    fn empty_prefix_leaves_message_bare() {
        let config = PluginConfig {
            message_prefix: String::new(),
            ..PluginConfig::default()
        };
        assert_eq!(config.prefixed("boom"), "boom");
    }

    #[test]
    fn malformed_config_is_rejected() {
        let err = PluginConfig::from_json("[1, 2]").unwrap_err();
        assert!(err.reason.starts_with("invalid config"));
    }
}
