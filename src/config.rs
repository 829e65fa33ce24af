//! Application configuration
//!
//! `RelayConfig` is read from YAML; every section and field is optional and
//! falls back to the compiled-in defaults.

use action_flow::RelayProfile;
use cdp_adapter::CdpConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Sites, page controls, probe keywords and timings
    pub profile: RelayProfile,
    /// How to reach Chromium
    pub browser: CdpConfig,
    /// HTTP control surface
    pub serve: ServeConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    /// Start a run as soon as the server is up
    pub autostart: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            autostart: false,
        }
    }
}

impl RelayConfig {
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        let config: RelayConfig = serde_yaml::from_str(content)?;
        Ok(config.normalized())
    }

    pub fn normalized(mut self) -> Self {
        self.profile = self.profile.normalized();
        self
    }

    /// Environment variables win over file values.
    pub fn apply_env_overrides(&mut self) {
        let attached = self.browser.is_attach();
        self.browser.apply_env();
        if !attached && self.browser.is_attach() {
            info!("Attaching to browser from RELAY_WS_URL");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = RelayConfig::from_yaml(
            r#"
profile:
  target:
    url: https://example.test/invite
  probes:
    failure_keywords: ["Nope"]
  timings:
    unknown_backoff_ms: 5000
serve:
  port: 9000
"#,
        )
        .unwrap();

        assert_eq!(config.profile.target.url, "https://example.test/invite");
        assert!(config.profile.target.matches("https://example.test/invite/step-2"));
        assert_eq!(config.profile.probes.failure_keywords, vec!["nope"]);
        assert_eq!(config.profile.timings.unknown_backoff_ms, 5_000);
        assert_eq!(config.profile.timings.failure_backoff_ms, 1_200);
        assert_eq!(config.profile.source, RelayProfile::default().source);
        assert_eq!(config.serve.port, 9000);
        assert_eq!(config.serve.host, "127.0.0.1");
    }

    #[test]
    fn site_patterns_come_from_yaml() {
        let config = RelayConfig::from_yaml(
            r#"
profile:
  source:
    url: https://codes.example.test/
    match_patterns:
      - https://*.codes.example.test/*
"#,
        )
        .unwrap();

        let source = &config.profile.source;
        assert_eq!(source.match_patterns, vec!["https://*.codes.example.test/*"]);
        assert!(source.matches("https://www.codes.example.test/batch"));
        assert!(!source.matches("https://codes.example.test.evil/"));
    }

    #[test]
    #[serial]
    fn environment_overrides_file() {
        let mut config = RelayConfig::from_yaml("browser:\n  headless: false\n").unwrap();
        env::set_var("RELAY_WS_URL", "ws://127.0.0.1:9222/devtools/browser/x");
        env::set_var("RELAY_HEADLESS", "yes");
        config.apply_env_overrides();
        env::remove_var("RELAY_WS_URL");
        env::remove_var("RELAY_HEADLESS");

        assert_eq!(
            config.browser.websocket_url.as_deref(),
            Some("ws://127.0.0.1:9222/devtools/browser/x")
        );
        assert!(config.browser.headless);
    }
}
