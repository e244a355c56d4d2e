//! Tool-provider process configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How tool-provider programs are launched and talked to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Interpreter for `.py` providers.
    pub python: String,
    /// Interpreter for `.js` / `.mjs` providers.
    pub node: String,
    /// Interpreter for `.sh` providers.
    pub shell: String,
    /// Upper bound on a single request/response round-trip.
    pub request_timeout_secs: u64,
    /// How long `close` waits for the child to exit on its own before killing it.
    pub shutdown_grace_ms: u64,
    /// Variables copied from our environment into the provider's, when set.
    pub passthrough_env: Vec<String>,
    /// Fixed variables injected into the provider's environment.
    pub env: HashMap<String, String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            python: "python3".into(),
            node: "node".into(),
            shell: "sh".into(),
            request_timeout_secs: 30,
            shutdown_grace_ms: 500,
            passthrough_env: vec![
                "WEATHER_API_URL".into(),
                "WEATHER_API_KEY".into(),
                "WEATHER_USER_AGENT".into(),
            ],
            env: HashMap::new(),
        }
    }
}

impl ProviderConfig {
    /// Environment to hand the provider: passthrough variables that `lookup`
    /// resolves, then the fixed `env` table (which wins on conflicts).
    /// Sorted by key so spawns are reproducible.
    pub fn child_env(&self, lookup: impl Fn(&str) -> Option<String>) -> Vec<(String, String)> {
        let mut vars: HashMap<String, String> = self
            .passthrough_env
            .iter()
            .filter_map(|key| lookup(key).map(|value| (key.clone(), value)))
            .collect();
        vars.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut vars: Vec<_> = vars.into_iter().collect();
        vars.sort();
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_config_defaults() {
        let config = ProviderConfig::default();
        assert_eq!(config.python, "python3");
        assert_eq!(config.node, "node");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.passthrough_env.len(), 3);
        assert!(config.env.is_empty());
    }

    #[test]
    fn child_env_only_forwards_present_vars() {
        let config = ProviderConfig::default();
        let vars = config.child_env(|key| match key {
            "WEATHER_API_KEY" => Some("k".into()),
            _ => None,
        });
        assert_eq!(vars, vec![("WEATHER_API_KEY".to_string(), "k".to_string())]);
    }

    #[test]
    fn child_env_fixed_table_wins() {
        let mut config = ProviderConfig::default();
        config
            .env
            .insert("WEATHER_USER_AGENT".into(), "parley-test".into());
        config.env.insert("DB_URL".into(), "postgres://localhost".into());

        let vars = config.child_env(|key| match key {
            "WEATHER_USER_AGENT" => Some("from-env".into()),
            _ => None,
        });
        assert_eq!(
            vars,
            vec![
                ("DB_URL".to_string(), "postgres://localhost".to_string()),
                ("WEATHER_USER_AGENT".to_string(), "parley-test".to_string()),
            ]
        );
    }

    #[test]
    fn provider_config_partial_toml() {
        let config: ProviderConfig = toml::from_str(
            r#"
python = "/usr/bin/python3.12"

[env]
WEATHER_USER_AGENT = "parley/0.1"
"#,
        )
        .unwrap();
        assert_eq!(config.python, "/usr/bin/python3.12");
        assert_eq!(config.env.get("WEATHER_USER_AGENT").unwrap(), "parley/0.1");
        assert_eq!(config.node, "node");
    }
}
