//! Configuration loading.
//!
//! Supplies the two capability facts (engine on/off, retain chown) and the raw
//! access rule lists. Everything is compiled once at startup; the results are
//! immutable and shared read-only by all sessions.

use std::path::Path;

use serde::Deserialize;

use crate::access::{AccessRule, CombinePolicy, Domain};
use crate::error::ConfigError;
use crate::policy::CapabilityPolicy;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// `CapabilitiesEngine`: whether privileges are reduced after login.
    #[serde(default = "default_engine")]
    pub capabilities_engine: bool,

    /// `CapabilitiesSet` arguments, e.g. `["-CAP_CHOWN"]`. Empty keeps the defaults.
    #[serde(default)]
    pub capabilities_set: Vec<String>,

    /// Access rules in their raw, uncompiled form.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// One raw access rule.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    pub policy: CombinePolicy,
    pub domain: Domain,
    /// Raw items, each possibly a comma-separated list.
    #[serde(default)]
    pub items: Vec<String>,
}

fn default_engine() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capabilities_engine: default_engine(),
            capabilities_set: Vec::new(),
            rules: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON string.
    pub fn parse(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builds the capability policy, validating `capabilities_set`.
    pub fn capability_policy(&self) -> Result<CapabilityPolicy, ConfigError> {
        let policy = if self.capabilities_set.is_empty() {
            CapabilityPolicy::new(self.capabilities_engine, true)
        } else {
            CapabilityPolicy::from_directive(self.capabilities_engine, self.capabilities_set.as_slice())?
        };
        tracing::debug!(
            enabled = policy.enabled(),
            retain_chown = policy.retain_chown(),
            "capability policy loaded"
        );
        Ok(policy)
    }

    /// Compiles every configured rule, in configuration order.
    pub fn access_rules(&self) -> Vec<AccessRule> {
        self.rules
            .iter()
            .map(|rule| AccessRule::compile(rule.policy, rule.domain, &rule.items))
            .collect()
    }
}
