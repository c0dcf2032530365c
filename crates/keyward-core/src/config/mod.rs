//! Keyward configuration
//!
//! Loaded from TOML, overridden by `KEYWARD_*` environment variables, then
//! validated as a whole so every problem is reported at once.
//!
//! ```toml
//! log_filter = "keyward=debug"
//!
//! [sessions]
//! ttl_secs = 604800
//! refresh_secs = 86400
//! purge_interval_secs = 60
//!
//! [sso]
//! entry_ttl_secs = 3600
//! multi_login_grace_secs = 30
//!
//! [permissions]
//! admin_group = "admins"
//! ```

pub mod validation;

pub use validation::{ConfigChecks, Violation};

use crate::{KeywardError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "KEYWARD_";

/// Session lifetime settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions idle for longer than this are purged
    pub ttl_secs: u64,
    /// A lookup older than this rewrites `lastUsedAt`
    pub refresh_secs: u64,
    /// How often the purge loop runs
    pub purge_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 60 * 60 * 24 * 7,
            refresh_secs: 60 * 60 * 24,
            purge_interval_secs: 60,
        }
    }
}

impl SessionConfig {
    /// `ttl_secs` as a duration
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// `refresh_secs` as a duration
    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }

    /// `purge_interval_secs` as a duration
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }
}

/// SSO login code settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsoConfig {
    /// Lifetime of a freshly issued login code
    pub entry_ttl_secs: u64,
    /// Sliding window granted by each multi-use login
    pub multi_login_grace_secs: u64,
}

impl Default for SsoConfig {
    fn default() -> Self {
        Self {
            entry_ttl_secs: 60 * 60,
            multi_login_grace_secs: 30,
        }
    }
}

impl SsoConfig {
    /// `entry_ttl_secs` as a duration
    pub fn entry_ttl(&self) -> Duration {
        Duration::from_secs(self.entry_ttl_secs)
    }

    /// `multi_login_grace_secs` as a duration
    pub fn multi_login_grace(&self) -> Duration {
        Duration::from_secs(self.multi_login_grace_secs)
    }
}

/// Permission defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    /// Group that receives admin actions alongside every grant
    pub admin_group: String,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            admin_group: "admins".to_string(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywardConfig {
    /// `tracing-subscriber` filter directive
    pub log_filter: String,
    /// Session lifetimes
    pub sessions: SessionConfig,
    /// SSO code lifetimes
    pub sso: SsoConfig,
    /// Permission defaults
    pub permissions: PermissionsConfig,
}

impl Default for KeywardConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            sessions: SessionConfig::default(),
            sso: SsoConfig::default(),
            permissions: PermissionsConfig::default(),
        }
    }
}

impl KeywardConfig {
    /// Parse a TOML document; missing fields keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            KeywardError::invalid(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from `path`, apply environment overrides, then validate
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::load_from_file(path)?;
        config.merge_with_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `KEYWARD_*` overrides from the process environment
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply overrides from `(name, value)` pairs; names without the
    /// `KEYWARD_` prefix are ignored
    pub fn merge_with_vars<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let Some(rest) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let rest = rest.to_lowercase();
            let key = match rest.split_once('_') {
                Some((section, field)) if matches!(section, "sessions" | "sso" | "permissions") => {
                    format!("{section}.{field}")
                }
                _ => rest,
            };
            self.set_from_string(&key, &value)?;
        }
        Ok(())
    }

    /// Set a value by dotted key, e.g. `sessions.ttl_secs`
    pub fn set_from_string(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "log_filter" => self.log_filter = value.to_string(),
            "sessions.ttl_secs" => self.sessions.ttl_secs = parse_secs(key, value)?,
            "sessions.refresh_secs" => self.sessions.refresh_secs = parse_secs(key, value)?,
            "sessions.purge_interval_secs" => {
                self.sessions.purge_interval_secs = parse_secs(key, value)?;
            }
            "sso.entry_ttl_secs" => self.sso.entry_ttl_secs = parse_secs(key, value)?,
            "sso.multi_login_grace_secs" => {
                self.sso.multi_login_grace_secs = parse_secs(key, value)?;
            }
            "permissions.admin_group" => self.permissions.admin_group = value.to_string(),
            _ => {
                return Err(KeywardError::invalid(format!(
                    "Unknown configuration key: {key}"
                )))
            }
        }
        Ok(())
    }

    /// Validate the configuration, reporting every violation
    pub fn validate(&self) -> Result<()> {
        let mut checks = ConfigChecks::new();
        checks
            .not_blank("log_filter", &self.log_filter)
            .section("sessions", |s| {
                let c = &self.sessions;
                s.at_least("ttl_secs", c.ttl_secs, 1)
                    .at_least("refresh_secs", c.refresh_secs, 1)
                    .at_least("purge_interval_secs", c.purge_interval_secs, 1)
                    .rule(
                        "refresh_secs",
                        c.refresh_secs < c.ttl_secs,
                        "must be smaller than ttl_secs",
                    );
            })
            .section("sso", |s| {
                s.at_least("entry_ttl_secs", self.sso.entry_ttl_secs, 1)
                    .at_least("multi_login_grace_secs", self.sso.multi_login_grace_secs, 1);
            })
            .section("permissions", |s| {
                s.not_blank("admin_group", &self.permissions.admin_group);
            });
        checks.finish()
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|e| KeywardError::invalid(format!("Invalid value for {key}: {e}")))
}
