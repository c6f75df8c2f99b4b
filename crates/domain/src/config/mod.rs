mod auth;
mod context;
mod database;
mod provider;
mod queue;
mod server;
mod webhook;

pub use auth::*;
pub use context::*;
pub use database::*;
pub use provider::*;
pub use queue::*;
pub use server::*;
pub use webhook::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub context: ContextBudgetConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues. Returns
    /// an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.http_port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.http_port".into(),
                message: "http_port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.database.database_url.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "database.database_url".into(),
                message: "database_url must not be empty".into(),
            });
        }
        if self.database.max_open_conns == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "database.max_open_conns".into(),
                message: "max_open_conns must be greater than 0".into(),
            });
        }
        if self.database.max_idle_conns > self.database.max_open_conns {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "database.max_idle_conns".into(),
                message: "max_idle_conns exceeds max_open_conns".into(),
            });
        }

        if self.provider.llm_base_url.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "provider.llm_base_url".into(),
                message: "llm_base_url must not be empty".into(),
            });
        } else if !self.provider.llm_base_url.starts_with("http://")
            && !self.provider.llm_base_url.starts_with("https://")
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "provider.llm_base_url".into(),
                message: format!(
                    "llm_base_url must start with http:// or https:// (got \"{}\")",
                    self.provider.llm_base_url
                ),
            });
        }
        if self.provider.max_tool_depth == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "provider.max_tool_depth".into(),
                message: "max_tool_depth must be greater than 0".into(),
            });
        }

        if self.queue.background_worker_count == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "queue.background_worker_count".into(),
                message: "background_worker_count must be greater than 0".into(),
            });
        }

        if self.webhook.webhook_max_retries == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "webhook.webhook_max_retries".into(),
                message: "webhook_max_retries is 0 — deliveries will never be retried".into(),
            });
        }

        if self.auth.auth_enabled && self.auth.jwks_url.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "auth.jwks_url".into(),
                message: "jwks_url is required when auth_enabled=true".into(),
            });
        }
        if self.auth.auth_enabled && !self.auth.api_key_prefix.starts_with("sk_") {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "auth.api_key_prefix".into(),
                message: "api_key_prefix conventionally starts with \"sk_\"".into(),
            });
        }

        if !(0.0..=1.0).contains(&self.context.context_safety_margin_ratio) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "context.context_safety_margin_ratio".into(),
                message: "context_safety_margin_ratio must be between 0.0 and 1.0".into(),
            });
        }
        if self.context.context_safety_margin_ratio > 0.80 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "context.context_safety_margin_ratio".into(),
                message:
                    "raising the safety margin above 0.80 was calibrated against a conservative \
                     token estimator; recalibrate before doing so"
                        .into(),
            });
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Layered loading with per-field provenance
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where a config value ultimately came from. Recorded per top-level
/// section (not per leaf field — sections are the unit config files and
/// env-var groups operate on) so operators can tell a file value from an
/// environment override without diffing every layer by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigSource {
    Default,
    File,
    EnvFile,
    EnvVar,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigSource::Default => "default",
            ConfigSource::File => "file",
            ConfigSource::EnvFile => "env-file",
            ConfigSource::EnvVar => "env-var",
        })
    }
}

/// Provenance map: section name -> winning source, built up as
/// `ConfigLoader` applies each layer in precedence order.
#[derive(Debug, Clone, Default)]
pub struct Provenance(pub BTreeMap<String, ConfigSource>);

impl Provenance {
    pub fn record(&mut self, section: impl Into<String>, source: ConfigSource) {
        self.0.insert(section.into(), source);
    }

    pub fn get(&self, section: &str) -> ConfigSource {
        self.0.get(section).copied().unwrap_or(ConfigSource::Default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            auth: AuthConfig {
                jwks_url: "https://issuer.example/.well-known/jwks.json".into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn find_issue<'a>(errors: &'a [ConfigError], field: &str) -> Option<&'a ConfigError> {
        errors.iter().find(|e| e.field == field)
    }

    #[test]
    fn default_config_with_jwks_url_is_valid() {
        let errors = valid_config().validate();
        assert!(
            errors.iter().all(|e| e.severity == ConfigSeverity::Warning),
            "unexpected errors: {errors:?}"
        );
    }

    #[test]
    fn server_port_zero_is_error() {
        let mut c = valid_config();
        c.server.http_port = 0;
        let errors = c.validate();
        let issue = find_issue(&errors, "server.http_port").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn llm_base_url_without_scheme_is_error() {
        let mut c = valid_config();
        c.provider.llm_base_url = "api.openai.com".into();
        let errors = c.validate();
        let issue = find_issue(&errors, "provider.llm_base_url").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn zero_background_workers_is_error() {
        let mut c = valid_config();
        c.queue.background_worker_count = 0;
        let errors = c.validate();
        let issue = find_issue(&errors, "queue.background_worker_count").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn auth_enabled_without_jwks_url_is_error() {
        let mut c = valid_config();
        c.auth.jwks_url = String::new();
        let errors = c.validate();
        let issue = find_issue(&errors, "auth.jwks_url").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn safety_margin_above_default_is_warning_not_error() {
        let mut c = valid_config();
        c.context.context_safety_margin_ratio = 0.95;
        let errors = c.validate();
        let issue = find_issue(&errors, "context.context_safety_margin_ratio").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn config_error_display_format() {
        let e = ConfigError {
            severity: ConfigSeverity::Error,
            field: "server.http_port".into(),
            message: "must be greater than 0".into(),
        };
        assert_eq!(e.to_string(), "[ERROR] server.http_port: must be greater than 0");
    }

    #[test]
    fn provenance_defaults_to_default_source() {
        let p = Provenance::default();
        assert_eq!(p.get("server"), ConfigSource::Default);
    }

    #[test]
    fn provenance_records_highest_precedence_layer() {
        let mut p = Provenance::default();
        p.record("server", ConfigSource::File);
        p.record("server", ConfigSource::EnvVar);
        assert_eq!(p.get("server"), ConfigSource::EnvVar);
    }
}
