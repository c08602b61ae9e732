//! Provider configuration.
//!
//! Settings come from the provider block first and from the environment
//! second. [`ProviderConfig`] keeps exactly what the block said; defaults and
//! environment fallbacks are applied by [`ProviderConfig::resolve`].
//!
//! | Attribute              | Environment variable   | Default            |
//! |------------------------|------------------------|--------------------|
//! | `hostname`             | `TFE_HOSTNAME`         | `app.terraform.io` |
//! | `token`                | `TFE_TOKEN`            |                    |
//! | `ssl_skip_verify`      | `TFE_SSL_SKIP_VERIFY`  | `false`            |
//! | `default_organization` | `TFE_ORGANIZATION`     |                    |

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema};

/// Hostname used when neither the configuration nor the environment sets one.
pub const DEFAULT_HOSTNAME: &str = "app.terraform.io";

/// The provider block as written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API hostname, without scheme.
    #[serde(default)]
    pub hostname: Option<String>,
    /// API token.
    #[serde(default)]
    pub token: Option<String>,
    /// Skip TLS certificate verification.
    #[serde(default)]
    pub ssl_skip_verify: Option<bool>,
    /// Organization used by resources that do not name one.
    #[serde(default)]
    pub default_organization: Option<String>,
}

/// Effective settings after defaults and environment fallbacks.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// API hostname.
    pub hostname: String,
    /// API token, if any.
    pub token: Option<String>,
    /// Skip TLS certificate verification.
    pub ssl_skip_verify: bool,
    /// Organization used by resources that do not name one.
    pub default_organization: Option<String>,
}

impl std::fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("hostname", &self.hostname)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("ssl_skip_verify", &self.ssl_skip_verify)
            .field("default_organization", &self.default_organization)
            .finish()
    }
}

impl ProviderConfig {
    /// Parse the provider block. `null` means an empty block.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProviderError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Problems with the block as written.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if let Some(hostname) = &self.hostname {
            if hostname.trim().is_empty() {
                diagnostics.push(
                    Diagnostic::error("hostname must not be empty")
                        .with_detail("Leave hostname unset to use the default")
                        .with_attribute("hostname"),
                );
            } else if hostname.contains("://") || hostname.contains('/') {
                diagnostics.push(
                    Diagnostic::error("hostname must be a bare host name")
                        .with_detail(format!(
                            "Got {:?}; drop the scheme and any path, e.g. {:?}",
                            hostname, DEFAULT_HOSTNAME
                        ))
                        .with_attribute("hostname"),
                );
            }
        }
        if self.default_organization.as_deref() == Some("") {
            diagnostics.push(
                Diagnostic::warning("default_organization is empty and will be ignored")
                    .with_attribute("default_organization"),
            );
        }
        diagnostics
    }

    /// Apply environment fallbacks and defaults from the process environment.
    pub fn resolve(&self) -> ResolvedConfig {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Apply fallbacks, looking variables up through `env`.
    pub fn resolve_with(&self, env: impl Fn(&str) -> Option<String>) -> ResolvedConfig {
        let lookup = |configured: &Option<String>, name: &str| {
            configured
                .clone()
                .or_else(|| env(name))
                .filter(|value| !value.is_empty())
        };

        let ssl_skip_verify = match self.ssl_skip_verify {
            Some(value) => value,
            None => env("TFE_SSL_SKIP_VERIFY")
                .map(|raw| {
                    parse_bool(&raw).unwrap_or_else(|| {
                        warn!(value = %raw, "Ignoring unparsable TFE_SSL_SKIP_VERIFY");
                        false
                    })
                })
                .unwrap_or(false),
        };

        ResolvedConfig {
            hostname: lookup(&self.hostname, "TFE_HOSTNAME")
                .unwrap_or_else(|| DEFAULT_HOSTNAME.to_string()),
            token: lookup(&self.token, "TFE_TOKEN"),
            ssl_skip_verify,
            default_organization: lookup(&self.default_organization, "TFE_ORGANIZATION"),
        }
    }

    /// Schema of the provider block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "hostname",
                Attribute::optional_string().with_description(format!(
                    "API hostname. Falls back to TFE_HOSTNAME, then {}.",
                    DEFAULT_HOSTNAME
                )),
            )
            .with_attribute(
                "token",
                Attribute::optional_string()
                    .sensitive()
                    .with_description("API token. Falls back to TFE_TOKEN."),
            )
            .with_attribute(
                "ssl_skip_verify",
                Attribute::optional_bool()
                    .with_description("Skip TLS verification. Falls back to TFE_SSL_SKIP_VERIFY."),
            )
            .with_attribute(
                "default_organization",
                Attribute::optional_string().with_description(
                    "Organization used when a resource does not name one. Falls back to TFE_ORGANIZATION.",
                ),
            )
    }
}

/// The boolean spellings accepted in environment variables.
fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_parse_keeps_raw_values() {
        let config = ProviderConfig::from_value(json!({"token": "abc", "hostname": null})).unwrap();
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert!(config.hostname.is_none());
        assert!(config.ssl_skip_verify.is_none());

        assert_eq!(ProviderConfig::from_value(serde_json::Value::Null).unwrap(), ProviderConfig::default());
    }

    #[test]
    fn test_parse_rejects_wrong_types() {
        let err = ProviderConfig::from_value(json!({"ssl_skip_verify": "yes"})).unwrap_err();
        assert!(matches!(err, ProviderError::Serialization(_)));
    }

    #[test]
    fn test_defaults_without_environment() {
        let resolved = ProviderConfig::default().resolve_with(env(&[]));
        assert_eq!(resolved.hostname, DEFAULT_HOSTNAME);
        assert!(resolved.token.is_none());
        assert!(!resolved.ssl_skip_verify);
        assert!(resolved.default_organization.is_none());
    }

    #[test]
    fn test_environment_fallbacks() {
        let resolved = ProviderConfig::default().resolve_with(env(&[
            ("TFE_HOSTNAME", "tfe.example.com"),
            ("TFE_TOKEN", "from-env"),
            ("TFE_SSL_SKIP_VERIFY", "1"),
            ("TFE_ORGANIZATION", "acme"),
        ]));
        assert_eq!(resolved.hostname, "tfe.example.com");
        assert_eq!(resolved.token.as_deref(), Some("from-env"));
        assert!(resolved.ssl_skip_verify);
        assert_eq!(resolved.default_organization.as_deref(), Some("acme"));
    }

    #[test]
    fn test_configuration_wins_over_environment() {
        let config = ProviderConfig {
            hostname: Some("terraform.io".to_string()),
            token: None,
            ssl_skip_verify: Some(false),
            default_organization: Some("configured".to_string()),
        };
        let resolved = config.resolve_with(env(&[
            ("TFE_HOSTNAME", "tfe.example.com"),
            ("TFE_TOKEN", "from-env"),
            ("TFE_SSL_SKIP_VERIFY", "true"),
            ("TFE_ORGANIZATION", "acme"),
        ]));
        assert_eq!(resolved.hostname, "terraform.io");
        assert_eq!(resolved.token.as_deref(), Some("from-env"));
        assert!(!resolved.ssl_skip_verify);
        assert_eq!(resolved.default_organization.as_deref(), Some("configured"));
    }

    #[test]
    fn test_unparsable_ssl_skip_verify_is_false() {
        let resolved =
            ProviderConfig::default().resolve_with(env(&[("TFE_SSL_SKIP_VERIFY", "maybe")]));
        assert!(!resolved.ssl_skip_verify);
    }

    #[test]
    fn test_hostname_diagnostics() {
        let config = ProviderConfig {
            hostname: Some("https://app.terraform.io".to_string()),
            ..Default::default()
        };
        let diagnostics = config.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("hostname"));

        let config = ProviderConfig {
            hostname: Some(" ".to_string()),
            ..Default::default()
        };
        assert!(config.diagnostics()[0].summary.contains("must not be empty"));

        let config = ProviderConfig {
            hostname: Some("tfe.example.com".to_string()),
            ..Default::default()
        };
        assert!(config.diagnostics().is_empty());
    }

    #[test]
    fn test_token_is_redacted_in_debug_output() {
        let resolved = ProviderConfig {
            token: Some("super-secret".to_string()),
            ..Default::default()
        }
        .resolve_with(env(&[]));
        assert!(!format!("{:?}", resolved).contains("super-secret"));
    }
}
