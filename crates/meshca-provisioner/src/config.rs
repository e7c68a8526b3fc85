//! Provisioner configuration documents
//!
//! The CA reads each provisioner from its configuration as a JSON object:
//!
//! ```json
//! {
//!   "type": "Nebula",
//!   "name": "mesh",
//!   "roots": "<base64 of PEM bundle>",
//!   "claims": { "maxTLSCertDuration": "24h", "enableSSHCA": true },
//!   "options": { "x509": { "templateData": { "team": "edge" } } }
//! }
//! ```
//!
//! Durations use Go duration syntax. Claims left unset fall back to the
//! authority-wide claims in [`GlobalConfig`].

use crate::audiences::Audiences;
use chrono::Duration;
use meshca_core::time::duration;
use serde::{Deserialize, Serialize};

/// Default minimum X.509 certificate validity
pub const DEFAULT_MIN_TLS_CERT_DURATION: Duration = Duration::minutes(5);
/// Default maximum X.509 certificate validity
pub const DEFAULT_MAX_TLS_CERT_DURATION: Duration = Duration::hours(24);
/// Default X.509 certificate validity
pub const DEFAULT_TLS_CERT_DURATION: Duration = Duration::hours(24);
/// Default minimum SSH user certificate validity
pub const DEFAULT_MIN_USER_SSH_CERT_DURATION: Duration = Duration::minutes(5);
/// Default maximum SSH user certificate validity
pub const DEFAULT_MAX_USER_SSH_CERT_DURATION: Duration = Duration::hours(24);
/// Default SSH user certificate validity
pub const DEFAULT_USER_SSH_CERT_DURATION: Duration = Duration::hours(16);
/// Default minimum SSH host certificate validity
pub const DEFAULT_MIN_HOST_SSH_CERT_DURATION: Duration = Duration::minutes(5);
/// Default maximum SSH host certificate validity (30 days)
pub const DEFAULT_MAX_HOST_SSH_CERT_DURATION: Duration = Duration::hours(720);
/// Default SSH host certificate validity (30 days)
pub const DEFAULT_HOST_SSH_CERT_DURATION: Duration = Duration::hours(720);

/// Issuance policy knobs
///
/// Every field is optional; resolution against the global claims happens in
/// [`Claimer`](crate::claimer::Claimer).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Minimum X.509 validity
    #[serde(
        rename = "minTLSCertDuration",
        default,
        with = "duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub min_tls_cert_duration: Option<Duration>,
    /// Maximum X.509 validity
    #[serde(
        rename = "maxTLSCertDuration",
        default,
        with = "duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_tls_cert_duration: Option<Duration>,
    /// Default X.509 validity
    #[serde(
        rename = "defaultTLSCertDuration",
        default,
        with = "duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_tls_cert_duration: Option<Duration>,
    /// Disable certificate renewal
    #[serde(
        rename = "disableRenewal",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub disable_renewal: Option<bool>,

    /// Minimum SSH user validity
    #[serde(
        rename = "minUserSSHCertDuration",
        default,
        with = "duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub min_user_ssh_cert_duration: Option<Duration>,
    /// Maximum SSH user validity
    #[serde(
        rename = "maxUserSSHCertDuration",
        default,
        with = "duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_user_ssh_cert_duration: Option<Duration>,
    /// Default SSH user validity
    #[serde(
        rename = "defaultUserSSHCertDuration",
        default,
        with = "duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_user_ssh_cert_duration: Option<Duration>,
    /// Minimum SSH host validity
    #[serde(
        rename = "minHostSSHCertDuration",
        default,
        with = "duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub min_host_ssh_cert_duration: Option<Duration>,
    /// Maximum SSH host validity
    #[serde(
        rename = "maxHostSSHCertDuration",
        default,
        with = "duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_host_ssh_cert_duration: Option<Duration>,
    /// Default SSH host validity
    #[serde(
        rename = "defaultHostSSHCertDuration",
        default,
        with = "duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_host_ssh_cert_duration: Option<Duration>,
    /// Allow SSH certificate issuance
    #[serde(rename = "enableSSHCA", default, skip_serializing_if = "Option::is_none")]
    pub enable_ssh_ca: Option<bool>,
}

impl Claims {
    /// The built-in authority defaults, every field set
    pub fn global_defaults() -> Self {
        Self {
            min_tls_cert_duration: Some(DEFAULT_MIN_TLS_CERT_DURATION),
            max_tls_cert_duration: Some(DEFAULT_MAX_TLS_CERT_DURATION),
            default_tls_cert_duration: Some(DEFAULT_TLS_CERT_DURATION),
            disable_renewal: Some(false),
            min_user_ssh_cert_duration: Some(DEFAULT_MIN_USER_SSH_CERT_DURATION),
            max_user_ssh_cert_duration: Some(DEFAULT_MAX_USER_SSH_CERT_DURATION),
            default_user_ssh_cert_duration: Some(DEFAULT_USER_SSH_CERT_DURATION),
            min_host_ssh_cert_duration: Some(DEFAULT_MIN_HOST_SSH_CERT_DURATION),
            max_host_ssh_cert_duration: Some(DEFAULT_MAX_HOST_SSH_CERT_DURATION),
            default_host_ssh_cert_duration: Some(DEFAULT_HOST_SSH_CERT_DURATION),
            enable_ssh_ca: Some(false),
        }
    }
}

/// Authority-wide settings handed to every provisioner at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Claims used where a provisioner leaves a field unset
    #[serde(default = "Claims::global_defaults")]
    pub claims: Claims,
    /// The authority's endpoint URLs, per operation
    #[serde(default)]
    pub audiences: Audiences,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            claims: Claims::global_defaults(),
            audiences: Audiences::default(),
        }
    }
}

/// Certificate template selection for one certificate family
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateConfig {
    /// Custom template text; the default template applies when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Extra data merged into the template data; must be a JSON object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_data: Option<serde_json::Value>,
}

/// Per-provisioner template options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// X.509 template options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x509: Option<TemplateConfig>,
    /// SSH template options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh: Option<TemplateConfig>,
}

impl Options {
    /// X.509 template options, if configured
    pub fn x509_options(&self) -> Option<&TemplateConfig> {
        self.x509.as_ref()
    }

    /// SSH template options, if configured
    pub fn ssh_options(&self) -> Option<&TemplateConfig> {
        self.ssh.as_ref()
    }
}

/// A provisioner entry from the authority configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    /// Explicit identifier; derived from the name when empty
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Provisioner type tag
    #[serde(rename = "type", default)]
    pub provisioner_type: String,
    /// Provisioner name; tokens must carry it as issuer
    #[serde(default)]
    pub name: String,
    /// PEM bundle of trusted mesh roots
    #[serde(default, with = "base64_bytes")]
    pub roots: Vec<u8>,
    /// Issuance policy overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<Claims>,
    /// Template options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Options>,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(Vec::new()),
            Some(s) => STANDARD.decode(s.trim()).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provisioner_config_from_json() {
        let json = r#"{
            "type": "Nebula",
            "name": "mesh",
            "roots": "aGVsbG8=",
            "claims": {"maxTLSCertDuration": "12h", "enableSSHCA": true},
            "options": {"x509": {"templateData": {"team": "edge"}}}
        }"#;
        let config: ProvisionerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.provisioner_type, "Nebula");
        assert_eq!(config.name, "mesh");
        assert_eq!(config.roots, b"hello");
        assert!(config.id.is_empty());

        let claims = config.claims.unwrap();
        assert_eq!(claims.max_tls_cert_duration, Some(Duration::hours(12)));
        assert_eq!(claims.enable_ssh_ca, Some(true));
        assert_eq!(claims.min_tls_cert_duration, None);

        let x509 = config.options.unwrap().x509.unwrap();
        assert_eq!(x509.template_data, Some(serde_json::json!({"team": "edge"})));
    }

    #[test]
    fn test_claims_serialize_go_durations() {
        let claims = Claims {
            default_tls_cert_duration: Some(Duration::hours(1)),
            ..Claims::default()
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json, serde_json::json!({"defaultTLSCertDuration": "1h0m0s"}));
    }

    #[test]
    fn test_global_config_defaults() {
        let global: GlobalConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(global, GlobalConfig::default());
        assert_eq!(global.claims.enable_ssh_ca, Some(false));
    }

    #[test]
    fn test_invalid_roots_encoding() {
        let json = r#"{"type": "Nebula", "name": "mesh", "roots": "***"}"#;
        assert!(serde_json::from_str::<ProvisionerConfig>(json).is_err());
    }
}
