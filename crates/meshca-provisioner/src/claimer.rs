//! Resolved issuance policy
//!
//! A [`Claimer`] merges a provisioner's own claims over the global claims and
//! the built-in defaults, validates the result once at startup, and answers
//! policy questions during authorization.

use crate::config::{self, Claims};
use crate::ssh::SshCertType;
use chrono::Duration;
use meshca_core::time::format_duration;
use meshca_core::{MeshcaError, Result};

/// Minimum, maximum and default validity for one certificate family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationLimits {
    /// Shortest validity a caller may request
    pub min: Duration,
    /// Longest validity a caller may request
    pub max: Duration,
    /// Validity used when the caller does not ask
    pub default: Duration,
}

impl DurationLimits {
    fn validate(&self, family: &str) -> Result<()> {
        let field = |kind: &str| format!("{kind}{family}CertDuration");
        let positive = [
            (self.min, field("Min")),
            (self.max, field("Max")),
            (self.default, field("Default")),
        ];
        for (value, name) in &positive {
            if *value <= Duration::zero() {
                return Err(MeshcaError::config(format!(
                    "claims: {name} must be greater than 0"
                )));
            }
        }
        if self.max < self.min {
            return Err(MeshcaError::config(format!(
                "claims: {} of {} cannot be less than {} of {}",
                field("Max"),
                format_duration(self.max),
                field("Min"),
                format_duration(self.min)
            )));
        }
        if self.default < self.min {
            return Err(MeshcaError::config(format!(
                "claims: {} of {} cannot be less than {} of {}",
                field("Default"),
                format_duration(self.default),
                field("Min"),
                format_duration(self.min)
            )));
        }
        if self.max < self.default {
            return Err(MeshcaError::config(format!(
                "claims: {} of {} cannot be less than {} of {}",
                field("Max"),
                format_duration(self.max),
                field("Default"),
                format_duration(self.default)
            )));
        }
        Ok(())
    }
}

/// Provisioner claims resolved against the global claims
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claimer {
    tls: DurationLimits,
    user_ssh: DurationLimits,
    host_ssh: DurationLimits,
    disable_renewal: bool,
    enable_ssh_ca: bool,
}

fn pick<T: Copy>(local: Option<&Claims>, global: &Claims, get: fn(&Claims) -> Option<T>, fallback: T) -> T {
    local
        .and_then(get)
        .or_else(|| get(global))
        .unwrap_or(fallback)
}

impl Claimer {
    /// Resolve and validate claims
    pub fn new(claims: Option<&Claims>, global: &Claims) -> Result<Self> {
        let tls = DurationLimits {
            min: pick(claims, global, |c| c.min_tls_cert_duration, config::DEFAULT_MIN_TLS_CERT_DURATION),
            max: pick(claims, global, |c| c.max_tls_cert_duration, config::DEFAULT_MAX_TLS_CERT_DURATION),
            default: pick(claims, global, |c| c.default_tls_cert_duration, config::DEFAULT_TLS_CERT_DURATION),
        };
        let user_ssh = DurationLimits {
            min: pick(claims, global, |c| c.min_user_ssh_cert_duration, config::DEFAULT_MIN_USER_SSH_CERT_DURATION),
            max: pick(claims, global, |c| c.max_user_ssh_cert_duration, config::DEFAULT_MAX_USER_SSH_CERT_DURATION),
            default: pick(claims, global, |c| c.default_user_ssh_cert_duration, config::DEFAULT_USER_SSH_CERT_DURATION),
        };
        let host_ssh = DurationLimits {
            min: pick(claims, global, |c| c.min_host_ssh_cert_duration, config::DEFAULT_MIN_HOST_SSH_CERT_DURATION),
            max: pick(claims, global, |c| c.max_host_ssh_cert_duration, config::DEFAULT_MAX_HOST_SSH_CERT_DURATION),
            default: pick(claims, global, |c| c.default_host_ssh_cert_duration, config::DEFAULT_HOST_SSH_CERT_DURATION),
        };

        tls.validate("TLS")?;
        user_ssh.validate("UserSSH")?;
        host_ssh.validate("HostSSH")?;

        Ok(Self {
            tls,
            user_ssh,
            host_ssh,
            disable_renewal: pick(claims, global, |c| c.disable_renewal, false),
            enable_ssh_ca: pick(claims, global, |c| c.enable_ssh_ca, false),
        })
    }

    /// X.509 validity limits
    pub fn tls(&self) -> DurationLimits {
        self.tls
    }

    /// SSH user certificate validity limits
    pub fn user_ssh(&self) -> DurationLimits {
        self.user_ssh
    }

    /// SSH host certificate validity limits
    pub fn host_ssh(&self) -> DurationLimits {
        self.host_ssh
    }

    /// SSH limits for a certificate type
    pub fn ssh(&self, cert_type: SshCertType) -> DurationLimits {
        match cert_type {
            SshCertType::User => self.user_ssh,
            SshCertType::Host => self.host_ssh,
        }
    }

    /// Minimum X.509 validity
    pub fn min_tls_cert_duration(&self) -> Duration {
        self.tls.min
    }

    /// Maximum X.509 validity
    pub fn max_tls_cert_duration(&self) -> Duration {
        self.tls.max
    }

    /// Default X.509 validity
    pub fn default_tls_cert_duration(&self) -> Duration {
        self.tls.default
    }

    /// Whether renewal is switched off
    pub fn is_disable_renewal(&self) -> bool {
        self.disable_renewal
    }

    /// Whether SSH certificates may be issued
    pub fn is_ssh_ca_enabled(&self) -> bool {
        self.enable_ssh_ca
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_builtin_defaults() {
        let claimer = Claimer::new(None, &Claims::default()).unwrap();
        assert_eq!(claimer.min_tls_cert_duration(), Duration::minutes(5));
        assert_eq!(claimer.max_tls_cert_duration(), Duration::hours(24));
        assert_eq!(claimer.default_tls_cert_duration(), Duration::hours(24));
        assert_eq!(claimer.user_ssh().default, Duration::hours(16));
        assert_eq!(claimer.host_ssh().max, Duration::hours(720));
        assert!(!claimer.is_ssh_ca_enabled());
        assert!(!claimer.is_disable_renewal());
    }

    #[test]
    fn test_local_overrides_global() {
        let global = Claims {
            max_tls_cert_duration: Some(Duration::hours(48)),
            default_tls_cert_duration: Some(Duration::hours(48)),
            enable_ssh_ca: Some(true),
            ..Claims::global_defaults()
        };
        let local = Claims {
            default_tls_cert_duration: Some(Duration::hours(1)),
            enable_ssh_ca: Some(false),
            ..Claims::default()
        };
        let claimer = Claimer::new(Some(&local), &global).unwrap();
        assert_eq!(claimer.max_tls_cert_duration(), Duration::hours(48));
        assert_eq!(claimer.default_tls_cert_duration(), Duration::hours(1));
        assert!(!claimer.is_ssh_ca_enabled());
        assert_eq!(claimer.ssh(SshCertType::Host), claimer.host_ssh());
    }

    #[test]
    fn test_rejects_inconsistent_limits() {
        let global = Claims::global_defaults();
        let cases = [
            Claims {
                min_tls_cert_duration: Some(Duration::zero()),
                ..Claims::default()
            },
            Claims {
                max_tls_cert_duration: Some(Duration::minutes(1)),
                ..Claims::default()
            },
            Claims {
                default_tls_cert_duration: Some(Duration::minutes(1)),
                ..Claims::default()
            },
            Claims {
                default_user_ssh_cert_duration: Some(Duration::hours(25)),
                ..Claims::default()
            },
            Claims {
                min_host_ssh_cert_duration: Some(Duration::seconds(-1)),
                ..Claims::default()
            },
        ];
        for claims in &cases {
            assert_matches!(
                Claimer::new(Some(claims), &global),
                Err(MeshcaError::Config { .. }),
                "{claims:?}"
            );
        }
    }

    #[test]
    fn test_error_names_the_field() {
        let claims = Claims {
            max_tls_cert_duration: Some(Duration::minutes(1)),
            ..Claims::default()
        };
        let err = Claimer::new(Some(&claims), &Claims::global_defaults()).unwrap_err();
        assert!(err.message().contains("MaxTLSCertDuration"), "{err}");
    }
}
