//! SSH modifiers and validators

use super::{SshCertificateModifier, SshCertificateOptionsValidator, SshCertificateValidator};
use crate::claimer::DurationLimits;
use crate::ssh::{from_unix_seconds, unix_seconds, SignSshOptions, SshCertType, SshCertificate, SshPublicKey};
use chrono::{DateTime, Duration, Utc};
use meshca_core::time::format_duration;
use meshca_core::{MeshcaError, Result};

/// Requested options must agree with pinned ones
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshCertOptionsValidator(pub SignSshOptions);

impl SshCertificateOptionsValidator for SshCertOptionsValidator {
    fn valid(&self, got: &SignSshOptions) -> Result<()> {
        self.0.matches(got)
    }
}

/// Fixes validAfter (Unix seconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SshCertValidAfterModifier(pub u64);

impl SshCertificateModifier for SshCertValidAfterModifier {
    fn modify(&self, cert: &mut SshCertificate, _opts: &SignSshOptions) -> Result<()> {
        cert.valid_after = self.0;
        Ok(())
    }
}

/// Fixes validBefore (Unix seconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SshCertValidBeforeModifier(pub u64);

impl SshCertificateModifier for SshCertValidBeforeModifier {
    fn modify(&self, cert: &mut SshCertificate, _opts: &SignSshOptions) -> Result<()> {
        cert.valid_before = self.0;
        Ok(())
    }
}

fn require_type(cert: &SshCertificate) -> Result<SshCertType> {
    cert.cert_type
        .ok_or_else(|| MeshcaError::bad_request("ssh certificate type has not been set"))
}

/// Fills unset validity and keeps it before the credential expires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SshLimitDuration {
    pub user: DurationLimits,
    pub host: DurationLimits,
    /// Credential expiry; unbounded when `None`
    pub not_after: Option<DateTime<Utc>>,
    /// Reference time captured at authorization
    pub now: DateTime<Utc>,
}

impl SshCertificateModifier for SshLimitDuration {
    fn modify(&self, cert: &mut SshCertificate, opts: &SignSshOptions) -> Result<()> {
        let default = match require_type(cert)? {
            SshCertType::User => self.user.default,
            SshCertType::Host => self.host.default,
        };

        if let Some(limit) = self.not_after {
            let valid_after = from_unix_seconds(cert.valid_after);
            if valid_after > limit {
                return Err(MeshcaError::forbidden(format!(
                    "provisioning credential expiration ({limit}) is before requested certificate validAfter ({valid_after})"
                )));
            }
            let valid_before = from_unix_seconds(cert.valid_before);
            if valid_before > limit {
                return Err(MeshcaError::forbidden(format!(
                    "provisioning credential expiration ({limit}) is before requested certificate validBefore ({valid_before})"
                )));
            }
        }

        if cert.valid_after == 0 {
            cert.valid_after = unix_seconds(self.now - opts.backdate);
        }
        if cert.valid_before == 0 {
            let mut t = from_unix_seconds(cert.valid_after)
                .checked_add_signed(default)
                .ok_or_else(|| {
                    MeshcaError::bad_request(format!(
                        "ssh certificate validAfter {} is too far in the future",
                        cert.valid_after
                    ))
                })?;
            if let Some(limit) = self.not_after {
                t = t.min(limit);
            }
            cert.valid_before = unix_seconds(t);
        }
        Ok(())
    }
}

/// Rejects missing, weak or DSA keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SshDefaultPublicKeyValidator;

impl SshCertificateValidator for SshDefaultPublicKeyValidator {
    fn valid(&self, cert: &SshCertificate, _opts: &SignSshOptions) -> Result<()> {
        match &cert.key {
            None => Err(MeshcaError::bad_request("ssh certificate key cannot be nil")),
            Some(SshPublicKey::Rsa { bits }) if *bits < 2048 => Err(MeshcaError::forbidden(
                "ssh certificate key must be at least 2048 bits (256 bytes)",
            )),
            Some(SshPublicKey::Dsa) => Err(MeshcaError::bad_request(
                "ssh certificate key algorithm (DSA) is not supported",
            )),
            Some(_) => Ok(()),
        }
    }
}

/// Enforces the SSH validity bounds for the certificate's type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SshCertValidityValidator {
    pub user: DurationLimits,
    pub host: DurationLimits,
    /// Reference time captured at authorization
    pub now: DateTime<Utc>,
}

impl SshCertificateValidator for SshCertValidityValidator {
    fn valid(&self, cert: &SshCertificate, opts: &SignSshOptions) -> Result<()> {
        let now = unix_seconds(self.now);
        if cert.valid_after == 0 {
            return Err(MeshcaError::bad_request("ssh certificate validAfter cannot be 0"));
        }
        if cert.valid_before < now {
            return Err(MeshcaError::bad_request("ssh certificate validBefore cannot be in the past"));
        }
        if cert.valid_before < cert.valid_after {
            return Err(MeshcaError::bad_request(
                "ssh certificate validBefore cannot be before validAfter",
            ));
        }

        let limits = match require_type(cert)? {
            SshCertType::User => self.user,
            SshCertType::Host => self.host,
        };

        // A backdated validAfter does not count towards the duration
        let start = cert.valid_after.max(now);
        let secs = i64::try_from(cert.valid_before - start).unwrap_or(i64::MAX);
        let d = Duration::try_seconds(secs).unwrap_or(Duration::MAX);
        if d < limits.min {
            return Err(MeshcaError::forbidden(format!(
                "requested duration of {} is less than minimum accepted duration for selected cert type of {}",
                format_duration(d),
                format_duration(limits.min)
            )));
        }
        if d > limits.max + opts.backdate {
            return Err(MeshcaError::forbidden(format!(
                "requested duration of {} is greater than maximum accepted duration for selected cert type of {}",
                format_duration(d),
                format_duration(limits.max + opts.backdate)
            )));
        }
        Ok(())
    }
}

/// Every field a signed certificate needs is present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SshCertDefaultValidator {
    /// Reference time captured at authorization
    pub now: DateTime<Utc>,
}

impl SshCertificateValidator for SshCertDefaultValidator {
    fn valid(&self, cert: &SshCertificate, _opts: &SignSshOptions) -> Result<()> {
        let missing = if cert.nonce.is_empty() {
            Some("ssh certificate nonce cannot be empty")
        } else if cert.key.is_none() {
            Some("ssh certificate key cannot be nil")
        } else if cert.serial == 0 {
            Some("ssh certificate serial cannot be 0")
        } else if cert.cert_type.is_none() {
            Some("ssh certificate type has not been set")
        } else if cert.key_id.is_empty() {
            Some("ssh certificate key id cannot be empty")
        } else if cert.principals.is_empty() {
            Some("ssh certificate valid principals cannot be empty")
        } else if cert.valid_after == 0 {
            Some("ssh certificate validAfter cannot be 0")
        } else if cert.valid_before < unix_seconds(self.now) {
            Some("ssh certificate validBefore cannot be in the past")
        } else if cert.valid_before < cert.valid_after {
            Some("ssh certificate validBefore cannot be before validAfter")
        } else if cert.signature_key.is_none() {
            Some("ssh certificate signature key cannot be nil")
        } else if cert.signature.is_none() {
            Some("ssh certificate signature cannot be nil")
        } else {
            None
        };
        missing.map_or(Ok(()), |m| Err(MeshcaError::bad_request(m)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const NOW: i64 = 1_000_000;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn limits(max_h: i64, def_h: i64) -> DurationLimits {
        DurationLimits {
            min: Duration::minutes(5),
            max: Duration::hours(max_h),
            default: Duration::hours(def_h),
        }
    }

    fn host_cert() -> SshCertificate {
        SshCertificate {
            cert_type: Some(SshCertType::Host),
            ..SshCertificate::default()
        }
    }

    fn limit(not_after: Option<i64>) -> SshLimitDuration {
        SshLimitDuration {
            user: limits(24, 16),
            host: limits(720, 720),
            not_after: not_after.map(at),
            now: at(NOW),
        }
    }

    #[test]
    fn test_limit_duration_fills_defaults() {
        let mut cert = host_cert();
        let opts = SignSshOptions {
            backdate: Duration::minutes(1),
            ..SignSshOptions::default()
        };
        limit(None).modify(&mut cert, &opts).unwrap();
        assert_eq!(cert.valid_after, (NOW - 60) as u64);
        assert_eq!(cert.valid_before, (NOW - 60 + 720 * 3600) as u64);
    }

    #[test]
    fn test_limit_duration_clamps_to_credential() {
        let mut cert = host_cert();
        limit(Some(NOW + 3600))
            .modify(&mut cert, &SignSshOptions::default())
            .unwrap();
        assert_eq!(cert.valid_before, (NOW + 3600) as u64);

        let mut late = host_cert();
        late.valid_before = (NOW + 7200) as u64;
        assert_matches!(
            limit(Some(NOW + 3600)).modify(&mut late, &SignSshOptions::default()),
            Err(MeshcaError::Forbidden { .. })
        );
    }

    #[test]
    fn test_limit_duration_requires_type() {
        let mut cert = SshCertificate::default();
        assert_matches!(
            limit(None).modify(&mut cert, &SignSshOptions::default()),
            Err(MeshcaError::BadRequest { .. })
        );
    }

    #[test]
    fn test_limit_duration_rejects_overflowing_start() {
        let mut cert = SshCertificate {
            valid_after: u64::MAX,
            ..host_cert()
        };
        assert_matches!(
            limit(None).modify(&mut cert, &SignSshOptions::default()),
            Err(MeshcaError::BadRequest { message }) if message.contains("validAfter")
        );
    }

    #[test]
    fn test_validity_bounds() {
        let v = SshCertValidityValidator {
            user: limits(24, 16),
            host: limits(720, 720),
            now: at(NOW),
        };
        let opts = SignSshOptions::default();
        let mut cert = host_cert();
        cert.valid_after = NOW as u64;
        cert.valid_before = (NOW + 3600) as u64;
        assert!(v.valid(&cert, &opts).is_ok());

        cert.valid_before = (NOW + 60) as u64;
        assert_matches!(v.valid(&cert, &opts), Err(MeshcaError::Forbidden { .. }));

        cert.valid_before = (NOW + 721 * 3600) as u64;
        assert_matches!(v.valid(&cert, &opts), Err(MeshcaError::Forbidden { .. }));

        cert.valid_after = 0;
        assert_matches!(v.valid(&cert, &opts), Err(MeshcaError::BadRequest { .. }));
    }

    #[test]
    fn test_public_key() {
        let v = SshDefaultPublicKeyValidator;
        let opts = SignSshOptions::default();
        let mut cert = host_cert();
        assert_matches!(v.valid(&cert, &opts), Err(MeshcaError::BadRequest { .. }));
        cert.key = Some(SshPublicKey::Rsa { bits: 1024 });
        assert_matches!(v.valid(&cert, &opts), Err(MeshcaError::Forbidden { .. }));
        cert.key = Some(SshPublicKey::Dsa);
        assert_matches!(v.valid(&cert, &opts), Err(MeshcaError::BadRequest { .. }));
        cert.key = Some(SshPublicKey::Ed25519(vec![1; 32]));
        assert!(v.valid(&cert, &opts).is_ok());
    }

    #[test]
    fn test_default_validator_requires_signature() {
        let v = SshCertDefaultValidator { now: at(NOW) };
        let mut cert = SshCertificate {
            nonce: vec![1; 16],
            key: Some(SshPublicKey::Ed25519(vec![1; 32])),
            serial: 42,
            cert_type: Some(SshCertType::Host),
            key_id: "node-7".into(),
            principals: vec!["node-7".into()],
            valid_after: NOW as u64,
            valid_before: (NOW + 3600) as u64,
            signature_key: Some(SshPublicKey::Ed25519(vec![2; 32])),
            ..SshCertificate::default()
        };
        assert_matches!(
            v.valid(&cert, &SignSshOptions::default()),
            Err(MeshcaError::BadRequest { message }) if message.contains("signature")
        );
        cert.signature = Some(vec![3; 64]);
        assert!(v.valid(&cert, &SignSshOptions::default()).is_ok());
    }

    #[test]
    fn test_options_validator() {
        let v = SshCertOptionsValidator(SignSshOptions {
            cert_type: "host".into(),
            ..SignSshOptions::default()
        });
        let got = SignSshOptions {
            cert_type: "user".into(),
            ..SignSshOptions::default()
        };
        assert_matches!(v.valid(&got), Err(MeshcaError::Forbidden { .. }));
    }
}
