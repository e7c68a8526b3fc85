//! X.509 modifiers and validators

use super::{CertificateModifier, CertificateRequestValidator, CertificateValidator};
use crate::provisioner::ProvisionerType;
use crate::x509::{Certificate, CertificateRequest, ProvisionerExtension, PublicKey, SignOptions};
use chrono::{DateTime, Duration, Utc};
use meshca_core::time::format_duration;
use meshca_core::{MeshcaError, Result};

/// Tags the certificate with the authorizing provisioner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionerExtensionOption {
    pub provisioner_type: ProvisionerType,
    pub name: String,
    pub credential_id: String,
}

impl ProvisionerExtensionOption {
    /// Extension naming `name` with no credential id
    pub fn new(provisioner_type: ProvisionerType, name: impl Into<String>) -> Self {
        Self {
            provisioner_type,
            name: name.into(),
            credential_id: String::new(),
        }
    }
}

impl CertificateModifier for ProvisionerExtensionOption {
    fn modify(&self, cert: &mut Certificate, _opts: &SignOptions) -> Result<()> {
        cert.provisioner = Some(ProvisionerExtension {
            provisioner_type: self.provisioner_type,
            name: self.name.clone(),
            credential_id: self.credential_id.clone(),
        });
        Ok(())
    }
}

/// Sets the validity window, keeping it inside the credential's own window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileLimitDuration {
    /// Validity when the caller does not ask for a notAfter
    pub default: Duration,
    /// Credential notBefore
    pub not_before: DateTime<Utc>,
    /// Credential notAfter
    pub not_after: DateTime<Utc>,
    /// Reference time captured at authorization
    pub now: DateTime<Utc>,
}

impl CertificateModifier for ProfileLimitDuration {
    fn modify(&self, cert: &mut Certificate, opts: &SignOptions) -> Result<()> {
        let (not_before, backdate) = match opts.not_before.relative_time(self.now) {
            Some(t) => (t, Duration::zero()),
            None => (self.now, opts.backdate),
        };
        if not_before < self.not_before {
            return Err(MeshcaError::forbidden(format!(
                "requested certificate notBefore ({not_before}) is before the active validity window of the provisioning credential ({})",
                self.not_before
            )));
        }

        let not_after = match opts.not_after.relative_time(not_before) {
            Some(t) if t > self.not_after => {
                return Err(MeshcaError::forbidden(format!(
                    "requested certificate notAfter ({t}) is after the expiration of the provisioning credential ({})",
                    self.not_after
                )));
            }
            Some(t) => t,
            None => (not_before + self.default).min(self.not_after),
        };

        cert.not_before = Some(not_before - backdate);
        cert.not_after = Some(not_after);
        Ok(())
    }
}

/// The request's common name must equal the token subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonNameValidator(pub String);

impl CommonNameValidator {
    /// Expect `common_name`
    pub fn new(common_name: impl Into<String>) -> Self {
        Self(common_name.into())
    }
}

impl CertificateRequestValidator for CommonNameValidator {
    fn valid(&self, csr: &CertificateRequest) -> Result<()> {
        if csr.common_name.is_empty() {
            return Err(MeshcaError::bad_request(
                "certificate request cannot contain an empty common name",
            ));
        }
        if csr.common_name != self.0 {
            return Err(MeshcaError::forbidden(format!(
                "certificate request does not contain the valid common name - got {}, want {}",
                csr.common_name, self.0
            )));
        }
        Ok(())
    }
}

fn check_subset(kind: &str, requested: &[String], allowed: &[String]) -> Result<()> {
    if requested.iter().all(|r| allowed.contains(r)) {
        return Ok(());
    }
    Err(MeshcaError::forbidden(format!(
        "certificate request contains unauthorized {kind} - got {requested:?}, allowed {allowed:?}"
    )))
}

/// Requested DNS names must all be allowed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsNamesValidator(pub Vec<String>);

impl CertificateRequestValidator for DnsNamesValidator {
    fn valid(&self, csr: &CertificateRequest) -> Result<()> {
        check_subset("DNS names", &csr.dns_names, &self.0)
    }
}

/// Requested email addresses must all be allowed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddressesValidator(pub Vec<String>);

impl CertificateRequestValidator for EmailAddressesValidator {
    fn valid(&self, csr: &CertificateRequest) -> Result<()> {
        check_subset("email addresses", &csr.email_addresses, &self.0)
    }
}

/// Requested URIs must all be allowed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrisValidator(pub Vec<String>);

impl CertificateRequestValidator for UrisValidator {
    fn valid(&self, csr: &CertificateRequest) -> Result<()> {
        check_subset("URIs", &csr.uris, &self.0)
    }
}

/// Rejects weak or unknown request keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultPublicKeyValidator;

impl CertificateRequestValidator for DefaultPublicKeyValidator {
    fn valid(&self, csr: &CertificateRequest) -> Result<()> {
        match &csr.public_key {
            PublicKey::Rsa { bits } if *bits < 2048 => Err(MeshcaError::forbidden(
                "certificate request RSA key must be at least 2048 bits (256 bytes)",
            )),
            PublicKey::Unsupported(kind) => Err(MeshcaError::bad_request(format!(
                "certificate request key of type '{kind}' is not supported"
            ))),
            _ => Ok(()),
        }
    }
}

/// Enforces the configured X.509 validity bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityValidator {
    pub min: Duration,
    pub max: Duration,
    /// Reference time captured at authorization
    pub now: DateTime<Utc>,
}

impl CertificateValidator for ValidityValidator {
    fn valid(&self, cert: &Certificate, opts: &SignOptions) -> Result<()> {
        let (Some(nb), Some(na)) = (cert.not_before, cert.not_after) else {
            return Err(MeshcaError::bad_request("certificate validity has not been set"));
        };
        // Whole seconds, as they will be encoded
        let (nb, na, now) = (nb.timestamp(), na.timestamp(), self.now.timestamp());
        if na < now {
            return Err(MeshcaError::bad_request("notAfter cannot be in the past"));
        }
        if na < nb {
            return Err(MeshcaError::bad_request("notAfter cannot be before notBefore"));
        }
        let d = Duration::seconds(na - nb);
        if d < self.min {
            return Err(MeshcaError::forbidden(format!(
                "requested duration of {} is less than the authorized minimum certificate duration of {}",
                format_duration(d),
                format_duration(self.min)
            )));
        }
        // Backdated certificates may exceed the maximum by the backdate
        if d > self.max + opts.backdate {
            return Err(MeshcaError::forbidden(format!(
                "requested duration of {} is more than the authorized maximum certificate duration of {}",
                format_duration(d),
                format_duration(self.max + opts.backdate)
            )));
        }
        Ok(())
    }
}
