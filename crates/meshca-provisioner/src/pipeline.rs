//! Applying sign options
//!
//! The signing engine walks the options in a fixed order: request
//! validators, the template, modifiers in list order, then certificate
//! validators. These helpers do the same so callers and tests see exactly
//! what the engine would produce, minus the signature.

use crate::sign_options::SignOption;
use crate::ssh::{SignSshOptions, SshCertificate};
use crate::x509::{Certificate, CertificateRequest, SignOptions};
use meshca_core::Result;
use tracing::debug;

/// Shape and validate an X.509 certificate for `csr`
pub fn apply_x509(options: &[SignOption], csr: &CertificateRequest, opts: &SignOptions) -> Result<Certificate> {
    for v in options.iter().filter_map(SignOption::as_request_validator) {
        v.valid(csr)?;
    }

    let mut cert = Certificate::for_request(csr);
    for template in options.iter().filter_map(SignOption::as_template) {
        template.apply(csr, &mut cert)?;
    }
    for m in options.iter().filter_map(SignOption::as_modifier) {
        m.modify(&mut cert, opts)?;
    }
    for v in options.iter().filter_map(SignOption::as_certificate_validator) {
        v.valid(&cert, opts)?;
    }

    debug!(common_name = %cert.common_name, options = options.len(), "applied x509 sign options");
    Ok(cert)
}

/// Check the requested SSH options and shape an unsigned certificate
pub fn apply_ssh(
    sign_options: &[SignOption],
    requested: &SignSshOptions,
    mut cert: SshCertificate,
) -> Result<SshCertificate> {
    for v in sign_options.iter().filter_map(SignOption::as_ssh_options_validator) {
        v.valid(requested)?;
    }
    for template in sign_options.iter().filter_map(SignOption::as_ssh_template) {
        template.apply(&mut cert)?;
    }
    for m in sign_options.iter().filter_map(SignOption::as_ssh_modifier) {
        m.modify(&mut cert, requested)?;
    }

    debug!(key_id = %cert.key_id, options = sign_options.len(), "applied ssh sign options");
    Ok(cert)
}

/// Validate a signed SSH certificate
pub fn validate_ssh(sign_options: &[SignOption], cert: &SshCertificate, opts: &SignSshOptions) -> Result<()> {
    for v in sign_options.iter().filter_map(SignOption::as_ssh_validator) {
        v.valid(cert, opts)?;
    }
    Ok(())
}
