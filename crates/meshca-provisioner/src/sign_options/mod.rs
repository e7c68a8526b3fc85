//! Sign options
//!
//! Authorization returns an ordered list of [`SignOption`]s that the signing
//! engine applies to the certificate it is about to issue. Each option is a
//! self-contained value: everything it checks or changes comes from its own
//! fields plus the request it is handed.

mod ssh;
mod x509;

pub use ssh::{
    SshCertDefaultValidator, SshCertOptionsValidator, SshCertValidAfterModifier,
    SshCertValidBeforeModifier, SshCertValidityValidator, SshDefaultPublicKeyValidator,
    SshLimitDuration,
};
pub use x509::{
    CommonNameValidator, DefaultPublicKeyValidator, DnsNamesValidator, EmailAddressesValidator,
    ProfileLimitDuration, ProvisionerExtensionOption, UrisValidator, ValidityValidator,
};

use crate::ssh::{SignSshOptions, SshCertificate};
use crate::template::{SshTemplateOptions, TemplateOptions};
use crate::validators::{NebulaPrincipalsValidator, NebulaSansValidator};
use crate::x509::{Certificate, CertificateRequest, SignOptions};
use meshca_core::Result;

/// Validates a certificate request before anything is built
pub trait CertificateRequestValidator {
    /// Accept or reject the request
    fn valid(&self, csr: &CertificateRequest) -> Result<()>;
}

/// Shapes an X.509 certificate under construction
pub trait CertificateModifier {
    /// Change `cert` given the caller's options
    fn modify(&self, cert: &mut Certificate, opts: &SignOptions) -> Result<()>;
}

/// Validates a shaped X.509 certificate
pub trait CertificateValidator {
    /// Accept or reject the certificate
    fn valid(&self, cert: &Certificate, opts: &SignOptions) -> Result<()>;
}

/// Validates the options an SSH caller asked for
pub trait SshCertificateOptionsValidator {
    /// Accept or reject the requested options
    fn valid(&self, got: &SignSshOptions) -> Result<()>;
}

/// Shapes an SSH certificate under construction
pub trait SshCertificateModifier {
    /// Change `cert` given the caller's options
    fn modify(&self, cert: &mut SshCertificate, opts: &SignSshOptions) -> Result<()>;
}

/// Validates a signed SSH certificate
pub trait SshCertificateValidator {
    /// Accept or reject the certificate
    fn valid(&self, cert: &SshCertificate, opts: &SignSshOptions) -> Result<()>;
}

/// Role an option plays in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignOptionKind {
    /// Supplies the template and its data
    TemplateSource,
    /// Changes the certificate
    Modifier,
    /// Accepts or rejects
    Validator,
}

/// One pipeline element
#[derive(Debug, Clone, PartialEq)]
pub enum SignOption {
    // X.509
    Template(TemplateOptions),
    ProvisionerExtension(ProvisionerExtensionOption),
    ProfileLimitDuration(ProfileLimitDuration),
    CommonName(CommonNameValidator),
    NebulaSans(NebulaSansValidator),
    DnsNames(DnsNamesValidator),
    EmailAddresses(EmailAddressesValidator),
    Uris(UrisValidator),
    DefaultPublicKey(DefaultPublicKeyValidator),
    Validity(ValidityValidator),

    // SSH
    SshTemplate(SshTemplateOptions),
    SshCertOptions(SshCertOptionsValidator),
    NebulaPrincipals(NebulaPrincipalsValidator),
    SshValidAfter(SshCertValidAfterModifier),
    SshValidBefore(SshCertValidBeforeModifier),
    SshLimitDuration(SshLimitDuration),
    SshDefaultPublicKey(SshDefaultPublicKeyValidator),
    SshValidity(SshCertValidityValidator),
    SshDefault(SshCertDefaultValidator),
}

impl SignOption {
    /// Pipeline role
    pub fn kind(&self) -> SignOptionKind {
        match self {
            Self::Template(_) | Self::SshTemplate(_) => SignOptionKind::TemplateSource,
            Self::ProvisionerExtension(_)
            | Self::ProfileLimitDuration(_)
            | Self::SshValidAfter(_)
            | Self::SshValidBefore(_)
            | Self::SshLimitDuration(_) => SignOptionKind::Modifier,
            _ => SignOptionKind::Validator,
        }
    }

    /// Short name, used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Template(_) => "template",
            Self::ProvisionerExtension(_) => "provisioner-extension",
            Self::ProfileLimitDuration(_) => "profile-limit-duration",
            Self::CommonName(_) => "common-name",
            Self::NebulaSans(_) => "nebula-sans",
            Self::DnsNames(_) => "dns-names",
            Self::EmailAddresses(_) => "email-addresses",
            Self::Uris(_) => "uris",
            Self::DefaultPublicKey(_) => "default-public-key",
            Self::Validity(_) => "validity",
            Self::SshTemplate(_) => "ssh-template",
            Self::SshCertOptions(_) => "ssh-cert-options",
            Self::NebulaPrincipals(_) => "nebula-principals",
            Self::SshValidAfter(_) => "ssh-valid-after",
            Self::SshValidBefore(_) => "ssh-valid-before",
            Self::SshLimitDuration(_) => "ssh-limit-duration",
            Self::SshDefaultPublicKey(_) => "ssh-default-public-key",
            Self::SshValidity(_) => "ssh-validity",
            Self::SshDefault(_) => "ssh-default",
        }
    }

    /// X.509 template, if this is one
    pub fn as_template(&self) -> Option<&TemplateOptions> {
        match self {
            Self::Template(t) => Some(t),
            _ => None,
        }
    }

    /// SSH template, if this is one
    pub fn as_ssh_template(&self) -> Option<&SshTemplateOptions> {
        match self {
            Self::SshTemplate(t) => Some(t),
            _ => None,
        }
    }

    /// Request validator view
    pub fn as_request_validator(&self) -> Option<&dyn CertificateRequestValidator> {
        match self {
            Self::CommonName(v) => Some(v),
            Self::NebulaSans(v) => Some(v),
            Self::DnsNames(v) => Some(v),
            Self::EmailAddresses(v) => Some(v),
            Self::Uris(v) => Some(v),
            Self::DefaultPublicKey(v) => Some(v),
            _ => None,
        }
    }

    /// X.509 modifier view
    pub fn as_modifier(&self) -> Option<&dyn CertificateModifier> {
        match self {
            Self::ProvisionerExtension(m) => Some(m),
            Self::ProfileLimitDuration(m) => Some(m),
            _ => None,
        }
    }

    /// X.509 certificate validator view
    pub fn as_certificate_validator(&self) -> Option<&dyn CertificateValidator> {
        match self {
            Self::Validity(v) => Some(v),
            _ => None,
        }
    }

    /// SSH options validator view
    pub fn as_ssh_options_validator(&self) -> Option<&dyn SshCertificateOptionsValidator> {
        match self {
            Self::SshCertOptions(v) => Some(v),
            Self::NebulaPrincipals(v) => Some(v),
            _ => None,
        }
    }

    /// SSH modifier view
    pub fn as_ssh_modifier(&self) -> Option<&dyn SshCertificateModifier> {
        match self {
            Self::SshValidAfter(m) => Some(m),
            Self::SshValidBefore(m) => Some(m),
            Self::SshLimitDuration(m) => Some(m),
            _ => None,
        }
    }

    /// SSH certificate validator view
    pub fn as_ssh_validator(&self) -> Option<&dyn SshCertificateValidator> {
        match self {
            Self::SshDefaultPublicKey(v) => Some(v),
            Self::SshValidity(v) => Some(v),
            Self::SshDefault(v) => Some(v),
            _ => None,
        }
    }
}
