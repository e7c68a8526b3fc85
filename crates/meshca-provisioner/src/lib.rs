//! # meshca-provisioner
//!
//! Lets nodes of a Nebula mesh obtain X.509 and SSH host certificates from
//! the authority by presenting a token signed with their mesh certificate.
//!
//! Authorization turns a token into an ordered list of
//! [`SignOption`](sign_options::SignOption)s: a template, modifiers that shape
//! the certificate, and validators that confine it to the identity the mesh
//! certificate asserts. The signing engine applies them; [`pipeline`] does the
//! same for callers that want to see the result.

pub mod audiences;
pub mod claimer;
pub mod config;
pub mod nebula;
pub mod pipeline;
pub mod provisioner;
pub mod sign_options;
pub mod ssh;
pub mod template;
pub mod token;
pub mod validators;
pub mod x509;

pub use audiences::{matches_audience, Audiences};
pub use claimer::{Claimer, DurationLimits};
pub use config::{Claims, GlobalConfig, Options, ProvisionerConfig, TemplateConfig};
pub use nebula::{AuthorizedToken, Nebula};
pub use provisioner::{Interface, Provisioner, ProvisionerType};
pub use sign_options::{SignOption, SignOptionKind};
pub use ssh::{SignSshOptions, SshCertType, SshCertificate, SshPublicKey};
pub use token::{TokenError, TokenPayload, NEBULA_CERT_HEADER};
pub use x509::{Certificate, CertificateRequest, PublicKey, SignOptions};
