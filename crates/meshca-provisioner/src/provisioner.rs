//! Provisioner kinds and their shared operation set

use crate::config::{GlobalConfig, ProvisionerConfig};
use crate::nebula::Nebula;
use crate::sign_options::SignOption;
use crate::ssh::SshCertificate;
use crate::x509::Certificate;
use meshca_core::{MeshcaError, PhysicalClock, Result, SystemClock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Kind of provisioner, as recorded in the provisioner extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProvisionerType {
    #[serde(rename = "JWK")]
    Jwk,
    #[serde(rename = "OIDC")]
    Oidc,
    #[serde(rename = "GCP")]
    Gcp,
    #[serde(rename = "AWS")]
    Aws,
    Azure,
    #[serde(rename = "ACME")]
    Acme,
    #[serde(rename = "X5C")]
    X5c,
    #[serde(rename = "K8sSA")]
    K8sSa,
    #[serde(rename = "SSHPOP")]
    SshPop,
    #[serde(rename = "SCEP")]
    Scep,
    Nebula,
}

impl ProvisionerType {
    const ALL: [Self; 11] = [
        Self::Jwk,
        Self::Oidc,
        Self::Gcp,
        Self::Aws,
        Self::Azure,
        Self::Acme,
        Self::X5c,
        Self::K8sSa,
        Self::SshPop,
        Self::Scep,
        Self::Nebula,
    ];

    /// Numeric value stored in the provisioner extension
    pub fn code(self) -> u8 {
        match self {
            Self::Jwk => 1,
            Self::Oidc => 2,
            Self::Gcp => 3,
            Self::Aws => 4,
            Self::Azure => 5,
            Self::Acme => 6,
            Self::X5c => 7,
            Self::K8sSa => 8,
            Self::SshPop => 9,
            Self::Scep => 10,
            Self::Nebula => 11,
        }
    }

    /// Configuration tag
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jwk => "JWK",
            Self::Oidc => "OIDC",
            Self::Gcp => "GCP",
            Self::Aws => "AWS",
            Self::Azure => "Azure",
            Self::Acme => "ACME",
            Self::X5c => "X5C",
            Self::K8sSa => "K8sSA",
            Self::SshPop => "SSHPOP",
            Self::Scep => "SCEP",
            Self::Nebula => "Nebula",
        }
    }

    /// Parse a configuration tag, ignoring case
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(tag))
    }
}

impl fmt::Display for ProvisionerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations every provisioner kind offers the authority
pub trait Interface {
    /// Stable identifier
    fn get_id(&self) -> &str;
    /// Identifier used to scope token audiences
    fn get_id_for_token(&self) -> String;
    /// The `jti` of a token, read without verification
    fn get_token_id(&self, token: &str) -> Result<String>;
    /// Configured name
    fn get_name(&self) -> &str;
    /// Provisioner kind
    fn get_type(&self) -> ProvisionerType;
    /// Key id and encrypted key, for kinds that publish one
    fn get_encrypted_key(&self) -> Option<(String, String)>;

    /// Authorize an X.509 sign request
    fn authorize_sign(&self, token: &str) -> Result<Vec<SignOption>>;
    /// Authorize an SSH sign request
    fn authorize_ssh_sign(&self, token: &str) -> Result<Vec<SignOption>>;
    /// Authorize renewal of an X.509 certificate
    fn authorize_renew(&self, cert: &Certificate) -> Result<()>;
    /// Authorize revocation of an X.509 certificate
    fn authorize_revoke(&self, token: &str) -> Result<()>;
    /// Authorize revocation of an SSH certificate
    fn authorize_ssh_revoke(&self, token: &str) -> Result<()>;
    /// Authorize renewal of an SSH certificate
    fn authorize_ssh_renew(&self, token: &str) -> Result<SshCertificate>;
    /// Authorize rekeying of an SSH certificate
    fn authorize_ssh_rekey(&self, token: &str) -> Result<(SshCertificate, Vec<SignOption>)>;
}

/// A configured provisioner of any supported kind
#[derive(Debug)]
pub enum Provisioner {
    /// Nebula mesh provisioner
    Nebula(Nebula),
}

impl Provisioner {
    /// Start the provisioner named by the configuration's type tag
    pub fn init(config: ProvisionerConfig, global: &GlobalConfig) -> Result<Self> {
        Self::init_with_clock(config, global, Arc::new(SystemClock))
    }

    /// Start the provisioner with an explicit clock
    pub fn init_with_clock(
        config: ProvisionerConfig,
        global: &GlobalConfig,
        clock: Arc<dyn PhysicalClock>,
    ) -> Result<Self> {
        match ProvisionerType::from_tag(&config.provisioner_type) {
            Some(ProvisionerType::Nebula) => {
                Nebula::init_with_clock(config, global, clock).map(Self::Nebula)
            }
            Some(other) => Err(MeshcaError::config(format!(
                "provisioner type {other} is not supported"
            ))),
            None if config.provisioner_type.is_empty() => {
                Err(MeshcaError::config("provisioner.type cannot be empty"))
            }
            None => Err(MeshcaError::config(format!(
                "unknown provisioner type {}",
                config.provisioner_type
            ))),
        }
    }

    fn inner(&self) -> &dyn Interface {
        match self {
            Self::Nebula(p) => p,
        }
    }
}

impl Interface for Provisioner {
    fn get_id(&self) -> &str {
        self.inner().get_id()
    }

    fn get_id_for_token(&self) -> String {
        self.inner().get_id_for_token()
    }

    fn get_token_id(&self, token: &str) -> Result<String> {
        self.inner().get_token_id(token)
    }

    fn get_name(&self) -> &str {
        self.inner().get_name()
    }

    fn get_type(&self) -> ProvisionerType {
        self.inner().get_type()
    }

    fn get_encrypted_key(&self) -> Option<(String, String)> {
        self.inner().get_encrypted_key()
    }

    fn authorize_sign(&self, token: &str) -> Result<Vec<SignOption>> {
        self.inner().authorize_sign(token)
    }

    fn authorize_ssh_sign(&self, token: &str) -> Result<Vec<SignOption>> {
        self.inner().authorize_ssh_sign(token)
    }

    fn authorize_renew(&self, cert: &Certificate) -> Result<()> {
        self.inner().authorize_renew(cert)
    }

    fn authorize_revoke(&self, token: &str) -> Result<()> {
        self.inner().authorize_revoke(token)
    }

    fn authorize_ssh_revoke(&self, token: &str) -> Result<()> {
        self.inner().authorize_ssh_revoke(token)
    }

    fn authorize_ssh_renew(&self, token: &str) -> Result<SshCertificate> {
        self.inner().authorize_ssh_renew(token)
    }

    fn authorize_ssh_rekey(&self, token: &str) -> Result<(SshCertificate, Vec<SignOption>)> {
        self.inner().authorize_ssh_rekey(token)
    }
}
