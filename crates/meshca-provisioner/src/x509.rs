//! X.509 request model
//!
//! The signing engine parses the CSR; provisioners only need the subject,
//! the alternative names and the key type, so that is all this models.

use crate::provisioner::ProvisionerType;
use chrono::{DateTime, Duration, Utc};
use meshca_core::TimeDuration;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use url::Url;

/// Public key found in a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    /// Ed25519 key
    Ed25519,
    /// ECDSA key on a named curve
    Ecdsa {
        /// Curve name, e.g. P-256
        curve: String,
    },
    /// RSA key
    Rsa {
        /// Modulus size in bits
        bits: usize,
    },
    /// Any other key algorithm
    Unsupported(String),
}

impl PublicKey {
    /// Whether this is an RSA key
    pub fn is_rsa(&self) -> bool {
        matches!(self, Self::Rsa { .. })
    }
}

/// A parsed certificate signing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub common_name: String,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub email_addresses: Vec<String>,
    pub uris: Vec<String>,
    pub public_key: PublicKey,
}

impl CertificateRequest {
    /// A request for `common_name` with SANs in their string form
    pub fn new(common_name: impl Into<String>, sans: &[String], public_key: PublicKey) -> Self {
        let split = split_sans(sans);
        Self {
            common_name: common_name.into(),
            dns_names: split.dns_names,
            ip_addresses: split.ips,
            email_addresses: split.emails,
            uris: split.uris,
            public_key,
        }
    }
}

/// Identity of the provisioner that authorized a certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionerExtension {
    pub provisioner_type: ProvisionerType,
    pub name: String,
    pub credential_id: String,
}

/// X.509 certificate under construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub common_name: String,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub email_addresses: Vec<String>,
    pub uris: Vec<String>,
    pub key_usage: Vec<String>,
    pub ext_key_usage: Vec<String>,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    pub public_key: PublicKey,
    pub provisioner: Option<ProvisionerExtension>,
}

impl Certificate {
    /// An empty certificate for the request's key
    pub fn for_request(csr: &CertificateRequest) -> Self {
        Self {
            common_name: String::new(),
            dns_names: Vec::new(),
            ip_addresses: Vec::new(),
            email_addresses: Vec::new(),
            uris: Vec::new(),
            key_usage: Vec::new(),
            ext_key_usage: Vec::new(),
            not_before: None,
            not_after: None,
            public_key: csr.public_key.clone(),
            provisioner: None,
        }
    }
}

/// Validity requested alongside a CSR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignOptions {
    pub not_before: TimeDuration,
    pub not_after: TimeDuration,
    /// How far notBefore is moved into the past
    pub backdate: Duration,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            not_before: TimeDuration::Zero,
            not_after: TimeDuration::Zero,
            backdate: Duration::zero(),
        }
    }
}

/// Kind of subject alternative name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SanType {
    Dns,
    Ip,
    Email,
    Uri,
}

/// Typed subject alternative name as exposed to templates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectAlternativeName {
    #[serde(rename = "type")]
    pub san_type: SanType,
    pub value: String,
}

/// SANs sorted by kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitSans {
    pub dns_names: Vec<String>,
    pub ips: Vec<IpAddr>,
    pub emails: Vec<String>,
    pub uris: Vec<String>,
}

fn classify(san: &str) -> SanType {
    if san.parse::<IpAddr>().is_ok() {
        SanType::Ip
    } else if Url::parse(san).is_ok() {
        SanType::Uri
    } else if san.contains('@') {
        SanType::Email
    } else {
        SanType::Dns
    }
}

/// Sort SAN strings into DNS names, IPs, emails and URIs
pub fn split_sans(sans: &[String]) -> SplitSans {
    let mut split = SplitSans::default();
    for san in sans {
        match classify(san) {
            SanType::Ip => {
                if let Ok(ip) = san.parse() {
                    split.ips.push(ip);
                }
            }
            SanType::Uri => split.uris.push(san.clone()),
            SanType::Email => split.emails.push(san.clone()),
            SanType::Dns => split.dns_names.push(san.clone()),
        }
    }
    split
}

/// Typed SANs for template data
pub fn create_sans(sans: &[String]) -> Vec<SubjectAlternativeName> {
    sans.iter()
        .map(|san| SubjectAlternativeName {
            san_type: classify(san),
            value: san.clone(),
        })
        .collect()
}
