//! SSH certificate request model
//!
//! [`SshCertificate`] is the certificate under construction as the signing
//! engine shapes it; [`SignSshOptions`] are the bounds a caller asks for and
//! the bounds a token pins.

use chrono::{DateTime, Duration, Utc};
use meshca_core::{MeshcaError, Result, TimeDuration};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Option value for user certificates
pub const SSH_USER_CERT: &str = "user";
/// Option value for host certificates
pub const SSH_HOST_CERT: &str = "host";

/// SSH certificate type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SshCertType {
    /// Authenticates a user to hosts
    User,
    /// Authenticates a host to users
    Host,
}

impl SshCertType {
    /// Wire value, 1 for user and 2 for host
    pub fn code(self) -> u32 {
        match self {
            Self::User => 1,
            Self::Host => 2,
        }
    }

    /// Option string form
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => SSH_USER_CERT,
            Self::Host => SSH_HOST_CERT,
        }
    }

    /// Parse the option string form
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            SSH_USER_CERT => Some(Self::User),
            SSH_HOST_CERT => Some(Self::Host),
            _ => None,
        }
    }
}

impl fmt::Display for SshCertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public key carried by an SSH certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SshPublicKey {
    /// ssh-ed25519
    Ed25519(Vec<u8>),
    /// ecdsa-sha2-*
    Ecdsa {
        /// Curve name, e.g. nistp256
        curve: String,
    },
    /// ssh-rsa
    Rsa {
        /// Modulus size in bits
        bits: usize,
    },
    /// ssh-dss
    Dsa,
}

/// SSH certificate under construction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SshCertificate {
    pub nonce: Vec<u8>,
    pub key: Option<SshPublicKey>,
    pub serial: u64,
    pub cert_type: Option<SshCertType>,
    pub key_id: String,
    pub principals: Vec<String>,
    /// Unix seconds; 0 when unset
    pub valid_after: u64,
    /// Unix seconds; 0 when unset
    pub valid_before: u64,
    pub critical_options: BTreeMap<String, String>,
    pub extensions: BTreeMap<String, String>,
    pub signature_key: Option<SshPublicKey>,
    pub signature: Option<Vec<u8>>,
}

/// Requested or pinned SSH certificate options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignSshOptions {
    /// "user", "host" or empty
    #[serde(default)]
    pub cert_type: String,
    #[serde(rename = "keyID", default)]
    pub key_id: String,
    #[serde(default)]
    pub principals: Vec<String>,
    #[serde(default, skip_serializing_if = "TimeDuration::is_zero")]
    pub valid_after: TimeDuration,
    #[serde(default, skip_serializing_if = "TimeDuration::is_zero")]
    pub valid_before: TimeDuration,
    /// Caller supplied template data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_data: Option<serde_json::Value>,
    /// How far validAfter is moved into the past; never read from JSON
    #[serde(skip, default = "Duration::zero")]
    pub backdate: Duration,
}

impl Default for SignSshOptions {
    fn default() -> Self {
        Self {
            cert_type: String::new(),
            key_id: String::new(),
            principals: Vec::new(),
            valid_after: TimeDuration::Zero,
            valid_before: TimeDuration::Zero,
            template_data: None,
            backdate: Duration::zero(),
        }
    }
}

impl SignSshOptions {
    /// Check that `got` stays within these options
    ///
    /// Each field is only compared when both sides set it. Requested
    /// principals must be a subset of ours.
    pub fn matches(&self, got: &SignSshOptions) -> Result<()> {
        if !self.cert_type.is_empty() && !got.cert_type.is_empty() && self.cert_type != got.cert_type {
            return Err(MeshcaError::forbidden(format!(
                "ssh certificate type does not match - got {}, want {}",
                got.cert_type, self.cert_type
            )));
        }
        if !self.principals.is_empty()
            && !got.principals.is_empty()
            && !got.principals.iter().all(|p| self.principals.contains(p))
        {
            return Err(MeshcaError::forbidden(format!(
                "ssh certificate principals does not match - got {:?}, want {:?}",
                got.principals, self.principals
            )));
        }
        if !self.valid_after.is_zero() && !got.valid_after.is_zero() && self.valid_after != got.valid_after {
            return Err(MeshcaError::forbidden(format!(
                "ssh certificate validAfter does not match - got {}, want {}",
                describe(&got.valid_after),
                describe(&self.valid_after)
            )));
        }
        if !self.valid_before.is_zero() && !got.valid_before.is_zero() && self.valid_before != got.valid_before {
            return Err(MeshcaError::forbidden(format!(
                "ssh certificate validBefore does not match - got {}, want {}",
                describe(&got.valid_before),
                describe(&self.valid_before)
            )));
        }
        Ok(())
    }

    /// Parsed certificate type, if set
    pub fn cert_type(&self) -> Option<SshCertType> {
        SshCertType::parse(&self.cert_type)
    }
}

fn describe(value: &TimeDuration) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Unix seconds for a certificate bound
pub(crate) fn unix_seconds(at: DateTime<Utc>) -> u64 {
    u64::try_from(at.timestamp()).unwrap_or(0)
}

/// Certificate bound as a timestamp
pub(crate) fn from_unix_seconds(secs: u64) -> DateTime<Utc> {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn opts(cert_type: &str, principals: &[&str]) -> SignSshOptions {
        SignSshOptions {
            cert_type: cert_type.into(),
            principals: principals.iter().map(|p| p.to_string()).collect(),
            ..SignSshOptions::default()
        }
    }

    #[test]
    fn test_options_from_json() {
        let json = r#"{"certType":"host","keyID":"node-7","principals":["node-7"],"validAfter":"-5m"}"#;
        let parsed: SignSshOptions = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.cert_type(), Some(SshCertType::Host));
        assert_eq!(parsed.key_id, "node-7");
        assert_eq!(parsed.valid_after, TimeDuration::Relative(Duration::minutes(-5)));
        assert!(parsed.valid_before.is_zero());
        assert!(parsed.backdate.is_zero());
    }

    #[test]
    fn test_matches_compares_only_set_fields() {
        let pinned = opts("host", &["node-7", "10.0.0.7"]);
        assert!(pinned.matches(&opts("", &[])).is_ok());
        assert!(pinned.matches(&opts("host", &["node-7"])).is_ok());
        assert_matches!(pinned.matches(&opts("user", &[])), Err(MeshcaError::Forbidden { .. }));
        assert_matches!(
            pinned.matches(&opts("", &["node-7", "node-9"])),
            Err(MeshcaError::Forbidden { .. })
        );
    }

    #[test]
    fn test_matches_validity() {
        let pinned = SignSshOptions {
            valid_before: TimeDuration::Relative(Duration::hours(1)),
            ..SignSshOptions::default()
        };
        let same = pinned.clone();
        let other = SignSshOptions {
            valid_before: TimeDuration::Relative(Duration::hours(2)),
            ..SignSshOptions::default()
        };
        assert!(pinned.matches(&same).is_ok());
        assert_matches!(pinned.matches(&other), Err(MeshcaError::Forbidden { .. }));
    }

    #[test]
    fn test_cert_type_codes() {
        assert_eq!(SshCertType::User.code(), 1);
        assert_eq!(SshCertType::Host.code(), 2);
        assert_eq!(SshCertType::parse("host"), Some(SshCertType::Host));
        assert_eq!(SshCertType::parse("HOST"), None);
    }
}
