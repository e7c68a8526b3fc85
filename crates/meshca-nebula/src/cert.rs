//! Mesh certificates
//!
//! Decoded form of the v1 certificate format: identity name, overlay
//! networks, groups, validity window, curve25519 public key and the CA
//! signature over the marshaled details.

use crate::error::{NebulaError, Result};
use crate::net::Ipv4Net;
use crate::pem;
use crate::wire::{Curve, RawNebulaCertificate, RawNebulaCertificateDetails};
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use prost::Message;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// PEM label of an encoded mesh certificate
pub const CERTIFICATE_BANNER: &str = "NEBULA CERTIFICATE";

/// The signed fields of a mesh certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NebulaCertificateDetails {
    /// Identity name of the node or authority
    pub name: String,
    /// Overlay addresses assigned to the node
    pub ips: Vec<Ipv4Net>,
    /// Networks the node may route for
    pub subnets: Vec<Ipv4Net>,
    /// Group memberships
    pub groups: Vec<String>,
    /// Start of the validity window
    pub not_before: DateTime<Utc>,
    /// End of the validity window
    pub not_after: DateTime<Utc>,
    /// Raw public key: Ed25519 for authorities, X25519 for leaves
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
    /// Whether this certificate belongs to an authority
    #[serde(rename = "isCa")]
    pub is_ca: bool,
    /// Raw fingerprint of the issuer; empty for roots
    #[serde(with = "hex_bytes")]
    pub issuer: Vec<u8>,
    /// Key curve
    #[serde(skip)]
    pub curve: Curve,
}

/// A decoded mesh certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NebulaCertificate {
    /// Signed fields
    pub details: NebulaCertificateDetails,
    /// Issuer signature over the marshaled details
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
}

impl NebulaCertificate {
    /// Decode a certificate from its protobuf encoding
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw = RawNebulaCertificate::decode(bytes)
            .map_err(|e| NebulaError::Decode(e.to_string()))?;
        let details = raw
            .details
            .ok_or_else(|| NebulaError::Decode("encoded Details was nil".into()))?;

        if details.ips.len() % 2 != 0 {
            return Err(NebulaError::Decode("encoded IPs should be in pairs".into()));
        }
        if details.subnets.len() % 2 != 0 {
            return Err(NebulaError::Decode(
                "encoded Subnets should be in pairs".into(),
            ));
        }

        let curve = Curve::try_from(details.curve)
            .map_err(|_| NebulaError::Decode(format!("unknown curve {}", details.curve)))?;

        Ok(Self {
            details: NebulaCertificateDetails {
                name: details.name,
                ips: words_to_nets(&details.ips),
                subnets: words_to_nets(&details.subnets),
                groups: details.groups,
                not_before: unix_to_time(details.not_before)?,
                not_after: unix_to_time(details.not_after)?,
                public_key: details.public_key,
                is_ca: details.is_ca,
                issuer: details.issuer,
                curve,
            },
            signature: raw.signature,
        })
    }

    /// Decode the first PEM block of `input`, returning the remaining bytes
    pub fn from_pem(input: &[u8]) -> Result<(Self, &[u8])> {
        let (block, rest) = pem::decode(input)?.ok_or_else(|| {
            NebulaError::Pem("input did not contain a valid PEM encoded block".into())
        })?;
        if block.label != CERTIFICATE_BANNER {
            return Err(NebulaError::Pem(
                "bytes did not contain a proper nebula certificate banner".into(),
            ));
        }
        Ok((Self::from_bytes(&block.contents)?, rest))
    }

    /// Protobuf encoding of the signed fields
    pub fn raw_details(&self) -> RawNebulaCertificateDetails {
        let d = &self.details;
        RawNebulaCertificateDetails {
            name: d.name.clone(),
            ips: nets_to_words(&d.ips),
            subnets: nets_to_words(&d.subnets),
            groups: d.groups.clone(),
            not_before: d.not_before.timestamp(),
            not_after: d.not_after.timestamp(),
            public_key: d.public_key.clone(),
            is_ca: d.is_ca,
            issuer: d.issuer.clone(),
            curve: d.curve as i32,
        }
    }

    /// Protobuf encoding of the full certificate
    pub fn marshal(&self) -> Vec<u8> {
        RawNebulaCertificate {
            details: Some(self.raw_details()),
            signature: self.signature.clone(),
        }
        .encode_to_vec()
    }

    /// PEM encoding of the full certificate
    pub fn marshal_to_pem(&self) -> Vec<u8> {
        pem::encode(CERTIFICATE_BANNER, &self.marshal())
    }

    /// Lowercase hex SHA-256 of the marshaled certificate
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.marshal()))
    }

    /// Hex form of the issuer fingerprint; empty for roots
    pub fn issuer(&self) -> String {
        hex::encode(&self.details.issuer)
    }

    /// Sign the details with an authority key
    pub fn sign(&mut self, key: &SigningKey) -> Result<()> {
        if self.details.curve != Curve::Curve25519 {
            return Err(NebulaError::UnsupportedCurve(self.details.curve));
        }
        let message = self.raw_details().encode_to_vec();
        self.signature = key.sign(&message).to_bytes().to_vec();
        Ok(())
    }

    /// Whether the signature verifies under the given Ed25519 key bytes
    pub fn check_signature(&self, public_key: &[u8]) -> bool {
        if self.details.curve != Curve::Curve25519 {
            return false;
        }
        let Ok(key_bytes) = <[u8; 32]>::try_from(public_key) else {
            return false;
        };
        let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(&self.signature) else {
            return false;
        };
        key.verify(&self.raw_details().encode_to_vec(), &signature)
            .is_ok()
    }

    /// Whether `at` falls outside the validity window
    pub fn expired(&self, at: DateTime<Utc>) -> bool {
        self.details.not_before > at || self.details.not_after < at
    }

    /// Check that this certificate stays inside what `signer` may issue
    pub fn check_root_constraints(&self, signer: &NebulaCertificate) -> Result<()> {
        let d = &self.details;
        let s = &signer.details;

        if s.not_after < d.not_after {
            return Err(NebulaError::RootConstraint(
                "certificate expires after signing certificate".into(),
            ));
        }
        if s.not_before > d.not_before {
            return Err(NebulaError::RootConstraint(
                "certificate is valid before the signing certificate".into(),
            ));
        }

        if !s.groups.is_empty() {
            if let Some(g) = d.groups.iter().find(|g| !s.groups.contains(g)) {
                return Err(NebulaError::RootConstraint(format!(
                    "certificate contained a group not present on the signing ca: {g}"
                )));
            }
        }

        if !s.ips.is_empty() {
            if let Some(ip) = d.ips.iter().find(|ip| !net_match(ip, &s.ips)) {
                return Err(NebulaError::RootConstraint(format!(
                    "certificate contained an ip assignment outside the limitations of the signing ca: {ip}"
                )));
            }
        }

        if !s.subnets.is_empty() {
            if let Some(sn) = d.subnets.iter().find(|sn| !net_match(sn, &s.subnets)) {
                return Err(NebulaError::RootConstraint(format!(
                    "certificate contained a subnet assignment outside the limitations of the signing ca: {sn}"
                )));
            }
        }

        Ok(())
    }
}

fn net_match(cert_net: &Ipv4Net, signer_nets: &[Ipv4Net]) -> bool {
    signer_nets.iter().any(|n| n.contains_net(cert_net))
}

fn words_to_nets(words: &[u32]) -> Vec<Ipv4Net> {
    words
        .chunks_exact(2)
        .map(|pair| Ipv4Net::from_words(pair[0], pair[1]))
        .collect()
}

fn nets_to_words(nets: &[Ipv4Net]) -> Vec<u32> {
    nets.iter()
        .flat_map(|n| {
            let (addr, mask) = n.to_words();
            [addr, mask]
        })
        .collect()
}

fn unix_to_time(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| NebulaError::Decode(format!("timestamp {secs} out of range")))
}

mod hex_bytes {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn root(key: &SigningKey) -> NebulaCertificate {
        let mut cert = NebulaCertificate {
            details: NebulaCertificateDetails {
                name: "mesh-root".into(),
                ips: vec!["10.0.0.0/16".parse().unwrap()],
                subnets: vec![],
                groups: vec!["servers".into(), "laptops".into()],
                not_before: ts(1_000),
                not_after: ts(100_000),
                public_key: key.verifying_key().to_bytes().to_vec(),
                is_ca: true,
                issuer: vec![],
                curve: Curve::Curve25519,
            },
            signature: vec![],
        };
        cert.sign(key).unwrap();
        cert
    }

    fn child_of(root: &NebulaCertificate, key: &SigningKey) -> NebulaCertificate {
        let mut cert = NebulaCertificate {
            details: NebulaCertificateDetails {
                name: "node-7".into(),
                ips: vec!["10.0.0.7/24".parse().unwrap()],
                subnets: vec![],
                groups: vec!["servers".into()],
                not_before: ts(2_000),
                not_after: ts(50_000),
                public_key: vec![9; 32],
                is_ca: false,
                issuer: hex::decode(root.fingerprint()).unwrap(),
                curve: Curve::Curve25519,
            },
            signature: vec![],
        };
        cert.sign(key).unwrap();
        cert
    }

    #[test]
    fn test_pem_roundtrip_preserves_fingerprint() {
        let key = SigningKey::from_bytes(&[1; 32]);
        let cert = root(&key);
        let pem = cert.marshal_to_pem();
        let (decoded, rest) = NebulaCertificate::from_pem(&pem).unwrap();
        assert!(rest.is_empty());
        assert_eq!(decoded, cert);
        assert_eq!(decoded.fingerprint(), cert.fingerprint());
    }

    #[test]
    fn test_signature_checks() {
        let key = SigningKey::from_bytes(&[1; 32]);
        let cert = root(&key);
        assert!(cert.check_signature(&cert.details.public_key));
        let other = SigningKey::from_bytes(&[2; 32]);
        assert!(!cert.check_signature(other.verifying_key().as_bytes()));

        let mut tampered = cert.clone();
        tampered.details.name = "impostor".into();
        assert!(!tampered.check_signature(&cert.details.public_key));
    }

    #[test]
    fn test_expired_window() {
        let key = SigningKey::from_bytes(&[1; 32]);
        let cert = root(&key);
        assert!(cert.expired(ts(999)));
        assert!(!cert.expired(ts(1_000)));
        assert!(!cert.expired(ts(100_000)));
        assert!(cert.expired(ts(100_001)));
    }

    #[test]
    fn test_root_constraints() {
        let key = SigningKey::from_bytes(&[1; 32]);
        let ca = root(&key);
        let mut leaf = child_of(&ca, &key);
        assert!(leaf.check_root_constraints(&ca).is_ok());

        leaf.details.groups.push("admins".into());
        assert_matches!(
            leaf.check_root_constraints(&ca),
            Err(NebulaError::RootConstraint(msg)) if msg.contains("admins")
        );

        let mut leaf = child_of(&ca, &key);
        leaf.details.ips = vec!["10.9.0.7/24".parse().unwrap()];
        assert_matches!(leaf.check_root_constraints(&ca), Err(NebulaError::RootConstraint(_)));

        let mut leaf = child_of(&ca, &key);
        leaf.details.not_after = ts(200_000);
        assert_matches!(leaf.check_root_constraints(&ca), Err(NebulaError::RootConstraint(_)));
    }

    #[test]
    fn test_decode_rejects_odd_ip_words() {
        let raw = RawNebulaCertificate {
            details: Some(RawNebulaCertificateDetails {
                name: "x".into(),
                ips: vec![1, 2, 3],
                ..Default::default()
            }),
            signature: vec![],
        };
        assert_matches!(
            NebulaCertificate::from_bytes(&raw.encode_to_vec()),
            Err(NebulaError::Decode(_))
        );
    }

    #[test]
    fn test_decode_rejects_missing_details() {
        let raw = RawNebulaCertificate {
            details: None,
            signature: vec![1],
        };
        assert_matches!(
            NebulaCertificate::from_bytes(&raw.encode_to_vec()),
            Err(NebulaError::Decode(_))
        );
    }
}
