//! Test mesh authorities and nodes

use crate::keys::KeyTestFixture;
use crate::token::TokenBuilder;
use chrono::{DateTime, Utc};
use meshca_nebula::{Curve, Ipv4Net, NebulaCertificate, NebulaCertificateDetails, ALG_EDDSA, ALG_XEDDSA};

fn certificate(
    name: &str,
    ips: &[&str],
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    public_key: Vec<u8>,
    is_ca: bool,
    issuer: Vec<u8>,
) -> NebulaCertificate {
    let ips: Vec<Ipv4Net> = ips
        .iter()
        .map(|ip| ip.parse().unwrap_or_else(|e| panic!("bad test network {ip}: {e}")))
        .collect();
    NebulaCertificate {
        details: NebulaCertificateDetails {
            name: name.into(),
            ips,
            subnets: vec![],
            groups: vec![],
            not_before,
            not_after,
            public_key,
            is_ca,
            issuer,
            curve: Curve::Curve25519,
        },
        signature: vec![],
    }
}

/// A mesh authority with its signing key
#[derive(Debug, Clone)]
pub struct TestCa {
    key: KeyTestFixture,
    certificate: NebulaCertificate,
}

impl TestCa {
    /// Self-signed root valid over the given window
    pub fn new(name: &str, not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Self {
        let key = KeyTestFixture::from_seed_string(name);
        let mut certificate = certificate(name, &[], not_before, not_after, key.ed25519_public(), true, vec![]);
        sign(&mut certificate, &key);
        Self { key, certificate }
    }

    /// The authority certificate
    pub fn certificate(&self) -> &NebulaCertificate {
        &self.certificate
    }

    /// The authority key
    pub fn key(&self) -> &KeyTestFixture {
        &self.key
    }

    /// PEM of the certificate, as placed in provisioner roots
    pub fn pem(&self) -> Vec<u8> {
        self.certificate.marshal_to_pem()
    }

    fn issuer(&self) -> Vec<u8> {
        hex::decode(self.certificate.fingerprint()).unwrap_or_default()
    }

    /// Issue a leaf certificate for a mesh node
    pub fn issue_node(
        &self,
        name: &str,
        ips: &[&str],
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
    ) -> TestNode {
        let key = KeyTestFixture::leaf_from_seed_string(name);
        let mut certificate = certificate(name, ips, not_before, not_after, key.x25519_public(), false, self.issuer());
        sign(&mut certificate, &self.key);
        TestNode { key, certificate }
    }

    /// Issue an intermediate authority
    pub fn issue_sub_ca(&self, name: &str, not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> TestCa {
        let key = KeyTestFixture::from_seed_string(name);
        let mut certificate = certificate(name, &[], not_before, not_after, key.ed25519_public(), true, self.issuer());
        sign(&mut certificate, &self.key);
        TestCa { key, certificate }
    }

    /// Token signed by this authority (EdDSA)
    pub fn token(&self) -> TokenBuilder {
        TokenBuilder::new(self.key.signing_key().clone(), ALG_EDDSA).nebula_certificate(&self.certificate)
    }
}

fn sign(certificate: &mut NebulaCertificate, key: &KeyTestFixture) {
    certificate
        .sign(key.signing_key())
        .unwrap_or_else(|e| panic!("failed to sign test certificate: {e}"));
}

/// A mesh node with its key
#[derive(Debug, Clone)]
pub struct TestNode {
    key: KeyTestFixture,
    certificate: NebulaCertificate,
}

impl TestNode {
    /// The node certificate
    pub fn certificate(&self) -> &NebulaCertificate {
        &self.certificate
    }

    /// The node key
    pub fn key(&self) -> &KeyTestFixture {
        &self.key
    }

    /// Token signed by this node (XEdDSA)
    pub fn token(&self) -> TokenBuilder {
        TokenBuilder::new(self.key.signing_key().clone(), ALG_XEDDSA).nebula_certificate(&self.certificate)
    }
}
