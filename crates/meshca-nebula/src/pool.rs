//! Trusted root pool
//!
//! A pool holds self-signed authority certificates keyed by fingerprint plus
//! a block list of revoked certificate fingerprints. Verification walks one
//! level: the certificate's issuer must be a root in the pool.

use crate::cert::NebulaCertificate;
use crate::error::{NebulaError, Result};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Set of trusted mesh roots
#[derive(Debug, Clone, Default)]
pub struct CaPool {
    cas: BTreeMap<String, NebulaCertificate>,
    blocklist: BTreeSet<String>,
}

impl CaPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool from a bundle of PEM encoded roots
    ///
    /// Every block must be a self-signed authority certificate. Roots that are
    /// expired at `now` make the whole bundle unusable.
    pub fn from_pem_bytes(bytes: &[u8], now: DateTime<Utc>) -> Result<Self> {
        let mut pool = Self::new();
        let mut rest = bytes;
        let mut expired = false;

        while !rest.iter().all(u8::is_ascii_whitespace) {
            let (cert, remaining) = NebulaCertificate::from_pem(rest)?;
            if cert.expired(now) {
                expired = true;
            }
            pool.add_ca_certificate(cert)?;
            rest = remaining;
        }

        if pool.is_empty() {
            return Err(NebulaError::EmptyPool);
        }
        if expired {
            return Err(NebulaError::RootExpired);
        }
        debug!(roots = pool.len(), "loaded mesh CA pool");
        Ok(pool)
    }

    /// Add a root certificate
    pub fn add_ca_certificate(&mut self, cert: NebulaCertificate) -> Result<()> {
        if !cert.details.is_ca {
            return Err(NebulaError::NotCa);
        }
        if !cert.check_signature(&cert.details.public_key) {
            return Err(NebulaError::NotSelfSigned);
        }
        self.cas.insert(cert.fingerprint(), cert);
        Ok(())
    }

    /// Block a certificate by fingerprint
    pub fn blocklist_fingerprint(&mut self, fingerprint: impl Into<String>) {
        self.blocklist.insert(fingerprint.into());
    }

    /// Whether the certificate's fingerprint is blocked
    pub fn is_blocklisted(&self, cert: &NebulaCertificate) -> bool {
        !self.blocklist.is_empty() && self.blocklist.contains(&cert.fingerprint())
    }

    /// The root that issued `cert`
    pub fn get_ca_for_cert(&self, cert: &NebulaCertificate) -> Result<&NebulaCertificate> {
        if cert.details.issuer.is_empty() {
            return Err(NebulaError::NoIssuer);
        }
        self.cas.get(&cert.issuer()).ok_or(NebulaError::UnknownCa)
    }

    /// Verify `cert` against the pool at `now`
    pub fn verify(&self, cert: &NebulaCertificate, now: DateTime<Utc>) -> Result<()> {
        if self.is_blocklisted(cert) {
            return Err(NebulaError::Blocklisted);
        }
        let signer = self.get_ca_for_cert(cert)?;
        if signer.expired(now) {
            return Err(NebulaError::RootExpired);
        }
        if cert.expired(now) {
            return Err(NebulaError::Expired);
        }
        if !cert.check_signature(&signer.details.public_key) {
            return Err(NebulaError::SignatureMismatch);
        }
        cert.check_root_constraints(signer)
    }

    /// Fingerprints of every root
    pub fn fingerprints(&self) -> impl Iterator<Item = &str> {
        self.cas.keys().map(String::as_str)
    }

    /// Number of roots
    pub fn len(&self) -> usize {
        self.cas.len()
    }

    /// Whether the pool has no roots
    pub fn is_empty(&self) -> bool {
        self.cas.is_empty()
    }
}
