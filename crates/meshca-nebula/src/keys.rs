//! Verification keys derived from mesh certificates
//!
//! Authorities carry Ed25519 keys and sign tokens with EdDSA. Leaf nodes only
//! carry an X25519 key-exchange key; they sign with XEdDSA, which verifies as
//! Ed25519 against the Edwards form of the Montgomery point (sign bit 0).

use crate::cert::NebulaCertificate;
use crate::error::{NebulaError, Result};
use crate::wire::Curve;
use curve25519_dalek::montgomery::MontgomeryPoint;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

/// Token algorithm for authority keys
pub const ALG_EDDSA: &str = "EdDSA";
/// Token algorithm for leaf keys
pub const ALG_XEDDSA: &str = "XEdDSA";

/// A key able to verify token signatures made by a certificate holder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationKey {
    /// Authority signature key
    Ed25519(VerifyingKey),
    /// Leaf key-exchange key, converted for XEdDSA verification
    X25519 {
        /// The Montgomery u-coordinate as carried by the certificate
        montgomery: [u8; 32],
        /// Equivalent Edwards verifying key
        edwards: VerifyingKey,
    },
}

impl VerificationKey {
    /// Select the key type from the certificate's role
    pub fn for_certificate(cert: &NebulaCertificate) -> Result<Self> {
        if cert.details.curve != Curve::Curve25519 {
            return Err(NebulaError::UnsupportedCurve(cert.details.curve));
        }
        let bytes = <[u8; 32]>::try_from(cert.details.public_key.as_slice()).map_err(|_| {
            NebulaError::InvalidKey(format!(
                "expected 32 bytes, got {}",
                cert.details.public_key.len()
            ))
        })?;

        if cert.details.is_ca {
            Self::ed25519(bytes)
        } else {
            Self::x25519(bytes)
        }
    }

    /// Interpret bytes as an Ed25519 verifying key
    pub fn ed25519(bytes: [u8; 32]) -> Result<Self> {
        VerifyingKey::from_bytes(&bytes)
            .map(Self::Ed25519)
            .map_err(|e| NebulaError::InvalidKey(e.to_string()))
    }

    /// Interpret bytes as an X25519 public key
    pub fn x25519(montgomery: [u8; 32]) -> Result<Self> {
        let edwards = MontgomeryPoint(montgomery)
            .to_edwards(0)
            .ok_or_else(|| NebulaError::InvalidKey("point is not on the curve".into()))?;
        let edwards = VerifyingKey::from_bytes(&edwards.compress().to_bytes())
            .map_err(|e| NebulaError::InvalidKey(e.to_string()))?;
        Ok(Self::X25519 {
            montgomery,
            edwards,
        })
    }

    /// Token algorithm this key verifies
    pub fn algorithm(&self) -> &'static str {
        match self {
            Self::Ed25519(_) => ALG_EDDSA,
            Self::X25519 { .. } => ALG_XEDDSA,
        }
    }

    /// Verify a 64-byte signature over `message`
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let signature =
            Signature::from_slice(signature).map_err(|_| NebulaError::SignatureMismatch)?;
        let key = match self {
            Self::Ed25519(key) => key,
            Self::X25519 { edwards, .. } => edwards,
        };
        key.verify(message, &signature)
            .map_err(|_| NebulaError::SignatureMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    /// A signing key whose Edwards public key has sign bit 0, so its
    /// Montgomery form converts back to the same point.
    fn xeddsa_key() -> SigningKey {
        (0u8..=255)
            .map(|seed| SigningKey::from_bytes(&[seed; 32]))
            .find(|k| k.verifying_key().to_bytes()[31] & 0x80 == 0)
            .unwrap()
    }

    #[test]
    fn test_ed25519_verifies() {
        let key = SigningKey::from_bytes(&[3; 32]);
        let vk = VerificationKey::ed25519(key.verifying_key().to_bytes()).unwrap();
        assert_eq!(vk.algorithm(), ALG_EDDSA);
        let sig = key.sign(b"payload").to_bytes();
        assert!(vk.verify(b"payload", &sig).is_ok());
        assert!(vk.verify(b"other", &sig).is_err());
    }

    #[test]
    fn test_x25519_converts_and_verifies() {
        let key = xeddsa_key();
        let montgomery = key.verifying_key().to_montgomery().to_bytes();
        let vk = VerificationKey::x25519(montgomery).unwrap();
        assert_eq!(vk.algorithm(), ALG_XEDDSA);
        let sig = key.sign(b"payload").to_bytes();
        assert!(vk.verify(b"payload", &sig).is_ok());
    }

    #[test]
    fn test_short_signature_rejected() {
        let key = SigningKey::from_bytes(&[3; 32]);
        let vk = VerificationKey::Ed25519(key.verifying_key());
        assert_eq!(
            vk.verify(b"payload", &[0u8; 10]),
            Err(NebulaError::SignatureMismatch)
        );
    }
}
