//! Errors raised while decoding and verifying mesh certificates

use crate::wire::Curve;

/// Mesh certificate failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NebulaError {
    /// Outside its own validity window
    #[error("certificate is expired")]
    Expired,
    /// The issuing root is outside its validity window
    #[error("root certificate is expired")]
    RootExpired,
    /// Fingerprint is on the pool's block list
    #[error("certificate is in the block list")]
    Blocklisted,
    /// The issuer's signature does not verify
    #[error("certificate signature did not match")]
    SignatureMismatch,
    /// The certificate names no issuer
    #[error("no issuer in certificate")]
    NoIssuer,
    /// The issuer is not in the pool
    #[error("could not find ca for the certificate")]
    UnknownCa,
    /// A root candidate is not marked as a CA
    #[error("certificate is not a CA")]
    NotCa,
    /// A root candidate is not signed by its own key
    #[error("certificate is not self-signed")]
    NotSelfSigned,
    /// The certificate exceeds what its signer may issue
    #[error("{0}")]
    RootConstraint(String),
    /// Protobuf or field level decode failure
    #[error("failed to decode certificate: {0}")]
    Decode(String),
    /// PEM armor failure
    #[error("invalid PEM: {0}")]
    Pem(String),
    /// Public key bytes cannot be used as a verification key
    #[error("invalid public key: {0}")]
    InvalidKey(String),
    /// Only curve25519 certificates are accepted
    #[error("unsupported certificate curve {0:?}")]
    UnsupportedCurve(Curve),
    /// A root bundle held no certificates
    #[error("no CA certificates found")]
    EmptyPool,
}

/// Result type for mesh certificate operations
pub type Result<T> = std::result::Result<T, NebulaError>;
