//! Mesh tokens
//!
//! A mesh token is a compact JWS signed by a mesh node. Its header carries
//! the node's certificate under `nbc`; the certificate's key verifies the
//! signature and the pool of trusted roots vouches for the certificate.

mod claims;
mod jws;

pub use claims::{
    Expected, NumericDate, RegisteredClaims, StepClaims, TokenPayload, DEFAULT_LEEWAY,
};
pub use jws::{JwsHeader, SignedToken};

/// Header parameter holding the base64url PEM of the signer's certificate
pub const NEBULA_CERT_HEADER: &str = "nbc";

/// Token parsing and claim validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Not a compact JWS
    #[error("token is malformed: {0}")]
    Malformed(String),
    /// Header algorithm does not fit the certificate key
    #[error("unexpected signature algorithm {got:?}, expected {expected:?}")]
    Algorithm {
        /// Header alg
        got: String,
        /// Algorithm implied by the key
        expected: &'static str,
    },
    /// Signature does not verify
    #[error("token signature does not match")]
    Signature,
    /// Payload is not valid claims JSON
    #[error("invalid token payload: {0}")]
    Payload(String),
    /// Issuer is not the provisioner name
    #[error("validation failed, invalid issuer claim (iss)")]
    InvalidIssuer,
    /// Reference time is before nbf
    #[error("validation failed, token not valid yet (nbf)")]
    NotValidYet,
    /// Reference time is past exp
    #[error("validation failed, token is expired (exp)")]
    Expired,
    /// iat is after the reference time
    #[error("validation failed, token issued in the future (iat)")]
    IssuedInTheFuture,
}
