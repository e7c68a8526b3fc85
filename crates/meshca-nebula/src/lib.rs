//! # meshca nebula
//!
//! Mesh-overlay certificates as used to authorize certificate issuance:
//!
//! - [`wire`]: protobuf messages of the v1 certificate format
//! - [`cert`]: decoded certificates, PEM armor, fingerprints, signatures
//! - [`pool`]: trusted roots, block list, chain verification
//! - [`keys`]: verification keys derived from a certificate's role

pub mod cert;
pub mod error;
pub mod keys;
pub mod net;
pub mod pem;
pub mod pool;

#[allow(clippy::derive_partial_eq_without_eq, missing_docs)]
pub mod wire;

pub use cert::{NebulaCertificate, NebulaCertificateDetails, CERTIFICATE_BANNER};
pub use error::{NebulaError, Result};
pub use keys::{VerificationKey, ALG_EDDSA, ALG_XEDDSA};
pub use net::Ipv4Net;
pub use pool::CaPool;
pub use wire::Curve;
