//! Protobuf messages of the v1 mesh certificate format
//!
//! Hand-maintained equivalents of the generated types for `cert.proto`.

/// Outer certificate envelope: details plus the issuer's signature
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RawNebulaCertificate {
    #[prost(message, optional, tag = "1")]
    pub details: ::core::option::Option<RawNebulaCertificateDetails>,
    #[prost(bytes = "vec", tag = "2")]
    pub signature: ::prost::alloc::vec::Vec<u8>,
}

/// Signed portion of a certificate
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RawNebulaCertificateDetails {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    /// Address and mask words, interleaved
    #[prost(uint32, repeated, tag = "2")]
    pub ips: ::prost::alloc::vec::Vec<u32>,
    /// Address and mask words, interleaved
    #[prost(uint32, repeated, tag = "3")]
    pub subnets: ::prost::alloc::vec::Vec<u32>,
    #[prost(string, repeated, tag = "4")]
    pub groups: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(int64, tag = "5")]
    pub not_before: i64,
    #[prost(int64, tag = "6")]
    pub not_after: i64,
    #[prost(bytes = "vec", tag = "7")]
    pub public_key: ::prost::alloc::vec::Vec<u8>,
    #[prost(bool, tag = "8")]
    pub is_ca: bool,
    /// Raw SHA-256 fingerprint of the issuing certificate
    #[prost(bytes = "vec", tag = "9")]
    pub issuer: ::prost::alloc::vec::Vec<u8>,
    #[prost(enumeration = "Curve", tag = "100")]
    pub curve: i32,
}

/// Key curve of a certificate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Curve {
    Curve25519 = 0,
    P256 = 1,
}
