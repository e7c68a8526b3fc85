//! Token builder
//!
//! Mints compact JWS tokens the way a mesh node would, with the signer's
//! certificate in the `nbc` header. Every field can be overridden so tests
//! can produce malformed or hostile tokens too.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signer, SigningKey};
use meshca_nebula::NebulaCertificate;
use meshca_provisioner::NEBULA_CERT_HEADER;
use serde_json::{json, Map, Value};

/// Builder for signed mesh tokens
#[derive(Debug, Clone)]
pub struct TokenBuilder {
    key: SigningKey,
    header: Map<String, Value>,
    claims: Map<String, Value>,
}

impl TokenBuilder {
    /// Builder signing with `key` under algorithm `alg`
    pub fn new(key: SigningKey, alg: &str) -> Self {
        let mut header = Map::new();
        header.insert("alg".into(), json!(alg));
        header.insert("typ".into(), json!("JWT"));
        Self {
            key,
            header,
            claims: Map::new(),
        }
    }

    /// Embed `cert` in the `nbc` header
    pub fn nebula_certificate(self, cert: &NebulaCertificate) -> Self {
        let encoded = URL_SAFE_NO_PAD.encode(cert.marshal_to_pem());
        self.header(NEBULA_CERT_HEADER, json!(encoded))
    }

    /// Set a header parameter
    pub fn header(mut self, name: &str, value: Value) -> Self {
        self.header.insert(name.into(), value);
        self
    }

    /// Drop a header parameter
    pub fn without_header(mut self, name: &str) -> Self {
        self.header.remove(name);
        self
    }

    /// Set a claim
    pub fn claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.into(), value);
        self
    }

    /// Drop a claim
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    pub fn issuer(self, iss: &str) -> Self {
        self.claim("iss", json!(iss))
    }

    pub fn subject(self, sub: &str) -> Self {
        self.claim("sub", json!(sub))
    }

    pub fn audience(self, aud: &str) -> Self {
        self.claim("aud", json!(aud))
    }

    pub fn audiences(self, aud: &[&str]) -> Self {
        self.claim("aud", json!(aud))
    }

    pub fn id(self, jti: &str) -> Self {
        self.claim("jti", json!(jti))
    }

    pub fn sans(self, sans: &[&str]) -> Self {
        self.claim("sans", json!(sans))
    }

    /// Set nbf and iat to `at` and exp to `at` plus five minutes
    pub fn valid_at(self, at: DateTime<Utc>) -> Self {
        let ts = at.timestamp();
        self.claim("nbf", json!(ts))
            .claim("iat", json!(ts))
            .claim("exp", json!(ts + 300))
    }

    /// Set the SSH sub-claims under `step.ssh`
    pub fn ssh(self, ssh: Value) -> Self {
        self.claim("step", json!({ "ssh": ssh }))
    }

    /// Sign and serialize
    pub fn sign(self) -> String {
        let input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(Value::Object(self.header).to_string()),
            URL_SAFE_NO_PAD.encode(Value::Object(self.claims).to_string())
        );
        let signature = self.key.sign(input.as_bytes());
        format!("{input}.{}", URL_SAFE_NO_PAD.encode(signature.to_bytes()))
    }
}
