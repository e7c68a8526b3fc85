//! Compact JWS parsing and verification
//!
//! Tokens are `header.payload.signature`, each part base64url without
//! padding. The signature covers the ASCII bytes `header.payload`.

use super::TokenError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use meshca_nebula::VerificationKey;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Protected header of a compact JWS
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JwsHeader {
    /// Signature algorithm
    #[serde(default)]
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    /// Every other header parameter
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JwsHeader {
    /// A string-valued header parameter
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.extra.get(name).and_then(Value::as_str)
    }
}

/// A parsed, not yet verified, compact JWS
#[derive(Debug, Clone, PartialEq)]
pub struct SignedToken {
    header: JwsHeader,
    signing_input: String,
    payload: Vec<u8>,
    signature: Vec<u8>,
}

fn decode_part(part: &str, what: &str) -> Result<Vec<u8>, TokenError> {
    URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|e| TokenError::Malformed(format!("invalid {what} encoding: {e}")))
}

impl SignedToken {
    /// Split and decode a compact serialization
    pub fn parse(token: &str) -> Result<Self, TokenError> {
        let token = token.trim();
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed(
                "compact JWS format must have three parts".into(),
            ));
        };

        let header_bytes = decode_part(header, "header")?;
        let parsed: JwsHeader = serde_json::from_slice(&header_bytes)
            .map_err(|e| TokenError::Malformed(format!("invalid header: {e}")))?;
        if parsed.alg.is_empty() {
            return Err(TokenError::Malformed("header is missing alg".into()));
        }

        Ok(Self {
            header: parsed,
            signing_input: format!("{header}.{payload}"),
            payload: decode_part(payload, "payload")?,
            signature: decode_part(signature, "signature")?,
        })
    }

    /// Protected header
    pub fn header(&self) -> &JwsHeader {
        &self.header
    }

    /// Raw payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Decode the payload without checking the signature
    pub fn unsafe_claims_without_verification<T: DeserializeOwned>(&self) -> Result<T, TokenError> {
        serde_json::from_slice(&self.payload).map_err(|e| TokenError::Payload(e.to_string()))
    }

    /// Check algorithm and signature against `key`, then decode the payload
    pub fn verify<T: DeserializeOwned>(&self, key: &VerificationKey) -> Result<T, TokenError> {
        if self.header.alg != key.algorithm() {
            return Err(TokenError::Algorithm {
                got: self.header.alg.clone(),
                expected: key.algorithm(),
            });
        }
        key.verify(self.signing_input.as_bytes(), &self.signature)
            .map_err(|_| TokenError::Signature)?;
        self.unsafe_claims_without_verification()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use ed25519_dalek::{Signer, SigningKey};
    use serde_json::json;

    fn compact(header: &Value, payload: &Value, key: &SigningKey) -> String {
        let input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(payload.to_string())
        );
        let sig = key.sign(input.as_bytes());
        format!("{input}.{}", URL_SAFE_NO_PAD.encode(sig.to_bytes()))
    }

    #[test]
    fn test_parse_and_verify() {
        let key = SigningKey::from_bytes(&[9; 32]);
        let token = compact(&json!({"alg": "EdDSA", "nbc": "abc"}), &json!({"sub": "node-7"}), &key);
        let parsed = SignedToken::parse(&token).unwrap();
        assert_eq!(parsed.header().alg, "EdDSA");
        assert_eq!(parsed.header().get_str("nbc"), Some("abc"));

        let vk = VerificationKey::Ed25519(key.verifying_key());
        let payload: Value = parsed.verify(&vk).unwrap();
        assert_eq!(payload, json!({"sub": "node-7"}));
    }

    #[test]
    fn test_algorithm_must_match_key() {
        let key = SigningKey::from_bytes(&[9; 32]);
        let token = compact(&json!({"alg": "XEdDSA"}), &json!({}), &key);
        let vk = VerificationKey::Ed25519(key.verifying_key());
        assert_matches!(
            SignedToken::parse(&token).unwrap().verify::<Value>(&vk),
            Err(TokenError::Algorithm { .. })
        );
    }

    #[test]
    fn test_wrong_key_rejected() {
        let key = SigningKey::from_bytes(&[9; 32]);
        let other = SigningKey::from_bytes(&[10; 32]);
        let token = compact(&json!({"alg": "EdDSA"}), &json!({}), &key);
        let vk = VerificationKey::Ed25519(other.verifying_key());
        assert_matches!(
            SignedToken::parse(&token).unwrap().verify::<Value>(&vk),
            Err(TokenError::Signature)
        );
    }

    #[test]
    fn test_malformed_tokens() {
        for bad in ["", "a.b", "a.b.c.d", "!!.e30.AA", "e30.e30.AA"] {
            assert_matches!(SignedToken::parse(bad), Err(TokenError::Malformed(_)), "{bad}");
        }
    }
}
