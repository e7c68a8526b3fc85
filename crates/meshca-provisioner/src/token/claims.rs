//! Token payload claims

use super::TokenError;
use crate::ssh::SignSshOptions;
use chrono::{DateTime, Duration, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Clock skew tolerated on exp, nbf and iat
pub const DEFAULT_LEEWAY: Duration = Duration::minutes(1);

/// Seconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NumericDate(i64);

impl NumericDate {
    /// From a timestamp, dropping sub-second precision
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at.timestamp())
    }

    /// From Unix seconds
    pub fn from_unix(secs: i64) -> Self {
        Self(secs)
    }

    /// Unix seconds
    pub fn unix(self) -> i64 {
        self.0
    }

    /// As a timestamp; out-of-range values saturate
    pub fn time(self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or(if self.0 < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
    }
}

impl Serialize for NumericDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> Deserialize<'de> for NumericDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NumericDateVisitor;

        impl Visitor<'_> for NumericDateVisitor {
            type Value = NumericDate;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a number of seconds since the epoch")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<NumericDate, E> {
                Ok(NumericDate(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<NumericDate, E> {
                i64::try_from(v)
                    .map(NumericDate)
                    .map_err(|_| E::custom("numeric date out of range"))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<NumericDate, E> {
                if v.is_finite() && v.abs() < i64::MAX as f64 {
                    Ok(NumericDate(v.trunc() as i64))
                } else {
                    Err(E::custom("numeric date out of range"))
                }
            }
        }

        deserializer.deserialize_any(NumericDateVisitor)
    }
}

mod audience {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    pub fn serialize<S: Serializer>(aud: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        match aud {
            [single] => serializer.serialize_str(single),
            many => serializer.collect_seq(many),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
            None => Vec::new(),
            Some(OneOrMany::One(s)) => vec![s],
            Some(OneOrMany::Many(v)) => v,
        })
    }
}

/// Registered JWT claims
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClaims {
    /// Issuer (`iss`)
    #[serde(rename = "iss", default, skip_serializing_if = "String::is_empty")]
    pub issuer: String,
    /// Subject (`sub`)
    #[serde(rename = "sub", default, skip_serializing_if = "String::is_empty")]
    pub subject: String,
    /// A single string or an array on the wire
    #[serde(rename = "aud", default, with = "audience", skip_serializing_if = "Vec::is_empty")]
    pub audience: Vec<String>,
    /// Expiry (`exp`)
    #[serde(rename = "exp", default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<NumericDate>,
    /// Not before (`nbf`)
    #[serde(rename = "nbf", default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<NumericDate>,
    /// Issued at (`iat`)
    #[serde(rename = "iat", default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<NumericDate>,
    /// Token id (`jti`)
    #[serde(rename = "jti", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
}

/// Values the registered claims are checked against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expected {
    /// Required issuer; empty skips the check
    pub issuer: String,
    /// Reference time
    pub time: DateTime<Utc>,
}

impl RegisteredClaims {
    /// Check issuer and time claims, tolerating `leeway` of clock skew
    ///
    /// Time claims that are absent are not checked.
    pub fn validate_with_leeway(&self, expected: &Expected, leeway: Duration) -> Result<(), TokenError> {
        if !expected.issuer.is_empty() && expected.issuer != self.issuer {
            return Err(TokenError::InvalidIssuer);
        }
        let now = expected.time;
        if let Some(nbf) = self.not_before {
            if now + leeway < nbf.time() {
                return Err(TokenError::NotValidYet);
            }
        }
        if let Some(exp) = self.expiry {
            if now - leeway > exp.time() {
                return Err(TokenError::Expired);
            }
        }
        if let Some(iat) = self.issued_at {
            if now + leeway < iat.time() {
                return Err(TokenError::IssuedInTheFuture);
            }
        }
        Ok(())
    }
}

/// Non-registered authority claims
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepClaims {
    /// SSH certificate options pinned by the token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh: Option<SignSshOptions>,
}

/// Full payload of a mesh token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    /// Registered claims
    #[serde(flatten)]
    pub claims: RegisteredClaims,
    /// Requested subject alternative names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sans: Vec<String>,
    /// Authority specific claims
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<StepClaims>,
}

impl TokenPayload {
    /// SSH options, present only when both `step` and `step.ssh` are set
    pub fn ssh_options(&self) -> Option<&SignSshOptions> {
        self.step.as_ref().and_then(|step| step.ssh.as_ref())
    }
}
