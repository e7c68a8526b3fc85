//! Token audiences
//!
//! Each authority operation is reachable under one or more URLs. A token is
//! only accepted by an operation when one of its `aud` values names one of
//! that operation's URLs.

use serde::{Deserialize, Serialize};
use url::Url;

/// Accepted audience URLs per operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audiences {
    /// X.509 signing
    #[serde(default)]
    pub sign: Vec<String>,
    /// X.509 revocation
    #[serde(default)]
    pub revoke: Vec<String>,
    /// SSH signing
    #[serde(default)]
    pub ssh_sign: Vec<String>,
    /// SSH revocation
    #[serde(default)]
    pub ssh_revoke: Vec<String>,
    /// SSH renewal
    #[serde(default)]
    pub ssh_renew: Vec<String>,
    /// SSH rekey
    #[serde(default)]
    pub ssh_rekey: Vec<String>,
}

impl Audiences {
    /// Copy with every URL's fragment replaced by `fragment`
    ///
    /// Provisioners scope the authority URLs to themselves this way so that
    /// a token minted for one provisioner is not accepted by another.
    pub fn with_fragment(&self, fragment: &str) -> Self {
        let scope = |urls: &[String]| -> Vec<String> {
            urls.iter().map(|u| with_fragment(u, fragment)).collect()
        };
        Self {
            sign: scope(&self.sign),
            revoke: scope(&self.revoke),
            ssh_sign: scope(&self.ssh_sign),
            ssh_revoke: scope(&self.ssh_revoke),
            ssh_renew: scope(&self.ssh_renew),
            ssh_rekey: scope(&self.ssh_rekey),
        }
    }
}

fn with_fragment(raw: &str, fragment: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_fragment(Some(fragment));
            url.to_string()
        }
        // Relative references keep their path
        Err(_) => {
            let base = raw.split_once('#').map_or(raw, |(base, _)| base);
            format!("{base}#{fragment}")
        }
    }
}

/// Whether any claimed audience is accepted
///
/// Values are compared as-is first, then with any explicit port removed on
/// both sides, so `https://ca:443/sign` matches `https://ca/sign`.
pub fn matches_audience(claimed: &[String], accepted: &[String]) -> bool {
    if claimed.is_empty() || accepted.is_empty() {
        return false;
    }
    claimed.iter().any(|c| {
        accepted.iter().any(|a| c == a) || {
            let c = strip_port(c);
            accepted.iter().any(|a| c == strip_port(a))
        }
    })
}

fn strip_port(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            if url.port().is_some() && url.set_port(None).is_err() {
                return raw.to_string();
            }
            url.to_string()
        }
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_with_fragment_scopes_every_operation() {
        let base = Audiences {
            sign: strings(&["https://ca.example.com/1.0/sign", "https://ca.example.com/sign"]),
            revoke: strings(&["https://ca.example.com/1.0/revoke"]),
            ssh_sign: strings(&["https://ca.example.com/1.0/ssh/sign"]),
            ..Audiences::default()
        };
        let scoped = base.with_fragment("nebula/mesh");
        assert_eq!(
            scoped.sign,
            strings(&[
                "https://ca.example.com/1.0/sign#nebula/mesh",
                "https://ca.example.com/sign#nebula/mesh"
            ])
        );
        assert_eq!(scoped.revoke, strings(&["https://ca.example.com/1.0/revoke#nebula/mesh"]));
        assert_eq!(scoped.ssh_sign, strings(&["https://ca.example.com/1.0/ssh/sign#nebula/mesh"]));
        assert!(scoped.ssh_renew.is_empty());
    }

    #[test]
    fn test_with_fragment_replaces_existing_fragment() {
        assert_eq!(
            with_fragment("https://ca.example.com/1.0/sign#old", "nebula/mesh"),
            "https://ca.example.com/1.0/sign#nebula/mesh"
        );
        assert_eq!(with_fragment("/1.0/sign#old", "nebula/mesh"), "/1.0/sign#nebula/mesh");
    }

    #[test]
    fn test_matches_audience() {
        let accepted = strings(&["https://ca.example.com/1.0/sign#nebula/mesh"]);
        assert!(matches_audience(&accepted, &accepted));
        assert!(matches_audience(
            &strings(&["https://other.example.com", "https://ca.example.com/1.0/sign#nebula/mesh"]),
            &accepted
        ));
        assert!(!matches_audience(&strings(&["https://ca.example.com/1.0/sign"]), &accepted));
        assert!(!matches_audience(&[], &accepted));
        assert!(!matches_audience(&accepted, &[]));
    }

    #[test]
    fn test_matches_audience_ignores_port() {
        let accepted = strings(&["https://ca.example.com/1.0/sign#nebula/mesh"]);
        assert!(matches_audience(
            &strings(&["https://ca.example.com:9000/1.0/sign#nebula/mesh"]),
            &accepted
        ));
        assert!(matches_audience(
            &accepted,
            &strings(&["https://ca.example.com:443/1.0/sign#nebula/mesh"])
        ));
    }
}
