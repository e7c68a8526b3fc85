//! Ready-made provisioner setups
//!
//! [`NebulaFixture`] is one mesh root, one node `node-7` at `10.0.0.7/32`
//! and a provisioner named `nebula/edge1` trusting that root, all pinned to
//! [`TEST_NOW`] through a [`FixedClock`].

use crate::ca::{TestCa, TestNode};
use crate::token::TokenBuilder;
use chrono::{DateTime, Duration, Utc};
use meshca_core::{FixedClock, Result};
use meshca_provisioner::{Audiences, Claims, GlobalConfig, Nebula, ProvisionerConfig};
use std::sync::Arc;

/// Reference time of every fixture (2025-06-15T15:06:40Z)
pub const TEST_NOW: i64 = 1_750_000_000;
/// Provisioner name used by the fixture
pub const PROVISIONER_NAME: &str = "nebula/edge1";
/// Node name used by the fixture
pub const NODE_NAME: &str = "node-7";
/// Node overlay network used by the fixture
pub const NODE_NETWORK: &str = "10.0.0.7/32";

/// The fixture reference time
pub fn test_now() -> DateTime<Utc> {
    DateTime::from_timestamp(TEST_NOW, 0).unwrap_or_default()
}

/// Authority endpoints before provisioner scoping
pub fn base_audiences() -> Audiences {
    let url = |path: &str| vec![format!("https://ca.example.com/1.0/{path}")];
    Audiences {
        sign: url("sign"),
        revoke: url("revoke"),
        ssh_sign: url("ssh/sign"),
        ssh_revoke: url("ssh/revoke"),
        ssh_renew: url("ssh/renew"),
        ssh_rekey: url("ssh/rekey"),
    }
}

/// Claims with SSH enabled and X.509 validity between 5m and 24h
pub fn default_claims() -> Claims {
    Claims {
        min_tls_cert_duration: Some(Duration::minutes(5)),
        max_tls_cert_duration: Some(Duration::hours(24)),
        default_tls_cert_duration: Some(Duration::hours(24)),
        enable_ssh_ca: Some(true),
        ..Claims::default()
    }
}

/// A provisioner with a trusted root and one node
#[derive(Debug)]
pub struct NebulaFixture {
    pub clock: Arc<FixedClock>,
    pub global: GlobalConfig,
    pub ca: TestCa,
    pub node: TestNode,
    pub config: ProvisionerConfig,
    pub provisioner: Nebula,
}

impl NebulaFixture {
    /// The standard fixture
    pub fn new() -> Self {
        Self::with_claims(default_claims())
    }

    /// The standard fixture with other claims
    pub fn with_claims(claims: Claims) -> Self {
        let now = test_now();
        let ca = TestCa::new("mesh-root", now - Duration::days(1), now + Duration::days(365));
        let node = ca.issue_node(NODE_NAME, &[NODE_NETWORK], now - Duration::hours(1), now + Duration::days(30));
        let config = ProvisionerConfig {
            provisioner_type: "Nebula".into(),
            name: PROVISIONER_NAME.into(),
            roots: ca.pem(),
            claims: Some(claims),
            ..ProvisionerConfig::default()
        };
        let global = GlobalConfig {
            audiences: base_audiences(),
            ..GlobalConfig::default()
        };
        let clock = Arc::new(FixedClock::new(now));
        let provisioner = Nebula::init_with_clock(config.clone(), &global, clock.clone())
            .unwrap_or_else(|e| panic!("fixture provisioner failed to start: {e}"));
        Self {
            clock,
            global,
            ca,
            node,
            config,
            provisioner,
        }
    }

    /// Start another provisioner from an edited copy of the fixture config
    pub fn init(&self, edit: impl FnOnce(&mut ProvisionerConfig)) -> Result<Nebula> {
        let mut config = self.config.clone();
        edit(&mut config);
        Nebula::init_with_clock(config, &self.global, self.clock.clone())
    }

    /// Scoped audience for X.509 signing
    pub fn sign_audience(&self) -> String {
        first(&self.provisioner.audiences().sign)
    }

    /// Scoped audience for SSH signing
    pub fn ssh_sign_audience(&self) -> String {
        first(&self.provisioner.audiences().ssh_sign)
    }

    /// Scoped audience for revocation
    pub fn revoke_audience(&self) -> String {
        first(&self.provisioner.audiences().revoke)
    }

    /// A node token valid now for `audience`, asking for the node's identity
    pub fn node_token(&self, audience: &str) -> TokenBuilder {
        self.node
            .token()
            .issuer(PROVISIONER_NAME)
            .subject(NODE_NAME)
            .audience(audience)
            .id("token-1")
            .sans(&[NODE_NAME, "10.0.0.7"])
            .valid_at(test_now())
    }
}

impl Default for NebulaFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn first(values: &[String]) -> String {
    values.first().cloned().unwrap_or_default()
}
