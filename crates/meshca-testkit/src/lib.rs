//! # meshca-testkit
//!
//! Shared test scaffolding: deterministic keys, mesh authorities that issue
//! node certificates, a token builder, and a provisioner fixture.

pub mod ca;
pub mod fixtures;
pub mod keys;
pub mod token;

pub use ca::{TestCa, TestNode};
pub use fixtures::{test_now, NebulaFixture, NODE_NAME, PROVISIONER_NAME, TEST_NOW};
pub use keys::KeyTestFixture;
pub use token::TokenBuilder;
