//! Configuration helpers shared by provisioner kinds

pub mod validation;

pub use validation::{ConfigValidator, ValidationError, ValidationResult};
