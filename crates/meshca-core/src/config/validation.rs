//! Configuration validation utilities and rules

use crate::MeshcaError;
use std::fmt;

/// Configuration validation result
pub type ValidationResult = Result<(), ValidationError>;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Value is required but missing or empty
    Required {
        /// Fully qualified field name
        field: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Required { field } => {
                write!(f, "{field} cannot be empty")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for MeshcaError {
    fn from(err: ValidationError) -> Self {
        MeshcaError::config(err.to_string())
    }
}

/// Configuration validator that accumulates validation rules
#[derive(Debug, Default)]
pub struct ConfigValidator {
    errors: Vec<ValidationError>,
    field_prefix: String,
}

impl ConfigValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator for a nested field
    pub fn for_field(&self, field_name: &str) -> Self {
        Self {
            errors: Vec::new(),
            field_prefix: self.full_field_name(field_name),
        }
    }

    /// Validate that a string is present and non-empty
    pub fn non_empty(&mut self, field_name: &str, value: &str) -> &mut Self {
        if value.is_empty() {
            self.errors.push(ValidationError::Required {
                field: self.full_field_name(field_name),
            });
        }
        self
    }

    /// Validate that a byte blob is present and non-empty
    pub fn non_empty_bytes(&mut self, field_name: &str, value: &[u8]) -> &mut Self {
        if value.is_empty() {
            self.errors.push(ValidationError::Required {
                field: self.full_field_name(field_name),
            });
        }
        self
    }

    /// Get validation result, reporting the first failure
    pub fn result(self) -> ValidationResult {
        match self.errors.into_iter().next() {
            None => Ok(()),
            Some(first) => Err(first),
        }
    }

    fn full_field_name(&self, field_name: &str) -> String {
        if self.field_prefix.is_empty() {
            field_name.to_string()
        } else {
            format!("{}.{}", self.field_prefix, field_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_error_wins() {
        let mut v = ConfigValidator::new().for_field("provisioner");
        v.non_empty("type", "").non_empty("name", "");
        let err = v.result().unwrap_err();
        assert_eq!(err.to_string(), "provisioner.type cannot be empty");
    }

    #[test]
    fn test_nested_field_names() {
        let mut v = ConfigValidator::new().for_field("provisioner").for_field("options");
        v.non_empty("template", "");
        let err = v.result().unwrap_err();
        assert_eq!(
            err,
            ValidationError::Required {
                field: "provisioner.options.template".into()
            }
        );
    }

    #[test]
    fn test_converts_to_config_error() {
        let mut v = ConfigValidator::new();
        v.non_empty("name", "");
        let err: MeshcaError = v.result().unwrap_err().into();
        assert!(matches!(err, MeshcaError::Config { .. }));
    }

    #[test]
    fn test_valid_config_passes() {
        let mut v = ConfigValidator::new();
        v.non_empty("name", "edge1").non_empty_bytes("roots", b"pem");
        assert!(v.result().is_ok());
    }
}
